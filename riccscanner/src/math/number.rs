use std::cmp::Ordering;
use std::fmt;

fn gcd(mut a: i128, mut b: i128) -> i128 {
    a = a.abs();
    b = b.abs();
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Exact fraction in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    num: i128,
    den: i128,
}

impl Rational {
    pub const ZERO: Rational = Rational { num: 0, den: 1 };
    pub const ONE: Rational = Rational { num: 1, den: 1 };

    pub fn new(num: i128, den: i128) -> Option<Self> {
        if den == 0 || num == i128::MIN || den == i128::MIN {
            return None;
        }
        let g = gcd(num, den);
        let (mut num, mut den) = (num / g, den / g);
        if den < 0 {
            num = num.checked_neg()?;
            den = den.checked_neg()?;
        }
        Some(Self { num, den })
    }

    pub fn from_integer(n: i128) -> Self {
        Self { num: n, den: 1 }
    }

    pub fn numer(&self) -> i128 {
        self.num
    }

    pub fn denom(&self) -> i128 {
        self.den
    }

    pub fn is_integer(&self) -> bool {
        self.den == 1
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    pub fn is_negative(&self) -> bool {
        self.num < 0
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let num = self
            .num
            .checked_mul(other.den)?
            .checked_add(other.num.checked_mul(self.den)?)?;
        Self::new(num, self.den.checked_mul(other.den)?)
    }

    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        Self::new(
            self.num.checked_mul(other.num)?,
            self.den.checked_mul(other.den)?,
        )
    }

    pub fn checked_neg(&self) -> Option<Self> {
        Some(Self {
            num: self.num.checked_neg()?,
            den: self.den,
        })
    }

    pub fn recip(&self) -> Option<Self> {
        Self::new(self.den, self.num)
    }

    pub fn checked_pow(&self, exp: i64) -> Option<Self> {
        let base = if exp < 0 { self.recip()? } else { *self };
        let e = u32::try_from(exp.unsigned_abs()).ok()?;
        Self::new(base.num.checked_pow(e)?, base.den.checked_pow(e)?)
    }

    /// Integer part rounded toward negative infinity.
    pub fn floor(&self) -> i128 {
        self.num.div_euclid(self.den)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (
            self.num.checked_mul(other.den),
            other.num.checked_mul(self.den),
        ) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

/// A numeric value: exact whenever the arithmetic allows it, floating point
/// once something inexact (or too large) enters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Rational(Rational),
    Float(f64),
}

impl Number {
    pub fn zero() -> Self {
        Number::Rational(Rational::ZERO)
    }

    pub fn one() -> Self {
        Number::Rational(Rational::ONE)
    }

    pub fn integer(n: i128) -> Self {
        Number::Rational(Rational::from_integer(n))
    }

    pub fn rational(num: i128, den: i128) -> Self {
        match Rational::new(num, den) {
            Some(r) => Number::Rational(r),
            None => Number::Float(num as f64 / den as f64),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Rational(r) => r.to_f64(),
            Number::Float(v) => *v,
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Number::Rational(r) => Some(*r),
            Number::Float(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Number::Rational(r) if r.is_integer() => Some(r.numer()),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_zero(),
            Number::Float(v) => *v == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Number::Rational(r) if *r == Rational::ONE)
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Number::Rational(r) => r.is_negative(),
            Number::Float(v) => *v < 0.0,
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        if let (Number::Rational(a), Number::Rational(b)) = (self, other) {
            if let Some(sum) = a.checked_add(b) {
                return Number::Rational(sum);
            }
        }
        Number::Float(self.to_f64() + other.to_f64())
    }

    pub fn mul(&self, other: &Number) -> Number {
        if let (Number::Rational(a), Number::Rational(b)) = (self, other) {
            if let Some(product) = a.checked_mul(b) {
                return Number::Rational(product);
            }
        }
        Number::Float(self.to_f64() * other.to_f64())
    }

    pub fn neg(&self) -> Number {
        match self {
            Number::Rational(r) => match r.checked_neg() {
                Some(n) => Number::Rational(n),
                None => Number::Float(-r.to_f64()),
            },
            Number::Float(v) => Number::Float(-v),
        }
    }

    pub fn abs(&self) -> Number {
        if self.is_negative() {
            self.neg()
        } else {
            *self
        }
    }

    /// `self ** exp` for an integer exponent. Exact when possible.
    pub fn powi(&self, exp: i128) -> Option<Number> {
        if exp < 0 && self.is_zero() {
            return None;
        }
        if let Number::Rational(r) = self {
            if let Some(p) = i64::try_from(exp).ok().and_then(|e| r.checked_pow(e)) {
                return Some(Number::Rational(p));
            }
        }
        Some(Number::Float(self.to_f64().powf(exp as f64)))
    }
}

impl From<i128> for Number {
    fn from(n: i128) -> Self {
        Number::integer(n)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Rational(r) => write!(f, "{r}"),
            Number::Float(v) => write!(f, "{}", format_float(*v)),
        }
    }
}

/// Render a float the way people expect a calculator to: integral values keep
/// a trailing `.0`, everything else uses the shortest round-trip form.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0.0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e16 {
        return format!("{value:.1}");
    }
    if value.abs() >= 1e16 || value.abs() < 1e-4 {
        return format!("{value:e}");
    }
    format!("{value}")
}

/// Exact integer `n`-th root of a non-negative integer, if one exists.
pub fn exact_root(value: i128, n: u32) -> Option<i128> {
    if value < 0 || n == 0 {
        return None;
    }
    if value < 2 || n == 1 {
        return Some(value);
    }
    let guess = (value as f64).powf(1.0 / n as f64).round() as i128;
    (guess.saturating_sub(1)..=guess.saturating_add(1))
        .filter(|c| *c >= 0)
        .find(|c| c.checked_pow(n) == Some(value))
}

/// Split `value` into `(s, f)` with `value = s^2 * f` and `f` as square-free
/// as trial division up to a fixed bound finds.
pub fn extract_square(value: i128) -> (i128, i128) {
    const TRIAL_LIMIT: i128 = 100_000;

    let mut outside = 1i128;
    let mut inside = value;
    let mut p = 2i128;
    while p <= TRIAL_LIMIT && p * p <= inside {
        let square = p * p;
        while inside % square == 0 {
            inside /= square;
            outside *= p;
        }
        p += 1;
    }
    (outside, inside)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_normalizes_sign_and_gcd() {
        let r = Rational::new(6, -8).unwrap();
        assert_eq!(r.numer(), -3);
        assert_eq!(r.denom(), 4);
        assert!(Rational::new(1, 0).is_none());
    }

    #[test]
    fn exact_fraction_arithmetic() {
        let third = Number::rational(1, 3);
        let sixth = Number::rational(1, 6);
        assert_eq!(third.add(&sixth), Number::rational(1, 2));
        assert_eq!(third.mul(&sixth), Number::rational(1, 18));
    }

    #[test]
    fn overflow_degrades_to_float() {
        let big = Number::integer(i128::MAX);
        assert!(matches!(big.add(&Number::one()), Number::Float(_)));
    }

    #[test]
    fn powi_handles_negative_exponents() {
        assert_eq!(Number::integer(2).powi(-2), Some(Number::rational(1, 4)));
        assert_eq!(Number::zero().powi(-1), None);
    }

    #[test]
    fn floor_rounds_toward_negative_infinity() {
        assert_eq!(Rational::new(7, 2).unwrap().floor(), 3);
        assert_eq!(Rational::new(-7, 2).unwrap().floor(), -4);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Number::integer(14).to_string(), "14");
        assert_eq!(Number::rational(-1, 3).to_string(), "-1/3");
        assert_eq!(Number::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn format_float_keeps_trailing_zero() {
        assert_eq!(format_float(14.0), "14.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(1.0 / 3.0), "0.3333333333333333");
        assert_eq!(format_float(0.0), "0.0");
    }

    #[test]
    fn exact_roots() {
        assert_eq!(exact_root(144, 2), Some(12));
        assert_eq!(exact_root(27, 3), Some(3));
        assert_eq!(exact_root(2, 2), None);
    }

    #[test]
    fn square_extraction() {
        assert_eq!(extract_square(8), (2, 2));
        assert_eq!(extract_square(72), (6, 2));
        assert_eq!(extract_square(7), (1, 7));
    }
}
