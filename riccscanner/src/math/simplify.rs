use std::cmp::Ordering;
use std::f64::consts::PI;

use super::expr::{Constant, Expr, Func};
use super::number::{exact_root, extract_square, Number, Rational};
use super::MathError;

type Result<T> = std::result::Result<T, MathError>;

/// `(coefficient, rest)` with `term = coefficient * rest`.
fn split_coeff(term: &Expr) -> (Number, Expr) {
    match term {
        Expr::Num(n) => (*n, Expr::int(1)),
        Expr::Mul(factors) => match factors.split_first() {
            Some((Expr::Num(n), rest)) => {
                let rest = match rest.len() {
                    0 => Expr::int(1),
                    1 => rest[0].clone(),
                    _ => Expr::Mul(rest.to_vec()),
                };
                (*n, rest)
            }
            _ => (Number::one(), term.clone()),
        },
        _ => (Number::one(), term.clone()),
    }
}

fn with_coeff(coeff: Number, rest: Expr) -> Expr {
    if coeff.is_one() {
        return rest;
    }
    match rest {
        Expr::Mul(mut factors) => {
            factors.insert(0, Expr::Num(coeff));
            Expr::Mul(factors)
        }
        other => Expr::Mul(vec![Expr::Num(coeff), other]),
    }
}

fn degree(e: &Expr) -> i128 {
    match e {
        Expr::Sym(_) => 1,
        Expr::Pow(base, exp) => match exp.as_number().and_then(Number::as_integer) {
            Some(n) => degree(base).saturating_mul(n),
            None => degree(base),
        },
        Expr::Mul(items) => items.iter().map(degree).fold(0, i128::saturating_add),
        Expr::Add(items) => items.iter().map(degree).max().unwrap_or(0),
        Expr::Func(_, arg) => degree(arg).min(1),
        Expr::Num(_) | Expr::Const(_) => 0,
    }
}

/// Highest degree first, then by the printed form of the non-numeric part.
fn compare_terms(a: &Expr, b: &Expr) -> Ordering {
    let (_, rest_a) = split_coeff(a);
    let (_, rest_b) = split_coeff(b);
    degree(&rest_b)
        .cmp(&degree(&rest_a))
        .then_with(|| rest_a.to_string().cmp(&rest_b.to_string()))
}

fn factor_rank(e: &Expr) -> u8 {
    match e {
        Expr::Num(_) => 0,
        Expr::Const(Constant::Pi) => 1,
        Expr::Const(Constant::I) => 3,
        _ => 2,
    }
}

fn compare_factors(a: &Expr, b: &Expr) -> Ordering {
    factor_rank(a)
        .cmp(&factor_rank(b))
        .then_with(|| a.to_string().cmp(&b.to_string()))
}

/// Canonical sum: flattened, like terms collected, numeric part folded.
pub fn add(terms: Vec<Expr>) -> Expr {
    let mut constant = Number::zero();
    let mut groups: Vec<(Expr, Number)> = Vec::new();
    let mut work = terms;

    while let Some(term) = work.pop() {
        match term {
            Expr::Add(items) => work.extend(items),
            Expr::Num(n) => constant = constant.add(&n),
            other => {
                let (coeff, rest) = split_coeff(&other);
                match groups.iter_mut().find(|(r, _)| *r == rest) {
                    Some((_, total)) => *total = total.add(&coeff),
                    None => groups.push((rest, coeff)),
                }
            }
        }
    }

    let mut out: Vec<Expr> = groups
        .into_iter()
        .filter(|(_, coeff)| !coeff.is_zero())
        .map(|(rest, coeff)| with_coeff(coeff, rest))
        .collect();
    out.sort_by(compare_terms);

    if !constant.is_zero() {
        let symbolic = out.iter().any(|t| !t.free_symbols().is_empty());
        let leading_negative = out.first().map_or(false, |t| split_coeff(t).0.is_negative());
        // `5 - y` rather than `-y + 5`
        if symbolic && !(leading_negative && !constant.is_negative()) {
            out.push(Expr::Num(constant));
        } else {
            out.insert(0, Expr::Num(constant));
        }
    }

    match out.len() {
        0 => Expr::Num(constant),
        1 => out.remove(0),
        _ => Expr::Add(out),
    }
}

fn push_factor(groups: &mut Vec<(Expr, Vec<Expr>)>, base: Expr, exp: Expr) {
    match groups.iter_mut().find(|(b, _)| *b == base) {
        Some((_, exps)) => exps.push(exp),
        None => groups.push((base, vec![exp])),
    }
}

/// `sqrt(2)*sqrt(3)` becomes `sqrt(6)`. Only positive rational radicands.
fn merge_square_roots(groups: &mut Vec<(Expr, Vec<Expr>)>) {
    let half = Expr::rational(1, 2);
    let is_root = |(base, exps): &(Expr, Vec<Expr>)| {
        matches!(base, Expr::Num(Number::Rational(r)) if !r.is_negative())
            && exps.len() == 1
            && exps[0] == half
    };
    if groups.iter().filter(|g| is_root(g)).count() < 2 {
        return;
    }

    let mut product = Number::one();
    groups.retain(|g| {
        if !is_root(g) {
            return true;
        }
        if let Expr::Num(n) = &g.0 {
            product = product.mul(n);
        }
        false
    });
    groups.push((Expr::Num(product), vec![half]));
}

/// Canonical product: coefficient first, equal bases merged, a lone sum
/// multiplied out by its numeric coefficient.
pub fn mul(factors: Vec<Expr>) -> Result<Expr> {
    mul_pass(factors, true)
}

fn mul_pass(factors: Vec<Expr>, regroup: bool) -> Result<Expr> {
    let mut coeff = Number::one();
    let mut groups: Vec<(Expr, Vec<Expr>)> = Vec::new();
    let mut work = factors;

    while let Some(factor) = work.pop() {
        match factor {
            Expr::Num(n) => coeff = coeff.mul(&n),
            Expr::Mul(items) => work.extend(items),
            Expr::Pow(base, exp) => push_factor(&mut groups, *base, *exp),
            other => push_factor(&mut groups, other, Expr::int(1)),
        }
    }
    if coeff.is_zero() {
        return Ok(Expr::Num(coeff));
    }
    merge_square_roots(&mut groups);

    let mut out = Vec::new();
    let mut reshaped = false;
    for (base, exps) in groups {
        match pow(base, add(exps))? {
            Expr::Num(n) => coeff = coeff.mul(&n),
            Expr::Mul(items) => {
                reshaped = true;
                for item in items {
                    match item {
                        Expr::Num(n) => coeff = coeff.mul(&n),
                        other => out.push(other),
                    }
                }
            }
            other => out.push(other),
        }
    }

    // Powers that split into products (I*I, (2*y)**2 * y) need one more round.
    if reshaped && regroup {
        out.push(Expr::Num(coeff));
        return mul_pass(out, false);
    }
    if coeff.is_zero() || out.is_empty() {
        return Ok(Expr::Num(coeff));
    }

    out.sort_by(compare_factors);
    if out.len() == 1 {
        if coeff.is_one() {
            return Ok(out.remove(0));
        }
        if let Expr::Add(terms) = &out[0] {
            let distributed = terms
                .iter()
                .map(|t| mul_pass(vec![Expr::Num(coeff), t.clone()], true))
                .collect::<Result<Vec<_>>>()?;
            return Ok(add(distributed));
        }
    }

    if !coeff.is_one() {
        out.insert(0, Expr::Num(coeff));
    }
    Ok(Expr::Mul(out))
}

pub fn pow(base: Expr, exp: Expr) -> Result<Expr> {
    if exp.is_zero() {
        return Ok(Expr::int(1));
    }
    if exp.is_one() || base.is_one() {
        return Ok(base);
    }
    if base.is_zero() {
        return match exp.as_number() {
            Some(n) if n.is_negative() => Err(MathError::DivisionByZero),
            Some(_) => Ok(base),
            None => Ok(Expr::pow(base, exp)),
        };
    }

    let integer_exp = exp.as_number().and_then(Number::as_integer);
    match (&base, &exp) {
        (Expr::Num(b), Expr::Num(e)) => num_pow(*b, *e),
        (Expr::Const(Constant::I), _) if integer_exp.is_some() => {
            Ok(match integer_exp.unwrap_or(0).rem_euclid(4) {
                0 => Expr::int(1),
                1 => Expr::Const(Constant::I),
                2 => Expr::int(-1),
                _ => Expr::Mul(vec![Expr::int(-1), Expr::Const(Constant::I)]),
            })
        }
        (Expr::Pow(inner, inner_exp), _) if integer_exp.is_some() => {
            let combined = mul(vec![inner_exp.as_ref().clone(), exp.clone()])?;
            pow(inner.as_ref().clone(), combined)
        }
        (Expr::Mul(factors), _) if integer_exp.is_some() => {
            let powered = factors
                .iter()
                .map(|f| pow(f.clone(), exp.clone()))
                .collect::<Result<Vec<_>>>()?;
            mul(powered)
        }
        (Expr::Mul(factors), Expr::Num(_)) => match factors.split_first() {
            // sqrt(4*a) -> 2*sqrt(a)
            Some((Expr::Num(c), rest)) if !c.is_negative() => {
                let rest = match rest.len() {
                    0 => Expr::int(1),
                    1 => rest[0].clone(),
                    _ => Expr::Mul(rest.to_vec()),
                };
                mul(vec![pow(Expr::Num(*c), exp.clone())?, pow(rest, exp.clone())?])
            }
            _ => Ok(Expr::pow(base.clone(), exp.clone())),
        },
        _ => Ok(Expr::pow(base.clone(), exp.clone())),
    }
}

fn num_pow(base: Number, exp: Number) -> Result<Expr> {
    if let (Number::Rational(b), Number::Rational(e)) = (base, exp) {
        return rational_pow(b, e);
    }

    let (b, e) = (base.to_f64(), exp.to_f64());
    if b < 0.0 && e.fract() != 0.0 {
        return Ok(Expr::pow(Expr::Num(base), Expr::Num(exp)));
    }
    Ok(Expr::Num(Number::Float(b.powf(e))))
}

fn rational_pow(base: Rational, exp: Rational) -> Result<Expr> {
    if exp.is_integer() {
        return Number::Rational(base)
            .powi(exp.numer())
            .map(Expr::Num)
            .ok_or(MathError::DivisionByZero);
    }

    let q = exp.denom();
    let whole = exp.floor();
    let frac = exp.numer().rem_euclid(q);
    let outside = Number::Rational(base)
        .powi(whole)
        .ok_or(MathError::DivisionByZero)?;
    let root = rational_root(base, frac, q);
    if outside.is_one() {
        return Ok(root);
    }
    mul(vec![Expr::Num(outside), root])
}

/// `base ** (m/q)` with `0 < m < q`. Never calls back into `mul`.
fn rational_root(base: Rational, m: i128, q: i128) -> Expr {
    let unevaluated = || {
        Expr::pow(
            Expr::Num(Number::Rational(base)),
            Expr::rational(m, q),
        )
    };
    let Ok(n) = u32::try_from(q) else {
        return unevaluated();
    };
    let negative = base.is_negative();
    let Some(magnitude) = (if negative { base.checked_neg() } else { Some(base) }) else {
        return unevaluated();
    };

    let assemble = |coeff: Number, radical: Option<Expr>| {
        let mut factors = Vec::new();
        if !coeff.is_one() {
            factors.push(Expr::Num(coeff));
        }
        factors.extend(radical);
        if negative {
            factors.push(Expr::Const(Constant::I));
        }
        match factors.len() {
            0 => Expr::int(1),
            1 => factors.remove(0),
            _ => Expr::Mul(factors),
        }
    };

    if let (Some(rn), Some(rd)) = (
        exact_root(magnitude.numer(), n),
        exact_root(magnitude.denom(), n),
    ) {
        let Some(root) = Number::rational(rn, rd).powi(m) else {
            return unevaluated();
        };
        if !negative {
            return Expr::Num(root);
        }
        if q == 2 {
            return assemble(root, None);
        }
        return unevaluated();
    }

    if q != 2 {
        return unevaluated();
    }

    // sqrt(n/d) = sqrt(n*d)/d, with square factors of n*d pulled out
    let Some(nd) = magnitude.numer().checked_mul(magnitude.denom()) else {
        return unevaluated();
    };
    let (outside, inside) = extract_square(nd);
    assemble(
        Number::rational(outside, magnitude.denom()),
        Some(Expr::sqrt(Expr::int(inside))),
    )
}

pub fn func(f: Func, arg: Expr) -> Result<Expr> {
    if let Expr::Num(n) = &arg {
        if n.is_zero() {
            return match f {
                Func::Sin | Func::Tan | Func::Abs => Ok(Expr::int(0)),
                Func::Cos => Ok(Expr::int(1)),
                Func::Log => Err(MathError::Undefined),
            };
        }
        if f == Func::Log && n.is_one() {
            return Ok(Expr::int(0));
        }
        if f == Func::Abs {
            return Ok(Expr::Num(n.abs()));
        }
        if let Number::Float(v) = n {
            let value = apply(f, *v);
            if value.is_finite() {
                return Ok(Expr::Num(Number::Float(value)));
            }
        }
    }

    if arg == Expr::Const(Constant::Pi) {
        match f {
            Func::Sin | Func::Tan => return Ok(Expr::int(0)),
            Func::Cos => return Ok(Expr::int(-1)),
            Func::Abs => return Ok(arg),
            Func::Log => {}
        }
    }

    Ok(Expr::Func(f, Box::new(arg)))
}

fn apply(f: Func, v: f64) -> f64 {
    match f {
        Func::Sin => v.sin(),
        Func::Cos => v.cos(),
        Func::Tan => v.tan(),
        Func::Log => v.ln(),
        Func::Abs => v.abs(),
    }
}

/// Bottom-up simplification into canonical form.
pub fn simplify(expr: &Expr) -> Result<Expr> {
    match expr {
        Expr::Num(_) | Expr::Sym(_) | Expr::Const(_) => Ok(expr.clone()),
        Expr::Add(items) => Ok(add(items.iter().map(simplify).collect::<Result<_>>()?)),
        Expr::Mul(items) => mul(items.iter().map(simplify).collect::<Result<_>>()?),
        Expr::Pow(base, exp) => pow(simplify(base)?, simplify(exp)?),
        Expr::Func(f, arg) => func(*f, simplify(arg)?),
    }
}

/// Numeric value of a symbol-free, real expression.
pub fn evaluate(expr: &Expr) -> Result<f64> {
    let value = eval(expr)?;
    if value.is_nan() {
        Err(MathError::NotReal)
    } else if value.is_infinite() {
        Err(MathError::Undefined)
    } else {
        Ok(value)
    }
}

fn eval(expr: &Expr) -> Result<f64> {
    match expr {
        Expr::Num(n) => Ok(n.to_f64()),
        Expr::Sym(s) => Err(MathError::NotNumeric(s.clone())),
        Expr::Const(Constant::Pi) => Ok(PI),
        Expr::Const(Constant::I) => Err(MathError::NotReal),
        Expr::Add(items) => items
            .iter()
            .try_fold(0.0, |acc, item| eval(item).map(|v| acc + v)),
        Expr::Mul(items) => items
            .iter()
            .try_fold(1.0, |acc, item| eval(item).map(|v| acc * v)),
        Expr::Pow(base, exp) => {
            let value = eval(base)?.powf(eval(exp)?);
            if value.is_nan() {
                Err(MathError::NotReal)
            } else {
                Ok(value)
            }
        }
        Expr::Func(f, arg) => Ok(apply(*f, eval(arg)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn simplified(input: &str) -> String {
        simplify(&parse(input).unwrap()).unwrap().to_string()
    }

    #[test]
    fn folds_constants() {
        assert_eq!(simplified("2+3*4"), "14");
        assert_eq!(simplified("1/3+1/6"), "1/2");
        assert_eq!(simplified("0.1+0.2"), "3/10");
    }

    #[test]
    fn collects_like_terms() {
        assert_eq!(simplified("2*y+3*y-1"), "5*y - 1");
        assert_eq!(simplified("y-y"), "0");
        assert_eq!(simplified("a+b+a"), "2*a + b");
    }

    #[test]
    fn merges_powers() {
        assert_eq!(simplified("y*y"), "y**2");
        assert_eq!(simplified("y**2*y"), "y**3");
        assert_eq!(simplified("y/y"), "1");
        assert_eq!(simplified("(2*y)**2"), "4*y**2");
    }

    #[test]
    fn orders_polynomials_by_degree() {
        assert_eq!(simplified("1-2*y+y**2"), "y**2 - 2*y + 1");
        assert_eq!(simplified("5-y"), "5 - y");
    }

    #[test]
    fn distributes_numeric_factor() {
        assert_eq!(simplified("2*(y+1)"), "2*y + 2");
        assert_eq!(simplified("(y+1)**2"), "(y + 1)**2");
    }

    #[test]
    fn simplifies_radicals() {
        assert_eq!(simplified("sqrt(16)"), "4");
        assert_eq!(simplified("sqrt(8)"), "2*sqrt(2)");
        assert_eq!(simplified("1/sqrt(2)"), "sqrt(2)/2");
        assert_eq!(simplified("sqrt(2)*sqrt(2)"), "2");
        assert_eq!(simplified("sqrt(2)*sqrt(3)"), "sqrt(6)");
        assert_eq!(simplified("8**(1/3)"), "2");
    }

    #[test]
    fn square_roots_of_negatives_are_imaginary() {
        assert_eq!(simplified("sqrt(-4)"), "2*I");
        assert_eq!(simplified("sqrt(-1)*sqrt(-1)"), "-1");
    }

    #[test]
    fn exact_function_values() {
        assert_eq!(simplified("sin(0)+cos(0)"), "1");
        assert_eq!(simplified("log(1)"), "0");
        assert_eq!(simplified("abs(-3)"), "3");
        assert_eq!(simplified("cos(pi)"), "-1");
        assert_eq!(simplified("sin(1/2)"), "sin(1/2)");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = simplify(&parse("1/0").unwrap()).unwrap_err();
        assert_eq!(err, MathError::DivisionByZero);
    }

    #[test]
    fn evaluate_numbers() {
        let third = simplify(&parse("1/3").unwrap()).unwrap();
        assert!((evaluate(&third).unwrap() - 1.0 / 3.0).abs() < 1e-15);
        let pi = parse("2*pi").unwrap();
        assert!((evaluate(&pi).unwrap() - 2.0 * PI).abs() < 1e-12);
    }

    #[test]
    fn evaluate_rejects_symbols_and_complex() {
        assert_eq!(
            evaluate(&parse("y+1").unwrap()),
            Err(MathError::NotNumeric("y".to_string()))
        );
        let imaginary = simplify(&parse("sqrt(-4)").unwrap()).unwrap();
        assert_eq!(evaluate(&imaginary), Err(MathError::NotReal));
    }
}
