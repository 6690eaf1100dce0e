use std::collections::BTreeSet;
use std::fmt;

use super::number::Number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Pi,
    /// Imaginary unit; only produced by square roots of negatives.
    I,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Log,
    Abs,
}

impl Func {
    pub fn name(&self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Log => "log",
            Func::Abs => "Abs",
        }
    }
}

/// Symbolic expression tree.
///
/// Subtraction is `a + (-1)*b`, division is `a * b**-1`, and `sqrt(x)` is
/// `x**(1/2)`. Simplified products keep their numeric coefficient first.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(Number),
    Sym(String),
    Const(Constant),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Func(Func, Box<Expr>),
}

impl Expr {
    pub fn int(n: i128) -> Expr {
        Expr::Num(Number::integer(n))
    }

    pub fn rational(num: i128, den: i128) -> Expr {
        Expr::Num(Number::rational(num, den))
    }

    pub fn sym(name: impl Into<String>) -> Expr {
        Expr::Sym(name.into())
    }

    pub fn pow(base: Expr, exp: Expr) -> Expr {
        Expr::Pow(Box::new(base), Box::new(exp))
    }

    pub fn sqrt(arg: Expr) -> Expr {
        Expr::pow(arg, Expr::rational(1, 2))
    }

    pub fn neg(e: Expr) -> Expr {
        Expr::Mul(vec![Expr::int(-1), e])
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Expr::Num(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_one())
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::Num(_) | Expr::Const(_) => {}
            Expr::Add(items) | Expr::Mul(items) => {
                for item in items {
                    item.collect_symbols(out);
                }
            }
            Expr::Pow(b, e) => {
                b.collect_symbols(out);
                e.collect_symbols(out);
            }
            Expr::Func(_, arg) => arg.collect_symbols(out),
        }
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        match self {
            Expr::Sym(s) => s == name,
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|i| i.contains_symbol(name)),
            Expr::Pow(b, e) => b.contains_symbol(name) || e.contains_symbol(name),
            Expr::Func(_, arg) => arg.contains_symbol(name),
        }
    }

    /// Replace every occurrence of symbol `name` with `value`. No simplification.
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Sym(s) if s == name => value.clone(),
            Expr::Num(_) | Expr::Sym(_) | Expr::Const(_) => self.clone(),
            Expr::Add(items) => Expr::Add(items.iter().map(|i| i.substitute(name, value)).collect()),
            Expr::Mul(items) => Expr::Mul(items.iter().map(|i| i.substitute(name, value)).collect()),
            Expr::Pow(b, e) => Expr::pow(b.substitute(name, value), e.substitute(name, value)),
            Expr::Func(f, arg) => Expr::Func(*f, Box::new(arg.substitute(name, value))),
        }
    }

    /// Split off a negative sign for printing: `(true, 3*x)` for `-3*x`.
    fn split_sign(&self) -> (bool, Expr) {
        match self {
            Expr::Num(n) if n.is_negative() => (true, Expr::Num(n.neg())),
            Expr::Mul(factors) => match factors.first() {
                Some(Expr::Num(n)) if n.is_negative() => {
                    let coeff = n.neg();
                    let mut rest: Vec<Expr> = factors[1..].to_vec();
                    if !coeff.is_one() {
                        rest.insert(0, Expr::Num(coeff));
                    }
                    let abs = match rest.len() {
                        0 => Expr::Num(coeff),
                        1 => rest.remove(0),
                        _ => Expr::Mul(rest),
                    };
                    (true, abs)
                }
                _ => (false, self.clone()),
            },
            _ => (false, self.clone()),
        }
    }
}

fn negative_exponent(e: &Expr) -> Option<Expr> {
    match e {
        Expr::Pow(base, exp) => match exp.as_ref() {
            Expr::Num(n) if n.is_negative() => {
                let flipped = n.neg();
                if flipped.is_one() {
                    Some(base.as_ref().clone())
                } else {
                    Some(Expr::pow(base.as_ref().clone(), Expr::Num(flipped)))
                }
            }
            _ => None,
        },
        _ => None,
    }
}

fn is_half(e: &Expr) -> bool {
    matches!(e, Expr::Num(n) if *n == Number::rational(1, 2))
}

/// Binding strength used to decide where parentheses go.
fn precedence(e: &Expr) -> u8 {
    match e {
        Expr::Add(_) => 1,
        Expr::Mul(_) => 2,
        Expr::Num(Number::Rational(r)) if !r.is_integer() => 2,
        Expr::Num(n) if n.is_negative() => 2,
        Expr::Pow(_, exp) if is_half(exp) => 4,
        Expr::Pow(_, exp) if matches!(exp.as_ref(), Expr::Num(n) if n.is_negative()) => 2,
        Expr::Pow(..) => 3,
        _ => 4,
    }
}

fn write_wrapped(f: &mut fmt::Formatter<'_>, e: &Expr, min_prec: u8) -> fmt::Result {
    if precedence(e) < min_prec {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

fn write_product(f: &mut fmt::Formatter<'_>, factors: &[Expr]) -> fmt::Result {
    let mut numer: Vec<Expr> = Vec::new();
    let mut denom: Vec<Expr> = Vec::new();

    for factor in factors {
        match factor {
            Expr::Num(Number::Rational(r)) if !r.is_integer() => {
                if r.numer() != 1 {
                    numer.push(Expr::int(r.numer()));
                }
                denom.push(Expr::int(r.denom()));
            }
            other => match negative_exponent(other) {
                Some(inverted) => denom.push(inverted),
                None => numer.push(other.clone()),
            },
        }
    }

    if numer.is_empty() {
        write!(f, "1")?;
    } else {
        for (i, factor) in numer.iter().enumerate() {
            if i > 0 {
                write!(f, "*")?;
            }
            write_wrapped(f, factor, 3)?;
        }
    }

    match denom.len() {
        0 => Ok(()),
        1 => {
            write!(f, "/")?;
            write_wrapped(f, &denom[0], 3)
        }
        _ => {
            write!(f, "/(")?;
            for (i, factor) in denom.iter().enumerate() {
                if i > 0 {
                    write!(f, "*")?;
                }
                write_wrapped(f, factor, 3)?;
            }
            write!(f, ")")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{n}"),
            Expr::Sym(s) => write!(f, "{s}"),
            Expr::Const(Constant::Pi) => write!(f, "pi"),
            Expr::Const(Constant::I) => write!(f, "I"),
            Expr::Func(func, arg) => write!(f, "{}({})", func.name(), arg),
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (negative, abs) = term.split_sign();
                    match (i, negative) {
                        (0, true) => {
                            write!(f, "-")?;
                            write_wrapped(f, &abs, 2)?;
                        }
                        (0, false) => write!(f, "{abs}")?,
                        (_, true) => {
                            write!(f, " - ")?;
                            write_wrapped(f, &abs, 2)?;
                        }
                        (_, false) => write!(f, " + {abs}")?,
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => {
                let (negative, abs) = self.split_sign();
                if negative {
                    write!(f, "-")?;
                    match abs {
                        Expr::Mul(rest) => write_product(f, &rest),
                        other => write_wrapped(f, &other, 3),
                    }
                } else {
                    write_product(f, factors)
                }
            }
            Expr::Pow(base, exp) => {
                if is_half(exp) {
                    return write!(f, "sqrt({base})");
                }
                if let Some(inverted) = negative_exponent(self) {
                    write!(f, "1/")?;
                    return write_wrapped(f, &inverted, 3);
                }
                write_wrapped(f, base, 4)?;
                write!(f, "**")?;
                write_wrapped(f, exp, 4)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_polynomial() {
        let e = Expr::Add(vec![
            Expr::pow(Expr::sym("y"), Expr::int(2)),
            Expr::Mul(vec![Expr::int(-2), Expr::sym("y")]),
            Expr::int(1),
        ]);
        assert_eq!(e.to_string(), "y**2 - 2*y + 1");
    }

    #[test]
    fn display_fraction_coefficient() {
        let e = Expr::Mul(vec![Expr::rational(3, 2), Expr::sym("y")]);
        assert_eq!(e.to_string(), "3*y/2");
        let half = Expr::Mul(vec![Expr::rational(-1, 2), Expr::sym("y")]);
        assert_eq!(half.to_string(), "-y/2");
    }

    #[test]
    fn display_sqrt_and_reciprocal() {
        assert_eq!(Expr::sqrt(Expr::int(2)).to_string(), "sqrt(2)");
        assert_eq!(
            Expr::pow(Expr::sym("z"), Expr::int(-1)).to_string(),
            "1/z"
        );
        let ratio = Expr::Mul(vec![
            Expr::sym("a"),
            Expr::pow(Expr::sym("b"), Expr::int(-1)),
        ]);
        assert_eq!(ratio.to_string(), "a/b");
    }

    #[test]
    fn display_wraps_sums_inside_products() {
        let e = Expr::Mul(vec![
            Expr::int(2),
            Expr::Add(vec![Expr::sym("a"), Expr::int(1)]),
        ]);
        assert_eq!(e.to_string(), "2*(a + 1)");
    }

    #[test]
    fn display_complex_root() {
        let e = Expr::Add(vec![
            Expr::int(-1),
            Expr::Mul(vec![
                Expr::int(-1),
                Expr::sqrt(Expr::int(3)),
                Expr::Const(Constant::I),
            ]),
        ]);
        assert_eq!(e.to_string(), "-1 - sqrt(3)*I");
    }

    #[test]
    fn free_symbols_are_sorted() {
        let e = Expr::Add(vec![Expr::sym("z"), Expr::sym("a"), Expr::sym("z")]);
        let syms: Vec<String> = e.free_symbols().into_iter().collect();
        assert_eq!(syms, vec!["a".to_string(), "z".to_string()]);
    }

    #[test]
    fn substitute_replaces_symbol() {
        let e = Expr::Add(vec![Expr::sym("y"), Expr::int(1)]);
        let replaced = e.substitute("y", &Expr::int(4));
        assert!(!replaced.contains_symbol("y"));
    }
}
