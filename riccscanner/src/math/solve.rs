use super::expr::Expr;
use super::number::{format_float, Number, Rational};
use super::parser::parse;
use super::simplify::{add, evaluate, mul, pow, simplify};
use super::MathError;
use crate::config::SolverConfig;

type Result<T> = std::result::Result<T, MathError>;

const MAX_POLY_DEGREE: usize = 10;
const SCAN_LIMIT: f64 = 1000.0;
const SCAN_STEPS: usize = 8000;
const ROOT_TOLERANCE: f64 = 1e-6;
/// Divisor enumeration for rational-root candidates stops above this.
const MAX_DIVISOR_SEARCH: i128 = 10_000_000_000;
/// Above this many `p/q` pairs the rational root search is skipped in favour
/// of the numeric scan.
const MAX_ROOT_CANDIDATES: usize = 100_000;

/// Solve or evaluate normalized OCR text and render the human-readable report.
///
/// Text containing `=` is treated as an equation, anything else as an
/// expression. Failures are reported inline rather than returned, so the
/// caller always has something to show.
pub fn solve_expression(text: &str, config: &SolverConfig) -> String {
    let outcome = if text.chars().count() > config.max_expression_len {
        Err(MathError::TooLong(config.max_expression_len))
    } else if let Some((left, right)) = text.split_once('=') {
        let (left, right) = (left.trim(), right.trim());
        if left.is_empty() || right.is_empty() {
            return "Error: Invalid equation format".to_string();
        }
        solve_equation(left, right)
            .map(|solution| format!("Equation: {left} = {right}\nSolution: {solution}"))
    } else {
        describe_expression(text)
    };

    outcome.unwrap_or_else(|err| {
        tracing::debug!(text, error = %err, "Could not solve");
        format!("Error parsing: {text}\nDetails: {err}")
    })
}

fn describe_expression(text: &str) -> Result<String> {
    let simplified = simplify(&parse(text)?)?;
    if !simplified.free_symbols().is_empty() {
        return Ok(format!("Expression: {text}\nSimplified: {simplified}"));
    }

    let value = evaluate(&simplified)?;
    Ok(format!(
        "Expression: {text}\nSimplified: {simplified}\nResult: {}",
        format_float(value)
    ))
}

fn solve_equation(left: &str, right: &str) -> Result<String> {
    let lhs = parse(left)?;
    let rhs = parse(right)?;
    let f = simplify(&Expr::Add(vec![lhs, Expr::neg(rhs)]))?;

    let symbols = f.free_symbols();
    let Some(unknown) = symbols.iter().next().cloned() else {
        return Ok(if f.is_zero() { "True" } else { "False" }.to_string());
    };
    let single = symbols.len() == 1;

    let roots = find_roots(&f, &unknown, single)?;
    let rendered: Vec<String> = roots
        .iter()
        .map(|root| {
            if single {
                root.to_string()
            } else {
                format!("{{{unknown}: {root}}}")
            }
        })
        .collect();

    Ok(format!("[{}]", rendered.join(", ")))
}

fn find_roots(f: &Expr, unknown: &str, single: bool) -> Result<Vec<Expr>> {
    if let Some(coeffs) = polynomial(f, unknown)? {
        match coeffs.len() {
            0 | 1 => return Ok(Vec::new()),
            2 => return Ok(vec![linear_root(&coeffs[0], &coeffs[1])?]),
            3 => return Ok(sort_roots(quadratic_roots(&coeffs[0], &coeffs[1], &coeffs[2])?)),
            _ => {
                if let Some(exact) = rational_coefficients(&coeffs) {
                    if let Some(roots) = solve_rational_polynomial(exact)? {
                        return Ok(sort_roots(roots));
                    }
                }
            }
        }
    }

    if !single {
        return Err(MathError::Unsolvable(format!("could not solve for {unknown}")));
    }

    tracing::debug!(unknown, "Falling back to numeric root search");
    let roots = scan_roots(|x| {
        evaluate(&f.substitute(unknown, &Expr::Num(Number::Float(x)))).ok()
    });
    Ok(roots
        .into_iter()
        .map(|r| Expr::Num(Number::Float(r)))
        .collect())
}

// ---------- polynomial extraction ----------

/// Coefficients of `e` as a polynomial in `var`, lowest power first, with
/// trailing zeros removed. `None` when `e` is not a polynomial in `var`.
fn polynomial(e: &Expr, var: &str) -> Result<Option<Vec<Expr>>> {
    let Some(mut coeffs) = expand(e, var)? else {
        return Ok(None);
    };
    while coeffs.len() > 1 && coeffs.last().is_some_and(Expr::is_zero) {
        coeffs.pop();
    }
    if coeffs.len() == 1 && coeffs[0].is_zero() {
        coeffs.clear();
    }
    Ok(Some(coeffs))
}

fn expand(e: &Expr, var: &str) -> Result<Option<Vec<Expr>>> {
    if !e.contains_symbol(var) {
        return Ok(Some(vec![e.clone()]));
    }

    match e {
        Expr::Sym(_) => Ok(Some(vec![Expr::int(0), Expr::int(1)])),
        Expr::Add(items) => {
            let mut acc = Vec::new();
            for item in items {
                let Some(p) = expand(item, var)? else {
                    return Ok(None);
                };
                acc = poly_add(acc, p);
            }
            Ok(Some(acc))
        }
        Expr::Mul(items) => {
            let mut acc = vec![Expr::int(1)];
            for item in items {
                let Some(p) = expand(item, var)? else {
                    return Ok(None);
                };
                acc = poly_mul(&acc, &p)?;
                if acc.len() > MAX_POLY_DEGREE + 1 {
                    return Ok(None);
                }
            }
            Ok(Some(acc))
        }
        Expr::Pow(base, exp) => {
            let n = match exp.as_number().and_then(Number::as_integer) {
                Some(n) if (0..=MAX_POLY_DEGREE as i128).contains(&n) => n,
                _ => return Ok(None),
            };
            let Some(p) = expand(base, var)? else {
                return Ok(None);
            };
            let mut acc = vec![Expr::int(1)];
            for _ in 0..n {
                acc = poly_mul(&acc, &p)?;
                if acc.len() > MAX_POLY_DEGREE + 1 {
                    return Ok(None);
                }
            }
            Ok(Some(acc))
        }
        _ => Ok(None),
    }
}

fn poly_add(a: Vec<Expr>, b: Vec<Expr>) -> Vec<Expr> {
    let len = a.len().max(b.len());
    let mut a = a.into_iter();
    let mut b = b.into_iter();
    (0..len)
        .map(|_| match (a.next(), b.next()) {
            (Some(x), Some(y)) => add(vec![x, y]),
            (Some(x), None) | (None, Some(x)) => x,
            (None, None) => Expr::int(0),
        })
        .collect()
}

fn poly_mul(a: &[Expr], b: &[Expr]) -> Result<Vec<Expr>> {
    if a.is_empty() || b.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = vec![Expr::int(0); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            let term = mul(vec![x.clone(), y.clone()])?;
            out[i + j] = add(vec![out[i + j].clone(), term]);
        }
    }
    Ok(out)
}

// ---------- closed forms ----------

fn linear_root(c0: &Expr, c1: &Expr) -> Result<Expr> {
    mul(vec![Expr::int(-1), c0.clone(), pow(c1.clone(), Expr::int(-1))?])
}

/// Roots of `a*x**2 + b*x + c`, the `-` branch first.
fn quadratic_roots(c: &Expr, b: &Expr, a: &Expr) -> Result<Vec<Expr>> {
    let discriminant = add(vec![
        pow(b.clone(), Expr::int(2))?,
        mul(vec![Expr::int(-4), a.clone(), c.clone()])?,
    ]);
    let inverse_denominator = pow(mul(vec![Expr::int(2), a.clone()])?, Expr::int(-1))?;
    let minus_b = mul(vec![Expr::int(-1), b.clone()])?;

    if discriminant.is_zero() {
        return Ok(vec![mul(vec![minus_b, inverse_denominator])?]);
    }

    let root = pow(discriminant, Expr::rational(1, 2))?;
    let lower = mul(vec![
        add(vec![minus_b.clone(), mul(vec![Expr::int(-1), root.clone()])?]),
        inverse_denominator.clone(),
    ])?;
    let upper = mul(vec![add(vec![minus_b, root]), inverse_denominator])?;
    Ok(vec![lower, upper])
}

// ---------- rational polynomials of higher degree ----------

fn rational_coefficients(coeffs: &[Expr]) -> Option<Vec<Rational>> {
    coeffs
        .iter()
        .map(|c| c.as_number().and_then(Number::as_rational))
        .collect()
}

fn gcd(a: i128, b: i128) -> i128 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

/// Scale to integer coefficients with the same roots.
fn integer_coefficients(coeffs: &[Rational]) -> Option<Vec<i128>> {
    let mut lcm = 1i128;
    for c in coeffs {
        lcm = (lcm / gcd(lcm, c.denom())).checked_mul(c.denom())?;
    }
    coeffs
        .iter()
        .map(|c| c.numer().checked_mul(lcm / c.denom()))
        .collect()
}

fn divisors(n: i128) -> Option<Vec<i128>> {
    let n = n.checked_abs()?;
    if n == 0 || n > MAX_DIVISOR_SEARCH {
        return None;
    }
    let mut out = Vec::new();
    let mut d = 1;
    while d * d <= n {
        if n % d == 0 {
            out.push(d);
            if d != n / d {
                out.push(n / d);
            }
        }
        d += 1;
    }
    Some(out)
}

fn horner(coeffs: &[Rational], x: Rational) -> Option<Rational> {
    coeffs
        .iter()
        .rev()
        .try_fold(Rational::ZERO, |acc, c| acc.checked_mul(&x)?.checked_add(c))
}

/// Rational root theorem: candidates `±p/q` with `p | a0` and `q | an`.
fn find_rational_root(coeffs: &[Rational]) -> Option<Rational> {
    let ints = integer_coefficients(coeffs)?;
    let constant_divisors = divisors(*ints.first()?)?;
    let leading_divisors = divisors(*ints.last()?)?;
    let candidates = constant_divisors.len().saturating_mul(leading_divisors.len());
    if candidates > MAX_ROOT_CANDIDATES {
        tracing::debug!(candidates, "Too many rational root candidates");
        return None;
    }

    for p in &constant_divisors {
        for q in &leading_divisors {
            for sign in [1, -1] {
                let Some(candidate) = Rational::new(sign * p, *q) else {
                    continue;
                };
                if horner(coeffs, candidate).is_some_and(|v| v.is_zero()) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

/// Divide by `(x - root)`.
fn deflate(coeffs: &[Rational], root: Rational) -> Option<Vec<Rational>> {
    let n = coeffs.len() - 1;
    let mut quotient = vec![Rational::ZERO; n];
    let mut carry = Rational::ZERO;
    for i in (1..=n).rev() {
        carry = coeffs[i].checked_add(&carry.checked_mul(&root)?)?;
        quotient[i - 1] = carry;
    }
    Some(quotient)
}

fn solve_rational_polynomial(coeffs: Vec<Rational>) -> Result<Option<Vec<Expr>>> {
    let mut coeffs = coeffs;
    let mut roots: Vec<Expr> = Vec::new();

    loop {
        if coeffs.len() > 1 && coeffs[0].is_zero() {
            coeffs.remove(0);
            push_unique(&mut roots, Expr::int(0));
            continue;
        }
        if coeffs.len() <= 3 {
            break;
        }
        let Some(root) = find_rational_root(&coeffs) else {
            break;
        };
        let Some(quotient) = deflate(&coeffs, root) else {
            return Ok(None);
        };
        push_unique(&mut roots, Expr::Num(Number::Rational(root)));
        coeffs = quotient;
    }

    let as_expr = |r: &Rational| Expr::Num(Number::Rational(*r));
    let remaining = match coeffs.len() {
        0 | 1 => Vec::new(),
        2 => vec![linear_root(&as_expr(&coeffs[0]), &as_expr(&coeffs[1]))?],
        3 => quadratic_roots(
            &as_expr(&coeffs[0]),
            &as_expr(&coeffs[1]),
            &as_expr(&coeffs[2]),
        )?,
        // Only real roots of what is left are found.
        _ => {
            let values: Vec<f64> = coeffs.iter().map(Rational::to_f64).collect();
            scan_roots(|x| Some(values.iter().rev().fold(0.0, |acc, c| acc * x + c)))
                .into_iter()
                .map(|r| Expr::Num(Number::Float(r)))
                .collect()
        }
    };

    for root in remaining {
        push_unique(&mut roots, root);
    }
    Ok(Some(roots))
}

fn push_unique(roots: &mut Vec<Expr>, root: Expr) {
    if !roots.contains(&root) {
        roots.push(root);
    }
}

/// Real roots ascending; complex roots keep their order after them.
fn sort_roots(roots: Vec<Expr>) -> Vec<Expr> {
    let (mut real, complex): (Vec<(f64, Expr)>, Vec<Expr>) = roots.into_iter().fold(
        (Vec::new(), Vec::new()),
        |(mut real, mut complex), root| {
            match evaluate(&root) {
                Ok(v) => real.push((v, root)),
                Err(_) => complex.push(root),
            }
            (real, complex)
        },
    );
    real.sort_by(|a, b| a.0.total_cmp(&b.0));
    real.into_iter().map(|(_, r)| r).chain(complex).collect()
}

// ---------- numeric fallback ----------

fn scan_roots(f: impl Fn(f64) -> Option<f64>) -> Vec<f64> {
    let step = 2.0 * SCAN_LIMIT / SCAN_STEPS as f64;
    let mut roots: Vec<f64> = Vec::new();
    let mut push = |r: f64| {
        if !roots.iter().any(|known| (known - r).abs() < 1e-9) {
            roots.push(r);
        }
    };

    let mut prev_x = -SCAN_LIMIT;
    let mut prev_y = f(prev_x);
    for i in 1..=SCAN_STEPS {
        let x = -SCAN_LIMIT + step * i as f64;
        let y = f(x);
        if let (Some(py), Some(cy)) = (prev_y, y) {
            if py == 0.0 {
                push(prev_x);
            } else if cy != 0.0 && py.signum() != cy.signum() {
                if let Some(root) = bisect(&f, prev_x, x, py) {
                    push(root);
                }
            }
        }
        prev_x = x;
        prev_y = y;
    }
    if prev_y == Some(0.0) {
        push(prev_x);
    }

    roots.sort_by(f64::total_cmp);
    roots
}

/// Bisection on a sign change; rejects poles by checking the residual.
fn bisect(f: &impl Fn(f64) -> Option<f64>, mut lo: f64, mut hi: f64, mut f_lo: f64) -> Option<f64> {
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let f_mid = f(mid)?;
        if f_mid == 0.0 {
            lo = mid;
            hi = mid;
            break;
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }

    let root = 0.5 * (lo + hi);
    if f(root)?.abs() > ROOT_TOLERANCE {
        return None;
    }
    let snapped = (root * 1e10).round() / 1e10;
    Some(if f(snapped).is_some_and(|v| v.abs() <= ROOT_TOLERANCE) {
        snapped
    } else {
        root
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn solve(text: &str) -> String {
        solve_expression(text, &SolverConfig::default())
    }

    #[test]
    fn evaluates_arithmetic() {
        assert_eq!(
            solve("2+3*4"),
            "Expression: 2+3*4\nSimplified: 14\nResult: 14.0"
        );
    }

    #[test]
    fn keeps_exact_fractions_in_simplified_form() {
        assert_eq!(
            solve("1/3"),
            "Expression: 1/3\nSimplified: 1/3\nResult: 0.3333333333333333"
        );
    }

    #[test]
    fn omits_result_when_symbols_remain() {
        assert_eq!(solve("2*y+y"), "Expression: 2*y+y\nSimplified: 3*y");
    }

    #[test]
    fn solves_linear_equation() {
        assert_eq!(solve("2*y+3=7"), "Equation: 2*y+3 = 7\nSolution: [2]");
        assert_eq!(solve("3*y=1"), "Equation: 3*y = 1\nSolution: [1/3]");
    }

    #[test]
    fn solves_quadratic_with_sorted_roots() {
        assert_eq!(solve("y**2-4=0"), "Equation: y**2-4 = 0\nSolution: [-2, 2]");
        assert_eq!(solve("y**2=2"), "Equation: y**2 = 2\nSolution: [-sqrt(2), sqrt(2)]");
        assert_eq!(
            solve("-y**2+2*y+3=0"),
            "Equation: -y**2+2*y+3 = 0\nSolution: [-1, 3]"
        );
    }

    #[test]
    fn quadratic_with_double_root() {
        assert_eq!(solve("y**2-2*y+1=0"), "Equation: y**2-2*y+1 = 0\nSolution: [1]");
    }

    #[test]
    fn quadratic_with_complex_roots() {
        assert_eq!(
            solve("y**2+2*y+4=0"),
            "Equation: y**2+2*y+4 = 0\nSolution: [-1 - sqrt(3)*I, -1 + sqrt(3)*I]"
        );
    }

    #[test]
    fn cubic_with_rational_roots() {
        assert_eq!(
            solve("y**3-6*y**2+11*y-6=0"),
            "Equation: y**3-6*y**2+11*y-6 = 0\nSolution: [1, 2, 3]"
        );
    }

    #[test]
    fn highly_divisible_coefficients_stay_fast() {
        for text in [
            "963761198400*y**4+y+963761198400=0",
            "963761198400*y**10+y**5+963761198400=0",
            "735134400*y**4+y+735134400=0",
        ] {
            let started = std::time::Instant::now();
            let out = solve(text);
            assert!(out.ends_with("Solution: []"), "{out}");
            assert!(
                started.elapsed() < std::time::Duration::from_secs(5),
                "{text} took {:?}",
                started.elapsed()
            );
        }
    }

    #[test]
    fn partially_factored_remainder_reports_real_roots_only() {
        assert_eq!(solve("y**10=1"), "Equation: y**10 = 1\nSolution: [-1, 1]");
    }

    #[test]
    fn several_symbols_render_as_mappings() {
        assert_eq!(solve("a+b=5"), "Equation: a+b = 5\nSolution: [{a: 5 - b}]");
    }

    #[test]
    fn equation_without_unknowns() {
        assert_eq!(solve("2+2=4"), "Equation: 2+2 = 4\nSolution: True");
        assert_eq!(solve("2+2=5"), "Equation: 2+2 = 5\nSolution: False");
    }

    #[test]
    fn non_polynomial_equation_uses_numeric_search() {
        assert_eq!(solve("1/y=2"), "Equation: 1/y = 2\nSolution: [0.5]");
    }

    #[test]
    fn rejects_empty_equation_side() {
        assert_eq!(solve("=5"), "Error: Invalid equation format");
        assert_eq!(solve("y+1="), "Error: Invalid equation format");
    }

    #[test]
    fn parse_failures_are_reported_inline() {
        let out = solve("2+*3");
        assert!(out.starts_with("Error parsing: 2+*3\nDetails: "), "{out}");
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(solve("1/0"), "Error parsing: 1/0\nDetails: division by zero");
    }

    #[test]
    fn enforces_length_limit() {
        let config = SolverConfig {
            max_expression_len: 4,
            ..SolverConfig::default()
        };
        assert_eq!(
            solve_expression("1+2+3", &config),
            "Error parsing: 1+2+3\nDetails: expression longer than 4 characters"
        );
    }
}
