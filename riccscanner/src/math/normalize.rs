use std::sync::LazyLock;

use regex::Regex;

const ASCII_SYMBOLS: &str = "+-*/=().^[]{}:";
const MATH_GLYPHS: &[char] = &['×', '·', '⋅', '÷', '√', '²', '³', 'π'];

/// Applied in order. `x` is read as multiplication, so it has to come after
/// every rule that could introduce one.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("×", "*"),
    ("·", "*"),
    ("⋅", "*"),
    ("÷", "/"),
    (":", "/"),
    ("√", "sqrt"),
    ("²", "**2"),
    ("³", "**3"),
    ("π", "pi"),
    ("{", "("),
    ("[", "("),
    ("}", ")"),
    ("]", ")"),
    ("^", "**"),
    ("x", "*"),
    (" ", ""),
];

static SQRT_SPELLINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sqrt|sqr|sq|rt").unwrap());

/// Drop everything OCR produced that cannot be part of a math expression.
pub fn clean_text(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || ASCII_SYMBOLS.contains(*c)
                || MATH_GLYPHS.contains(c)
                || *c == ' '
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rewrite cleaned OCR text into something the parser accepts.
pub fn normalize_math(text: &str) -> String {
    let mut normalized = text.to_lowercase();
    for (from, to) in SUBSTITUTIONS {
        normalized = normalized.replace(from, to);
    }
    SQRT_SPELLINGS.replace_all(&normalized, "sqrt").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace_and_drops_noise() {
        assert_eq!(clean_text("  2 +\n3 \t* 4 "), "2 + 3 * 4");
        assert_eq!(clean_text("y² @ # 1 ;"), "y² 1");
        assert_eq!(clean_text("\n\n"), "");
    }

    #[test]
    fn clean_text_keeps_math_glyphs() {
        assert_eq!(clean_text("√16 ÷ 2 × π"), "√16 ÷ 2 × π");
    }

    #[test]
    fn normalize_rewrites_glyphs() {
        assert_eq!(normalize_math("2 × 3 ÷ 4"), "2*3/4");
        assert_eq!(normalize_math("y² + y³"), "y**2+y**3");
        assert_eq!(normalize_math("2π"), "2pi");
        assert_eq!(normalize_math("[1 + 2] ^ 2"), "(1+2)**2");
    }

    #[test]
    fn normalize_treats_x_as_multiplication() {
        assert_eq!(normalize_math("3 X 4"), "3*4");
        assert_eq!(normalize_math("3x4"), "3*4");
    }

    #[test]
    fn normalize_folds_sqrt_spellings_once() {
        assert_eq!(normalize_math("√16"), "sqrt16");
        assert_eq!(normalize_math("sqrt(9)"), "sqrt(9)");
        assert_eq!(normalize_math("SQR(9)"), "sqrt(9)");
        assert_eq!(normalize_math("sq(9)"), "sqrt(9)");
        assert_eq!(normalize_math("rt(9)"), "sqrt(9)");
    }

    #[test]
    fn normalize_colon_is_division() {
        assert_eq!(normalize_math("8 : 2"), "8/2");
    }

    #[test]
    fn normalize_is_deterministic() {
        let input = "√(y²) = 3 · 2";
        assert_eq!(normalize_math(input), normalize_math(input));
    }
}
