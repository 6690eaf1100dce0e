//! Math Module
//!
//! Everything between raw OCR text and the final answer:
//! - `normalize`: strip OCR noise and rewrite handwriting glyphs to ASCII math
//! - `parser`: recursive-descent parser producing an `Expr` tree
//! - `simplify`: exact-rational simplification and numeric evaluation
//! - `solve`: expression reports and equation solving
//!
//! Numbers stay exact (`i128` fractions) until something forces a float, so
//! `1/3 + 1/6` simplifies to `1/2` rather than `0.5`.

mod expr;
mod normalize;
mod number;
mod parser;
mod simplify;
mod solve;

use thiserror::Error;

pub use expr::{Constant, Expr, Func};
pub use normalize::{clean_text, normalize_math};
pub use number::{format_float, Number, Rational};
pub use parser::parse;
pub use simplify::{evaluate, simplify};
pub use solve::solve_expression;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("{message} at position {position}")]
    Parse { message: String, position: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression contains free symbol '{0}'")]
    NotNumeric(String),

    #[error("result is not a real number")]
    NotReal,

    #[error("result is undefined")]
    Undefined,

    #[error("{0}")]
    Unsolvable(String),

    #[error("expression longer than {0} characters")]
    TooLong(usize),
}
