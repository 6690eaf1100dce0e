use super::expr::{Constant, Expr, Func};
use super::number::{Number, Rational};
use super::MathError;

/// Nesting deeper than this is rejected rather than risking the stack.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Sym(String),
    Const(Constant),
    Func(Func),
    Sqrt,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

/// Names recognised inside a run of letters, longest first so `sqrt` wins
/// over a bare `s`.
const NAMES: &[(&str, Token)] = &[
    ("sqrt", Token::Sqrt),
    ("sin", Token::Func(Func::Sin)),
    ("cos", Token::Func(Func::Cos)),
    ("tan", Token::Func(Func::Tan)),
    ("log", Token::Func(Func::Log)),
    ("abs", Token::Func(Func::Abs)),
    ("ln", Token::Func(Func::Log)),
    ("pi", Token::Const(Constant::Pi)),
];

fn parse_error(message: impl Into<String>, position: usize) -> MathError {
    MathError::Parse {
        message: message.into(),
        position,
    }
}

fn number_literal(text: &str, position: usize) -> Result<Number, MathError> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return Err(parse_error(format!("Invalid number '{text}'"), position));
    }

    let digits = format!("{int_part}{frac_part}");
    let exact = digits.parse::<i128>().ok().and_then(|numer| {
        let scale = u32::try_from(frac_part.len()).ok()?;
        let denom = 10i128.checked_pow(scale)?;
        Rational::new(numer, denom)
    });

    match exact {
        Some(r) => Ok(Number::Rational(r)),
        None => text
            .parse::<f64>()
            .map(Number::Float)
            .map_err(|_| parse_error(format!("Invalid number '{text}'"), position)),
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, MathError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            ' ' | '\t' => {
                i += 1;
            }
            '0'..='9' | '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push((Token::Num(number_literal(&text, start)?), start));
            }
            'a'..='z' | 'A'..='Z' => {
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let mut rest = word.as_str();
                let mut offset = start;
                while !rest.is_empty() {
                    if let Some((name, token)) = NAMES.iter().find(|(n, _)| rest.starts_with(n)) {
                        tokens.push((token.clone(), offset));
                        rest = &rest[name.len()..];
                        offset += name.len();
                    } else {
                        let (head, tail) = rest.split_at(1);
                        tokens.push((Token::Sym(head.to_string()), offset));
                        rest = tail;
                        offset += 1;
                    }
                }
            }
            '+' => {
                tokens.push((Token::Plus, start));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, start));
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push((Token::Caret, start));
                    i += 2;
                } else {
                    tokens.push((Token::Star, start));
                    i += 1;
                }
            }
            '/' => {
                tokens.push((Token::Slash, start));
                i += 1;
            }
            '^' => {
                tokens.push((Token::Caret, start));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            other => {
                return Err(parse_error(format!("Unexpected character '{other}'"), start));
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, p)| *p).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), MathError> {
        let position = self.position();
        match self.advance() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(parse_error(format!("Expected {expected:?}, found {t:?}"), position)),
            None => Err(parse_error(format!("Expected {expected:?}, found end of input"), position)),
        }
    }

    fn enter(&mut self) -> Result<(), MathError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(parse_error("Expression nested too deeply", self.position()));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expression(&mut self) -> Result<Expr, MathError> {
        self.enter()?;
        let mut terms = vec![self.term()?];
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    terms.push(self.term()?);
                }
                Some(Token::Minus) => {
                    self.advance();
                    terms.push(Expr::neg(self.term()?));
                }
                _ => break,
            }
        }
        self.leave();
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Expr::Add(terms)
        })
    }

    fn term(&mut self) -> Result<Expr, MathError> {
        let mut factors = vec![self.unary()?];
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    factors.push(self.unary()?);
                }
                Some(Token::Slash) => {
                    self.advance();
                    factors.push(Expr::pow(self.unary()?, Expr::int(-1)));
                }
                // Implicit multiplication: 2y, 3(y+1), (a)(b), 2sqrt(3)
                Some(Token::Num(_))
                | Some(Token::Sym(_))
                | Some(Token::Const(_))
                | Some(Token::Func(_))
                | Some(Token::Sqrt)
                | Some(Token::LParen) => {
                    factors.push(self.power()?);
                }
                _ => break,
            }
        }
        Ok(if factors.len() == 1 {
            factors.remove(0)
        } else {
            Expr::Mul(factors)
        })
    }

    fn unary(&mut self) -> Result<Expr, MathError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                self.enter()?;
                let inner = self.unary()?;
                self.leave();
                Ok(Expr::neg(inner))
            }
            Some(Token::Plus) => {
                self.advance();
                self.enter()?;
                let inner = self.unary();
                self.leave();
                inner
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, MathError> {
        let base = self.primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.advance();
            self.enter()?;
            let exponent = self.unary()?;
            self.leave();
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn argument(&mut self) -> Result<Expr, MathError> {
        if let Some(Token::LParen) = self.peek() {
            self.primary()
        } else {
            self.enter()?;
            let arg = self.power();
            self.leave();
            arg
        }
    }

    fn primary(&mut self) -> Result<Expr, MathError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Sym(s)) => Ok(Expr::Sym(s)),
            Some(Token::Const(c)) => Ok(Expr::Const(c)),
            Some(Token::Sqrt) => Ok(Expr::sqrt(self.argument()?)),
            Some(Token::Func(f)) => Ok(Expr::Func(f, Box::new(self.argument()?))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(t) => Err(parse_error(format!("Unexpected token {t:?}"), position)),
            None => Err(parse_error("Unexpected end of input", position)),
        }
    }
}

/// Parse normalized text (no `=`) into an unsimplified expression tree.
pub fn parse(input: &str) -> Result<Expr, MathError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(parse_error("Empty expression", 0));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        end: input.chars().count(),
    };
    let expr = parser.expression()?;

    if parser.pos < parser.tokens.len() {
        let position = parser.position();
        let token = parser.advance();
        return Err(parse_error(format!("Unexpected token {token:?}"), position));
    }

    Ok(expr)
}
