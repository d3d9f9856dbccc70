//! Variant instruction parameters.

use std::fmt;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::expression::Expr;

/// Schedule keywords understood by annealing instructions. They look like
/// identifiers but are never treated as variables.
pub const RESERVED_KEYWORDS: [&str; 2] = ["forward", "reverse"];

/// Returns true if `word` is a reserved mode keyword.
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS.contains(&word)
}

/// A single instruction parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Parameter {
    /// Integer value (classical register indices, counts).
    Int(i64),
    /// Real value (angles, weights).
    Double(f64),
    /// A literal string or a symbolic expression such as `"2*theta"`.
    Str(String),
    /// Complex value.
    Complex(Complex64),
}

impl Parameter {
    /// True if this is a string holding an expression with at least one free
    /// variable. Reserved keywords and plain literals are not variables.
    pub fn is_variable(&self) -> bool {
        !self.variables().is_empty()
    }

    /// The free variables referenced by this parameter, in order of first
    /// appearance.
    pub fn variables(&self) -> Vec<String> {
        match self {
            Parameter::Str(s) if !is_reserved_keyword(s.trim()) => {
                Expr::parse(s).map(|e| e.symbols()).unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }

    /// Numeric value for `Int` and `Double`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Parameter::Int(v) => Some(*v as f64),
            Parameter::Double(v) => Some(*v),
            Parameter::Str(_) | Parameter::Complex(_) => None,
        }
    }

    /// Integer value, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Parameter::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String contents, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Int(v) => write!(f, "{v}"),
            Parameter::Double(v) => write!(f, "{v}"),
            Parameter::Str(s) => write!(f, "{s}"),
            Parameter::Complex(c) => write!(f, "({},{})", c.re, c.im),
        }
    }
}

impl From<i64> for Parameter {
    fn from(v: i64) -> Self {
        Parameter::Int(v)
    }
}

impl From<i32> for Parameter {
    fn from(v: i32) -> Self {
        Parameter::Int(i64::from(v))
    }
}

impl From<f64> for Parameter {
    fn from(v: f64) -> Self {
        Parameter::Double(v)
    }
}

impl From<&str> for Parameter {
    fn from(v: &str) -> Self {
        Parameter::Str(v.to_string())
    }
}

impl From<String> for Parameter {
    fn from(v: String) -> Self {
        Parameter::Str(v)
    }
}

impl From<Complex64> for Parameter {
    fn from(v: Complex64) -> Self {
        Parameter::Complex(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_detection() {
        assert!(Parameter::from("theta").is_variable());
        assert!(Parameter::from("2*theta + phi").is_variable());
        assert_eq!(
            Parameter::from("2*theta + phi").variables(),
            vec!["theta".to_string(), "phi".to_string()]
        );
        assert!(!Parameter::from("forward").is_variable());
        assert!(!Parameter::from("reverse").is_variable());
        assert!(!Parameter::from("pi/2").is_variable());
        assert!(!Parameter::from("not an expression!").is_variable());
        assert!(!Parameter::Double(0.5).is_variable());
        assert!(!Parameter::Int(3).is_variable());
    }

    #[test]
    fn test_numeric_access() {
        assert_eq!(Parameter::Int(2).as_f64(), Some(2.0));
        assert_eq!(Parameter::Double(0.25).as_f64(), Some(0.25));
        assert_eq!(Parameter::from("x").as_f64(), None);
        assert_eq!(Parameter::Int(7).as_int(), Some(7));
    }

    #[test]
    fn test_serde_keeps_variant() {
        for p in [
            Parameter::Int(1),
            Parameter::Double(1.0),
            Parameter::from("1"),
            Parameter::Complex(Complex64::new(0.0, 1.0)),
        ] {
            let json = serde_json::to_string(&p).unwrap();
            let back: Parameter = serde_json::from_str(&json).unwrap();
            assert_eq!(p, back);
        }
    }
}
