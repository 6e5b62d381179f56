//! Interval conditions such as `50<=x<100`
//!
//! Accepted shapes, with `OP` one of `<` or `<=`:
//!
//! - `x OP hi`          -> (-inf, hi)
//! - `lo OP x`          -> (lo, +inf)
//! - `lo OP x OP hi`    -> (lo, hi)

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

/// The variable name standing for the current metric value
pub const VARIABLE: &str = "x";

/// A closed, validated numeric range predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalCondition {
    lower: f64,
    lower_inclusive: bool,
    upper: f64,
    upper_inclusive: bool,
}

impl IntervalCondition {
    /// Parse a textual interval expression
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let expr = expr.trim();
        let (operands, operators) = tokenize(expr);

        if operators.is_empty() {
            return Err(ConditionError::MissingOperator(expr.to_string()));
        }

        let variables = operands.iter().filter(|o| **o == VARIABLE).count();
        match variables {
            0 => return Err(ConditionError::MissingVariable(expr.to_string())),
            1 => {}
            _ => return Err(ConditionError::RepeatedVariable(expr.to_string())),
        }

        let inclusive = operators
            .iter()
            .map(|op| match *op {
                "<" => Ok(false),
                "<=" => Ok(true),
                other => Err(ConditionError::UnsupportedOperator {
                    expr: expr.to_string(),
                    operator: other.to_string(),
                }),
            })
            .collect::<Result<Vec<bool>, _>>()?;

        let condition = match (operands.as_slice(), inclusive.as_slice()) {
            ([var, hi], [incl]) if *var == VARIABLE => Self {
                lower: f64::NEG_INFINITY,
                lower_inclusive: false,
                upper: parse_bound(expr, hi)?,
                upper_inclusive: *incl,
            },
            ([lo, var], [incl]) if *var == VARIABLE => Self {
                lower: parse_bound(expr, lo)?,
                lower_inclusive: *incl,
                upper: f64::INFINITY,
                upper_inclusive: false,
            },
            ([lo, var, hi], [lo_incl, hi_incl]) if *var == VARIABLE => Self {
                lower: parse_bound(expr, lo)?,
                lower_inclusive: *lo_incl,
                upper: parse_bound(expr, hi)?,
                upper_inclusive: *hi_incl,
            },
            _ => return Err(ConditionError::BadShape(expr.to_string())),
        };

        if condition.lower > condition.upper {
            return Err(ConditionError::EmptyInterval {
                expr: expr.to_string(),
                lower: condition.lower,
                upper: condition.upper,
            });
        }

        Ok(condition)
    }

    /// Whether `x` falls inside the interval. NaN never matches.
    pub fn matches(&self, x: f64) -> bool {
        if x.is_nan() {
            return false;
        }
        let above_lower = x > self.lower || (x == self.lower && self.lower_inclusive);
        let below_upper = x < self.upper || (x == self.upper && self.upper_inclusive);
        above_lower && below_upper
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn lower_inclusive(&self) -> bool {
        self.lower_inclusive
    }

    pub fn upper_inclusive(&self) -> bool {
        self.upper_inclusive
    }
}

impl FromStr for IntervalCondition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IntervalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = |inclusive: bool| if inclusive { "<=" } else { "<" };
        if self.lower.is_finite() {
            write!(f, "{}{}", self.lower, op(self.lower_inclusive))?;
        }
        write!(f, "{}", VARIABLE)?;
        if self.upper.is_finite() {
            write!(f, "{}{}", op(self.upper_inclusive), self.upper)?;
        }
        Ok(())
    }
}

fn operator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<=|>=|==|!=|<>|=<|=>|<|>|=").expect("valid operator regex"))
}

/// Split an expression into trimmed operands and the operators between them
fn tokenize(expr: &str) -> (Vec<&str>, Vec<&str>) {
    let mut operands = Vec::new();
    let mut operators = Vec::new();
    let mut last = 0;

    for m in operator_regex().find_iter(expr) {
        operands.push(expr[last..m.start()].trim());
        operators.push(m.as_str());
        last = m.end();
    }
    operands.push(expr[last..].trim());

    (operands, operators)
}

fn parse_bound(expr: &str, token: &str) -> Result<f64, ConditionError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ConditionError::InvalidBound {
            expr: expr.to_string(),
            token: token.to_string(),
        }),
    }
}

/// Malformed interval expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    #[error("No relational operator in condition '{0}'")]
    MissingOperator(String),

    #[error("Variable 'x' missing from condition '{0}'")]
    MissingVariable(String),

    #[error("Variable 'x' appears more than once in condition '{0}'")]
    RepeatedVariable(String),

    #[error("Unsupported operator '{operator}' in condition '{expr}' (only < and <= are allowed)")]
    UnsupportedOperator { expr: String, operator: String },

    #[error("Bound '{token}' in condition '{expr}' is not a number")]
    InvalidBound { expr: String, token: String },

    #[error("Condition '{0}' is not of the form 'x<b', 'a<x' or 'a<x<b'")]
    BadShape(String),

    #[error("Condition '{expr}' has lower bound {lower} above upper bound {upper}")]
    EmptyInterval { expr: String, lower: f64, upper: f64 },
}
