//! Runtime value type for the macro expression language.
//!
//! Values are dynamically typed.  Strings that look like numbers take part
//! in arithmetic as numbers; any other string turns `+` into concatenation.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Default for Value {
    fn default() -> Self {
        Value::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                // Whole floats keep one decimal so they read back as floats.
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Str(s) => f.write_str(s),
        }
    }
}

/// Numeric reading of a value, if it has one.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

impl Value {
    /// `0`, `""` and `"0"` are false; everything else is true.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty() && s != "0",
        }
    }

    /// Integer reading; non-numeric strings are 0.
    pub fn as_int(&self) -> i64 {
        match self.num() {
            Some(Num::Int(n)) => n,
            Some(Num::Float(x)) => x as i64,
            None => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        self.num().map(Num::as_f64).unwrap_or(0.0)
    }

    pub fn as_str(&self) -> String {
        self.to_string()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "real",
            Value::Str(_) => "string",
        }
    }

    fn num(&self) -> Option<Num> {
        match self {
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(x) => Some(Num::Float(*x)),
            Value::Str(s) => {
                let t = s.trim();
                if let Ok(n) = t.parse::<i64>() {
                    Some(Num::Int(n))
                } else if t.bytes().any(|b| b.is_ascii_digit()) {
                    // Digits required so "inf" and "nan" stay text.
                    t.parse::<f64>().ok().map(Num::Float)
                } else {
                    None
                }
            }
        }
    }

    // ── Arithmetic ────────────────────────────────────────────────────────

    /// Apply an integer or float operation depending on the operands.
    fn numeric(
        &self,
        rhs: &Value,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Value {
        let a = self.num().unwrap_or(Num::Int(0));
        let b = rhs.num().unwrap_or(Num::Int(0));
        match (a, b) {
            (Num::Int(x), Num::Int(y)) => match int_op(x, y) {
                Some(n) => Value::Int(n),
                None => Value::Float(float_op(x as f64, y as f64)),
            },
            _ => Value::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }

    /// Numeric addition, or concatenation if either side is a non-numeric
    /// string.
    pub fn arith_add(&self, rhs: &Value) -> Value {
        let textual = |v: &Value| matches!(v, Value::Str(_)) && v.num().is_none();
        if textual(self) || textual(rhs) {
            return Value::Str(format!("{self}{rhs}"));
        }
        self.numeric(rhs, i64::checked_add, |a, b| a + b)
    }

    pub fn arith_sub(&self, rhs: &Value) -> Value {
        self.numeric(rhs, i64::checked_sub, |a, b| a - b)
    }

    /// Numeric product; a string times an integer repeats the string.
    pub fn arith_mul(&self, rhs: &Value) -> Value {
        if let (Value::Str(s), Some(Num::Int(n))) = (self, rhs.num()) {
            if self.num().is_none() {
                return Value::Str(s.repeat(n.max(0) as usize));
            }
        }
        self.numeric(rhs, i64::checked_mul, |a, b| a * b)
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, String> {
        if rhs.as_float() == 0.0 {
            return Err("division by zero".into());
        }
        Ok(self.numeric(rhs, i64::checked_div, |a, b| a / b))
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, String> {
        if rhs.as_float() == 0.0 {
            return Err("modulo by zero".into());
        }
        Ok(self.numeric(rhs, i64::checked_rem, |a, b| a % b))
    }

    pub fn arith_neg(&self) -> Value {
        match self.num() {
            Some(Num::Int(n)) => Value::Int(n.wrapping_neg()),
            Some(Num::Float(x)) => Value::Float(-x),
            None => Value::Int(0),
        }
    }

    /// Numeric comparison when both sides are numeric, string comparison
    /// otherwise.
    pub fn cmp_value(&self, rhs: &Value) -> Ordering {
        match (self.num(), rhs.num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a.cmp(&b),
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
            _ => self.as_str().cmp(&rhs.as_str()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
