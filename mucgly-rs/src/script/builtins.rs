//! Built-in pure functions.
//!
//! Each function receives already-evaluated arguments.  Functions that touch
//! engine state (`write`, `hook`, …) live in the interpreter, not here.

use std::cmp::Ordering;

use super::value::Value;

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a built-in.
pub fn call_builtin(name: &str, args: Vec<Value>) -> Option<Result<Value, String>> {
    // Ok(None) means "not a builtin"; `.transpose()` turns that into `None`.
    fn inner(name: &str, args: Vec<Value>) -> Result<Option<Value>, String> {
        Ok(Some(match name {
            // ── Strings ───────────────────────────────────────────────────
            "strlen" => Value::Int(get_str(&args, 0, name)?.chars().count() as i64),
            "strcat" => Value::Str(args.iter().map(Value::as_str).collect()),
            "substr" => {
                let s = get_str(&args, 0, name)?;
                let chars: Vec<char> = s.chars().collect();
                let start = (get_int(&args, 1, name)?.max(0) as usize).min(chars.len());
                let end = match args.get(2) {
                    Some(n) => start.saturating_add(n.as_int().max(0) as usize).min(chars.len()),
                    None => chars.len(),
                };
                Value::Str(chars[start..end].iter().collect())
            }
            "strstr" => {
                let hay = get_str(&args, 0, name)?;
                let needle = get_str(&args, 1, name)?;
                Value::Int(match hay.find(&needle) {
                    Some(i) => hay[..i].chars().count() as i64,
                    None => -1,
                })
            }
            "strcmp" => {
                let a = get_str(&args, 0, name)?;
                let b = get_str(&args, 1, name)?;
                Value::Int(match a.cmp(&b) {
                    Ordering::Less => -1,
                    Ordering::Equal => 0,
                    Ordering::Greater => 1,
                })
            }
            "toupper" => Value::Str(get_str(&args, 0, name)?.to_uppercase()),
            "tolower" => Value::Str(get_str(&args, 0, name)?.to_lowercase()),
            "trim" => Value::Str(get_str(&args, 0, name)?.trim().to_owned()),
            "strrep" => {
                let s = get_str(&args, 0, name)?;
                let n = get_int(&args, 1, name)?.max(0) as usize;
                Value::Str(s.repeat(n))
            }
            "replace" => {
                let hay = get_str(&args, 0, name)?;
                let needle = get_str(&args, 1, name)?;
                let repl = get_str(&args, 2, name)?;
                if needle.is_empty() {
                    return Err(format!("{name}: empty search string"));
                }
                Value::Str(hay.replace(&needle, &repl))
            }
            "pad" => {
                // pad(str, width[, char]): positive width pads right, negative left.
                let s = get_str(&args, 0, name)?;
                let width = get_int(&args, 1, name)?;
                let fill = args.get(2).and_then(|v| v.as_str().chars().next()).unwrap_or(' ');
                let missing = (width.unsigned_abs() as usize).saturating_sub(s.chars().count());
                let padding: String = std::iter::repeat(fill).take(missing).collect();
                Value::Str(if width < 0 { padding + &s } else { s + &padding })
            }
            "ascii" => {
                let s = get_str(&args, 0, name)?;
                Value::Int(s.chars().next().map_or(0, |c| c as i64))
            }
            "char" => {
                let n = get_int(&args, 0, name)?;
                let ch = u32::try_from(n).ok().and_then(char::from_u32).unwrap_or('\u{FFFD}');
                Value::Str(ch.to_string())
            }

            // ── Numbers ───────────────────────────────────────────────────
            "abs" => match get_val(&args, 0, name)? {
                Value::Float(x) => Value::Float(x.abs()),
                v => Value::Int(v.as_int().wrapping_abs()),
            },
            "min" | "max" => {
                let mut it = args.into_iter();
                let mut best = it.next().ok_or_else(|| format!("{name}: too few args"))?;
                for v in it {
                    let better = match v.cmp_value(&best) {
                        Ordering::Less => name == "min",
                        Ordering::Greater => name == "max",
                        Ordering::Equal => false,
                    };
                    if better {
                        best = v;
                    }
                }
                best
            }
            "trunc" => Value::Int(get_float(&args, 0, name)?.trunc() as i64),
            "round" => Value::Int(get_float(&args, 0, name)?.round() as i64),
            "sqrt" => Value::Float(get_float(&args, 0, name)?.sqrt()),
            "pow" => {
                let base = get_float(&args, 0, name)?;
                let exp = get_float(&args, 1, name)?;
                Value::Float(base.powf(exp))
            }

            // ── Conversion / inspection ───────────────────────────────────
            "int" => Value::Int(get_val(&args, 0, name)?.as_int()),
            "real" => Value::Float(get_val(&args, 0, name)?.as_float()),
            "string" => Value::Str(get_str(&args, 0, name)?),
            "whatis" => Value::Str(get_val(&args, 0, name)?.type_name().to_owned()),

            _ => return Ok(None),
        }))
    }

    inner(name, args).transpose()
}

// ── Argument accessors ────────────────────────────────────────────────────────

fn get_val<'v>(args: &'v [Value], idx: usize, name: &str) -> Result<&'v Value, String> {
    args.get(idx).ok_or_else(|| format!("{name}: argument {} missing", idx + 1))
}

fn get_str(args: &[Value], idx: usize, name: &str) -> Result<String, String> {
    get_val(args, idx, name).map(Value::as_str)
}

fn get_int(args: &[Value], idx: usize, name: &str) -> Result<i64, String> {
    get_val(args, idx, name).map(Value::as_int)
}

fn get_float(args: &[Value], idx: usize, name: &str) -> Result<f64, String> {
    get_val(args, idx, name).map(Value::as_float)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        call_builtin(name, args).expect("not a builtin").expect("call failed")
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    #[test]
    fn string_functions() {
        assert_eq!(call("strlen", vec![s("héllo")]), Value::Int(5));
        assert_eq!(call("strcat", vec![s("a"), Value::Int(1), s("b")]), s("a1b"));
        assert_eq!(call("toupper", vec![s("abc")]), s("ABC"));
        assert_eq!(call("trim", vec![s("  x ")]), s("x"));
        assert_eq!(call("strrep", vec![s("ab"), Value::Int(3)]), s("ababab"));
        assert_eq!(call("replace", vec![s("a-b-c"), s("-"), s("+")]), s("a+b+c"));
    }

    #[test]
    fn substr_bounds() {
        assert_eq!(call("substr", vec![s("hello"), Value::Int(1), Value::Int(3)]), s("ell"));
        assert_eq!(call("substr", vec![s("hello"), Value::Int(3)]), s("lo"));
        assert_eq!(call("substr", vec![s("hi"), Value::Int(10)]), s(""));
        assert_eq!(call("substr", vec![s("hi"), Value::Int(1), Value::Int(99)]), s("i"));
    }

    #[test]
    fn strstr_counts_chars() {
        assert_eq!(call("strstr", vec![s("héllo"), s("llo")]), Value::Int(2));
        assert_eq!(call("strstr", vec![s("abc"), s("x")]), Value::Int(-1));
    }

    #[test]
    fn pad_both_directions() {
        assert_eq!(call("pad", vec![s("ab"), Value::Int(4)]), s("ab  "));
        assert_eq!(call("pad", vec![s("7"), Value::Int(-3), s("0")]), s("007"));
        assert_eq!(call("pad", vec![s("long"), Value::Int(2)]), s("long"));
    }

    #[test]
    fn numbers() {
        assert_eq!(call("abs", vec![Value::Int(-3)]), Value::Int(3));
        assert_eq!(call("abs", vec![Value::Float(-1.5)]), Value::Float(1.5));
        assert_eq!(call("max", vec![Value::Int(2), s("10"), Value::Int(3)]), s("10"));
        assert_eq!(call("min", vec![Value::Int(2), Value::Int(-1)]), Value::Int(-1));
        assert_eq!(call("round", vec![Value::Float(2.5)]), Value::Int(3));
        assert_eq!(call("pow", vec![Value::Int(2), Value::Int(10)]), Value::Float(1024.0));
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", vec![s("42")]), Value::Int(42));
        assert_eq!(call("real", vec![Value::Int(2)]), Value::Float(2.0));
        assert_eq!(call("string", vec![Value::Int(2)]), s("2"));
        assert_eq!(call("whatis", vec![Value::Float(1.0)]), s("real"));
        assert_eq!(call("ascii", vec![s("A")]), Value::Int(65));
        assert_eq!(call("char", vec![Value::Int(97)]), s("a"));
    }

    #[test]
    fn errors() {
        assert_eq!(call_builtin("strlen", vec![]), Some(Err("strlen: argument 1 missing".into())));
        assert!(call_builtin("replace", vec![s("a"), s(""), s("b")]).unwrap().is_err());
        assert!(call_builtin("no_such_fn", vec![]).is_none());
    }
}
