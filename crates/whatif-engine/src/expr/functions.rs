//! Allow-listed functions callable from expressions.
//!
//! Dates are ISO-8601 strings in one of three shapes: `YYYY-MM-DD`,
//! `YYYY-MM-DDTHH:MM:SS` (no offset), or RFC 3339 with an offset. Functions
//! that return a date keep the shape of their input.

use std::cmp::Ordering;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use whatif_core::Value;

use super::error::ExprError;

/// Largest day offset accepted by `add_days`; keeps `Duration::days` in range.
const MAX_DAY_SPAN: u64 = 3_650_000;

/// Names of every callable function.
pub const FUNCTIONS: &[&str] = &[
    "min",
    "max",
    "abs",
    "round",
    "floor",
    "ceil",
    "coalesce",
    "is_null",
    "len",
    "sum",
    "str",
    "num",
    "trim",
    "date",
    "add_days",
    "days_between",
    "latest",
    "earliest",
];

/// Dispatches a call by name.
pub fn call(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    match name {
        "min" => extreme(name, args, Ordering::Less),
        "max" => extreme(name, args, Ordering::Greater),
        "abs" => abs(one(name, args)?),
        "round" => round(name, args),
        "floor" => to_integer(name, one(name, args)?, f64::floor),
        "ceil" => to_integer(name, one(name, args)?, f64::ceil),
        "coalesce" => {
            at_least(name, &args, 1)?;
            Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or_default())
        }
        "is_null" => Ok(Value::Bool(one(name, args)?.is_null())),
        "len" => len(one(name, args)?),
        "sum" => sum(args),
        "str" => Ok(match one(name, args)? {
            Value::Str(s) => Value::Str(s),
            other => Value::Str(other.to_string()),
        }),
        "num" => num(one(name, args)?),
        "trim" => match one(name, args)? {
            Value::Str(s) => Ok(Value::Str(s.trim().to_string())),
            other => Err(ExprError::mismatch("trim()", format!("expected string, got {}", other.type_name()))),
        },
        "date" => {
            let v = one(name, args)?;
            let moment = Moment::from_value(name, &v)?;
            moment.format()
        }
        "add_days" => add_days(name, args),
        "days_between" => days_between(name, args),
        "latest" => pick_moment(name, args, Ordering::Greater),
        "earliest" => pick_moment(name, args, Ordering::Less),
        _ => Err(ExprError::UnknownFunction {
            name: name.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn arity(name: &str, expected: &str, got: usize) -> ExprError {
    ExprError::Arity {
        function: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn one(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    let got = args.len();
    let mut it = args.into_iter();
    match (it.next(), it.next()) {
        (Some(v), None) => Ok(v),
        _ => Err(arity(name, "1", got)),
    }
}

fn two(name: &str, args: Vec<Value>) -> Result<(Value, Value), ExprError> {
    let got = args.len();
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(arity(name, "2", got)),
    }
}

fn at_least(name: &str, args: &[Value], n: usize) -> Result<(), ExprError> {
    if args.len() < n {
        return Err(arity(name, &format!("at least {n}"), args.len()));
    }
    Ok(())
}

/// Variadic functions also accept a single list argument.
fn spread(args: Vec<Value>) -> Vec<Value> {
    match <[Value; 1]>::try_from(args) {
        Ok([Value::List(items)]) => items,
        Ok([single]) => vec![single],
        Err(args) => args,
    }
}

// ---------------------------------------------------------------------------
// Numeric functions
// ---------------------------------------------------------------------------

fn extreme(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, ExprError> {
    at_least(name, &args, 1)?;
    let mut best: Option<Value> = None;
    for v in spread(args).into_iter().filter(|v| !v.is_null()) {
        let ord = match (&best, &v) {
            (None, _) => want,
            (Some(Value::Str(a)), Value::Str(b)) => b.as_str().cmp(a.as_str()),
            (Some(b), _) => match (v.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => {
                    return Err(ExprError::mismatch(
                        format!("{name}()"),
                        format!("cannot compare {} with {}", v.type_name(), b.type_name()),
                    ))
                }
            },
        };
        if best.is_none() && !(v.is_number() || matches!(v, Value::Str(_))) {
            return Err(ExprError::mismatch(
                format!("{name}()"),
                format!("expected numbers or strings, got {}", v.type_name()),
            ));
        }
        if ord == want {
            best = Some(v);
        }
    }
    Ok(best.unwrap_or_default())
}

fn abs(v: Value) -> Result<Value, ExprError> {
    match v {
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| ExprError::overflow("abs()")),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(ExprError::mismatch(
            "abs()",
            format!("expected number, got {}", other.type_name()),
        )),
    }
}

fn round(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    let got = args.len();
    let mut it = args.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(x), None, None) => to_integer(name, x, f64::round),
        (Some(x), Some(Value::Int(digits)), None) => match x {
            Value::Int(i) => Ok(Value::Int(i)),
            Value::Float(f) => {
                let digits = i32::try_from(digits.clamp(-15, 15)).unwrap_or(0);
                let scale = 10f64.powi(digits);
                Ok(Value::Float((f * scale).round() / scale))
            }
            other => Err(ExprError::mismatch(
                "round()",
                format!("expected number, got {}", other.type_name()),
            )),
        },
        (Some(_), Some(other), None) => Err(ExprError::mismatch(
            "round()",
            format!("digits must be int, got {}", other.type_name()),
        )),
        _ => Err(arity(name, "1 or 2", got)),
    }
}

/// Applies `f` to a float and converts the result to an int.
fn to_integer(name: &str, v: Value, f: fn(f64) -> f64) -> Result<Value, ExprError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(x) => {
            let y = f(x);
            if y.is_finite() && y >= i64::MIN as f64 && y < i64::MAX as f64 {
                Ok(Value::Int(y as i64))
            } else {
                Err(ExprError::overflow(format!("{name}()")))
            }
        }
        other => Err(ExprError::mismatch(
            format!("{name}()"),
            format!("expected number, got {}", other.type_name()),
        )),
    }
}

fn len(v: Value) -> Result<Value, ExprError> {
    let n = match &v {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(entries) => entries.len(),
        other => {
            return Err(ExprError::mismatch(
                "len()",
                format!("expected string, list or map, got {}", other.type_name()),
            ))
        }
    };
    i64::try_from(n)
        .map(Value::Int)
        .map_err(|_| ExprError::overflow("len()"))
}

/// Sums numbers, skipping nulls. Stays integral until a float appears.
fn sum(args: Vec<Value>) -> Result<Value, ExprError> {
    let mut acc = Value::Int(0);
    for v in spread(args) {
        acc = match (&acc, &v) {
            (_, Value::Null) => acc,
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| ExprError::overflow("sum()"))?,
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Value::Float(x + y),
                _ => {
                    return Err(ExprError::mismatch(
                        "sum()",
                        format!("expected numbers, got {}", b.type_name()),
                    ))
                }
            },
        };
    }
    Ok(acc)
}

fn num(v: Value) -> Result<Value, ExprError> {
    match v {
        Value::Null | Value::Int(_) | Value::Float(_) => Ok(v),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Str(s) => {
            let t = s.trim();
            if let Ok(i) = t.parse::<i64>() {
                Ok(Value::Int(i))
            } else if let Ok(f) = t.parse::<f64>() {
                Ok(Value::Float(f))
            } else {
                Err(ExprError::InvalidNumber { input: s })
            }
        }
        other => Err(ExprError::mismatch(
            "num()",
            format!("cannot convert {}", other.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Date helpers
// ---------------------------------------------------------------------------

/// A parsed date value, remembering the shape it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Moment {
    Date(Date),
    Naive(PrimitiveDateTime),
    Offset(OffsetDateTime),
}

impl Moment {
    fn parse(s: &str) -> Option<Moment> {
        let s = s.trim();
        if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
            return Some(Moment::Offset(dt));
        }
        if let Ok(dt) = PrimitiveDateTime::parse(
            s,
            format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
        ) {
            return Some(Moment::Naive(dt));
        }
        Date::parse(s, format_description!("[year]-[month]-[day]"))
            .ok()
            .map(Moment::Date)
    }

    fn from_value(function: &str, v: &Value) -> Result<Moment, ExprError> {
        match v {
            Value::Str(s) => Moment::parse(s).ok_or_else(|| ExprError::InvalidDate { input: s.clone() }),
            other => Err(ExprError::mismatch(
                format!("{function}()"),
                format!("expected date string, got {}", other.type_name()),
            )),
        }
    }

    /// Instant used for ordering; date-only and naive values are read as UTC.
    fn instant(self) -> OffsetDateTime {
        match self {
            Moment::Date(d) => d.midnight().assume_utc(),
            Moment::Naive(dt) => dt.assume_utc(),
            Moment::Offset(dt) => dt,
        }
    }

    fn checked_add(self, d: Duration) -> Option<Moment> {
        match self {
            Moment::Date(x) => x.checked_add(d).map(Moment::Date),
            Moment::Naive(x) => x.checked_add(d).map(Moment::Naive),
            Moment::Offset(x) => x.checked_add(d).map(Moment::Offset),
        }
    }

    fn format(self) -> Result<Value, ExprError> {
        let formatted = match self {
            Moment::Date(d) => d.format(format_description!("[year]-[month]-[day]")),
            Moment::Naive(dt) => {
                dt.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
            }
            Moment::Offset(dt) => dt.format(&Rfc3339),
        };
        formatted.map(Value::Str).map_err(|e| ExprError::InvalidDate {
            input: e.to_string(),
        })
    }
}

fn add_days(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    let (d, n) = two(name, args)?;
    let moment = Moment::from_value(name, &d)?;
    let days = match n {
        Value::Int(i) => i,
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() && f.abs() < MAX_DAY_SPAN as f64 => {
            f as i64
        }
        other => {
            return Err(ExprError::mismatch(
                "add_days()",
                format!("day count must be a whole number, got {}", other.type_name()),
            ))
        }
    };
    if days.unsigned_abs() > MAX_DAY_SPAN {
        return Err(ExprError::overflow("add_days()"));
    }
    moment
        .checked_add(Duration::days(days))
        .ok_or_else(|| ExprError::overflow("add_days()"))?
        .format()
}

/// Whole days from the first argument to the second.
fn days_between(name: &str, args: Vec<Value>) -> Result<Value, ExprError> {
    let (a, b) = two(name, args)?;
    let a = Moment::from_value(name, &a)?.instant();
    let b = Moment::from_value(name, &b)?.instant();
    Ok(Value::Int((b - a).whole_days()))
}

/// Latest or earliest of several dates, skipping nulls. Returns the winning
/// argument unchanged.
fn pick_moment(name: &str, args: Vec<Value>, want: Ordering) -> Result<Value, ExprError> {
    at_least(name, &args, 1)?;
    let mut best: Option<(OffsetDateTime, Value)> = None;
    for v in spread(args).into_iter().filter(|v| !v.is_null()) {
        let instant = Moment::from_value(name, &v)?.instant();
        let better = match &best {
            None => true,
            Some((current, _)) => instant.cmp(current) == want,
        };
        if better {
            best = Some((instant, v));
        }
    }
    Ok(best.map(|(_, v)| v).unwrap_or_default())
}
