//! Ready-made parameter validators and coercers

use crate::route::{Coercer, Validator};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

static INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d+$").unwrap()
});

/// Accepts optionally signed decimal integers within inclusive bounds
///
/// A missing parameter is rejected.
///
/// ```
/// use rhtmx_router::validators::int;
///
/// let page = int(Some(1), Some(10));
/// assert!(page(Some("3")));
/// assert!(!page(Some("0")));
/// assert!(!page(Some("3.5")));
/// assert!(!page(None));
/// ```
pub fn int(min: Option<i64>, max: Option<i64>) -> impl Fn(Option<&str>) -> bool + Send + Sync + Clone + 'static {
    move |value| {
        let Some(value) = value.filter(|v| INTEGER.is_match(v)) else {
            return false;
        };
        let n: f64 = value.parse().unwrap_or(f64::NAN);
        min.map_or(true, |min| n >= min as f64) && max.map_or(true, |max| n <= max as f64)
    }
}

/// Accepts members of a fixed set
///
/// ```
/// use rhtmx_router::validators::one_of;
///
/// let tab = one_of(["posts", "likes"]);
/// assert!(tab(Some("likes")));
/// assert!(!tab(Some("other")));
/// assert!(!tab(None));
/// ```
pub fn one_of<I, S>(values: I) -> impl Fn(Option<&str>) -> bool + Send + Sync + Clone + 'static
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: Arc<HashSet<String>> = Arc::new(values.into_iter().map(Into::into).collect());
    move |value| value.map_or(false, |v| set.contains(v))
}

/// Coerces a numeric string to a JSON number; anything else becomes `null`
///
/// ```
/// use rhtmx_router::validators::number;
/// use serde_json::json;
///
/// let to_number = number();
/// assert_eq!(to_number(Some("3")), json!(3));
/// assert_eq!(to_number(Some("2.5")), json!(2.5));
/// assert_eq!(to_number(Some("x")), json!(null));
/// ```
pub fn number() -> impl Fn(Option<&str>) -> Value + Send + Sync + Clone + 'static {
    |value| match value.map(str::trim) {
        Some(v) => v
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| v.parse::<f64>().map(Value::from))
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

/// Coerces `"true"`/`"false"` to booleans; anything else becomes `null`
pub fn boolean() -> impl Fn(Option<&str>) -> Value + Send + Sync + Clone + 'static {
    |value| match value {
        Some("true") => Value::Bool(true),
        Some("false") => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Box a validator closure
pub fn boxed_validator<F>(f: F) -> Validator
where
    F: Fn(Option<&str>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a coercer closure
pub fn boxed_coercer<F>(f: F) -> Coercer
where
    F: Fn(Option<&str>) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}
