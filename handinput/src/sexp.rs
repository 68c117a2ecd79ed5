//! S-expression plist helpers shared by configuration loading, frame
//! replay and event formatting.
//!
//! Plists come from two parser dialects: the elisp parser yields
//! `Value::Keyword("key")` while the default parser yields
//! `Value::Symbol(":key")`.  Every lookup accepts both.

use lexpr::Value;

/// Whether `car` is the plist key `key` in either dialect.
fn is_key(car: &Value, key: &str) -> bool {
    match car {
        Value::Keyword(k) => k.as_ref() == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// Plist key name without its leading colon, if `v` is a key.
pub fn key_name(v: &Value) -> Option<&str> {
    match v {
        Value::Keyword(k) => Some(k.as_ref()),
        Value::Symbol(s) => s.strip_prefix(':'),
        _ => None,
    }
}

/// Raw value following `:key` in a plist.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    while let Value::Cons(pair) = current {
        if is_key(pair.car(), key) {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Render a scalar plist value as a string.
/// Symbols lose any leading colon; booleans become `t`/`nil`.
pub fn scalar_string(val: &Value) -> String {
    match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => v.strip_prefix(':').unwrap_or(v).to_string(),
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => bool_sexp(*b).to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        other => other.to_string(),
    }
}

/// Numeric value of a single element, if it is a number.
pub fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Walk a plist as `(key, value)` pairs, in order.
pub fn plist_pairs(value: &Value) -> Vec<(&Value, &Value)> {
    let mut pairs = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        match pair.cdr() {
            Value::Cons(next) => {
                pairs.push((pair.car(), next.car()));
                current = next.cdr();
            }
            _ => break,
        }
    }
    pairs
}

/// Top-level elements of a proper or dotted list.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    loop {
        match current {
            Value::Cons(pair) => {
                items.push(pair.car());
                current = pair.cdr();
            }
            Value::Null | Value::Nil => break,
            other => {
                items.push(other);
                break;
            }
        }
    }
    items
}

/// Flatten a possibly nested list/cons structure into leaf values.
pub fn flatten_list(value: &Value) -> Vec<&Value> {
    let mut result = Vec::new();
    fn walk<'a>(v: &'a Value, out: &mut Vec<&'a Value>) {
        match v {
            Value::Cons(pair) => {
                walk(pair.car(), out);
                walk(pair.cdr(), out);
            }
            Value::Null => {}
            other => out.push(other),
        }
    }
    walk(value, &mut result);
    result
}

pub fn parse_vec3(v: &Value) -> Option<[f32; 3]> {
    let nums: Vec<f64> = flatten_list(v).into_iter().filter_map(as_number).collect();
    match nums.as_slice() {
        [x, y, z] => Some([*x as f32, *y as f32, *z as f32]),
        _ => None,
    }
}

// ── Output ─────────────────────────────────────────────────

pub fn bool_sexp(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}
