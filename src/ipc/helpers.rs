use crate::ipc::error::err;
use crate::ipc::types::Request;

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match str_param(req, key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

/// Accepts JSON booleans and the strings "true"/"false".
pub fn bool_param(req: &Request, key: &str) -> Option<bool> {
    match req.params.get(key)? {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts non-negative JSON integers and numeric strings.
pub fn usize_param(req: &Request, key: &str) -> Option<usize> {
    match req.params.get(key)? {
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as usize),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
