use crate::error::GradeFormError;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody<'a>>,
}

fn envelope(env: Envelope<'_>) -> serde_json::Value {
    serde_json::to_value(env).unwrap_or_else(|_| json!({ "ok": false }))
}

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    envelope(Envelope {
        id: Some(id),
        ok: true,
        result: Some(result),
        error: None,
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    envelope(Envelope {
        id: Some(id),
        ok: false,
        result: None,
        error: Some(ErrorBody {
            code,
            message: message.into(),
            details,
        }),
    })
}

/// Reply for a line that did not parse; there is no id to echo.
pub fn malformed_request(message: impl Into<String>) -> serde_json::Value {
    envelope(Envelope {
        id: None,
        ok: false,
        result: None,
        error: Some(ErrorBody {
            code: "bad_json",
            message: message.into(),
            details: None,
        }),
    })
}

pub fn domain_err(id: &str, e: &GradeFormError) -> serde_json::Value {
    let details = match e {
        GradeFormError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
        GradeFormError::UnknownFilter(name) => Some(json!({ "filter": name })),
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}
