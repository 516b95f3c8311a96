use crate::error::AppError;
use serde_json::json;
use tracing::error;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Handler error carrying optional structured details for the client.
#[derive(Debug)]
pub struct HandlerErr {
    pub source: AppError,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn with_details(source: AppError, details: serde_json::Value) -> Self {
        HandlerErr {
            source,
            details: Some(details),
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        if !self.source.is_client_error() {
            error!(request_id = id, code = self.source.code(), error = %self.source, "request failed");
        }
        err(id, self.source.code(), self.source.public_message(), self.details)
    }
}

impl From<AppError> for HandlerErr {
    fn from(source: AppError) -> Self {
        HandlerErr {
            source,
            details: None,
        }
    }
}

pub type HandlerResult = Result<serde_json::Value, HandlerErr>;

pub fn respond(id: &str, result: HandlerResult) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
