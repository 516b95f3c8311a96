use super::error::HandlerErr;
use crate::error::AppError;
use crate::import::sheet::number_text;
use serde_json::Value;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::from(AppError::validation(format!("missing {}", key))))
}

/// Strings pass through; numbers are accepted for fields such as semester and
/// render the way sheet cells do (`5.0` becomes `"5"`).
pub fn get_optional_text(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(v)) => number_text(v),
            _ => n.to_string(),
        })),
        Some(_) => Err(AppError::validation(format!("{} must be a string", key)).into()),
    }
}

pub fn get_string_list(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(items) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(AppError::validation(format!("{} must be an array", key)).into());
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| {
                    HandlerErr::from(AppError::validation(format!("{} must contain strings", key)))
                })
        })
        .collect()
}

pub fn get_optional_bool(params: &Value, key: &str) -> Result<Option<bool>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(AppError::validation(format!("{} must be a boolean", key)).into()),
    }
}

/// `None` when the key is absent, `Some(None)` when it is explicitly null.
pub fn get_nullable_f64(params: &Value, key: &str) -> Result<Option<Option<f64>>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(|n| Some(Some(n)))
            .ok_or_else(|| HandlerErr::from(AppError::validation(format!("{} must be a number", key)))),
    }
}
