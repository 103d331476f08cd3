//! Typed access to step parameters.

use clipflow_core::{HandlerError, Params};

pub(crate) fn optional_str<'a>(params: &'a Params, key: &str) -> Result<Option<&'a str>, HandlerError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(HandlerError::new(format!(
            "parameter '{key}' must be a string, got {other}"
        ))),
    }
}

pub(crate) fn optional_usize(params: &Params, key: &str) -> Result<Option<usize>, HandlerError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                HandlerError::new(format!(
                    "parameter '{key}' must be a non-negative integer, got {value}"
                ))
            }),
    }
}
