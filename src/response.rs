use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{transport::HttpResponse, ApiError, Result};

/// Decoded response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Body of a JSON response.
    Json(Value),
    /// Body of any other content type, or JSON that failed to parse.
    Text(String),
}

/// Successful response of a logical operation.
///
/// Portal endpoints wrap results in `{ "success": bool, "data": ..., "message": "..." }`;
/// the accessors read that envelope and degrade gracefully when it is absent.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub payload: Payload,
}

impl ApiResponse {
    pub(crate) fn from_http(response: HttpResponse) -> Self {
        let payload = if response.is_json() {
            match serde_json::from_str::<Value>(&response.body) {
                Ok(value) => Payload::Json(value),
                Err(_) => Payload::Text(response.body),
            }
        } else {
            Payload::Text(response.body)
        };

        Self {
            status: response.status,
            payload,
        }
    }

    /// Envelope `success` flag; falls back to the HTTP status class.
    pub fn success(&self) -> bool {
        match &self.payload {
            Payload::Json(value) => value
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or_else(|| (200..300).contains(&self.status)),
            Payload::Text(_) => (200..300).contains(&self.status),
        }
    }

    /// Envelope `data` field.
    pub fn data(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Json(value) => value.get("data"),
            Payload::Text(_) => None,
        }
    }

    /// Envelope `message` field.
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Json(value) => value.get("message").and_then(Value::as_str),
            Payload::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Json(_) => None,
        }
    }

    /// Deserializes `data`, or the whole body when there is no envelope.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self.payload {
            Payload::Json(Value::Object(mut object)) if object.contains_key("data") => {
                object.remove("data").unwrap_or(Value::Null)
            }
            Payload::Json(value) => value,
            Payload::Text(text) => {
                return Err(ApiError::Decode(format!(
                    "expected a JSON payload, got text: {}",
                    truncate(&text, 200)
                )))
            }
        };

        serde_json::from_value(value)
            .map_err(|err| ApiError::Decode(format!("invalid response data: {err}")))
    }
}

/// Pulls a human-readable message out of an error body, JSON or not.
pub(crate) fn body_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return Some(text.to_owned());
            }
        }
        return None;
    }

    Some(truncate(trimmed, 200).to_owned())
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::{body_message, ApiResponse, Payload};
    use crate::{transport::HttpResponse, ApiError};

    fn json_response(status: u16, body: serde_json::Value) -> ApiResponse {
        ApiResponse::from_http(HttpResponse {
            status,
            content_type: Some("application/json".to_owned()),
            body: body.to_string(),
        })
    }

    #[test]
    fn reads_envelope_fields() {
        let response = json_response(
            200,
            json!({"success": true, "data": {"token": "abc"}, "message": "ok"}),
        );
        assert!(response.success());
        assert_eq!(response.message(), Some("ok"));
        assert_eq!(response.data(), Some(&json!({"token": "abc"})));
    }

    #[test]
    fn missing_success_flag_follows_status() {
        assert!(json_response(200, json!({"status": "healthy"})).success());
        assert!(!json_response(200, json!({"success": false})).success());
    }

    #[test]
    fn non_json_content_type_keeps_raw_text() {
        let response = ApiResponse::from_http(HttpResponse {
            status: 200,
            content_type: Some("text/plain".to_owned()),
            body: "OK".to_owned(),
        });
        assert_eq!(response.payload, Payload::Text("OK".to_owned()));
        assert!(response.success());
        assert_eq!(response.text(), Some("OK"));
    }

    #[test]
    fn into_data_decodes_typed_payload() {
        #[derive(Deserialize)]
        struct Token {
            token: String,
        }

        let response = json_response(200, json!({"success": true, "data": {"token": "abc"}}));
        let token: Token = response.into_data().expect("data must decode");
        assert_eq!(token.token, "abc");
    }

    #[test]
    fn into_data_rejects_text() {
        let response = ApiResponse::from_http(HttpResponse {
            status: 200,
            content_type: None,
            body: "<html>".to_owned(),
        });
        let err = response.into_data::<serde_json::Value>().expect_err("text must not decode");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn body_message_prefers_json_message() {
        assert_eq!(
            body_message(r#"{"success":false,"message":"NPSN tidak ditemukan"}"#),
            Some("NPSN tidak ditemukan".to_owned())
        );
        assert_eq!(
            body_message("Internal Server Error"),
            Some("Internal Server Error".to_owned())
        );
        assert_eq!(body_message("  "), None);
    }
}
