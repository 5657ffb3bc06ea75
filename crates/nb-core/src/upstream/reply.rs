use serde_json::Value;

use super::{RawReply, SUCCESS_CODE};
use crate::request::JobId;

/// Decoded response to a submission call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReply {
    Accepted(JobId),
    RateLimited,
    Forbidden,
    HttpError(u16),
    EmptyBody,
    MalformedBody(String),
    ErrorCode { code: Option<i64>, message: String },
}

impl SubmitReply {
    pub fn decode(raw: &RawReply) -> Self {
        match raw.status {
            429 => return Self::RateLimited,
            403 => return Self::Forbidden,
            status if !(200..300).contains(&status) => return Self::HttpError(status),
            _ => {}
        }
        if raw.body.trim().is_empty() {
            return Self::EmptyBody;
        }
        let data: Value = match serde_json::from_str(&raw.body) {
            Ok(data) => data,
            Err(err) => return Self::MalformedBody(err.to_string()),
        };

        let code = data.get("code").and_then(Value::as_i64);
        let session_id = data
            .get("data")
            .and_then(|inner| inner.get("session_id"))
            .and_then(value_as_id);

        match (code, session_id) {
            (Some(SUCCESS_CODE), Some(id)) => Self::Accepted(JobId::new(id)),
            _ => Self::ErrorCode {
                code,
                message: message_of(&data).unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Queued,
    Starting,
    Processing,
    Succeeded,
    Failed,
    Unknown(String),
}

impl PollStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "starting" => Self::Starting,
            "processing" => Self::Processing,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::Starting | Self::Processing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown(raw) => raw,
        }
    }
}

/// One poll cycle's view of the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub status: PollStatus,
    pub progress_percent: u8,
    pub result_urls: Vec<String>,
    pub error_detail: Option<String>,
}

/// Decoded response to a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReply {
    HttpError(u16),
    EmptyBody,
    MalformedBody(String),
    SessionExpired(String),
    ErrorCode { code: Option<i64>, message: String },
    /// Accepted but the upstream has not materialized a result row yet.
    NoResults,
    Progress(PollResult),
}

impl StatusReply {
    pub fn decode(raw: &RawReply) -> Self {
        if !(200..300).contains(&raw.status) {
            return Self::HttpError(raw.status);
        }
        if raw.body.trim().is_empty() {
            return Self::EmptyBody;
        }
        let data: Value = match serde_json::from_str(&raw.body) {
            Ok(data) => data,
            Err(err) => return Self::MalformedBody(err.to_string()),
        };

        let message = message_of(&data).unwrap_or_default();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("time") && lowered.contains("out") {
            return Self::SessionExpired(message);
        }

        let code = data.get("code").and_then(Value::as_i64);
        if code != Some(SUCCESS_CODE) {
            let message = if message.is_empty() {
                "Unknown error".to_string()
            } else {
                message
            };
            return Self::ErrorCode { code, message };
        }

        let Some(first) = data
            .get("data")
            .and_then(|inner| inner.get("results"))
            .and_then(Value::as_array)
            .and_then(|rows| rows.first())
        else {
            return Self::NoResults;
        };

        let status = first
            .get("status")
            .and_then(Value::as_str)
            .map(PollStatus::parse)
            .unwrap_or_else(|| PollStatus::Unknown(String::new()));
        let result_urls = first
            .get("urls")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let error_detail = first.get("error").and_then(|err| match err {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        });

        Self::Progress(PollResult {
            status,
            progress_percent: first.get("progress").map(progress_of).unwrap_or(0),
            result_urls,
            error_detail,
        })
    }
}

fn message_of(data: &Value) -> Option<String> {
    data.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn progress_of(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    };
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ok(body: Value) -> RawReply {
        RawReply::new(200, body.to_string())
    }

    #[test]
    fn test_submit_accepted() {
        let reply = SubmitReply::decode(&ok(json!({
            "code": 100000,
            "data": { "session_id": "abc123" }
        })));
        assert_eq!(reply, SubmitReply::Accepted(JobId::new("abc123")));
    }

    #[test]
    fn test_submit_status_classes() {
        assert_eq!(
            SubmitReply::decode(&RawReply::new(429, "slow down")),
            SubmitReply::RateLimited
        );
        assert_eq!(
            SubmitReply::decode(&RawReply::new(403, "")),
            SubmitReply::Forbidden
        );
        assert_eq!(
            SubmitReply::decode(&RawReply::new(502, "bad gateway")),
            SubmitReply::HttpError(502)
        );
        assert_eq!(
            SubmitReply::decode(&RawReply::new(200, "  \n")),
            SubmitReply::EmptyBody
        );
        assert!(matches!(
            SubmitReply::decode(&RawReply::new(200, "<html>")),
            SubmitReply::MalformedBody(_)
        ));
    }

    #[test]
    fn test_submit_missing_session_is_error_code() {
        let reply = SubmitReply::decode(&ok(json!({
            "code": 100001,
            "message": "session invalid",
            "data": {}
        })));
        assert_eq!(
            reply,
            SubmitReply::ErrorCode {
                code: Some(100001),
                message: "session invalid".into()
            }
        );

        let reply = SubmitReply::decode(&ok(json!({ "code": 100000, "data": {} })));
        assert!(matches!(reply, SubmitReply::ErrorCode { code: Some(100000), .. }));
    }

    #[test]
    fn test_status_progress_row() {
        let reply = StatusReply::decode(&ok(json!({
            "code": 100000,
            "message": "ok",
            "data": { "results": [ { "status": "processing", "progress": 42.4 } ] }
        })));
        let StatusReply::Progress(result) = reply else {
            panic!("expected progress row");
        };
        assert_eq!(result.status, PollStatus::Processing);
        assert_eq!(result.progress_percent, 42);
        assert!(result.result_urls.is_empty());
    }

    #[test]
    fn test_status_succeeded_urls() {
        let reply = StatusReply::decode(&ok(json!({
            "code": 100000,
            "data": { "results": [ {
                "status": "succeeded",
                "progress": 100,
                "urls": ["https://cdn.test/out.png", "https://cdn.test/alt.png"]
            } ] }
        })));
        let StatusReply::Progress(result) = reply else {
            panic!("expected progress row");
        };
        assert_eq!(result.status, PollStatus::Succeeded);
        assert_eq!(result.result_urls[0], "https://cdn.test/out.png");
    }

    #[test]
    fn test_status_session_timeout_beats_code() {
        let reply = StatusReply::decode(&ok(json!({
            "code": 100000,
            "message": "Session Timed Out"
        })));
        assert_eq!(reply, StatusReply::SessionExpired("Session Timed Out".into()));
    }

    #[test]
    fn test_status_error_code_and_empty_results() {
        let reply = StatusReply::decode(&ok(json!({ "code": 200001, "message": "denied" })));
        assert_eq!(
            reply,
            StatusReply::ErrorCode {
                code: Some(200001),
                message: "denied".into()
            }
        );

        let reply = StatusReply::decode(&ok(json!({ "code": 100000, "data": { "results": [] } })));
        assert_eq!(reply, StatusReply::NoResults);
    }

    #[test]
    fn test_unknown_status_kept_verbatim() {
        assert_eq!(
            PollStatus::parse("canceled"),
            PollStatus::Unknown("canceled".into())
        );
        assert!(PollStatus::parse("Starting").is_pending());
    }
}
