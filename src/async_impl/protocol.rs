//! JSON-lines request/response types of the administrative interface.
//!
//! One request object per line in, one response object per line out:
//!
//! ```text
//! {"cmd":"retune","kp":150.0,"ki":50.0,"kd":4000.0}
//! {"type":"accepted"}
//! ```

use serde::{Deserialize, Serialize};

use crate::controller::{ControllerSnapshot, Gains};
use crate::ipc::Telemetry;
use crate::plant::ModelParams;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
    Retune(Gains),
    Reset,
    Clamp { max: f64, min: f64 },
    Query,
    State,
    Status,
    StartStop,
    ResetModel,
    Params(ModelParams),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Accepted,
    Controller(ControllerSnapshot),
    State(Telemetry),
    Status { paused: bool, started: bool },
    Error { message: String },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

pub fn parse_request(line: &str) -> Result<Request, serde_json::Error> {
    serde_json::from_str(line.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_retune() {
        let request = parse_request(r#"{"cmd":"retune","kp":1.5,"ki":0.2,"kd":3.0}"#).unwrap();
        assert_eq!(request, Request::Retune(Gains::new(1.5, 0.2, 3.0)));
    }

    #[test]
    fn parses_clamp_and_params() {
        assert_eq!(
            parse_request(r#"{"cmd":"clamp","max":10.0,"min":-10.0}"#).unwrap(),
            Request::Clamp {
                max: 10.0,
                min: -10.0
            }
        );
        assert_eq!(
            parse_request(r#" {"cmd":"params","ref_angle":0.1,"delay_us":200,"jitter_us":50} "#)
                .unwrap(),
            Request::Params(ModelParams {
                ref_angle: 0.1,
                delay_us: 200,
                jitter_us: 50
            })
        );
    }

    #[test]
    fn parses_unit_commands() {
        for (text, expected) in [
            (r#"{"cmd":"reset"}"#, Request::Reset),
            (r#"{"cmd":"query"}"#, Request::Query),
            (r#"{"cmd":"state"}"#, Request::State),
            (r#"{"cmd":"status"}"#, Request::Status),
            (r#"{"cmd":"start_stop"}"#, Request::StartStop),
            (r#"{"cmd":"reset_model"}"#, Request::ResetModel),
        ] {
            assert_eq!(parse_request(text).unwrap(), expected);
        }
    }

    #[test]
    fn rejects_unknown_and_incomplete() {
        assert!(parse_request(r#"{"cmd":"launch"}"#).is_err());
        assert!(parse_request(r#"{"cmd":"retune","kp":1.0}"#).is_err());
        assert!(parse_request("not json").is_err());
    }

    #[test]
    fn responses_are_tagged() {
        assert_eq!(
            serde_json::to_value(Response::Accepted).unwrap(),
            json!({"type": "accepted"})
        );
        assert_eq!(
            serde_json::to_value(Response::Status {
                paused: true,
                started: false
            })
            .unwrap(),
            json!({"type": "status", "paused": true, "started": false})
        );
        let value = serde_json::to_value(Response::State(Telemetry::default())).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["theta"], 0.0);
        assert_eq!(value["ticks"], 0);
    }
}
