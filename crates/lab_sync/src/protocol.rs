//! Wire protocol message types
//!
//! Every frame in both directions is a JSON envelope `{"event": tag,
//! "data": payload}`. Each direction gets its own closed enum so
//! dispatch is exhaustive at compile time; an inbound frame that fails
//! to decode is surfaced verbatim by the session as a raw console entry
//! rather than dropped silently.

use crate::files::LineDelta;
use lab_common::CursorPos;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages sent by the client to the collaboration server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Request the authoritative file snapshot; sent once after every
    /// successful connect.
    GetFiles { environment_id: String },

    /// Full-content replace for one file
    UpdateFile {
        environment_id: String,
        file_name: String,
        file: String,
    },

    /// Line-level delta for one file
    DiffLine {
        environment_id: String,
        file_name: String,
        #[serde(flatten)]
        delta: LineDelta,
    },

    /// Execution request with a content-integrity hash over the snapshot
    Run {
        file_names: Vec<String>,
        environment_id: String,
        hash: String,
        files: BTreeMap<String, String>,
    },

    /// One line of interactive stdin
    Input { input: String },

    /// Live draft of pending stdin, for presence only
    InputChange { input: String },

    /// Local cursor position, tagged with the open file
    CursorMove {
        file: String,
        environment_id: String,
        #[serde(flatten)]
        pos: CursorPos,
    },

    RenameFile {
        old_name: String,
        new_name: String,
        environment_id: String,
    },

    DeleteFile {
        file_name: String,
        environment_id: String,
    },

    DuplicateFile {
        file_name: String,
        environment_id: String,
    },
}

/// Payload of a server `error` event: either structured or bare text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ErrorData {
    Structured { message: String },
    Text(String),
}

impl ErrorData {
    pub fn message(&self) -> &str {
        match self {
            ErrorData::Structured { message } => message,
            ErrorData::Text(text) => text,
        }
    }
}

/// Messages broadcast by the collaboration server to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Authoritative full snapshot; replaces local state wholesale
    Files { files: BTreeMap<String, String> },

    /// Remote line delta to apply
    LineUpdated {
        file_name: String,
        #[serde(flatten)]
        delta: LineDelta,
    },

    /// Console text to append
    Output { output: String },

    /// Advisory run status; no required handling
    RunStatus {
        #[serde(default)]
        status: Option<String>,
    },

    /// Process termination
    Exit { exit_code: i32 },

    /// Structured failure reported by the server
    Error(ErrorData),

    /// Remote cursor upsert
    MovedCursor {
        id: String,
        pos: CursorPos,
        file: String,
    },

    /// Remote cursor removal on disconnect
    DeleteCursor { session_id: String },

    /// A remote participant's live stdin draft
    InputChanged { input: String },

    /// Acknowledgement that a run was accepted; resets the console
    RunRan {},
}

impl ClientEvent {
    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ServerEvent {
    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON text frame
    pub fn from_json(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{LineOp, LineText};

    #[test]
    fn test_get_files_wire_shape() {
        let event = ClientEvent::GetFiles {
            environment_id: "env-1".to_string(),
        };
        let json = event.to_json().unwrap();
        assert_eq!(json, r#"{"event":"getFiles","data":{"environmentId":"env-1"}}"#);
    }

    #[test]
    fn test_diff_line_flattens_delta() {
        let event = ClientEvent::DiffLine {
            environment_id: "env-1".to_string(),
            file_name: "main.py".to_string(),
            delta: LineDelta::replace(2, "x = 1"),
        };
        let value: serde_json::Value =
            serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["event"], "diffLine");
        assert_eq!(value["data"]["fileName"], "main.py");
        assert_eq!(value["data"]["op"], "replace");
        assert_eq!(value["data"]["lineNumber"], 2);
        assert_eq!(value["data"]["lineContent"], "x = 1");
    }

    #[test]
    fn test_line_updated_round_trip() {
        let frame = r#"{"event":"lineUpdated","data":{"fileName":"main.py","op":"insert","lineNumber":0,"lineContent":["a","b"]}}"#;
        let event = ServerEvent::from_json(frame).unwrap();
        match event {
            ServerEvent::LineUpdated { file_name, delta } => {
                assert_eq!(file_name, "main.py");
                assert_eq!(delta.op, LineOp::Insert);
                assert_eq!(
                    delta.content,
                    Some(LineText::Many(vec!["a".into(), "b".into()]))
                );
            }
            other => panic!("expected LineUpdated, got {:?}", other),
        }
    }

    #[test]
    fn test_cursor_events() {
        let frame = r#"{"event":"movedCursor","data":{"id":"s-9","pos":{"line":3,"ch":7},"file":"main.py"}}"#;
        let event = ServerEvent::from_json(frame).unwrap();
        assert_eq!(
            event,
            ServerEvent::MovedCursor {
                id: "s-9".to_string(),
                pos: CursorPos::new(3, 7),
                file: "main.py".to_string(),
            }
        );

        let frame = r#"{"event":"deleteCursor","data":{"sessionId":"s-9"}}"#;
        assert_eq!(
            ServerEvent::from_json(frame).unwrap(),
            ServerEvent::DeleteCursor {
                session_id: "s-9".to_string()
            }
        );
    }

    #[test]
    fn test_error_data_both_shapes() {
        let structured =
            ServerEvent::from_json(r#"{"event":"error","data":{"message":"boom"}}"#).unwrap();
        match structured {
            ServerEvent::Error(data) => assert_eq!(data.message(), "boom"),
            other => panic!("expected Error, got {:?}", other),
        }

        let bare = ServerEvent::from_json(r#"{"event":"error","data":"plain text"}"#).unwrap();
        match bare {
            ServerEvent::Error(data) => assert_eq!(data.message(), "plain text"),
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_a_decode_error() {
        assert!(ServerEvent::from_json(r#"{"event":"mystery","data":{}}"#).is_err());
        assert!(ServerEvent::from_json("not json at all").is_err());
    }

    #[test]
    fn test_run_request_round_trip() {
        let mut files = BTreeMap::new();
        files.insert("main.py".to_string(), "print(1)".to_string());
        let event = ClientEvent::Run {
            file_names: vec!["main.py".to_string()],
            environment_id: "env-1".to_string(),
            hash: "abc".to_string(),
            files,
        };
        let json = event.to_json().unwrap();
        let parsed: ClientEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
