//! # ClassLab Sync Engine
//!
//! Client-side synchronization for collaborative code-editing environments.
//!
//! ## Architecture
//!
//! - **Transport**: one WebSocket per environment session, with automatic
//!   reconnect and a bounded attempt budget
//! - **Protocol**: tagged `{event, data}` JSON envelopes, one closed enum
//!   per direction
//! - **Files**: line-granular deltas applied optimistically, corrected by
//!   authoritative full snapshots from the server
//! - **Presence**: ephemeral collaborator cursors and live input drafts
//! - **Execution**: run requests carrying a content-integrity hash, with
//!   streamed console output and interactive stdin
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lab_sync::{SessionConfig, EditorSession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SessionConfig {
//!         server_url: "ws://localhost:8080".to_string(),
//!         environment_id: "env-123".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let session = EditorSession::spawn(config)?;
//!     session.run_code();
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod cursors;
pub mod files;
pub mod link;
pub mod protocol;
pub mod session;

pub use config::SessionConfig;
pub use console::ConsoleLog;
pub use cursors::{CursorRecord, CursorTracker};
pub use files::{FileStore, LineDelta, LineOp, LineText};
pub use link::{LinkStatus, ReconnectPolicy};
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{EditorSession, SessionHandle, SessionState};

/// Common result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during sync operations
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("WebSocket error: {0}")]
    WebSocketError(Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::WebSocketError(Box::new(err))
    }
}
