//! Common types and errors for ClassLab
//!
//! This crate provides shared data structures used across all ClassLab
//! components.

pub mod telemetry;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error types for ClassLab operations
#[derive(Error, Debug)]
pub enum LabError {
    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A cursor position inside a file, zero-based.
///
/// `ch` is the column within the line, matching the wire protocol's
/// field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CursorPos {
    pub line: u32,
    pub ch: u32,
}

impl CursorPos {
    pub fn new(line: u32, ch: u32) -> Self {
        Self { line, ch }
    }

    /// The idle/default position a freshly mounted editor reports.
    pub fn is_origin(&self) -> bool {
        self.line == 0 && self.ch == 0
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, LabError>;

/// Exit code constants
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CONFIG_ERROR: i32 = 101;
pub const EXIT_TERMINATED: i32 = 130;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_pos_origin() {
        assert!(CursorPos::default().is_origin());
        assert!(!CursorPos::new(0, 3).is_origin());
        assert!(!CursorPos::new(2, 0).is_origin());
    }

    #[test]
    fn test_cursor_pos_serialization() {
        let pos = CursorPos::new(4, 12);
        let json = serde_json::to_string(&pos).unwrap();
        assert_eq!(json, r#"{"line":4,"ch":12}"#);
    }
}
