//! Session console log
//!
//! Append-only text shown alongside the editor: program output plus
//! timestamped status lines from the connection lifecycle. Status lines
//! are a logging side effect only, never a control signal. Starting a
//! run destructively resets the log to a fresh banner so separate runs
//! stay delineated.

use chrono::Local;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// The visible console text for one session
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    text: String,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append one line verbatim (program output, raw frames).
    pub fn append(&mut self, line: &str) {
        self.text.push('\n');
        self.text.push_str(line);
    }

    /// Append a timestamped status line.
    pub fn status(&mut self, message: &str) {
        let line = format!("[{}] {}", Local::now().format(TIMESTAMP_FORMAT), message);
        self.append(&line);
    }

    /// Append an unparseable inbound frame verbatim rather than dropping
    /// it silently.
    pub fn raw_frame(&mut self, frame: &str) {
        let line = format!(
            "[{}] Received: {}",
            Local::now().format(TIMESTAMP_FORMAT),
            frame
        );
        self.append(&line);
    }

    /// Discard everything and start a fresh run banner.
    pub fn reset_running_banner(&mut self) {
        self.text = format!(
            "[{}] 🚀 Running code...",
            Local::now().format(TIMESTAMP_FORMAT)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_status() {
        let mut console = ConsoleLog::new();
        assert!(console.is_empty());

        console.append("hello");
        console.status("🔌 Connected to server");

        assert!(console.contents().contains("hello"));
        assert!(console.contents().contains("🔌 Connected to server"));
        // Status lines are timestamped.
        assert!(console.contents().contains('['));
    }

    #[test]
    fn test_reset_discards_prior_output() {
        let mut console = ConsoleLog::new();
        console.append("old output");
        console.reset_running_banner();

        assert!(!console.contents().contains("old output"));
        assert!(console.contents().contains("🚀 Running code..."));
    }

    #[test]
    fn test_raw_frame_kept_verbatim() {
        let mut console = ConsoleLog::new();
        console.raw_frame("{\"event\":\"mystery\"}");
        assert!(console.contents().contains("Received: {\"event\":\"mystery\"}"));
    }
}
