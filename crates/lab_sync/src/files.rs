//! File collection state and line-granular diffing
//!
//! The store is the client-side mirror of the server's file collection.
//! Local edits are turned into per-line operations which are applied
//! optimistically and sent over the wire; remote operations mutate the
//! same store. A full `files` snapshot from the server always wins and
//! corrects any drift accumulated from delta application.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Kind of line operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineOp {
    Insert,
    Delete,
    Replace,
}

/// One line or an ordered sequence of lines, as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineText {
    One(String),
    Many(Vec<String>),
}

impl LineText {
    /// Borrow the contained lines in order.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            LineText::One(s) => vec![s.as_str()],
            LineText::Many(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LineText::One(_) => 1,
            LineText::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for LineText {
    fn from(s: &str) -> Self {
        LineText::One(s.to_string())
    }
}

/// A single line-level operation against one file
///
/// Field names match the wire protocol: `lineNumber` is zero-based,
/// `lineContent` carries the new line(s) for insert/replace, `count` is
/// the number of lines removed by a delete (default 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDelta {
    pub op: LineOp,

    #[serde(rename = "lineNumber")]
    pub line_number: usize,

    #[serde(rename = "lineContent", default, skip_serializing_if = "Option::is_none")]
    pub content: Option<LineText>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl LineDelta {
    pub fn insert(line_number: usize, content: impl Into<LineText>) -> Self {
        Self {
            op: LineOp::Insert,
            line_number,
            content: Some(content.into()),
            count: None,
        }
    }

    pub fn delete(line_number: usize, count: usize) -> Self {
        Self {
            op: LineOp::Delete,
            line_number,
            content: None,
            count: Some(count),
        }
    }

    pub fn replace(line_number: usize, content: impl Into<LineText>) -> Self {
        Self {
            op: LineOp::Replace,
            line_number,
            content: Some(content.into()),
            count: None,
        }
    }
}

/// Client-side mirror of the environment's file collection
///
/// Filenames map to full newline-joined content. A `BTreeMap` keeps the
/// serialization order-stable, which the run-request integrity hash
/// relies on.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    files: BTreeMap<String, String>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Filenames in stable (sorted) order.
    pub fn file_names(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Clone of the full collection, for run requests.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.files.clone()
    }

    /// Wholesale replacement from an authoritative `files` snapshot.
    /// Any pending optimistic edits are discarded.
    pub fn replace_all(&mut self, snapshot: BTreeMap<String, String>) {
        self.files = snapshot;
    }

    /// Full-content replace of one file (the `updateFile` path).
    pub fn set_file(&mut self, name: &str, content: &str) {
        self.files.insert(name.to_string(), content.to_string());
    }

    /// Create an empty file locally. Returns false if the name is taken.
    pub fn add_file(&mut self, name: &str) -> bool {
        if name.is_empty() || self.files.contains_key(name) {
            return false;
        }
        self.files.insert(name.to_string(), String::new());
        true
    }

    /// Apply a line delta to one file, clamping out-of-range indices
    /// instead of failing.
    ///
    /// A missing file is treated as empty, so deltas for files the local
    /// mirror has not seen yet still land somewhere sensible until the
    /// next full snapshot corrects things.
    pub fn apply_delta(&mut self, name: &str, delta: &LineDelta) {
        let content = self.files.get(name).map(|s| s.as_str()).unwrap_or("");
        let mut lines: Vec<String> = content.split('\n').map(|s| s.to_string()).collect();

        match delta.op {
            LineOp::Insert => {
                let at = delta.line_number.min(lines.len());
                let new_lines: Vec<String> = delta
                    .content
                    .iter()
                    .flat_map(|c| c.lines())
                    .map(|s| s.to_string())
                    .collect();
                lines.splice(at..at, new_lines);
            }
            LineOp::Delete => {
                let count = delta.count.unwrap_or(1);
                if delta.line_number < lines.len() {
                    let end = (delta.line_number + count).min(lines.len());
                    lines.drain(delta.line_number..end);
                }
            }
            LineOp::Replace => {
                let new_lines: Vec<&str> =
                    delta.content.iter().flat_map(|c| c.lines()).collect();
                for (i, line) in new_lines.into_iter().enumerate() {
                    let idx = delta.line_number + i;
                    if idx < lines.len() {
                        lines[idx] = line.to_string();
                    } else {
                        // Replacement past the end extends the file.
                        lines.push(line.to_string());
                    }
                }
            }
        }

        self.files.insert(name.to_string(), lines.join("\n"));
    }

    /// Compute the minimal per-line operations that turn `old` into `new`.
    ///
    /// Walks both line sequences from index 0: overlapping indices that
    /// differ become one `replace` each; a longer new sequence yields one
    /// `insert` carrying the tail; a longer old sequence yields one
    /// `delete` with a count. Replaying the returned operations in order
    /// against `old` reproduces `new` exactly.
    pub fn diff_lines(old: &str, new: &str) -> Vec<LineDelta> {
        let old_lines: Vec<&str> = old.split('\n').collect();
        let new_lines: Vec<&str> = new.split('\n').collect();
        let overlap = old_lines.len().min(new_lines.len());

        let mut deltas = Vec::new();

        for i in 0..overlap {
            if old_lines[i] != new_lines[i] {
                deltas.push(LineDelta::replace(i, new_lines[i]));
            }
        }

        if new_lines.len() > old_lines.len() {
            let tail: Vec<String> = new_lines[old_lines.len()..]
                .iter()
                .map(|s| s.to_string())
                .collect();
            let content = if tail.len() == 1 {
                LineText::One(tail.into_iter().next().unwrap_or_default())
            } else {
                LineText::Many(tail)
            };
            deltas.push(LineDelta {
                op: LineOp::Insert,
                line_number: old_lines.len(),
                content: Some(content),
                count: None,
            });
        } else if old_lines.len() > new_lines.len() {
            deltas.push(LineDelta::delete(
                new_lines.len(),
                old_lines.len() - new_lines.len(),
            ));
        }

        deltas
    }

    /// Order-stable SHA-256 fingerprint of the serialized collection,
    /// carried in run requests so the server can detect stale or
    /// duplicate submissions.
    pub fn content_hash(&self) -> String {
        // BTreeMap serializes in key order, so equal collections always
        // hash identically.
        let serialized = serde_json::to_string(&self.files).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
