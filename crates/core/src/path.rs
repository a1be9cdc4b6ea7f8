// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized database paths.
//!
//! Paths are compared by their normalized string form, so `a//b/`, `/a/b`
//! and `a/b` all address the same location.

use std::fmt;

/// A slash-separated location in the realtime tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path {
    pieces: Vec<String>,
}

impl Path {
    /// Parses a path string, dropping empty segments.
    pub fn new(path: &str) -> Self {
        let pieces = path.split('/').filter(|p| !p.is_empty()).map(str::to_string).collect();
        Path { pieces }
    }

    /// The root path `/`.
    pub fn root() -> Self {
        Path::default()
    }

    pub fn is_root(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn pieces(&self) -> &[String] {
        &self.pieces
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Self {
        let mut pieces = self.pieces.clone();
        pieces.extend(segment.split('/').filter(|p| !p.is_empty()).map(str::to_string));
        Path { pieces }
    }

    /// Normalizes a raw path string without keeping the parsed form.
    pub fn normalize(path: &str) -> String {
        Path::new(path).to_string()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pieces.is_empty() {
            return f.write_str("/");
        }
        for piece in &self.pieces {
            write!(f, "/{}", piece)?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::new(path)
    }
}

#[cfg(test)]
#[path = "path_tests.rs"]
mod tests;
