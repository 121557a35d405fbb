// src/reload/notice.rs

use serde::{Deserialize, Serialize};

/// What a connected client has to refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Reload the whole page.
    Full,
    /// Swap a stylesheet in place.
    Css,
    /// Re-fetch an image, font or downloadable file.
    Asset,
}

/// Message pushed to live-reload clients.
///
/// Wire format: `{"kind":"full"|"css"|"asset","path":"/css/main.css"}`. The
/// path is relative to the output root, with a leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadNotice {
    pub kind: ReloadKind,
    pub path: String,
}

impl ReloadNotice {
    pub fn new(kind: ReloadKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a struct of an enum and a string cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
