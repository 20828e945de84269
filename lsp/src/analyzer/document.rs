use std::sync::Arc;

/// Immutable view of an editor buffer, captured when a request starts.
///
/// The URI is the cache identity; `version` only guards against a
/// computation that raced an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    uri: String,
    text: Arc<str>,
    version: i32,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, text: impl Into<Arc<str>>, version: i32) -> Self {
        Self {
            uri: uri.into(),
            text: text.into(),
            version,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }
}
