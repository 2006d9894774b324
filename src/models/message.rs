//! Message and attachment models

use serde::{Deserialize, Serialize};

/// File attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminAttachment {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub stored_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl AdminAttachment {
    /// Best display name: original filename, stored name, then URL basename.
    pub fn file_name(&self) -> &str {
        self.original_filename
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.stored_name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| self.url.rsplit('/').next().unwrap_or(&self.url))
    }
}

/// One message in a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminMessage {
    pub id: i64,
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AdminAttachment>,
}

/// Response to message create/edit.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageMutation {
    pub message: AdminMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMessage {
    pub deleted_message_id: i64,
}

/// Resolve an attachment URL against the API origin.
///
/// Absolute `http(s)` URLs pass through; relative paths are joined onto
/// `base` with exactly one slash.
pub fn resolve_attachment_url(base: &str, value: &str) -> String {
    let raw = value.trim();
    if raw.is_empty() {
        return String::new();
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return raw.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        raw.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_attachment_url() {
        assert_eq!(
            resolve_attachment_url("http://api.local/", "/uploads/a.png"),
            "http://api.local/uploads/a.png"
        );
        assert_eq!(
            resolve_attachment_url("http://api.local", "HTTPS://cdn/x.png"),
            "HTTPS://cdn/x.png"
        );
        assert_eq!(resolve_attachment_url("http://api.local", "  "), "");
    }

    #[test]
    fn test_attachment_file_name_fallback() {
        let att: AdminAttachment = serde_json::from_value(serde_json::json!({
            "id": 1,
            "type": "file",
            "url": "/uploads/abc/report.pdf",
            "original_filename": null,
            "stored_name": ""
        }))
        .unwrap();
        assert_eq!(att.file_name(), "report.pdf");
    }
}
