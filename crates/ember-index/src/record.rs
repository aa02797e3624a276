//! The upload record written to and read back from the index.

use std::collections::HashMap;

/// Fields written at upload time. `uses_remaining` and `previewed` are
/// stored as separate subkeys, not part of the field-map itself.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub sha256: String,
    pub created_at: String,
    pub expiry_at: String,
    pub encryption_key: String,
}

/// A fully assembled record, as returned by [`crate::IndexClient::get`].
#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub sha256: String,
    pub created_at: String,
    pub expiry_at: String,
    pub encryption_key: Option<String>,
    pub uses_remaining: i64,
    pub previewed: bool,
}

impl UploadRecord {
    pub(crate) fn from_fields(
        mut fields: HashMap<String, String>,
        uses: Option<String>,
        previewed: Option<String>,
    ) -> Option<Self> {
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            filename: fields.remove("filename").unwrap_or_default(),
            size: fields.remove("size").and_then(|s| s.parse().ok()).unwrap_or(0),
            mime_type: fields.remove("mime_type").unwrap_or_default(),
            sha256: fields.remove("sha256").unwrap_or_default(),
            created_at: fields.remove("created_at").unwrap_or_default(),
            expiry_at: fields.remove("expiry_at").unwrap_or_default(),
            encryption_key: fields.remove("encryption_key"),
            uses_remaining: uses.and_then(|s| s.parse().ok()).unwrap_or(0),
            previewed: previewed.as_deref() == Some("1"),
        })
    }
}
