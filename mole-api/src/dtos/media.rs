use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ACCEPTED_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Debug, Error, PartialEq)]
pub enum DataUrlError {
    #[error("Invalid image data base64")]
    Malformed,

    #[error("Not support content-type: {0}")]
    UnsupportedType(String),

    #[error("Decode file content fail")]
    Decode,
}

/// Form body of an image upload.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadForm {
    #[serde(default)]
    pub account_id: Option<String>,
    pub file_name: String,
    pub file_base64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Decoded `data:image/<kind>;base64,<payload>` URL.
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(raw: &str) -> Result<Self, DataUrlError> {
        let (content_type, payload) = raw
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or(DataUrlError::Malformed)?;

        let kind = content_type
            .strip_prefix("image/")
            .ok_or(DataUrlError::Malformed)?;
        if kind.is_empty()
            || !kind.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || payload.is_empty()
        {
            return Err(DataUrlError::Malformed);
        }

        if !ACCEPTED_TYPES.contains(&content_type) {
            return Err(DataUrlError::UnsupportedType(content_type.to_string()));
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|_| DataUrlError::Decode)?;

        Ok(Self {
            content_type: content_type.to_string(),
            bytes,
        })
    }
}

/// File names become part of an object key; keep them to one path segment.
pub fn valid_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_png_data_url() {
        let url = DataUrl::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(url.content_type, "image/png");
        assert_eq!(url.bytes, b"hello");
    }

    #[test]
    fn rejects_other_types_and_garbage() {
        assert_eq!(
            DataUrl::parse("data:image/gif;base64,aGVsbG8="),
            Err(DataUrlError::UnsupportedType("image/gif".to_string()))
        );
        assert_eq!(DataUrl::parse("aGVsbG8="), Err(DataUrlError::Malformed));
        assert_eq!(
            DataUrl::parse("data:image/jpeg;base64,!!!"),
            Err(DataUrlError::Decode)
        );
    }

    #[test]
    fn file_names_stay_in_one_segment() {
        assert!(valid_file_name("mole.jpg"));
        assert!(!valid_file_name("../mole.jpg"));
        assert!(!valid_file_name(""));
    }
}
