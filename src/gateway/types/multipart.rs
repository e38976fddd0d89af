//! Buffered multipart forms.

use axum::extract::Multipart;
use std::collections::HashMap;

use crate::error::AppError;

/// File part of a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lowercased extension including the dot, e.g. `.png`.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{}", ext.to_lowercase()))
    }
}

/// Text fields and files of a multipart request.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::bad_request(format!("Failed to read {}: {}", name, e)))?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::bad_request(format!("Failed to read {}: {}", name, e)))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    /// Trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        self.files
            .remove(name)
            .ok_or_else(|| AppError::bad_request(format!("Missing file field '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        let file = UploadedFile {
            filename: "Chair.Front.JPG".into(),
            content_type: None,
            bytes: vec![],
        };
        assert_eq!(file.extension().as_deref(), Some(".jpg"));
        let bare = UploadedFile {
            filename: "README".into(),
            ..file
        };
        assert!(bare.extension().is_none());
    }

    #[test]
    fn test_text_field_trimmed() {
        let mut form = MultipartForm::default();
        form.fields.insert("name".into(), "  Chair ".into());
        form.fields.insert("blank".into(), "   ".into());
        assert_eq!(form.text("name"), Some("Chair"));
        assert!(form.text("blank").is_none());
        assert!(form.take_file("image").is_err());
    }
}
