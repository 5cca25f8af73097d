//! Multipart upload extraction shared by every import endpoint.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::errors::AppError;
use crate::ingest::reader::UploadBatch;

/// The `file` part of an upload plus any plain form fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    /// A form field, trimmed; blank values count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parse the uploaded file into a table with filename metadata.
    /// A file with headers but no data rows is rejected.
    pub fn batch(&self) -> Result<UploadBatch, AppError> {
        let batch = UploadBatch::parse(&self.filename, &self.bytes)?;
        if batch.table.is_empty() {
            return Err(AppError::Validation(format!(
                "'{}' contains no data rows",
                self.filename
            )));
        }
        Ok(batch)
    }
}

pub async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    let mut has_file = false;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            form.filename = field.file_name().unwrap_or_default().trim().to_string();
            form.bytes = field.bytes().await?.to_vec();
            has_file = true;
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }

    if !has_file {
        return Err(AppError::BadRequest(
            "No file part in the request".to_string(),
        ));
    }
    if form.filename.is_empty() {
        return Err(AppError::BadRequest("No file selected".to_string()));
    }

    tracing::debug!(
        "Received upload '{}' ({} bytes, {} form fields)",
        form.filename,
        form.bytes.len(),
        form.fields.len()
    );

    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_absent() {
        let mut form = UploadForm::default();
        form.fields.insert("level".into(), " FIE3 ".into());
        form.fields.insert("semester".into(), "  ".into());

        assert_eq!(form.field("level"), Some("FIE3"));
        assert_eq!(form.field("semester"), None);
        assert_eq!(form.field("missing"), None);
    }

    #[test]
    fn test_header_only_file_is_rejected() {
        let form = UploadForm {
            filename: "arion.csv".into(),
            bytes: b"activite,groupe,code_y,niveau,date,duree\n".to_vec(),
            ..Default::default()
        };
        match form.batch() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("no data rows")),
            other => panic!("expected a validation error, got {:?}", other.map(|b| b.filename)),
        }

        let form = UploadForm {
            bytes: b"activite,groupe\nSoudure,G1\n".to_vec(),
            ..form
        };
        assert_eq!(form.batch().unwrap().table.len(), 1);
    }
}
