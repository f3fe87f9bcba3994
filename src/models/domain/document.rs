use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

use crate::errors::{AppError, AppResult};

pub const DOCUMENT_MIME_TYPE: &str = "application/pdf";

/// An uploaded document, treated as opaque bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    bytes: Vec<u8>,
    digest: String,
}

impl Document {
    pub fn from_upload(bytes: Vec<u8>, max_bytes: usize) -> AppResult<Self> {
        if bytes.is_empty() {
            return Err(AppError::ValidationError(
                "Uploaded document is empty".to_string(),
            ));
        }

        if bytes.len() > max_bytes {
            return Err(AppError::ValidationError(format!(
                "Uploaded document is {} bytes, the limit is {}",
                bytes.len(),
                max_bytes
            )));
        }

        let digest = format!("{:x}", Sha256::digest(&bytes));
        Ok(Self { bytes, digest })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the content, used to identify the document in logs.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn short_digest(&self) -> &str {
        &self.digest[..12]
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", DOCUMENT_MIME_TYPE, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.bytes.len())
            .field("digest", &self.short_digest())
            .finish()
    }
}

/// Everything one generation call needs.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub document: Arc<Document>,
    /// Question texts the model is asked not to repeat
    pub exclude_questions: Vec<String>,
}

impl GenerationRequest {
    pub fn new(document: Arc<Document>) -> Self {
        Self {
            document,
            exclude_questions: Vec::new(),
        }
    }

    pub fn excluding(mut self, questions: Vec<String>) -> Self {
        self.exclude_questions = questions;
        self
    }
}
