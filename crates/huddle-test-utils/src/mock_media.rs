// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`MediaStore`] recording uploads and minting fake public URLs.

use tokio::sync::Mutex;

use async_trait::async_trait;

use huddle_core::{HuddleError, MediaStore};

/// One recorded upload: bucket, path, and payload size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub bucket: String,
    pub path: String,
    pub size: usize,
}

#[derive(Default)]
pub struct MockMedia {
    uploads: Mutex<Vec<RecordedUpload>>,
    fail_next: Mutex<Option<String>>,
}

impl MockMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().await.clone()
    }

    pub async fn fail_next(&self, message: &str) {
        *self.fail_next.lock().await = Some(message.to_string());
    }
}

#[async_trait]
impl MediaStore for MockMedia {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, HuddleError> {
        if let Some(message) = self.fail_next.lock().await.take() {
            return Err(HuddleError::Media {
                message,
                source: None,
            });
        }
        self.uploads.lock().await.push(RecordedUpload {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: bytes.len(),
        });
        Ok(format!("https://cdn.example.test/{bucket}/{path}"))
    }
}
