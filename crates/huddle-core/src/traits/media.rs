// SPDX-FileCopyrightText: 2026 Huddle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-upload collaborator trait for inline image messages.

use async_trait::async_trait;

use crate::error::HuddleError;

/// Upload bytes and return a public URL.
///
/// The chat core treats the returned URL as an opaque message body; storage
/// mechanics are entirely the collaborator's concern.
#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, HuddleError>;
}
