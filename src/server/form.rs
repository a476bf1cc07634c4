//! Reading multipart conversion requests.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::config::Tool;
use crate::error::{Error, Result};
use crate::fs::{Storage, StoredUpload};

/// What to do with a file part the tool does not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unaccepted {
    /// Fail the whole request.
    Reject,
    /// Record it and carry on.
    Skip,
}

/// A parsed conversion request: stored uploads plus the text fields.
#[derive(Debug, Default)]
pub struct ToolForm {
    pub uploads: Vec<StoredUpload>,
    /// Files left out under [`Unaccepted::Skip`], with the reason.
    pub skipped: Vec<(String, String)>,
    fields: HashMap<String, String>,
}

impl ToolForm {
    /// Read every part of `multipart`, storing file parts in `tool`'s upload directory.
    ///
    /// Unaccepted extensions are caught before a part is written. When the
    /// request fails, files already stored for it are removed again.
    pub async fn read(
        storage: &Storage,
        tool: Tool,
        multipart: Multipart,
        unaccepted: Unaccepted,
    ) -> Result<Self> {
        let mut form = ToolForm::default();
        match form.read_parts(storage, tool, multipart, unaccepted).await {
            Ok(()) => Ok(form),
            Err(e) => {
                form.discard_uploads().await;
                Err(e)
            }
        }
    }

    async fn read_parts(
        &mut self,
        storage: &Storage,
        tool: Tool,
        mut multipart: Multipart,
        unaccepted: Unaccepted,
    ) -> Result<()> {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let file_name = match field.file_name() {
                Some(file_name) => file_name.to_string(),
                None => {
                    let value = field.text().await?;
                    self.fields.insert(name, value);
                    continue;
                }
            };

            // Browsers send an empty part when no file was picked.
            if file_name.is_empty() {
                continue;
            }

            if !tool.accepts(&file_name) {
                self.refuse(
                    file_name,
                    Error::UnsupportedFile(tool.rejection_message()),
                    unaccepted,
                )?;
                continue;
            }

            let stored = match storage.save_upload(tool.as_str(), &file_name, field).await {
                Ok(stored) => stored,
                Err(e @ Error::InvalidFilename(_)) => {
                    self.refuse(file_name, e, unaccepted)?;
                    continue;
                }
                Err(e) => return Err(e),
            };
            if stored.size == 0 {
                let _ = tokio::fs::remove_file(&stored.path).await;
                self.refuse(
                    file_name,
                    Error::BadRequest("Empty file".into()),
                    unaccepted,
                )?;
                continue;
            }

            tracing::debug!(tool = %tool, file = %file_name, bytes = stored.size, "upload received");
            self.uploads.push(stored);
        }

        Ok(())
    }

    /// Fail with `reason` or record it against `file_name`, per `unaccepted`.
    fn refuse(&mut self, file_name: String, reason: Error, unaccepted: Unaccepted) -> Result<()> {
        match unaccepted {
            Unaccepted::Reject => Err(reason),
            Unaccepted::Skip => {
                let message = match reason {
                    Error::UnsupportedFile(m) | Error::BadRequest(m) => m,
                    other => other.to_string(),
                };
                self.skipped.push((file_name, message));
                Ok(())
            }
        }
    }

    async fn discard_uploads(&mut self) {
        for upload in self.uploads.drain(..) {
            if let Err(e) = tokio::fs::remove_file(&upload.path).await {
                tracing::warn!(path = %upload.path.display(), error = %e, "could not remove upload");
            }
        }
    }

    /// Trimmed value of a text field; blank counts as missing.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// First upload, or a 400 when there is none.
    pub fn first_upload(&self) -> Result<&StoredUpload> {
        self.uploads
            .first()
            .ok_or_else(|| Error::BadRequest("No file provided".into()))
    }

    #[cfg(test)]
    pub(crate) fn with_fields<const N: usize>(fields: [(&str, &str); N]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}
