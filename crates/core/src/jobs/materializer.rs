//! Publishes finished artifacts into the public output store.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use super::error::MaterializeError;
use super::types::JobId;

/// Copies completed working files into the output directory.
///
/// Each job publishes into its own `<output_dir>/<job_id>/` directory, so two
/// uploads with the same name never overwrite each other. The working file is
/// left in place so it can still be streamed back to the requester. The copy
/// lands under a temporary name first and is renamed into place, so the
/// static file server never serves a half-written artifact.
#[derive(Debug, Clone)]
pub struct OutputMaterializer {
    output_dir: PathBuf,
}

impl OutputMaterializer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding everything published for `job_id`.
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.output_dir.join(job_id.to_string())
    }

    /// Copies `working_path` to `<output_dir>/<job_id>/<filename>` and returns the destination.
    pub async fn publish(
        &self,
        job_id: &JobId,
        working_path: &Path,
        filename: &str,
    ) -> Result<PathBuf, MaterializeError> {
        // Only the final component is honoured
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.starts_with('.'))
            .ok_or_else(|| MaterializeError::InvalidFileName {
                name: filename.to_string(),
            })?;

        if fs::metadata(working_path).await.is_err() {
            return Err(MaterializeError::SourceNotFound {
                path: working_path.to_path_buf(),
            });
        }

        let job_dir = self.job_dir(job_id);
        fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| MaterializeError::DirectoryCreationFailed {
                path: job_dir.clone(),
                source: e,
            })?;

        let destination = job_dir.join(name);
        let partial = job_dir.join(format!(".{}.{}.partial", name, Uuid::new_v4().simple()));

        let copied = fs::copy(working_path, &partial).await.map_err(|e| {
            MaterializeError::CopyFailed {
                from: working_path.to_path_buf(),
                to: destination.clone(),
                source: e,
            }
        });

        if let Err(e) = copied {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&partial, &destination).await {
            let _ = fs::remove_file(&partial).await;
            return Err(MaterializeError::CopyFailed {
                from: working_path.to_path_buf(),
                to: destination,
                source: e,
            });
        }

        info!(job_id = %job_id, path = %destination.display(), "File copied to output folder");
        Ok(destination)
    }
}
