//! Local filesystem copy/move handler

use super::types::{FileOperations, HandlerError, HandlerResult, Outcome, TransferMode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File operations against the local filesystem
#[derive(Debug, Default, Clone)]
pub struct LocalFileOperations;

impl LocalFileOperations {
    pub fn new() -> Self {
        Self
    }
}

/// Expand `~` and environment variables, leaving the path untouched when
/// expansion fails
fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(path),
    }
}

/// Regular files directly inside `dir` whose name ends with `extension`
async fn matching_files(dir: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>, HandlerError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| HandlerError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HandlerError::io(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| HandlerError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        let name = entry.file_name();
        let matches = match extension {
            Some(ext) => name.to_string_lossy().ends_with(ext),
            None => true,
        };
        if matches {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Move a file, falling back to copy + remove when rename is not possible
/// (e.g. across filesystems)
async fn move_file(from: &Path, to: &Path) -> Result<(), HandlerError> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    fs::copy(from, to)
        .await
        .map_err(|e| HandlerError::io(from, e))?;
    fs::remove_file(from)
        .await
        .map_err(|e| HandlerError::io(from, e))
}

#[async_trait]
impl FileOperations for LocalFileOperations {
    async fn copy_or_move(
        &self,
        source_dir: &str,
        dest_dir: &str,
        extension: Option<&str>,
        mode: TransferMode,
    ) -> HandlerResult<String> {
        let source = expand(source_dir);
        let dest = expand(dest_dir);

        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Ok(Outcome::failure(format!(
                "source folder not found: {source_dir}"
            )));
        }

        if let Err(e) = fs::create_dir_all(&dest).await {
            return Ok(Outcome::failure(format!(
                "cannot create destination {dest_dir}: {e}"
            )));
        }

        let files = match matching_files(&source, extension).await {
            Ok(files) => files,
            Err(e) => return Ok(Outcome::failure(e.to_string())),
        };

        if files.is_empty() {
            return Ok(Outcome::Success("no files matched the filter".to_string()));
        }

        let mut count = 0;
        for file in &files {
            let Some(name) = file.file_name() else {
                continue;
            };
            let target = dest.join(name);
            let transferred = match mode {
                TransferMode::Copy => fs::copy(file, &target)
                    .await
                    .map(|_| ())
                    .map_err(|e| HandlerError::io(file, e)),
                TransferMode::Move => move_file(file, &target).await,
            };
            if let Err(e) = transferred {
                return Ok(Outcome::failure(e.to_string()));
            }
            count += 1;
        }

        tracing::debug!(count, mode = mode.verb(), dest = %dest.display(), "transferred files");

        Ok(Outcome::Success(format!(
            "{count} file(s) {} to {dest_dir}",
            mode.verb()
        )))
    }
}
