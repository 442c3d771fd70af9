use crate::error::AppError;
use lazy_regex::regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};

/// Storage bucket a part lands in, derived only from its multipart field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Files,
    Videos,
}

impl Category {
    pub fn from_field(field: &str) -> Self {
        if field == "videos" {
            Self::Videos
        } else {
            Self::Files
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Videos => "videos",
        }
    }
}

/// A part that has been fully written to disk.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub original_name: String,
    pub stored_name: String,
    pub size: u64,
    pub path: PathBuf,
    pub category: Category,
}

/// A freshly created, still empty destination file.
pub struct PendingFile {
    pub file: File,
    pub stored_name: String,
    pub path: PathBuf,
    pub category: Category,
}

/// Replaces every `/ \ : * ? " < > |` with `-`; everything else is kept as is.
pub fn sanitize_file_name(original: &str) -> String {
    regex!(r#"[/\\:*?"<>|]"#)
        .replace_all(original, "-")
        .into_owned()
}

pub fn generate_name(original: &str, timestamp_millis: i64) -> String {
    format!("{}-{}", timestamp_millis, sanitize_file_name(original))
}

#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::storage("Failed to create storage root", e)
                .with_context(self.root.display().to_string())
        })
    }

    pub async fn resolve_directory(&self, field: &str) -> Result<PathBuf, AppError> {
        let dir = self.root.join(Category::from_field(field).as_str());
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::storage("Failed to create upload directory", e)
                .with_context(dir.display().to_string())
        })?;
        Ok(dir)
    }

    /// Creates a new file for `original`, never overwriting an existing one.
    ///
    /// If `{millis}-{name}` is taken (two identically named parts in the same
    /// millisecond), the timestamp is bumped until a free name turns up.
    pub async fn create_file(
        &self,
        field: &str,
        original: &str,
        timestamp_millis: i64,
    ) -> Result<PendingFile, AppError> {
        let category = Category::from_field(field);
        let dir = self.resolve_directory(field).await?;

        let mut stamp = timestamp_millis;
        loop {
            let stored_name = generate_name(original, stamp);
            let path = dir.join(&stored_name);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(PendingFile {
                        file,
                        stored_name,
                        path,
                        category,
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => {
                    return Err(AppError::storage("Failed to create file", e)
                        .with_context(path.display().to_string()))
                }
            }
        }
    }

    /// Best effort removal of a partially written part.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
        }
    }
}
