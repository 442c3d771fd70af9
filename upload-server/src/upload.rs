use crate::config::AppState;
use crate::error::AppError;
use crate::storage::{Category, StoredFile};
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderMap},
    Json,
};
use chrono::Utc;
use serde::{
    ser::{SerializeMap, Serializer},
    Serialize,
};
use tokio::{fs::File, io::AsyncWriteExt};
use url::Url;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub field: &'static str,
    pub max_files: usize,
    pub max_file_size: u64,
}

pub const FILES_LIMITS: UploadLimits = UploadLimits {
    field: "files",
    max_files: 150,
    max_file_size: 50 * MIB,
};

pub const VIDEOS_LIMITS: UploadLimits = UploadLimits {
    field: "videos",
    max_files: 25,
    max_file_size: 100 * MIB,
};

impl UploadLimits {
    /// Whole-body cap: every allowed part at full size plus room for boundaries and headers.
    pub fn max_body_bytes(&self) -> usize {
        let parts = (self.max_file_size as usize).saturating_mul(self.max_files);
        parts.saturating_add(MIB as usize)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub name: String,
    pub size: String,
    pub download_url: String,
}

#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub success: bool,
    pub msg: String,
    pub category: Category,
    pub items: Vec<FileSummary>,
}

// The list key follows the category, so both endpoints share one shape.
impl Serialize for UploadResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("success", &self.success)?;
        map.serialize_entry("msg", &self.msg)?;
        map.serialize_entry(self.category.as_str(), &self.items)?;
        map.end()
    }
}

/// Megabytes with two decimals, halves rounded up.
pub fn format_size_mb(bytes: u64) -> String {
    let mib = MIB as u128;
    let hundredths = (bytes as u128 * 100 + mib / 2) / mib;
    format!("{}.{:02}MB", hundredths / 100, hundredths % 100)
}

pub async fn upload_files(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    handle_upload(&state, &headers, multipart?, FILES_LIMITS).await
}

pub async fn upload_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    handle_upload(&state, &headers, multipart?, VIDEOS_LIMITS).await
}

async fn handle_upload(
    state: &AppState,
    headers: &HeaderMap,
    multipart: Multipart,
    limits: UploadLimits,
) -> Result<Json<UploadResponse>, AppError> {
    let stored = receive_parts(state, multipart, limits).await?;
    let base = base_url(state, headers);

    let items = stored
        .iter()
        .map(|file| {
            Ok(FileSummary {
                name: file.original_name.clone(),
                size: format_size_mb(file.size),
                download_url: download_url(&base, file.category, &file.stored_name)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let category = Category::from_field(limits.field);
    tracing::info!(category = category.as_str(), count = items.len(), "upload complete");

    Ok(Json(UploadResponse {
        success: true,
        msg: format!("Uploaded {} {}", items.len(), category.as_str()),
        category,
        items,
    }))
}

async fn receive_parts(
    state: &AppState,
    mut multipart: Multipart,
    limits: UploadLimits,
) -> Result<Vec<StoredFile>, AppError> {
    let mut stored = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        // Plain form fields carry no filename and are not uploads.
        let Some(original_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            continue;
        };

        let field_name = field.name().unwrap_or_default().to_owned();
        if field_name != limits.field {
            return Err(AppError::UnexpectedField(field_name));
        }
        if stored.len() >= limits.max_files {
            return Err(AppError::TooManyFiles {
                limit: limits.max_files,
            });
        }

        let pending = state
            .storage
            .create_file(&field_name, &original_name, Utc::now().timestamp_millis())
            .await?;
        let mut file = pending.file;

        let size = match write_field(&mut field, &mut file, limits).await {
            Ok(size) => size,
            Err(e) => {
                drop(file);
                state.storage.discard(&pending.path).await;
                return Err(e);
            }
        };

        let stored_file = StoredFile {
            original_name,
            stored_name: pending.stored_name,
            size,
            path: pending.path,
            category: pending.category,
        };
        tracing::debug!(
            original = %stored_file.original_name,
            path = %stored_file.path.display(),
            size,
            "stored part"
        );
        stored.push(stored_file);
    }

    Ok(stored)
}

async fn write_field(
    field: &mut Field<'_>,
    file: &mut File,
    limits: UploadLimits,
) -> Result<u64, AppError> {
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size > limits.max_file_size {
            return Err(AppError::FileTooLarge {
                field: limits.field.to_string(),
                limit: limits.max_file_size,
            });
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::storage("Failed to write file", e))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::storage("Failed to flush file", e))?;
    Ok(size)
}

fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.public_base_url {
        return base.clone();
    }
    headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .map(|host| format!("http://{}", host))
        .filter(|url| Url::parse(url).is_ok())
        .unwrap_or_else(|| format!("http://localhost:{}", state.port))
}

pub fn download_url(base: &str, category: Category, stored_name: &str) -> Result<String, AppError> {
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Internal(format!("Invalid base url {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Internal(format!("Base url {} cannot carry a path", base)))?
        .pop_if_empty()
        .extend(["uploads", category.as_str(), stored_name]);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_megabytes_with_two_decimals() {
        assert_eq!(format_size_mb(0), "0.00MB");
        assert_eq!(format_size_mb(1024 * 1024), "1.00MB");
        assert_eq!(format_size_mb(50 * 1024 * 1024), "50.00MB");
        assert_eq!(format_size_mb(1_572_864), "1.50MB");
        assert_eq!(format_size_mb(10_000), "0.01MB");
        assert_eq!(format_size_mb(5_000), "0.00MB");
    }

    #[test]
    fn size_ties_round_up() {
        assert_eq!(format_size_mb(128 * 1024), "0.13MB");
        assert_eq!(format_size_mb(640 * 1024), "0.63MB");
        assert_eq!(format_size_mb(1024 * 1024 + 128 * 1024), "1.13MB");
    }

    #[test]
    fn download_url_encodes_stored_name() {
        let url = download_url("http://localhost:3000", Category::Videos, "17-my clip.mp4").unwrap();
        assert_eq!(url, "http://localhost:3000/uploads/videos/17-my%20clip.mp4");

        let url = download_url("https://cdn.example.com/base", Category::Files, "1-a.txt").unwrap();
        assert_eq!(url, "https://cdn.example.com/base/uploads/files/1-a.txt");
    }

    #[test]
    fn body_cap_covers_every_part() {
        assert!(FILES_LIMITS.max_body_bytes() as u64 > 150 * FILES_LIMITS.max_file_size);
        assert!(VIDEOS_LIMITS.max_body_bytes() as u64 > 25 * VIDEOS_LIMITS.max_file_size);
    }

    #[test]
    fn response_list_key_follows_category() {
        let response = UploadResponse {
            success: true,
            msg: "Uploaded 1 videos".into(),
            category: Category::Videos,
            items: vec![FileSummary {
                name: "v.mp4".into(),
                size: "0.00MB".into(),
                download_url: "http://localhost:3000/uploads/videos/1-v.mp4".into(),
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["videos"][0]["downloadUrl"], "http://localhost:3000/uploads/videos/1-v.mp4");
        assert!(json.get("files").is_none());
    }
}
