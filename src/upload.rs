//! 单文件 multipart 上传处理器与临时文件清理。

use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::extract::Extension;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json as JsonResponse;
use chrono::Utc;
use futures_util::stream::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::atomic::is_temp_name;
use crate::error::ApiError;
use crate::http::{fetch_url, public_base};
use crate::naming::{NameScheme, stored_name};
use crate::storage::{LocalStore, MemeStore, StorageError};

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug)]
pub struct UploadConfig {
    pub max_upload_size: u64,
    pub name_scheme: NameScheme,
    pub public_url: Option<String>,
    pub temp_ttl: Duration,
    /// Millisecond clock used for stored filenames.
    pub clock: fn() -> i64,
}

pub fn wall_clock_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    message: &'static str,
    url: String,
}

struct StoredUpload {
    name: String,
    size: u64,
    original_name: Option<String>,
}

/// 接收单个文件并边读边写入上传目录，返回访问 URL。
pub async fn upload_meme(
    headers: HeaderMap,
    Extension(store): Extension<Arc<dyn MemeStore>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let mut multipart =
        multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut stored: Option<StoredUpload> = None;
    if let Err(err) = receive_file(&mut multipart, store.as_ref(), &upload, &mut stored).await {
        if let Some(partial) = stored {
            discard_upload(store.as_ref(), &partial.name).await;
        }
        return Err(err);
    }
    let stored = stored.ok_or(ApiError::MissingFile)?;

    let url = fetch_url(
        &public_base(&headers, upload.public_url.as_deref()),
        &stored.name,
    );
    info!(
        stored = %stored.name,
        size = stored.size,
        original = stored.original_name.as_deref().unwrap_or(""),
        "meme uploaded"
    );
    Ok(JsonResponse(UploadResponse {
        message: "file uploaded",
        url,
    }))
}

/// 遍历表单字段，将唯一的文件字段流式写入存储；其余字段忽略。
async fn receive_file(
    multipart: &mut Multipart,
    store: &dyn MemeStore,
    upload: &UploadConfig,
    stored: &mut Option<StoredUpload>,
) -> Result<(), ApiError> {
    let max_size = upload.max_upload_size;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, max_size))?
    {
        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            debug!(field = field.name().unwrap_or(""), "ignoring form field");
            continue;
        }
        if stored.is_some() {
            return Err(ApiError::BadRequest(
                "only one file may be uploaded per request".into(),
            ));
        }

        let original_name = field.file_name().map(str::to_string);
        let name = stored_name(
            upload.name_scheme,
            (upload.clock)(),
            original_name.as_deref(),
        );
        let data = field
            .map(move |chunk| chunk.map_err(|err| multipart_storage_error(err, max_size)))
            .boxed();
        let size = store
            .put(&name, data, max_size)
            .await
            .map_err(|err| match err {
                StorageError::Io(err) => {
                    ApiError::Internal(format!("failed to store {name}: {err}"))
                }
                other => other.into(),
            })?;
        *stored = Some(StoredUpload {
            name,
            size,
            original_name,
        });
    }

    Ok(())
}

/// 请求被拒绝时删除已写入的文件。
async fn discard_upload(store: &dyn MemeStore, name: &str) {
    if let Err(err) = store.delete(name).await {
        warn!(file = name, error = ?err, "failed to discard rejected upload");
    }
}

fn multipart_storage_error(err: MultipartError, max_size: u64) -> StorageError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return StorageError::TooLarge(max_size);
    }
    StorageError::Source(err.body_text())
}

fn multipart_error(err: MultipartError, max_size: u64) -> ApiError {
    multipart_storage_error(err, max_size).into()
}

/// 清理中断写入遗留的过期临时文件，返回删除数量。
pub async fn cleanup_upload_temp(
    store: &LocalStore,
    upload: &UploadConfig,
) -> Result<usize, std::io::Error> {
    if upload.temp_ttl.is_zero() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut removed = 0;
    let mut dir = fs::read_dir(store.root_path()).await?;
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        if !is_temp_name(&name.to_string_lossy()) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let age = match metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
        {
            Some(value) => value,
            None => continue,
        };
        if age >= upload.temp_ttl {
            let path = entry.path();
            if let Err(err) = fs::remove_file(&path).await {
                warn!(path = ?path, error = %err, "failed to remove stale temp file");
            } else {
                info!(path = ?path, "removed stale temp file");
                removed += 1;
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn make_store() -> (tempfile::TempDir, LocalStore) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        std::fs::create_dir_all(&root).expect("create upload dir");
        (temp, LocalStore::new(root))
    }

    fn make_upload_config(temp_ttl: Duration) -> UploadConfig {
        UploadConfig {
            max_upload_size: 1024,
            name_scheme: NameScheme::Unique,
            public_url: None,
            temp_ttl,
            clock: wall_clock_millis,
        }
    }

    fn backdate(path: &Path, age: Duration) {
        let file = std::fs::File::options()
            .write(true)
            .open(path)
            .expect("open for backdate");
        file.set_modified(SystemTime::now() - age)
            .expect("set modified");
    }

    #[tokio::test]
    async fn cleanup_removes_only_stale_temp_files() {
        let (_temp, store) = make_store();
        let root = store.root_path().to_path_buf();
        let stale = root.join(".1.png.tmp.aaaa");
        let fresh = root.join(".2.png.tmp.bbbb");
        let meme = root.join("3.png");
        for path in [&stale, &fresh, &meme] {
            std::fs::write(path, b"x").expect("write");
        }
        backdate(&stale, Duration::from_secs(7200));
        backdate(&meme, Duration::from_secs(7200));

        let removed = cleanup_upload_temp(&store, &make_upload_config(Duration::from_secs(3600)))
            .await
            .expect("cleanup");

        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(fresh.exists());
        assert!(meme.exists());
    }

    #[tokio::test]
    async fn cleanup_disabled_with_zero_ttl() {
        let (_temp, store) = make_store();
        let stale = store.root_path().join(".1.png.tmp.aaaa");
        std::fs::write(&stale, b"x").expect("write");
        backdate(&stale, Duration::from_secs(7200));

        let removed = cleanup_upload_temp(&store, &make_upload_config(Duration::ZERO))
            .await
            .expect("cleanup");

        assert_eq!(removed, 0);
        assert!(stale.exists());
    }
}
