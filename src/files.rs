//! 文件列表、读取与删除处理器。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path, State};
use axum::middleware::Next;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use httpdate::fmt_http_date;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::{ApiError, MessageBody};
use crate::etag::{is_not_modified, weak_etag};
use crate::http::{fetch_url, public_base};
use crate::naming::is_image_name;
use crate::storage::{LocalStore, MemeStore, StorageError};
use crate::upload::UploadConfig;

/// 存活检查。
pub async fn index() -> &'static str {
    "meme-depot is running"
}

/// 列出全部图片的访问 URL（目录顺序）。
pub async fn list_memes(
    headers: HeaderMap,
    Extension(store): Extension<Arc<dyn MemeStore>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
) -> Result<JsonResponse<Vec<String>>, ApiError> {
    let names = store.list().await?;
    let base = public_base(&headers, upload.public_url.as_deref());
    let urls = names
        .iter()
        .filter(|name| is_image_name(name))
        .map(|name| fetch_url(&base, name))
        .collect::<Vec<_>>();
    info!(count = urls.len(), "list memes");
    Ok(JsonResponse(urls))
}

/// 流式返回文件内容，Content-Type 依据扩展名推断。
pub async fn fetch_file(
    Path(filename): Path<String>,
    request_headers: HeaderMap,
    Extension(store): Extension<Arc<dyn MemeStore>>,
) -> Result<Response, ApiError> {
    let stored = store.open(&filename).await.map_err(|err| match err {
        StorageError::NotFound => ApiError::FileNotFound,
        other => other.into(),
    })?;

    let etag = weak_etag(stored.size, stored.modified);
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::ETAG,
        HeaderValue::from_str(&etag).map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
    );
    if let Some(modified) = stored.modified {
        response_headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&fmt_http_date(modified))
                .map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
        );
    }

    if is_not_modified(&request_headers, &etag) {
        debug!(filename, "fetch not modified");
        return Ok((StatusCode::NOT_MODIFIED, response_headers).into_response());
    }

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("无效的 MIME 类型".into()))?,
    );
    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stored.size));

    debug!(filename, size = stored.size, "fetch file");
    let stream = ReaderStream::new(stored.reader);
    Ok((
        StatusCode::OK,
        response_headers,
        AxumBody::from_stream(stream),
    )
        .into_response())
}

/// 按文件名删除，不做归属校验。
pub async fn delete_file(
    Path(filename): Path<String>,
    Extension(store): Extension<Arc<dyn MemeStore>>,
) -> Result<JsonResponse<MessageBody>, ApiError> {
    store.delete(&filename).await?;
    info!(filename, "delete file");
    Ok(JsonResponse(MessageBody {
        message: format!("{filename} deleted"),
    }))
}

/// 静态挂载前置检查：隐藏文件（含上传中的临时文件）、符号链接、目录与非法名一律 404。
pub async fn guard_static_mount(
    State(store): State<Arc<LocalStore>>,
    request: Request<AxumBody>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let raw = path
        .strip_prefix("/uploads/")
        .or_else(|| path.strip_prefix('/'))
        .unwrap_or(path);
    let servable = match urlencoding::decode(raw) {
        Ok(name) => store.check_servable(&name).await,
        Err(_) => Err(StorageError::InvalidName),
    };
    if let Err(err) = servable {
        debug!(path, error = ?err, "static mount request refused");
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(request).await
}
