//! 路由表组装。

use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{delete, get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::MULTIPART_OVERHEAD;
use crate::storage::{LocalStore, MemeStore};
use crate::upload::UploadConfig;
use crate::{files, http, upload};

/// 构建完整的应用路由（不含请求追踪层）。
pub fn build_router(store: Arc<LocalStore>, upload: Arc<UploadConfig>, cors: CorsLayer) -> Router {
    let body_limit = if upload.max_upload_size == 0 {
        DefaultBodyLimit::disable()
    } else {
        DefaultBodyLimit::max(
            usize::try_from(upload.max_upload_size.saturating_add(MULTIPART_OVERHEAD))
                .unwrap_or(usize::MAX),
        )
    };

    let static_routes = Router::new()
        .nest_service("/uploads", ServeDir::new(store.root_path()))
        .layer(middleware::from_fn_with_state(
            store.clone(),
            files::guard_static_mount,
        ));

    let file_routes = Router::new()
        .route("/file/{filename}", get(files::fetch_file))
        .merge(static_routes)
        .layer(middleware::from_fn(http::add_cross_origin_headers));

    let meme_store: Arc<dyn MemeStore> = store;

    Router::new()
        .route("/", get(files::index))
        .route("/upload", post(upload::upload_meme).layer(body_limit))
        .route("/memes", get(files::list_memes))
        .route("/delete/{filename}", delete(files::delete_file))
        .merge(file_routes)
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(Extension(meme_store))
        .layer(Extension(upload))
        .layer(cors)
}
