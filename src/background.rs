//! 上传目录临时文件清理的后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TEMP_CLEAN_INTERVAL_SECS;
use crate::storage::LocalStore;
use crate::upload::{UploadConfig, cleanup_upload_temp};

/// 启动后台任务（过期临时文件清理）。
pub fn spawn_background_tasks(store: Arc<LocalStore>, upload: Arc<UploadConfig>) {
    if upload.temp_ttl.is_zero() {
        debug!("temp file cleanup disabled");
        return;
    }

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TEMP_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            if let Err(err) = cleanup_upload_temp(&store, &upload).await {
                warn!(error = %err, "temp file cleanup failed");
            }
        }
    });
}
