//! ETag 计算与条件请求校验。

use axum::http::{HeaderMap, header};
use std::time::{SystemTime, UNIX_EPOCH};

/// 根据文件大小与修改时间生成弱 ETag。
pub fn weak_etag(size: u64, modified: Option<SystemTime>) -> String {
    if let Some(modified) = modified
        && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
    {
        return format!(
            "W/\"{}-{}-{}\"",
            size,
            duration.as_secs(),
            duration.subsec_nanos()
        );
    }
    format!("W/\"{}\"", size)
}

/// 判断 If-None-Match 是否命中当前 ETag。
pub fn is_not_modified(headers: &HeaderMap, current_etag: &str) -> bool {
    let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    value
        .split(',')
        .map(|item| item.trim())
        .any(|item| item == "*" || item == current_etag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    #[test]
    fn etag_changes_with_modification_time() {
        let earlier = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let later = earlier + Duration::from_millis(1);
        assert_ne!(weak_etag(10, Some(earlier)), weak_etag(10, Some(later)));
        assert_eq!(weak_etag(10, None), "W/\"10\"");
    }

    #[test]
    fn if_none_match_list_is_checked() {
        let mut headers = HeaderMap::new();
        assert!(!is_not_modified(&headers, "W/\"1\""));
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("W/\"0\", W/\"1\""),
        );
        assert!(is_not_modified(&headers, "W/\"1\""));
        assert!(!is_not_modified(&headers, "W/\"2\""));
    }
}
