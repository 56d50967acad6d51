//! 存储文件名生成与图片扩展名判断。

use clap::ValueEnum;
use std::path::Path;
use uuid::Uuid;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];
const MAX_EXTENSION_LEN: usize = 10;

/// How stored filenames are derived from the upload time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum NameScheme {
    /// `{millis}{ext}`; two uploads in the same millisecond overwrite each other.
    Timestamp,
    /// `{millis}-{random}{ext}`.
    #[default]
    Unique,
}

/// 根据上传时间与原始文件名生成存储文件名。
pub fn stored_name(scheme: NameScheme, unix_millis: i64, original: Option<&str>) -> String {
    let ext = original.and_then(extension_of).unwrap_or_default();
    match scheme {
        NameScheme::Timestamp => format!("{unix_millis}{ext}"),
        NameScheme::Unique => {
            let suffix = Uuid::new_v4().simple().to_string();
            format!("{unix_millis}-{}{ext}", &suffix[..8])
        }
    }
}

/// 返回带前导点的扩展名；非短字母数字扩展名视为无扩展名。
pub fn extension_of(original: &str) -> Option<String> {
    let ext = Path::new(original).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(format!(".{ext}"))
}

pub fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|image| ext.eq_ignore_ascii_case(image))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_scheme_keeps_original_extension() {
        assert_eq!(
            stored_name(NameScheme::Timestamp, 1_700_000_000_000, Some("cat.png")),
            "1700000000000.png"
        );
        assert_eq!(
            stored_name(NameScheme::Timestamp, 1_700_000_000_000, Some("CAT.JPEG")),
            "1700000000000.JPEG"
        );
        assert_eq!(
            stored_name(NameScheme::Timestamp, 1_700_000_000_000, Some("noext")),
            "1700000000000"
        );
    }

    #[test]
    fn unique_scheme_differs_within_one_millisecond() {
        let first = stored_name(NameScheme::Unique, 1_700_000_000_000, Some("a.gif"));
        let second = stored_name(NameScheme::Unique, 1_700_000_000_000, Some("a.gif"));
        assert_ne!(first, second);
        assert!(first.starts_with("1700000000000-"));
        assert!(first.ends_with(".gif"));
    }

    #[test]
    fn suspicious_extensions_are_dropped() {
        assert_eq!(extension_of("x.p ng"), None);
        assert_eq!(extension_of("x.averyveryverylongext"), None);
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
    }

    #[test]
    fn image_names_match_case_insensitively() {
        assert!(is_image_name("1.png"));
        assert!(is_image_name("1.JPG"));
        assert!(is_image_name("1-abcd.Gif"));
        assert!(is_image_name("1.jpeg"));
        assert!(!is_image_name("1.txt"));
        assert!(!is_image_name("1"));
    }
}
