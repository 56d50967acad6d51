//! 上传目录的存储抽象与本地目录实现。

use async_trait::async_trait;
use axum::body::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt, ErrorKind};

use crate::atomic::AtomicFile;

/// Flat key/value view of the stored memes. Handlers only see this trait.
#[async_trait]
pub trait MemeStore: Send + Sync {
    /// 返回全部已存储文件名（目录顺序）。
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// 边接收边写入文件，同名时覆盖；超过 `max_size`（0 为不限制）时放弃写入。
    /// 返回写入的字节数。
    async fn put(
        &self,
        name: &str,
        data: ByteStream<'_>,
        max_size: u64,
    ) -> Result<u64, StorageError>;

    /// 打开文件用于流式读取。
    async fn open(&self, name: &str) -> Result<StoredFile, StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

/// Upload body as it arrives; source errors are already mapped to [`StorageError`].
pub type ByteStream<'a> = BoxStream<'a, Result<Bytes, StorageError>>;

pub struct StoredFile {
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

#[derive(Debug)]
pub enum StorageError {
    InvalidName,
    NotFound,
    TooLarge(u64),
    /// 上传数据源本身读取失败（如 multipart 格式错误）。
    Source(String),
    Io(io::Error),
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::Io(err),
        }
    }
}

/// 校验单段文件名：拒绝空名、路径分隔符、父目录与隐藏文件。
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.split(['/', '\\']).any(|segment| segment == "..")
    {
        return Err(StorageError::InvalidName);
    }
    Ok(())
}

/// Upload directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// 解析文件名并拒绝符号链接，避免读写逃出上传目录。
    async fn resolve_checked(
        &self,
        name: &str,
        allow_missing: bool,
    ) -> Result<PathBuf, StorageError> {
        let target = self.resolve(name)?;
        match fs::symlink_metadata(&target).await {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() || metadata.is_dir() {
                    return Err(StorageError::InvalidName);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound && allow_missing => {}
            Err(err) => return Err(err.into()),
        }
        Ok(target)
    }

    /// 判断文件名是否可通过静态挂载直接访问：必须是已存在、非隐藏、非符号链接的普通文件。
    pub async fn check_servable(&self, name: &str) -> Result<(), StorageError> {
        self.resolve_checked(name, false).await.map(|_| ())
    }
}

#[async_trait]
impl MemeStore for LocalStore {
    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = fs::read_dir(&self.root).await.map_err(StorageError::Io)?;
        let mut names = Vec::new();

        while let Some(entry) = dir.next_entry().await.map_err(StorageError::Io)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            let file_type = entry.file_type().await.map_err(StorageError::Io)?;
            if !file_type.is_file() {
                continue;
            }
            names.push(name);
        }

        Ok(names)
    }

    async fn put(
        &self,
        name: &str,
        mut data: ByteStream<'_>,
        max_size: u64,
    ) -> Result<u64, StorageError> {
        let target = self.resolve_checked(name, true).await?;
        let mut atomic = AtomicFile::new(&target).await.map_err(StorageError::Io)?;
        let write_result: Result<u64, StorageError> = async {
            let mut total_written: u64 = 0;
            while let Some(chunk) = data.next().await {
                let chunk = chunk?;
                if chunk.is_empty() {
                    continue;
                }
                total_written += chunk.len() as u64;
                if max_size > 0 && total_written > max_size {
                    return Err(StorageError::TooLarge(max_size));
                }
                atomic
                    .file_mut()
                    .write_all(&chunk)
                    .await
                    .map_err(StorageError::Io)?;
            }
            Ok(total_written)
        }
        .await;
        let total_written = match write_result {
            Ok(value) => value,
            Err(err) => {
                atomic.cleanup().await;
                return Err(err);
            }
        };
        atomic.finalize().await.map_err(StorageError::Io)?;
        Ok(total_written)
    }

    async fn open(&self, name: &str) -> Result<StoredFile, StorageError> {
        let target = self.resolve_checked(name, false).await?;
        let file = File::open(&target).await?;
        let metadata = file.metadata().await?;
        Ok(StoredFile {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            reader: Box::new(file),
        })
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let target = self.resolve_checked(name, false).await?;
        fs::remove_file(target).await?;
        Ok(())
    }
}
