use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::object::{UploadBody, UploadedFile};
use crate::Result;

/// Filesystem side of an upload: naming, validation and byte transfer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// A present file is valid when it carries at least one byte.
    fn is_valid_file(&self, file: &UploadedFile) -> bool;

    /// `{yyyyMMddHHmm}_{uuid}{ext}`, timestamp in UTC.
    fn create_file_name(&self, file: &UploadedFile) -> String;

    fn create_file_path(&self, file: &UploadedFile) -> PathBuf;

    fn file_directory(&self) -> PathBuf;

    /// Puts every byte of `file` at `path`, replacing whatever was there.
    async fn save_file_to_path(&self, file: &UploadedFile, path: &Path) -> std::io::Result<()>;

    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct DiskStore {
    file_directory: PathBuf,
}

impl DiskStore {
    pub fn new(file_directory: impl Into<PathBuf>) -> Self {
        Self {
            file_directory: file_directory.into(),
        }
    }

    /// Builds the store and makes sure its directory exists.
    pub async fn open(file_directory: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(file_directory);
        fs::create_dir_all(&store.file_directory).await?;
        tracing::info!("File store ready at {:?}", store.file_directory);
        Ok(store)
    }
}

#[async_trait]
impl FileStore for DiskStore {
    fn is_valid_file(&self, file: &UploadedFile) -> bool {
        !file.is_empty()
    }

    fn create_file_name(&self, file: &UploadedFile) -> String {
        format!(
            "{}_{}{}",
            Utc::now().format("%Y%m%d%H%M"),
            Uuid::new_v4(),
            file.extension()
        )
    }

    fn create_file_path(&self, file: &UploadedFile) -> PathBuf {
        self.file_directory.join(self.create_file_name(file))
    }

    fn file_directory(&self) -> PathBuf {
        self.file_directory.clone()
    }

    async fn save_file_to_path(&self, file: &UploadedFile, path: &Path) -> std::io::Result<()> {
        match &file.body {
            UploadBody::Memory(data) => {
                let mut out = fs::File::create(path).await?;
                out.write_all(data).await?;
                out.flush().await?;
                Ok(())
            }
            UploadBody::Spooled { path: spool, .. } => {
                let spool: &Path = spool;
                fs::rename(spool, path).await
            }
        }
    }

    async fn read_file(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        fs::read(path).await
    }
}

/// Streams an upload into a temporary file. Created inside the file directory so that
/// saving it is a rename.
pub struct UploadSpool {
    file: fs::File,
    path: TempPath,
    len: u64,
}

impl UploadSpool {
    pub fn create_in(directory: &Path) -> std::io::Result<Self> {
        let (file, path) = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(directory)?
            .into_parts();

        Ok(Self {
            file: fs::File::from_std(file),
            path,
            len: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk).await?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(
        mut self,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> std::io::Result<UploadedFile> {
        self.file.flush().await?;
        Ok(UploadedFile::spooled(file_name, content_type, self.path, self.len))
    }
}
