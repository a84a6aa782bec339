//! 本地文件目录后端，用于 mock 存储适配器（实现 ObjectBackend）。
//!
//! 对象内容保存在 `<root>/<key>`，content-type 保存在 `<root>/.content-type/<key>`。

use crate::cadapter::client::{ObjectBackend, ObjectMeta};
use crate::error::StoreError;
use crate::range::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter},
};

const CONTENT_TYPE_DIR: &str = ".content-type";

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn content_type_path(&self, key: &str) -> PathBuf {
        self.root.join(CONTENT_TYPE_DIR).join(key)
    }

    fn not_found(key: &str, e: std::io::Error) -> StoreError {
        if e.kind() == ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io(e)
        }
    }

    async fn create(&self, key: &str) -> Result<BufWriter<fs::File>, StoreError> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        // 新对象不继承旧的 content-type
        self.remove_content_type(key).await?;
        Ok(BufWriter::new(fs::File::create(path).await?))
    }

    async fn remove_content_type(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.content_type_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn open_at(&self, key: &str, start: u64) -> Result<fs::File, StoreError> {
        let mut f = fs::File::open(self.path_for(key))
            .await
            .map_err(|e| Self::not_found(key, e))?;
        f.seek(SeekFrom::Start(start)).await?;
        Ok(f)
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    async fn head_object(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        let metadata = fs::metadata(self.path_for(key))
            .await
            .map_err(|e| Self::not_found(key, e))?;
        let content_type = match fs::read_to_string(self.content_type_path(key)).await {
            Ok(s) => Some(s),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::Io(e)),
        };
        Ok(ObjectMeta {
            size: metadata.len(),
            content_type,
        })
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Bytes, StoreError> {
        let f = self.open_at(key, start).await?;
        let mut buf = Vec::new();
        // 越过文件末尾时返回较短的内容
        f.take(end.saturating_sub(start).saturating_add(1))
            .read_to_end(&mut buf)
            .await?;
        Ok(Bytes::from(buf))
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StoreError> {
        let mut f = self.create(key).await?;
        f.write_all(&data).await?;
        f.flush().await?;
        Ok(())
    }

    async fn compose(&self, sources: &[String], destination: &str) -> Result<(), StoreError> {
        // 先写临时文件再 rename，目标可以同时出现在 sources 中
        let tmp_key = format!("{destination}.compose.tmp");
        let mut out = self.create(&tmp_key).await?;
        for source in sources {
            let mut f = self.open_at(source, 0).await?;
            tokio::io::copy(&mut f, &mut out).await?;
        }
        out.flush().await?;
        drop(out);
        self.remove_content_type(destination).await?;
        fs::rename(self.path_for(&tmp_key), self.path_for(destination)).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path_for(key))
            .await
            .map_err(|e| Self::not_found(key, e))?;
        self.remove_content_type(key).await
    }

    async fn set_content_type(&self, key: &str, content_type: &str) -> Result<(), StoreError> {
        fs::metadata(self.path_for(key))
            .await
            .map_err(|e| Self::not_found(key, e))?;
        let path = self.content_type_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        fs::write(path, content_type).await?;
        Ok(())
    }

    async fn copy_range(
        &self,
        source: &str,
        range: ByteRange,
        destination: &str,
        content_type: Option<&str>,
    ) -> Result<(), StoreError> {
        let f = self.open_at(source, range.start).await?;
        let mut limited = f.take(range.len());
        let mut out = self.create(destination).await?;
        tokio::io::copy(&mut limited, &mut out).await?;
        out.flush().await?;
        match content_type {
            Some(ct) => self.set_content_type(destination, ct).await,
            None => Ok(()),
        }
    }
}
