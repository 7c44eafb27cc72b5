//! Local directory backend
//!
//! One JSON file per key. Writes go to a sibling temp file first and are
//! renamed into place, so readers never see a half-written value.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::KvBackend;
use crate::error::{Error, Result};

pub struct FileKvBackend {
    dir: PathBuf,
}

impl FileKvBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// `strategy:low` -> `<dir>/strategy_low.json`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl KvBackend for FileKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Store(format!("read {}: {}", path.display(), e))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Store(format!("create {}: {}", self.dir.display(), e)))?;

        let path = self.path_for(key);
        let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| Error::Store(format!("write {}: {}", tmp.display(), e)))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Store(format!("rename into {}: {}", path.display(), e)));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_to_path() {
        let backend = FileKvBackend::new("/tmp/kv");
        assert_eq!(
            backend.path_for("strategy:low"),
            PathBuf::from("/tmp/kv/strategy_low.json")
        );
        assert_eq!(
            backend.path_for("../etc/passwd"),
            PathBuf::from("/tmp/kv/___etc_passwd.json")
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let backend = FileKvBackend::new(dir.path());
        assert_eq!(backend.get("strategy:high").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_creates_dir_and_overwrites() {
        let dir = tempdir().unwrap();
        let backend = FileKvBackend::new(dir.path().join("nested"));

        backend.set("strategy:low", "{\"v\":1}").await.unwrap();
        backend.set("strategy:low", "{\"v\":2}").await.unwrap();

        assert_eq!(
            backend.get("strategy:low").await.unwrap().as_deref(),
            Some("{\"v\":2}")
        );

        // No temp files left behind
        let mut entries = tokio::fs::read_dir(dir.path().join("nested")).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["strategy_low.json".to_string()]);
    }
}
