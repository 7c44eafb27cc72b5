//! In-process backend, lost on restart

use async_trait::async_trait;
use dashmap::DashMap;

use super::KvBackend;
use crate::error::Result;

#[derive(Default)]
pub struct MemoryKvBackend {
    entries: DashMap<String, String>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryKvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
