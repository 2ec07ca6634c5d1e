//! 持久化键值存储抽象
//! 中枢通过注入的存储接口读写缓存，而非访问环境全局状态，
//! 测试注入内存假实现即可覆盖全部编排逻辑；
//! 每个分类独占一个键，跨分类不存在写竞争

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

use crate::error::{QuietwebError, QwResult};

/// 键值存储接口
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get(&self, key: &str) -> QwResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> QwResult<()>;
    async fn remove(&self, key: &str) -> QwResult<()>;
}

/// 进程内存存储（测试与无持久化场景）
#[derive(Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn get(&self, key: &str) -> QwResult<Option<String>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> QwResult<()> {
        self.map
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> QwResult<()> {
        self.map.write().await.remove(key);
        Ok(())
    }
}

/// 目录文件存储：一键一文件，跨重启存活
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 键名转文件名：非字母数字字符一律归一为下划线
    fn file_path(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

#[async_trait]
impl RuleStore for DirStore {
    async fn get(&self, key: &str) -> QwResult<Option<String>> {
        match tokio::fs::read_to_string(self.file_path(key)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(QuietwebError::Storage(format!(
                "read '{}' failed: {}",
                key, e
            ))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> QwResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| QuietwebError::Storage(format!("create cache dir failed: {}", e)))?;
        tokio::fs::write(self.file_path(key), value)
            .await
            .map_err(|e| QuietwebError::Storage(format!("write '{}' failed: {}", key, e)))
    }

    async fn remove(&self, key: &str) -> QwResult<()> {
        match tokio::fs::remove_file(self.file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QuietwebError::Storage(format!(
                "remove '{}' failed: {}",
                key, e
            ))),
        }
    }
}
