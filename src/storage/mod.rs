//! 本地键值存储（Local Store）
//!
//! 以 `{channelId}/users/{userId}` 形式的存储键保存属性包的序列化形式。
//!
//! ## 内置实现
//!
//! - [`InMemoryStorage`]：进程内存，适合测试
//! - [`FileStorage`]：JSON 文件持久化，零额外依赖
//!
//! 远端（Skill 托管）路径见 [`rest`]，两者之间的选择见 [`router`]。
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use short_memory::storage::{FileStorage, Storage};
//! use std::sync::Arc;
//!
//! # async fn example() -> short_memory::error::Result<()> {
//! let storage = Arc::new(FileStorage::new("~/.short-memory/state.json")?);
//!
//! storage.write("msteams/users/U1", serde_json::json!({
//!     "LastLocation": "47.6,-122.3"
//! })).await?;
//!
//! let bag = storage.read("msteams/users/U1").await?;
//! # Ok(())
//! # }
//! ```

pub mod rest;
pub mod router;

use crate::error::{Result, StorageError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

// ── Storage trait ─────────────────────────────────────────────────────────────

/// 通用键值存储接口
///
/// 被多个会话/回合并发共享，实现必须线程安全；单个键的读写由调用方
/// （状态缓存管理器）保证回合内顺序执行。
#[async_trait]
pub trait Storage: Send + Sync {
    /// 按键精确读取（不存在时返回 `None`）
    async fn read(&self, key: &str) -> Result<Option<Value>>;

    /// 写入或覆盖一个键（upsert）
    async fn write(&self, key: &str, value: Value) -> Result<()>;

    /// 删除指定键，返回是否存在并删除
    async fn delete(&self, key: &str) -> Result<bool>;
}

// ── InMemoryStorage ───────────────────────────────────────────────────────────

/// 进程内存 Storage，不持久化，适合测试和短生命周期使用
pub struct InMemoryStorage {
    data: RwLock<HashMap<String, Value>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }
}

// ── FileStorage ───────────────────────────────────────────────────────────────

/// 基于 JSON 文件的持久化 Storage
///
/// 写时立即落盘，读时从内存缓存返回（无需反复解析文件）。
///
/// 存储格式（每个 key 为完整存储键）：
/// ```json
/// {
///   "msteams/users/U1": { "LastLocation": "47.6,-122.3" }
/// }
/// ```
pub struct FileStorage {
    path: PathBuf,
    data: RwLock<HashMap<String, Value>>,
}

impl FileStorage {
    /// 打开或创建存储文件，自动建父目录
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = expand_tilde(path.as_ref());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::IoError(format!("创建目录失败: {e}")))?;
        }
        let data: HashMap<String, Value> = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| StorageError::IoError(format!("读取 storage 文件失败: {e}")))?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Storage 文件解析失败，从空状态开始: {e}");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        let key_count = data.len();
        info!(path = %path.display(), keys = key_count, "🗄️ FileStorage 初始化");
        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    async fn flush(&self) -> Result<()> {
        let data = self.data.read().await;
        let json = serde_json::to_string_pretty(&*data)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| StorageError::IoError(format!("写入 storage 文件失败: {e}")))?;
        debug!(path = %self.path.display(), "💾 Storage 已持久化");
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut data = self.data.write().await;
            data.insert(key.to_string(), value);
        }
        self.flush().await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let found = {
            let mut data = self.data.write().await;
            data.remove(key).is_some()
        };
        if found {
            self.flush().await?;
        }
        Ok(found)
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}
