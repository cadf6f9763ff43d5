use crate::error::{ConfigError, Result};
use crate::storage::{FileStorage, InMemoryStorage, Storage};
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

/// 本地后端类型
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    File,
}

/// 本地后端配置
///
/// 只配置本地路径；远端端点地址来自每回合的入站 Activity，不出现在配置里。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// `kind: file` 时的存储文件路径
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let file =
            std::fs::File::open(path).map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: Config = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}

impl StorageConfig {
    /// 按配置构造本地存储实例
    pub fn build(&self) -> Result<Arc<dyn Storage>> {
        match self.kind {
            StorageKind::Memory => Ok(Arc::new(InMemoryStorage::new())),
            StorageKind::File => {
                let path = self.path.as_deref().ok_or_else(|| ConfigError::InvalidValue {
                    field: "storage.path".to_string(),
                    message: "required when kind is file".to_string(),
                })?;
                Ok(Arc::new(FileStorage::new(path)?))
            }
        }
    }
}
