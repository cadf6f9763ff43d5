//! 测试基础设施
//!
//! 提供在不依赖真实后端的情况下测试状态缓存各组件的工具。
//!
//! | 类型 | 用途 |
//! |------|------|
//! | [`RecordingStorage`] | 替代真实本地存储，记录每次读写，可脚本化注入错误 |
//!
//! # 设计原则
//!
//! - **零外部依赖**：完全在内存中运行
//! - **可脚本化**：通过 `with_value()` 预置数据，`with_read_error()` /
//!   `with_write_error()` 精确控制失败点
//! - **可观测**：通过 `read_count()` / `write_count()` / `last_write()`
//!   检查后端实际发生了什么——脏检测契约（"没变就不写"）的断言全靠它
//! - **线程安全**：内部使用 `Mutex`，可在多任务测试中以 `Arc` 共享
//!
//! 远端路径的测试不在这里：线上协议用 `wiremock` 起真实 HTTP 端点来验证。

use crate::error::{Result, StorageError};
use crate::storage::Storage;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// 记录型 Storage Mock
///
/// 读写落在进程内存里，每次调用都被记录；可预先排队错误，排到的那次
/// 调用返回错误而不触碰数据。
pub struct RecordingStorage {
    data: Mutex<HashMap<String, Value>>,
    reads: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, Value)>>,
    read_errors: Mutex<VecDeque<StorageError>>,
    write_errors: Mutex<VecDeque<StorageError>>,
}

impl Default for RecordingStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingStorage {
    /// 创建空 Mock，尚未预置任何数据
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            reads: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            read_errors: Mutex::new(VecDeque::new()),
            write_errors: Mutex::new(VecDeque::new()),
        }
    }

    /// 预置一个键值（模拟后端已有数据）
    pub fn with_value(self, key: impl Into<String>, value: Value) -> Self {
        self.data.lock().unwrap().insert(key.into(), value);
        self
    }

    /// 追加一条读错误：下一次 `read` 返回它
    pub fn with_read_error(self, err: StorageError) -> Self {
        self.read_errors.lock().unwrap().push_back(err);
        self
    }

    /// 追加一条写错误：下一次 `write` 返回它（用于测试保存失败路径）
    pub fn with_write_error(self, err: StorageError) -> Self {
        self.write_errors.lock().unwrap().push_back(err);
        self
    }

    /// 已发生的读取次数
    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    /// 已发生的写入次数
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// 最后一次写入的键值（若从未写入则返回 `None`）
    pub fn last_write(&self) -> Option<(String, Value)> {
        self.writes.lock().unwrap().last().cloned()
    }

    /// 全部写入记录，按发生顺序
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn read(&self, key: &str) -> Result<Option<Value>> {
        if let Some(err) = self.read_errors.lock().unwrap().pop_front() {
            return Err(err.into());
        }
        self.reads.lock().unwrap().push(key.to_string());
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    async fn write(&self, key: &str, value: Value) -> Result<()> {
        if let Some(err) = self.write_errors.lock().unwrap().pop_front() {
            return Err(err.into());
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone()));
        self.data.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.lock().unwrap().remove(key).is_some())
    }
}
