//! 存储路由（Storage Router）
//!
//! 每回合在两个后端之间做一次纯决策：
//!
//! | 执行模式 | 后端 | 寻址 |
//! |----------|------|------|
//! | 独立进程 | [`Storage`] 本地存储 | [`storage_key`]（`{channelId}/users/{userId}`） |
//! | Skill 托管 | [`RestStateStorage`] 远端端点 | 会话 id + 属性包名 |
//!
//! 决策依据是 [`TurnContext::is_skill`]，该事实在上下文构造时冻结，
//! 同一回合内 load 与 save 必然命中同一个后端。

use crate::context::TurnContext;
use crate::error::{ActivityError, DecodeError, Result};
use crate::state::snapshot::PropertyBag;
use crate::storage::Storage;
use crate::storage::rest::RestStateStorage;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

// ── Backend ───────────────────────────────────────────────────────────────────

/// 本回合选中的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Remote,
}

// ── storage_key ───────────────────────────────────────────────────────────────

/// 计算本地后端的存储键：`{channelId}/users/{userId}`
///
/// 两个组成部分缺一即是致命的前置条件错误，不做任何兜底。
pub fn storage_key(ctx: &TurnContext) -> Result<String> {
    let activity = ctx.activity();
    let channel_id = activity
        .channel_id
        .as_deref()
        .ok_or(ActivityError::MissingChannelId)?;
    let user_id = activity
        .from_id
        .as_deref()
        .ok_or(ActivityError::MissingUserId)?;
    Ok(format!("{channel_id}/users/{user_id}"))
}

// ── TurnScopedStorage ─────────────────────────────────────────────────────────

/// 按回合上下文路由读写的存储门面
///
/// 本地存储以 trait 对象注入，可替换为任意 [`Storage`] 实现；远端客户端
/// 持有共享的 HTTP Client。两者都可被无关回合并发使用。
pub struct TurnScopedStorage {
    local: Arc<dyn Storage>,
    remote: RestStateStorage,
}

impl TurnScopedStorage {
    pub fn new(local: Arc<dyn Storage>, remote: RestStateStorage) -> Self {
        Self { local, remote }
    }

    /// 纯决策，无 I/O：Skill 托管回合走远端，否则走本地
    pub fn resolve(&self, ctx: &TurnContext) -> Backend {
        if ctx.is_skill() {
            Backend::Remote
        } else {
            Backend::Local
        }
    }

    /// 读取当前回合的属性包（不存在时返回 `None`）
    pub async fn read(
        &self,
        ctx: &TurnContext,
        property_name: &str,
    ) -> Result<Option<PropertyBag>> {
        match self.resolve(ctx) {
            Backend::Remote => {
                debug!(backend = "remote", "🔀 状态读取路由");
                self.remote.read(ctx, property_name).await
            }
            Backend::Local => {
                let key = storage_key(ctx)?;
                debug!(backend = "local", key = %key, "🔀 状态读取路由");
                match self.local.read(&key).await? {
                    None => Ok(None),
                    Some(Value::Object(bag)) => Ok(Some(bag)),
                    Some(other) => Err(DecodeError::InvalidBagShape(format!(
                        "expected JSON object under '{key}', got {other}"
                    ))
                    .into()),
                }
            }
        }
    }

    /// 写入当前回合的属性包，等待所选后端确认
    pub async fn write(&self, ctx: &TurnContext, property_name: &str, bag: &PropertyBag) -> Result<()> {
        match self.resolve(ctx) {
            Backend::Remote => {
                debug!(backend = "remote", "🔀 状态写入路由");
                self.remote.write(ctx, property_name, bag).await
            }
            Backend::Local => {
                let key = storage_key(ctx)?;
                debug!(backend = "local", key = %key, "🔀 状态写入路由");
                self.local.write(&key, Value::Object(bag.clone())).await
            }
        }
    }
}
