//! 短期记忆状态（State Cache Manager）
//!
//! 每回合一个状态机：load → 内存读写 → 脏检测 → 条件 save。
//!
//! | 状态 | 含义 |
//! |------|------|
//! | Unloaded | 回合注册表里还没有快照 |
//! | Loaded-Clean | 快照指纹与内容一致 |
//! | Loaded-Dirty | 内容被改过（或被显式清空强制脏化） |
//!
//! 核心契约：内容没变的回合，save 绝不产生后端写入。
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use short_memory::context::{Activity, TurnContext};
//! use short_memory::state::ShortMemoryState;
//! use short_memory::storage::rest::RestStateStorage;
//! use short_memory::storage::router::TurnScopedStorage;
//! use short_memory::storage::InMemoryStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> short_memory::error::Result<()> {
//! let storage = TurnScopedStorage::new(
//!     Arc::new(InMemoryStorage::new()),
//!     RestStateStorage::new(Arc::new(reqwest::Client::new())),
//! );
//! let state = ShortMemoryState::new(storage);
//!
//! let ctx = TurnContext::new(Activity {
//!     channel_id: Some("msteams".to_string()),
//!     from_id: Some("U1".to_string()),
//!     conversation_id: "c1".to_string(),
//!     service_url: "https://channel.example.com/".to_string(),
//!     caller_id: None,
//! });
//!
//! let visits = state.create_property::<u32>("Visits")?;
//! let n = visits.get_or_insert_with(&ctx, || 0).await?;
//! visits.set(&ctx, n + 1).await?;
//! state.save_changes(&ctx, false).await?;
//! # Ok(())
//! # }
//! ```

pub mod accessor;
pub mod snapshot;

pub use accessor::StatePropertyAccessor;
pub use snapshot::{CachedState, PropertyBag, fingerprint};

use crate::context::TurnContext;
use crate::error::{ActivityError, DecodeError, Result, StateError};
use crate::storage::router::TurnScopedStorage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use tracing::debug;

/// 属性包的逻辑名，远端读写以它标识整个包
pub const SHORT_MEMORY_PROPERTY_NAME: &str = "ShortMemory";

/// 回合注册表里快照槽位的组件身份键
const CONTEXT_SERVICE_KEY: &str = "ShortMemoryState";

// ── ShortMemoryState ──────────────────────────────────────────────────────────

/// 短期记忆属性包的缓存与持久化编排器
///
/// 自身无回合内状态，可跨回合共享；回合级快照放在 [`TurnContext`] 的
/// 注册表里，以本组件的身份键寻址，不与其他组件冲突。
pub struct ShortMemoryState {
    storage: TurnScopedStorage,
}

impl ShortMemoryState {
    pub fn new(storage: TurnScopedStorage) -> Self {
        Self { storage }
    }

    /// 创建指定属性的类型化访问器
    ///
    /// 属性名为空（或仅空白）是前置条件错误。
    pub fn create_property<T>(&self, name: &str) -> Result<StatePropertyAccessor<'_, T>> {
        if name.trim().is_empty() {
            return Err(ActivityError::EmptyPropertyName.into());
        }
        Ok(StatePropertyAccessor {
            state: self,
            name: name.to_string(),
            _marker: PhantomData,
        })
    }

    /// 从后端填充本回合的状态缓存
    ///
    /// 快照已存在且 `force=false` 时为 no-op。`force=true` 总是重新拉取，
    /// 未保存的内存修改会被丢弃——调用方不得依赖 `force=true` 保留未提交的变更。
    pub async fn load(&self, ctx: &TurnContext, force: bool) -> Result<()> {
        if !force && ctx.turn_state().contains(CONTEXT_SERVICE_KEY) {
            return Ok(());
        }

        let snapshot = match self.storage.read(ctx, SHORT_MEMORY_PROPERTY_NAME).await? {
            // 后端没有数据：以空包进入 Loaded-Clean
            None => CachedState::new(),
            Some(bag) => CachedState::with_bag(bag),
        };
        debug!(keys = snapshot.bag().len(), force, "📖 状态缓存已加载");
        ctx.turn_state().insert(CONTEXT_SERVICE_KEY, snapshot);
        Ok(())
    }

    /// 把本回合的状态缓存写回后端
    ///
    /// 无快照时为 no-op；`force=true` 或快照为脏时写后端并把指纹对齐到当前
    /// 内容，否则零 I/O。写失败原样上报，内存快照保持有效。
    pub async fn save_changes(&self, ctx: &TurnContext, force: bool) -> Result<()> {
        let Some(snapshot) = ctx.turn_state().get_cloned::<CachedState>(CONTEXT_SERVICE_KEY)
        else {
            return Ok(());
        };

        if force || snapshot.is_dirty() {
            self.storage
                .write(ctx, SHORT_MEMORY_PROPERTY_NAME, snapshot.bag())
                .await?;
            ctx.turn_state()
                .with_mut::<CachedState, _>(CONTEXT_SERVICE_KEY, |s| s.mark_clean());
            debug!(keys = snapshot.bag().len(), force, "💾 状态缓存已保存");
        }
        Ok(())
    }

    /// 清空本回合的状态缓存
    ///
    /// 用哨兵指纹替换快照，下一次 `save_changes(false)` 即使包为空也必然写后端——
    /// 显式重置由此区别于"什么都没改"。本方法只改缓存，持久化仍需调用
    /// [`save_changes`](Self::save_changes)。
    pub fn clear_state(&self, ctx: &TurnContext) {
        ctx.turn_state()
            .insert(CONTEXT_SERVICE_KEY, CachedState::cleared());
        debug!("🧹 状态缓存已清空（强制脏化）");
    }

    /// 从已加载的快照中读取一个属性并转换为声明的类型
    ///
    /// 键不存在或值为 null 时返回 `Ok(None)`；值存在但无法转换为 `T` 是
    /// 致命的解码错误，绝不静默退化为默认值。
    pub fn get_property_value<T: DeserializeOwned>(
        &self,
        ctx: &TurnContext,
        name: &str,
    ) -> Result<Option<T>> {
        let snapshot = self.loaded_snapshot(ctx)?;
        match snapshot.bag().get(name) {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value::<T>(value.clone()).map_err(|e| {
                    DecodeError::PropertyConversion {
                        name: name.to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// 向已加载的快照写入一个属性（纯内存操作）
    ///
    /// 不同步设置脏标志，脏与否由 save 时的指纹比较按需判定。
    pub fn set_property_value<T: Serialize>(
        &self,
        ctx: &TurnContext,
        name: &str,
        value: T,
    ) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.with_loaded_snapshot(ctx, |s| {
            s.bag_mut().insert(name.to_string(), value);
        })
    }

    /// 从已加载的快照中删除一个属性（不存在时 no-op）
    pub fn delete_property_value(&self, ctx: &TurnContext, name: &str) -> Result<()> {
        self.with_loaded_snapshot(ctx, |s| {
            s.bag_mut().remove(name);
        })
    }

    /// 执行一段回合逻辑，结束后自动做一次非强制 save
    ///
    /// 对应宿主运行时"回合末自动保存"的编排方式；回合逻辑出错时跳过保存。
    pub async fn run_turn<R>(
        &self,
        ctx: &TurnContext,
        turn: impl Future<Output = Result<R>>,
    ) -> Result<R> {
        let result = turn.await?;
        self.save_changes(ctx, false).await?;
        Ok(result)
    }

    fn loaded_snapshot(&self, ctx: &TurnContext) -> Result<CachedState> {
        ctx.turn_state()
            .get_cloned::<CachedState>(CONTEXT_SERVICE_KEY)
            .ok_or_else(|| {
                StateError::Other("state cache not loaded for this turn; call load first".into())
            })
    }

    fn with_loaded_snapshot(
        &self,
        ctx: &TurnContext,
        f: impl FnOnce(&mut CachedState),
    ) -> Result<()> {
        ctx.turn_state()
            .with_mut::<CachedState, _>(CONTEXT_SERVICE_KEY, f)
            .ok_or_else(|| {
                StateError::Other("state cache not loaded for this turn; call load first".into())
            })
    }
}
