//! 回合上下文（Turn Context）
//!
//! 每个入站请求对应一个 [`TurnContext`]：携带入站 [`Activity`]、一次性计算的
//! Skill 调用事实（[`TurnContext::is_skill`]），以及一个按组件身份取值的
//! 类型化注册表 [`TurnState`]。
//!
//! 上下文通过引用在调用链中传递，生命周期恰好一个回合；不同回合互不共享，
//! 因此不使用任何进程级单例。

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

// ── Activity ──────────────────────────────────────────────────────────────────

/// 入站活动信封
///
/// 状态子系统只关心其中四件事：`channel_id` 与 `from_id`（拼装本地存储键）、
/// `conversation_id`（远端读写的寻址键）、`service_url`（远端状态端点的基地址，
/// 来自本回合投递方，而非静态配置）。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    /// 渠道标识（如 "msteams"）
    pub channel_id: Option<String>,
    /// 发送方用户标识（原始协议中的 From.Id）
    pub from_id: Option<String>,
    /// 会话标识
    pub conversation_id: String,
    /// 投递此活动的渠道服务地址，远端状态端点以它为基地址
    pub service_url: String,
    /// 宿主进程以 Skill 方式调用时填入的调用方标识
    pub caller_id: Option<String>,
}

// ── TurnState ─────────────────────────────────────────────────────────────────

/// 回合内的类型化注册表
///
/// 以组件身份（字符串键）存放任意 `'static` 值。状态缓存管理器在这里存放
/// 它的回合级快照，其他组件不读写该槽位。
///
/// 内部用 `std::sync::Mutex` 保护，所有操作都是同步短临界区，锁从不跨 await。
#[derive(Default)]
pub struct TurnState {
    slots: Mutex<HashMap<String, Box<dyn Any + Send>>>,
}

impl TurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入（或覆盖）一个槽位
    pub fn insert<T: Send + 'static>(&self, key: &str, value: T) {
        self.slots
            .lock()
            .unwrap()
            .insert(key.to_string(), Box::new(value));
    }

    /// 取出槽位值的克隆（类型不匹配或不存在时返回 `None`）
    pub fn get_cloned<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .and_then(|b| b.downcast_ref::<T>())
            .cloned()
    }

    /// 对槽位内的值做一次原地修改，返回闭包结果（槽位不存在时返回 `None`）
    pub fn with_mut<T: 'static, R>(&self, key: &str, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.slots
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(|b| b.downcast_mut::<T>())
            .map(f)
    }

    /// 槽位是否存在
    pub fn contains(&self, key: &str) -> bool {
        self.slots.lock().unwrap().contains_key(key)
    }

    /// 删除槽位，返回是否存在
    pub fn remove(&self, key: &str) -> bool {
        self.slots.lock().unwrap().remove(key).is_some()
    }
}

// ── TurnContext ───────────────────────────────────────────────────────────────

/// 单个回合的执行上下文
///
/// `is_skill` 在构造时根据 `Activity.caller_id` 计算一次，此后不可变——
/// 同一回合内后端选择因此必然一致，不会出现读本地、写远端的错位。
pub struct TurnContext {
    activity: Activity,
    is_skill: bool,
    turn_state: TurnState,
}

impl TurnContext {
    pub fn new(activity: Activity) -> Self {
        let is_skill = activity.caller_id.is_some();
        Self {
            activity,
            is_skill,
            turn_state: TurnState::new(),
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    /// 当前回合是否运行在 Skill 托管模式（宿主进程的子组件）
    pub fn is_skill(&self) -> bool {
        self.is_skill
    }

    pub fn turn_state(&self) -> &TurnState {
        &self.turn_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity() -> Activity {
        Activity {
            channel_id: Some("msteams".to_string()),
            from_id: Some("U1".to_string()),
            conversation_id: "c1".to_string(),
            service_url: "https://channel.example.com/".to_string(),
            caller_id: None,
        }
    }

    #[test]
    fn test_is_skill_derived_from_caller_id() {
        let ctx = TurnContext::new(activity());
        assert!(!ctx.is_skill());

        let mut hosted = activity();
        hosted.caller_id = Some("host-bot".to_string());
        let ctx = TurnContext::new(hosted);
        assert!(ctx.is_skill());
    }

    #[test]
    fn test_turn_state_roundtrip() {
        let ctx = TurnContext::new(activity());
        assert!(!ctx.turn_state().contains("slot"));

        ctx.turn_state().insert("slot", 41_u32);
        assert_eq!(ctx.turn_state().get_cloned::<u32>("slot"), Some(41));

        // 类型不匹配时取不到值
        assert_eq!(ctx.turn_state().get_cloned::<String>("slot"), None);

        let r = ctx.turn_state().with_mut::<u32, u32>("slot", |v| {
            *v += 1;
            *v
        });
        assert_eq!(r, Some(42));
        assert_eq!(ctx.turn_state().get_cloned::<u32>("slot"), Some(42));

        assert!(ctx.turn_state().remove("slot"));
        assert!(!ctx.turn_state().contains("slot"));
    }

    #[test]
    fn test_turn_state_overwrite_keeps_single_slot() {
        let state = TurnState::new();
        state.insert("k", "a".to_string());
        state.insert("k", "b".to_string());
        assert_eq!(state.get_cloned::<String>("k"), Some("b".to_string()));
    }
}
