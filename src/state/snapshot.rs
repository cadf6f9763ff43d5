//! 回合级状态快照（Cached Snapshot）
//!
//! 属性包在内存中的唯一副本，附带一个序列化指纹用于脏检测。
//! 快照由状态缓存管理器创建、放入回合上下文的注册表，回合结束随上下文一起丢弃，
//! 从不跨回合共享。

use serde_json::Value;

/// 属性包：属性名 → 任意可序列化 JSON 值
///
/// `serde_json::Map` 按键序存储，序列化结果与插入顺序无关——这是指纹
/// 可比较性的前提。
pub type PropertyBag = serde_json::Map<String, Value>;

/// 脏检测指纹：属性包的确定性序列化
///
/// 对逻辑内容相同的属性包，结果恒等；对任何非空或空的真实属性包，
/// 结果至少是 `"{}"`，不可能为空串。
pub fn fingerprint(bag: &PropertyBag) -> String {
    serde_json::to_string(bag).unwrap_or_default()
}

/// 强制脏化哨兵：空串不可能等于任何真实指纹
const FORCED_DIRTY_HASH: &str = "";

// ── CachedState ───────────────────────────────────────────────────────────────

/// 属性包 + 最近一次 load/save 时刻的指纹
///
/// 脏 ⇔ 当前指纹 ≠ 记录的指纹。没有同步维护的脏标志位，`is_dirty` 每次
/// 按需重新计算。
#[derive(Debug, Clone)]
pub struct CachedState {
    bag: PropertyBag,
    hash: String,
}

impl Default for CachedState {
    fn default() -> Self {
        Self::new()
    }
}

impl CachedState {
    /// 空属性包快照；指纹立即计算，新建即干净
    pub fn new() -> Self {
        Self::with_bag(PropertyBag::new())
    }

    /// 以后端读回的属性包建快照；load 完成即干净
    pub fn with_bag(bag: PropertyBag) -> Self {
        let hash = fingerprint(&bag);
        Self { bag, hash }
    }

    /// 显式清空时使用：空属性包 + 哨兵指纹，下一次 save 必然落盘
    pub fn cleared() -> Self {
        Self {
            bag: PropertyBag::new(),
            hash: FORCED_DIRTY_HASH.to_string(),
        }
    }

    pub fn bag(&self) -> &PropertyBag {
        &self.bag
    }

    pub fn bag_mut(&mut self) -> &mut PropertyBag {
        &mut self.bag
    }

    /// 自上次 load/save 以来属性包是否发生变化
    pub fn is_dirty(&self) -> bool {
        self.hash != fingerprint(&self.bag)
    }

    /// 把指纹对齐到当前内容；只改内存，无 I/O
    pub fn mark_clean(&mut self) {
        self.hash = fingerprint(&self.bag);
    }

    /// 把指纹设为哨兵值，保证下一次非强制 save 也会写后端
    pub fn force_dirty(&mut self) {
        self.hash = FORCED_DIRTY_HASH.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let mut bag = PropertyBag::new();
        bag.insert("a".to_string(), json!(1));
        bag.insert("b".to_string(), json!({"nested": true}));
        assert_eq!(fingerprint(&bag), fingerprint(&bag));
    }

    #[test]
    fn test_fingerprint_is_insertion_order_independent() {
        let mut forward = PropertyBag::new();
        forward.insert("a".to_string(), json!(1));
        forward.insert("b".to_string(), json!(2));

        let mut backward = PropertyBag::new();
        backward.insert("b".to_string(), json!(2));
        backward.insert("a".to_string(), json!(1));

        assert_eq!(fingerprint(&forward), fingerprint(&backward));
    }

    #[test]
    fn test_fresh_snapshot_is_clean() {
        assert!(!CachedState::new().is_dirty());

        let mut bag = PropertyBag::new();
        bag.insert("k".to_string(), json!("v"));
        assert!(!CachedState::with_bag(bag).is_dirty());
    }

    #[test]
    fn test_mutation_makes_dirty_and_mark_clean_resets() {
        let mut state = CachedState::new();
        state.bag_mut().insert("k".to_string(), json!("v"));
        assert!(state.is_dirty());

        state.mark_clean();
        assert!(!state.is_dirty());

        // 改回相同内容不算脏
        state.bag_mut().insert("k".to_string(), json!("v"));
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_cleared_snapshot_is_dirty_even_when_empty() {
        let state = CachedState::cleared();
        assert!(state.bag().is_empty());
        assert!(state.is_dirty());
    }

    #[test]
    fn test_force_dirty_survives_until_mark_clean() {
        let mut state = CachedState::new();
        state.force_dirty();
        assert!(state.is_dirty());
        state.mark_clean();
        assert!(!state.is_dirty());
    }
}
