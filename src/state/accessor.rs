//! 类型化属性访问器（Typed Property Accessor）
//!
//! [`ShortMemoryState`] 之上的单属性薄视图，负责类型转换与默认值注入。
//! 语义是惰性的：Get/Set/Delete 都先走一次 load，因此应用代码可以直接使用
//! 访问器，不必手动调用 `load`；回合末由宿主（或 [`ShortMemoryState::run_turn`]）
//! 统一 save。
//!
//! 与源行为保持一致的读写策略：
//!
//! | 操作 | 隐式 load |
//! |------|-----------|
//! | `get` / `try_get` / `get_or_insert_with` | `force=true`（读路径总是回源刷新） |
//! | `set` / `delete` | `force=false`（改路径从不丢弃未提交的修改） |
//!
//! 读路径回源意味着同回合内未保存的 `set` 在下一次 `get` 时不可见；
//! 需要读自己刚写的值时先 `save_changes` 或改用
//! [`ShortMemoryState::get_property_value`]。

use crate::context::TurnContext;
use crate::error::{Result, StateError};
use crate::state::ShortMemoryState;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// 绑定到单个属性名与逻辑类型 `T` 的访问器
///
/// 由 [`ShortMemoryState::create_property`] 创建。
pub struct StatePropertyAccessor<'a, T> {
    pub(crate) state: &'a ShortMemoryState,
    pub(crate) name: String,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<'a, T> StatePropertyAccessor<'a, T>
where
    T: Serialize + DeserializeOwned,
{
    /// 属性名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 读取属性值；键不存在时是 [`StateError::PropertyNotFound`]（必填语义）
    pub async fn get(&self, ctx: &TurnContext) -> Result<T> {
        self.state.load(ctx, true).await?;
        self.state
            .get_property_value::<T>(ctx, &self.name)?
            .ok_or_else(|| StateError::PropertyNotFound(self.name.clone()))
    }

    /// 读取属性值；键不存在时返回 `None`（可空语义）
    pub async fn try_get(&self, ctx: &TurnContext) -> Result<Option<T>> {
        self.state.load(ctx, true).await?;
        self.state.get_property_value::<T>(ctx, &self.name)
    }

    /// 读取属性值；键不存在时用工厂合成默认值，立即写入缓存并返回
    ///
    /// 本回合内的后续读取（不回源时）会看到该默认值，工厂不会再次被调用。
    pub async fn get_or_insert_with(
        &self,
        ctx: &TurnContext,
        factory: impl FnOnce() -> T,
    ) -> Result<T> {
        self.state.load(ctx, true).await?;
        if let Some(value) = self.state.get_property_value::<T>(ctx, &self.name)? {
            return Ok(value);
        }
        let value = factory();
        self.state.set_property_value(ctx, &self.name, &value)?;
        Ok(value)
    }

    /// 写入属性值
    pub async fn set(&self, ctx: &TurnContext, value: T) -> Result<()> {
        self.state.load(ctx, false).await?;
        self.state.set_property_value(ctx, &self.name, value)
    }

    /// 删除属性（不存在时 no-op）
    pub async fn delete(&self, ctx: &TurnContext) -> Result<()> {
        self.state.load(ctx, false).await?;
        self.state.delete_property_value(ctx, &self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Activity;
    use crate::state::SHORT_MEMORY_PROPERTY_NAME;
    use crate::storage::rest::RestStateStorage;
    use crate::storage::router::TurnScopedStorage;
    use crate::storage::Storage;
    use crate::testing::RecordingStorage;
    use reqwest::Client;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct UserProfile {
        name: String,
        visits: u32,
    }

    fn local_context() -> TurnContext {
        TurnContext::new(Activity {
            channel_id: Some("msteams".to_string()),
            from_id: Some("U1".to_string()),
            conversation_id: "c1".to_string(),
            service_url: "https://channel.example.com/".to_string(),
            caller_id: None,
        })
    }

    fn state_over(storage: Arc<RecordingStorage>) -> ShortMemoryState {
        ShortMemoryState::new(TurnScopedStorage::new(
            storage,
            RestStateStorage::new(Arc::new(Client::new())),
        ))
    }

    #[tokio::test]
    async fn test_get_missing_required_property_errors() {
        let storage = Arc::new(RecordingStorage::new());
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<u32>("Visits").unwrap();
        let err = accessor.get(&ctx).await.unwrap_err();
        assert!(matches!(err, StateError::PropertyNotFound(name) if name == "Visits"));
    }

    #[tokio::test]
    async fn test_try_get_missing_property_is_none() {
        let storage = Arc::new(RecordingStorage::new());
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<UserProfile>("Profile").unwrap();
        assert!(accessor.try_get(&ctx).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_converts_structured_value_into_declared_type() {
        let storage = Arc::new(RecordingStorage::new().with_value(
            "msteams/users/U1",
            json!({"Profile": {"name": "alice", "visits": 3}}),
        ));
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<UserProfile>("Profile").unwrap();
        let profile = accessor.get(&ctx).await.unwrap();
        assert_eq!(
            profile,
            UserProfile {
                name: "alice".to_string(),
                visits: 3
            }
        );
    }

    #[tokio::test]
    async fn test_get_conversion_mismatch_is_decode_error_not_default() {
        let storage = Arc::new(
            RecordingStorage::new().with_value("msteams/users/U1", json!({"Profile": [1, 2, 3]})),
        );
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<UserProfile>("Profile").unwrap();
        let err = accessor.get(&ctx).await.unwrap_err();
        assert!(matches!(err, StateError::Decode(_)));
    }

    #[tokio::test]
    async fn test_default_factory_invoked_once_and_value_visible_in_turn() {
        let storage = Arc::new(RecordingStorage::new());
        let state = state_over(storage);
        let ctx = local_context();
        let factory_calls = AtomicUsize::new(0);

        let accessor = state.create_property::<u32>("Visits").unwrap();
        let value = accessor
            .get_or_insert_with(&ctx, || {
                factory_calls.fetch_add(1, Ordering::SeqCst);
                7
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);

        // 同回合内不回源的读取直接命中缓存，工厂不再被调用
        let cached: Option<u32> = state.get_property_value(&ctx, "Visits").unwrap();
        assert_eq!(cached, Some(7));
        assert_eq!(factory_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_factory_not_invoked_when_value_exists() {
        let storage = Arc::new(
            RecordingStorage::new().with_value("msteams/users/U1", json!({"Visits": 41})),
        );
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<u32>("Visits").unwrap();
        let value = accessor
            .get_or_insert_with(&ctx, || panic!("factory must not run"))
            .await
            .unwrap();
        assert_eq!(value, 41);
    }

    #[tokio::test]
    async fn test_set_save_get_roundtrip() {
        let storage = Arc::new(RecordingStorage::new());
        let state = state_over(storage);
        let ctx = local_context();

        let accessor = state.create_property::<UserProfile>("Profile").unwrap();
        accessor
            .set(
                &ctx,
                UserProfile {
                    name: "alice".to_string(),
                    visits: 1,
                },
            )
            .await
            .unwrap();
        state.save_changes(&ctx, false).await.unwrap();

        // get 回源刷新，读到的是刚保存的内容
        let profile = accessor.get(&ctx).await.unwrap();
        assert_eq!(profile.visits, 1);
    }

    #[tokio::test]
    async fn test_get_always_reflects_backend_state() {
        let storage = Arc::new(
            RecordingStorage::new().with_value("msteams/users/U1", json!({"Visits": 1})),
        );
        let state = state_over(storage.clone());
        let ctx = local_context();

        let accessor = state.create_property::<u32>("Visits").unwrap();
        assert_eq!(accessor.get(&ctx).await.unwrap(), 1);

        // 后端内容被外部改写后，读路径的回源刷新会看到新值
        storage
            .write("msteams/users/U1", json!({"Visits": 2}))
            .await
            .unwrap();
        assert_eq!(accessor.get(&ctx).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_delete_then_save_drops_key_from_backend() {
        let storage = Arc::new(RecordingStorage::new().with_value(
            "msteams/users/U1",
            json!({"Visits": 1, "Name": "alice"}),
        ));
        let state = state_over(storage.clone());
        let ctx = local_context();

        let accessor = state.create_property::<u32>("Visits").unwrap();
        accessor.delete(&ctx).await.unwrap();
        state.save_changes(&ctx, false).await.unwrap();

        let (_, value) = storage.last_write().unwrap();
        assert_eq!(value, json!({"Name": "alice"}));
    }

    #[tokio::test]
    async fn test_skill_turn_reads_and_writes_remote_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/state"))
            .and(query_param("ConversationId", "c1"))
            .and(query_param("PropertyName", SHORT_MEMORY_PROPERTY_NAME))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ConversationId": "c1",
                "PropertyName": SHORT_MEMORY_PROPERTY_NAME,
                "Data": { "Visits": 9 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/state"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let state = ShortMemoryState::new(TurnScopedStorage::new(
            Arc::new(RecordingStorage::new()),
            RestStateStorage::new(Arc::new(Client::new())),
        ));
        let ctx = TurnContext::new(Activity {
            channel_id: Some("msteams".to_string()),
            from_id: Some("U1".to_string()),
            conversation_id: "c1".to_string(),
            service_url: format!("{}/", server.uri()),
            caller_id: Some("host-bot".to_string()),
        });

        let accessor = state.create_property::<u32>("Visits").unwrap();
        let visits = accessor.get(&ctx).await.unwrap();
        assert_eq!(visits, 9);

        accessor.set(&ctx, visits + 1).await.unwrap();
        state.save_changes(&ctx, false).await.unwrap();
    }
}
