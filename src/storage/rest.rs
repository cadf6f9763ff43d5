//! 远端状态存储（Remote Store Client）
//!
//! Skill 托管模式下，状态不落在本进程可寻址的存储里，而是通过 HTTP 读写
//! 宿主方的状态端点：
//!
//! - `GET  {serviceUrl}state?ConversationId={id}&PropertyName={bag}` → [`StateRestPayload`]
//! - `POST {serviceUrl}state`，body 为 [`StateRestPayload`]
//!
//! 基地址取自本回合入站 [`Activity`](crate::context::Activity) 的 `service_url`，
//! 不是静态配置——不同会话可以路由到不同的远端权威。
//!
//! 写入必须等到远端应答才算完成，没有 fire-and-forget。

use crate::context::TurnContext;
use crate::error::{DecodeError, Result, StorageError};
use crate::state::snapshot::PropertyBag;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// 状态端点相对路径（拼接在 `service_url` 之后）
const API_ENDPOINT: &str = "state";
const CONVERSATION_ID_KEY: &str = "ConversationId";
const PROPERTY_NAME_KEY: &str = "PropertyName";

// ── StateRestPayload ──────────────────────────────────────────────────────────

/// 远端读写的线上载荷
///
/// `property_name` 标识整个属性包的逻辑名（如 "ShortMemory"），不是包内
/// 单个键。`data` 缺失或为空对象是规范的 "not found" 信号。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRestPayload {
    #[serde(rename = "ConversationId")]
    pub conversation_id: String,
    #[serde(rename = "PropertyName")]
    pub property_name: String,
    #[serde(rename = "Data", default)]
    pub data: PropertyBag,
}

// ── RestStateStorage ──────────────────────────────────────────────────────────

/// 远端状态端点的 HTTP 客户端
///
/// 内部共享一个 `Arc<reqwest::Client>`，可被所有会话/回合并发复用。
pub struct RestStateStorage {
    client: Arc<Client>,
}

impl RestStateStorage {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// 读取指定会话的属性包
    ///
    /// 返回 `Ok(None)` 表示远端没有该会话的数据（`Data` 缺失或为空对象），
    /// 这是正常信号而非错误；传输失败和解码失败都会如实上报。
    pub async fn read(
        &self,
        ctx: &TurnContext,
        property_name: &str,
    ) -> Result<Option<PropertyBag>> {
        let activity = ctx.activity();
        let url = format!("{}{}", activity.service_url, API_ENDPOINT);

        let response = self
            .client
            .get(&url)
            .query(&[
                (CONVERSATION_ID_KEY, activity.conversation_id.as_str()),
                (PROPERTY_NAME_KEY, property_name),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::ApiError {
                status,
                message: error_text,
            }
            .into());
        }

        let payload = response
            .json::<StateRestPayload>()
            .await
            .map_err(|e| DecodeError::InvalidBagShape(e.to_string()))?;

        debug!(
            conversation_id = %payload.conversation_id,
            keys = payload.data.len(),
            "📥 远端状态读取完成"
        );

        if payload.data.is_empty() {
            Ok(None)
        } else {
            Ok(Some(payload.data))
        }
    }

    /// 写入指定会话的属性包，等待远端确认
    pub async fn write(
        &self,
        ctx: &TurnContext,
        property_name: &str,
        bag: &PropertyBag,
    ) -> Result<()> {
        let activity = ctx.activity();
        let url = format!("{}{}", activity.service_url, API_ENDPOINT);

        let payload = StateRestPayload {
            conversation_id: activity.conversation_id.clone(),
            property_name: property_name.to_string(),
            data: bag.clone(),
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::ApiError {
                status,
                message: error_text,
            }
            .into());
        }

        debug!(
            conversation_id = %payload.conversation_id,
            keys = payload.data.len(),
            "📤 远端状态写入已确认"
        );
        Ok(())
    }
}
