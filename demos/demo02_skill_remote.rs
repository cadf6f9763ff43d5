use serde_json::json;
use short_memory::prelude::*;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// demo02: Skill 托管模式——同一套代码，状态透明地改走远端 HTTP 状态端点
///
/// 用 wiremock 扮演宿主方的状态端点，观察 GET/POST 交换。

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🧪 demo02 - Skill 远端回合演示\n");

    let host = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ConversationId": "c1",
            "PropertyName": "ShortMemory",
            "Data": { "Visits": 41 }
        })))
        .mount(&host)
        .await;
    Mock::given(method("POST"))
        .and(path("/state"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&host)
        .await;

    let storage = TurnScopedStorage::new(
        Arc::new(InMemoryStorage::new()),
        RestStateStorage::new(Arc::new(reqwest::Client::new())),
    );
    let state = ShortMemoryState::new(storage);
    let visits = state.create_property::<u32>("Visits")?;

    // caller_id 表明本回合由宿主进程以 Skill 方式调用
    let ctx = TurnContext::new(Activity {
        channel_id: Some("msteams".to_string()),
        from_id: Some("U1".to_string()),
        conversation_id: "c1".to_string(),
        service_url: format!("{}/", host.uri()),
        caller_id: Some("host-bot".to_string()),
    });

    state
        .run_turn(&ctx, async {
            let n = visits.get(&ctx).await?;
            println!("远端读回: Visits = {n}");
            visits.set(&ctx, n + 1).await?;
            Ok(())
        })
        .await?;

    println!("\n📋 回合结束，更新后的属性包已 POST 回宿主状态端点");
    Ok(())
}
