use short_memory::prelude::*;
use std::sync::Arc;

/// demo01: 独立进程模式——状态走本地存储，演示脏检测（没变就不写）

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🧪 demo01 - 本地回合演示\n");

    let storage = TurnScopedStorage::new(
        Arc::new(InMemoryStorage::new()),
        RestStateStorage::new(Arc::new(reqwest::Client::new())),
    );
    let state = ShortMemoryState::new(storage);
    let visits = state.create_property::<u32>("Visits")?;

    // 三个回合，同一个用户
    for turn in 1..=3_u32 {
        let ctx = TurnContext::new(Activity {
            channel_id: Some("msteams".to_string()),
            from_id: Some("U1".to_string()),
            conversation_id: "c1".to_string(),
            service_url: "https://channel.example.com/".to_string(),
            caller_id: None,
        });

        state
            .run_turn(&ctx, async {
                let n = visits.get_or_insert_with(&ctx, || 0).await?;
                println!("回合 {turn}: 历史访问 {n} 次");
                visits.set(&ctx, n + 1).await?;
                Ok(())
            })
            .await?;
    }

    // 第四个回合只读不写：save 不会产生后端写入
    let ctx = TurnContext::new(Activity {
        channel_id: Some("msteams".to_string()),
        from_id: Some("U1".to_string()),
        conversation_id: "c1".to_string(),
        service_url: "https://channel.example.com/".to_string(),
        caller_id: None,
    });
    let n = visits.get(&ctx).await?;
    state.save_changes(&ctx, false).await?;
    println!("\n📋 最终计数: {n}（本回合未修改，保存被跳过）");

    Ok(())
}
