//! Waggle - 游戏开发智能体控制平面
//!
//! 入口：加载配置、初始化日志，装配控制平面并演示一条资产生成任务的
//! 完整推进、一次工具链桥接往返和一次互助请求。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use waggle::bridge::{RetroForgeHandler, ToolRequestBridge};
use waggle::collab::{AssistStatus, EventCallback};
use waggle::config::load_config;
use waggle::core::{create_checkpoint_store, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    waggle::observability::init();

    let app_name = config
        .app
        .name
        .clone()
        .unwrap_or_else(|| "waggle".to_string());
    tracing::info!("{} control plane starting", app_name);

    // 装配控制平面：检查点存储按配置选 SQLite 或内存
    let store = create_checkpoint_store(config.checkpoint.db_path.as_deref());
    let orchestrator = Orchestrator::with_event_history_limit(store, config.events.history_limit);
    orchestrator
        .seed_default_prompts()
        .await
        .context("Failed to seed prompts")?;
    if let Some(dir) = &config.prompts.dir {
        let loaded = orchestrator
            .prompts()
            .load_dir(dir)
            .await
            .context("Failed to load prompt manifests")?;
        tracing::info!("Loaded {} prompt manifest(s) from {}", loaded, dir.display());
    }
    orchestrator.install_builtin_agents().await;
    for descriptor in orchestrator.list_agents().await {
        tracing::info!(
            "Agent ready: {} {:?}",
            descriptor.agent_id,
            descriptor.capabilities
        );
    }

    // 订阅进度事件，演示事件总线
    let events = orchestrator.events();
    let progress_logger: EventCallback = Arc::new(|event| {
        Box::pin(async move {
            tracing::info!(
                "[event] {} from {}: {}",
                event.event_type,
                event.source_agent_id,
                event.data
            );
            Ok(())
        })
    });
    events.subscribe("task_progress_update", progress_logger).await;

    // 1. 资产生成任务完整跑一轮
    let state = orchestrator
        .create_task(
            "generate_asset",
            "pixel_forge",
            json!({ "description": "a mossy stone wall tile" }),
        )
        .await?;
    events
        .publish(
            "pixel_forge",
            "task_progress_update",
            json!({ "task_id": state.task_id, "step": state.current_step }),
        )
        .await;
    println!("{}", serde_json::to_string_pretty(&state)?);

    // 2. 桥接往返：同一 prompt 的第二次提交命中缓存
    let bridge = ToolRequestBridge::with_cache(
        Arc::new(RetroForgeHandler::new()),
        config.bridge.cache_enabled,
    );
    let submit_timeout = Duration::from_secs(config.bridge.submit_timeout_secs);
    let payload = json!({
        "prompt": "mossy stone wall tile",
        "parameters": { "resolution": [32, 32], "tileable": true },
    });
    let record = tokio::time::timeout(
        submit_timeout,
        bridge.submit(
            "GENERATE_IMAGE_ASSET",
            payload.clone(),
            Some("pixel_forge".to_string()),
        ),
    )
    .await
    .context("Bridge submit timed out")??;
    tracing::info!("Bridge produced asset at {}", record["image_path"]);
    tokio::time::timeout(
        submit_timeout,
        bridge.submit(
            "GENERATE_IMAGE_ASSET",
            payload,
            Some("pixel_forge".to_string()),
        ),
    )
    .await
    .context("Bridge submit timed out")??;
    tracing::info!("Bridge cache now holds {} entries", bridge.cache_len().await);

    // 3. 互助请求：关卡设计临时需要 2D 资产能力
    let collaboration = orchestrator.collaboration();
    if let Some(request_id) = collaboration
        .request_assistance(
            "level_architect",
            &state.task_id,
            "asset_generation_2d",
            json!({ "prompt": "mossy stone doorway" }),
        )
        .await
    {
        collaboration
            .update_request_status(
                &request_id,
                AssistStatus::Completed,
                Some(json!({ "asset": "doorway.png" })),
            )
            .await;
        tracing::info!("Assistance request {} completed", request_id);
    }

    bridge.shutdown().await;
    tracing::info!("{} demo finished", app_name);
    Ok(())
}
