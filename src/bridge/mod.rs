//! 工具链桥接：FIFO 队列、惰性单 worker 与结果缓存
//!
//! 桥接把外部工具链调用（图像生成、概念设计等）收拢到一个串行队列里：
//! 调用方 `submit` 后拿到 oneshot future，后台 worker 逐条出队并交给
//! 注入的 `BridgeHandler` 处理。worker 按需启动，队列排空即退出；
//! 同一把锁同时守护队列与运行标记，保证任意时刻至多一个 worker。
//!
//! 结果缓存以处理器给出的规范化键存储，进程生命周期内不淘汰
//! （已知的资源增长风险，按原设计保留）。超时由调用方用
//! `tokio::time::timeout` 包裹 `submit` 自行控制，桥接本身不计时。

pub mod muse;
pub mod params;
pub mod retro;

pub use muse::MuseHandler;
pub use retro::RetroForgeHandler;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 桥接层错误
#[derive(Debug, Error)]
pub enum BridgeError {
    /// 处理器执行失败或请求类型不受支持
    #[error("bridge execution failed: {0}")]
    Execution(String),
    /// 桥接正在关闭，不再接受或处理请求
    #[error("bridge is shutting down")]
    ShuttingDown,
    /// worker 在回复前丢弃了应答通道
    #[error("bridge reply channel closed")]
    ChannelClosed,
}

/// 入队的一次工具链请求
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRequest {
    pub id: String,
    pub request_type: String,
    pub payload: Value,
    pub agent_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl BridgeRequest {
    pub fn new(request_type: impl Into<String>, payload: Value, agent_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request_type: request_type.into(),
            payload,
            agent_id,
            submitted_at: Utc::now(),
        }
    }
}

/// 具体工具链的处理器接口
///
/// `cache_key` 返回 `None` 表示该请求不参与缓存（默认）。
#[async_trait]
pub trait BridgeHandler: Send + Sync {
    fn name(&self) -> &str;

    fn supported_types(&self) -> &[&str];

    async fn handle(&self, request: &BridgeRequest) -> Result<Value, String>;

    fn cache_key(&self, _request_type: &str, _payload: &Value) -> Option<String> {
        None
    }
}

type ReplySender = oneshot::Sender<Result<Value, BridgeError>>;

/// 队列与 worker 运行标记共用一把锁，惰性启动才不会竞态
struct BridgeState {
    queue: VecDeque<(BridgeRequest, ReplySender)>,
    worker_running: bool,
}

/// 通用工具链桥接
pub struct ToolRequestBridge {
    handler: Arc<dyn BridgeHandler>,
    state: Mutex<BridgeState>,
    cache: RwLock<HashMap<String, Value>>,
    cache_enabled: bool,
    cancel: CancellationToken,
}

impl ToolRequestBridge {
    pub fn new(handler: Arc<dyn BridgeHandler>) -> Arc<Self> {
        Self::with_cache(handler, true)
    }

    pub fn with_cache(handler: Arc<dyn BridgeHandler>, cache_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            handler,
            state: Mutex::new(BridgeState {
                queue: VecDeque::new(),
                worker_running: false,
            }),
            cache: RwLock::new(HashMap::new()),
            cache_enabled,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handler_name(&self) -> &str {
        self.handler.name()
    }

    /// 提交一次请求并等待结果
    ///
    /// 命中缓存时直接返回，不入队也不唤醒 worker。
    pub async fn submit(
        self: &Arc<Self>,
        request_type: &str,
        payload: Value,
        agent_id: Option<String>,
    ) -> Result<Value, BridgeError> {
        if self.cancel.is_cancelled() {
            return Err(BridgeError::ShuttingDown);
        }
        if !self.handler.supported_types().contains(&request_type) {
            return Err(BridgeError::Execution(format!(
                "Unsupported request type '{}' for handler '{}'",
                request_type,
                self.handler.name()
            )));
        }

        let cache_key = if self.cache_enabled {
            self.handler.cache_key(request_type, &payload)
        } else {
            None
        };
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cache.read().await.get(key) {
                tracing::debug!(
                    "bridge cache hit for '{}' on handler '{}'",
                    request_type,
                    self.handler.name()
                );
                return Ok(hit.clone());
            }
        }

        let request = BridgeRequest::new(request_type, payload, agent_id);
        let request_id = request.id.clone();
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            state.queue.push_back((request, tx));
            if !state.worker_running {
                state.worker_running = true;
                let bridge = Arc::clone(self);
                tokio::spawn(async move { bridge.worker_loop().await });
            }
        }
        tracing::debug!("bridge request {} queued ({})", request_id, request_type);

        rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }

    async fn worker_loop(self: Arc<Self>) {
        tracing::debug!("bridge worker started for handler '{}'", self.handler.name());
        loop {
            let (request, reply) = {
                let mut state = self.state.lock().await;
                match state.queue.pop_front() {
                    Some(entry) => entry,
                    None => {
                        state.worker_running = false;
                        tracing::debug!("bridge queue drained, worker exiting");
                        return;
                    }
                }
            };

            if self.cancel.is_cancelled() {
                let _ = reply.send(Err(BridgeError::ShuttingDown));
                continue;
            }

            match self.handler.handle(&request).await {
                Ok(value) => {
                    if self.cache_enabled {
                        if let Some(key) =
                            self.handler.cache_key(&request.request_type, &request.payload)
                        {
                            self.cache.write().await.insert(key, value.clone());
                        }
                    }
                    let _ = reply.send(Ok(value));
                }
                Err(message) => {
                    tracing::warn!("bridge request {} failed: {}", request.id, message);
                    let _ = reply.send(Err(BridgeError::Execution(message)));
                }
            }
        }
    }

    /// 关闭桥接：拒绝后续提交，并让仍在排队的请求以错误结束
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let mut state = self.state.lock().await;
        while let Some((request, reply)) = state.queue.pop_front() {
            tracing::debug!("bridge request {} dropped during shutdown", request.id);
            let _ = reply.send(Err(BridgeError::ShuttingDown));
        }
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn worker_running(&self) -> bool {
        self.state.lock().await.worker_running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RecordingHandler {
        calls: AtomicUsize,
        seen: Mutex<Vec<i64>>,
        delay: Duration,
        cacheable: bool,
    }

    impl RecordingHandler {
        fn new(delay_ms: u64, cacheable: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                delay: Duration::from_millis(delay_ms),
                cacheable,
            })
        }
    }

    #[async_trait]
    impl BridgeHandler for RecordingHandler {
        fn name(&self) -> &str {
            "recording"
        }

        fn supported_types(&self) -> &[&str] {
            &["MOCK_WORK", "MOCK_FAIL"]
        }

        async fn handle(&self, request: &BridgeRequest) -> Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(seq) = request.payload.get("seq").and_then(Value::as_i64) {
                self.seen.lock().await.push(seq);
            }
            tokio::time::sleep(self.delay).await;
            if request.request_type == "MOCK_FAIL" {
                return Err("simulated handler failure".to_string());
            }
            Ok(json!({ "echo": request.payload }))
        }

        fn cache_key(&self, request_type: &str, payload: &Value) -> Option<String> {
            if self.cacheable {
                Some(format!("{}:{}", request_type, payload))
            } else {
                None
            }
        }
    }

    #[tokio::test]
    async fn fifo_order_is_preserved_under_concurrent_submits() {
        let handler = RecordingHandler::new(5, false);
        let bridge = ToolRequestBridge::with_cache(handler.clone(), false);

        let mut joins = Vec::new();
        for seq in 0..4 {
            let bridge = Arc::clone(&bridge);
            joins.push(tokio::spawn(async move {
                bridge.submit("MOCK_WORK", json!({ "seq": seq }), None).await
            }));
            tokio::task::yield_now().await;
        }
        for join in joins {
            join.await.unwrap().unwrap();
        }

        assert_eq!(*handler.seen.lock().await, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn worker_exits_after_draining_and_restarts_on_demand() {
        let handler = RecordingHandler::new(1, false);
        let bridge = ToolRequestBridge::with_cache(handler.clone(), false);
        assert!(!bridge.worker_running().await);

        bridge.submit("MOCK_WORK", json!({ "seq": 1 }), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!bridge.worker_running().await);
        assert_eq!(bridge.queue_len().await, 0);

        bridge.submit("MOCK_WORK", json!({ "seq": 2 }), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!bridge.worker_running().await);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_hit_resolves_without_invoking_handler_again() {
        let handler = RecordingHandler::new(1, true);
        let bridge = ToolRequestBridge::new(handler.clone());

        let first = bridge
            .submit("MOCK_WORK", json!({ "seq": 7 }), None)
            .await
            .unwrap();
        let second = bridge
            .submit("MOCK_WORK", json!({ "seq": 7 }), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.cache_len().await, 1);
    }

    #[tokio::test]
    async fn disabled_cache_invokes_handler_every_time() {
        let handler = RecordingHandler::new(1, true);
        let bridge = ToolRequestBridge::with_cache(handler.clone(), false);

        bridge.submit("MOCK_WORK", json!({ "seq": 9 }), None).await.unwrap();
        bridge.submit("MOCK_WORK", json!({ "seq": 9 }), None).await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.cache_len().await, 0);
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected_without_queueing() {
        let handler = RecordingHandler::new(1, false);
        let bridge = ToolRequestBridge::new(handler.clone());

        let err = bridge
            .submit("NOT_A_TYPE", json!({}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Execution(_)));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.queue_len().await, 0);
    }

    #[tokio::test]
    async fn handler_failure_resolves_error_and_worker_survives() {
        let handler = RecordingHandler::new(1, false);
        let bridge = ToolRequestBridge::new(handler.clone());

        let err = bridge
            .submit("MOCK_FAIL", json!({ "seq": 1 }), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Execution(_)));

        let ok = bridge
            .submit("MOCK_WORK", json!({ "seq": 2 }), None)
            .await
            .unwrap();
        assert_eq!(ok["echo"]["seq"], 2);
    }

    #[tokio::test]
    async fn shutdown_fails_queued_requests_and_rejects_new_ones() {
        let handler = RecordingHandler::new(200, false);
        let bridge = ToolRequestBridge::new(handler.clone());

        // 第一条占住 worker，第二条留在队列里
        let busy = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge.submit("MOCK_WORK", json!({ "seq": 1 }), None).await
            })
        };
        tokio::task::yield_now().await;
        let queued = {
            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                bridge.submit("MOCK_WORK", json!({ "seq": 2 }), None).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        bridge.shutdown().await;

        assert!(matches!(
            queued.await.unwrap().unwrap_err(),
            BridgeError::ShuttingDown
        ));
        assert!(matches!(
            bridge
                .submit("MOCK_WORK", json!({ "seq": 3 }), None)
                .await
                .unwrap_err(),
            BridgeError::ShuttingDown
        ));
        // 已被 worker 取走的请求允许正常完成
        assert!(busy.await.unwrap().is_ok());
    }
}
