//! Agent 事件总线
//!
//! 进程内按事件类型分发的发布/订阅总线。回调并发执行且彼此隔离，
//! 单个订阅者失败只记日志，不影响其他订阅者和发布方。最近事件
//! 保存在固定容量的环形缓冲里，供诊断与测试回看。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

/// 默认保留的事件条数
pub const EVENT_HISTORY_LIMIT: usize = 100;

/// 一条 agent 事件
#[derive(Debug, Clone, Serialize)]
pub struct AgentEvent {
    pub event_id: String,
    pub source_agent_id: String,
    pub event_type: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

/// 订阅回调：拿到事件副本，返回处理结果
pub type EventCallback =
    Arc<dyn Fn(AgentEvent) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

pub type SubscriptionId = u64;

/// 事件总线
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, EventCallback)>>>,
    history: RwLock<VecDeque<AgentEvent>>,
    history_limit: usize,
    next_subscription: AtomicU64,
    seq: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_limit(EVENT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            history_limit,
            next_subscription: AtomicU64::new(1),
            seq: AtomicU64::new(0),
        }
    }

    /// 订阅某一类型的事件
    pub async fn subscribe(&self, event_type: &str, callback: EventCallback) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .write()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push((id, callback));
        tracing::debug!("subscription {} added for event type '{}'", id, event_type);
        id
    }

    /// 取消订阅；返回是否确实移除了一个回调
    pub async fn unsubscribe(&self, event_type: &str, subscription_id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let Some(entries) = subscribers.get_mut(event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(id, _)| *id != subscription_id);
        let removed = entries.len() < before;
        if entries.is_empty() {
            subscribers.remove(event_type);
        }
        removed
    }

    /// 发布事件：先进历史，再并发通知该类型的全部订阅者
    pub async fn publish(
        &self,
        source_agent_id: &str,
        event_type: &str,
        data: Value,
    ) -> AgentEvent {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let event = AgentEvent {
            event_id: format!(
                "evt_{}_{}_{}_{}",
                source_agent_id,
                event_type,
                Utc::now().timestamp(),
                seq
            ),
            source_agent_id: source_agent_id.to_string(),
            event_type: event_type.to_string(),
            data,
            timestamp: Utc::now(),
        };

        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        let callbacks: Vec<(SubscriptionId, EventCallback)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .get(event_type)
                .map(|entries| entries.to_vec())
                .unwrap_or_default()
        };
        if callbacks.is_empty() {
            return event;
        }

        let results = join_all(callbacks.iter().map(|(_, callback)| callback(event.clone()))).await;
        for ((subscription_id, _), result) in callbacks.iter().zip(results) {
            if let Err(message) = result {
                tracing::warn!(
                    "subscriber {} failed handling event {}: {}",
                    subscription_id,
                    event.event_id,
                    message
                );
            }
        }
        event
    }

    /// 最近的事件，时间先后排列（最新在末尾）
    pub async fn recent_events(&self, limit: usize) -> Vec<AgentEvent> {
        let history = self.history.read().await;
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(counter: Arc<AtomicUsize>) -> EventCallback {
        Arc::new(move |_event| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    fn failing_callback() -> EventCallback {
        Arc::new(|_event| Box::pin(async { Err("subscriber exploded".to_string()) }))
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_subscribers() {
        let bus = EventBus::new();
        let progress = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        bus.subscribe("task_progress_update", counting_callback(progress.clone()))
            .await;
        bus.subscribe("error_encountered", counting_callback(errors.clone()))
            .await;

        bus.publish("pixel_forge", "task_progress_update", json!({ "pct": 50 }))
            .await;

        assert_eq!(progress.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_subscriber_is_isolated() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("resource_generated", failing_callback()).await;
        bus.subscribe("resource_generated", counting_callback(counter.clone()))
            .await;

        let event = bus
            .publish("pixel_forge", "resource_generated", json!({ "asset": "a.png" }))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(event.event_type, "resource_generated");
    }

    #[tokio::test]
    async fn history_ring_drops_oldest_events() {
        let bus = EventBus::with_history_limit(3);
        for i in 0..5 {
            bus.publish("src", "tick", json!({ "i": i })).await;
        }

        let recent = bus.recent_events(10).await;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].data["i"], 2);
        assert_eq!(recent[2].data["i"], 4);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus
            .subscribe("tick", counting_callback(counter.clone()))
            .await;

        bus.publish("src", "tick", json!({})).await;
        assert!(bus.unsubscribe("tick", id).await);
        bus.publish("src", "tick", json!({})).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe("tick", id).await);
    }

    #[tokio::test]
    async fn event_ids_stay_unique_within_one_second() {
        let bus = EventBus::new();
        let a = bus.publish("src", "tick", json!({})).await;
        let b = bus.publish("src", "tick", json!({})).await;
        assert_ne!(a.event_id, b.event_id);
        assert!(a.event_id.starts_with("evt_src_tick_"));
    }
}
