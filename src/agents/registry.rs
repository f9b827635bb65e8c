//! Agent 注册表
//!
//! 按 agent_id 存储 Arc<dyn Agent>，注册同名 id 时静默覆盖。

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::Agent;

/// 对外展示的 agent 摘要
#[derive(Debug, Clone, Serialize)]
pub struct AgentDescriptor {
    pub agent_id: String,
    pub capabilities: Vec<String>,
}

/// Agent 注册表：register / get / contains / list
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let agent_id = agent.agent_id().to_string();
        tracing::info!(
            "Registered agent '{}' with capabilities: {:?}",
            agent_id,
            agent.capabilities()
        );
        self.agents.write().await.insert(agent_id, agent);
    }

    pub async fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    /// 按 agent_id 排序的摘要列表（输出稳定，便于展示与测试）
    pub async fn list(&self) -> Vec<AgentDescriptor> {
        let mut descriptors: Vec<AgentDescriptor> = self
            .agents
            .read()
            .await
            .values()
            .map(|a| AgentDescriptor {
                agent_id: a.agent_id().to_string(),
                capabilities: a.capabilities(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentReply, TaskDetails};
    use async_trait::async_trait;

    struct EchoAgent {
        id: String,
    }

    #[async_trait]
    impl Agent for EchoAgent {
        fn agent_id(&self) -> &str {
            &self.id
        }

        fn capabilities(&self) -> Vec<String> {
            vec!["echo".to_string()]
        }

        async fn process(&self, task: TaskDetails) -> Result<AgentReply, String> {
            Ok(AgentReply::completed(format!("echo {}", task.task_id)))
        }
    }

    #[tokio::test]
    async fn register_then_get_and_list() {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(EchoAgent { id: "b_agent".into() }))
            .await;
        registry
            .register(Arc::new(EchoAgent { id: "a_agent".into() }))
            .await;

        assert!(registry.contains("a_agent").await);
        assert!(registry.get("missing").await.is_none());

        let listed = registry.list().await;
        assert_eq!(listed.len(), 2);
        // 列表按 id 排序
        assert_eq!(listed[0].agent_id, "a_agent");
        assert_eq!(listed[1].agent_id, "b_agent");
    }

    #[tokio::test]
    async fn duplicate_registration_replaces() {
        let registry = AgentRegistry::new();
        registry
            .register(Arc::new(EchoAgent { id: "dup".into() }))
            .await;
        registry
            .register(Arc::new(EchoAgent { id: "dup".into() }))
            .await;
        assert_eq!(registry.list().await.len(), 1);
    }
}
