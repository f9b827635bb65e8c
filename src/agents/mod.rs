//! Agent 抽象：统一的任务处理契约
//!
//! 所有 agent 实现 Agent trait（agent_id / capabilities / process），
//! 由 AgentRegistry 按 id 注册与查找，任务图的 dispatch 节点通过它调度。

pub mod builtin;
pub mod registry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use builtin::{
    CodeWeaverAgent, DocumentationSentinelAgent, LevelArchitectAgent, PixelForgeAgent,
};
pub use registry::{AgentDescriptor, AgentRegistry};

/// 派发给 agent 的任务细节：任务 id、创建时的参数、触发本次派发的事件
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetails {
    pub task_id: String,
    pub parameters: Value,
    pub current_event: Value,
}

/// Agent 处理结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    CompletedSuccessfully,
    Failed,
    InProgress,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::CompletedSuccessfully => "completed_successfully",
            AgentStatus::Failed => "failed",
            AgentStatus::InProgress => "in_progress",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent 处理结果
///
/// source_agent_id / event_type 未填时由 dispatch 节点补上目标 agent 的 id
/// 与默认事件类型，保证 agent_responses 记录在真实 id 之下。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub status: AgentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl AgentReply {
    pub fn completed(message: impl Into<String>) -> Self {
        Self::with_status(AgentStatus::CompletedSuccessfully, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::with_status(AgentStatus::Failed, message)
    }

    pub fn in_progress(message: impl Into<String>) -> Self {
        Self::with_status(AgentStatus::InProgress, message)
    }

    fn with_status(status: AgentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            output: None,
            source_agent_id: None,
            event_type: None,
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }
}

/// Agent trait：id、能力列表、异步处理
#[async_trait]
pub trait Agent: Send + Sync {
    /// 注册与派发使用的稳定 id
    fn agent_id(&self) -> &str;

    /// 能力标签（协作管理器按此匹配协助请求）
    fn capabilities(&self) -> Vec<String>;

    /// 处理一次派发；Err 由 dispatch 节点捕获进任务状态，不会中断任务图
    async fn process(&self, task: TaskDetails) -> Result<AgentReply, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_status_serializes_snake_case() {
        let json = serde_json::to_string(&AgentStatus::CompletedSuccessfully).unwrap();
        assert_eq!(json, "\"completed_successfully\"");
    }

    #[test]
    fn reply_builder_fills_fields() {
        let reply = AgentReply::completed("done")
            .with_output(serde_json::json!({"path": "a.png"}))
            .with_event_type("asset_ready");
        assert_eq!(reply.status, AgentStatus::CompletedSuccessfully);
        assert_eq!(reply.message.as_deref(), Some("done"));
        assert_eq!(reply.event_type.as_deref(), Some("asset_ready"));
        assert!(reply.source_agent_id.is_none());
    }
}
