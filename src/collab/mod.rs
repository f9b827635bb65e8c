//! 多智能体协作协议
//!
//! 管理 agent 的能力档案与互助请求：一个 agent 在任务中发现自己
//! 缺少某项能力时，可以按"注册顺序里第一个空闲且具备该能力"的
//! 策略找到帮手，并派发一个合成子任务。档案扫描顺序是确定性的，
//! 因此匹配结果可复现。

pub mod events;

pub use events::{AgentEvent, EventBus, EventCallback, SubscriptionId};

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

/// Agent 当前可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAvailability {
    Idle,
    ProcessingTask,
    AwaitingAssistance,
}

impl AgentAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ProcessingTask => "processing_task",
            Self::AwaitingAssistance => "awaiting_assistance",
        }
    }
}

impl std::fmt::Display for AgentAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 互助请求生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistStatus {
    Pending,
    DispatchedToMcp,
    Completed,
    Failed,
    Rejected,
}

impl AssistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DispatchedToMcp => "dispatched_to_mcp",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// 终态：结清后帮手回到空闲
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }
}

impl std::fmt::Display for AssistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent 能力与状态档案
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub capabilities: Vec<String>,
    pub current_task_id: Option<String>,
    pub availability: AgentAvailability,
}

/// 一次互助请求
#[derive(Debug, Clone, Serialize)]
pub struct AssistanceRequest {
    pub request_id: String,
    pub requesting_agent_id: String,
    pub original_task_id: String,
    pub required_capability: String,
    pub task_details: Value,
    pub status: AssistStatus,
    pub assigned_agent_id: Option<String>,
}

/// 档案用 Vec 保持注册顺序，匹配扫描才可复现
struct CollabState {
    profiles: Vec<AgentProfile>,
    requests: HashMap<String, AssistanceRequest>,
}

/// 协作管理器
pub struct CollaborationManager {
    state: RwLock<CollabState>,
}

impl Default for CollaborationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborationManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CollabState {
                profiles: Vec::new(),
                requests: HashMap::new(),
            }),
        }
    }

    /// 注册 agent 档案；重复注册原位覆盖，不改变扫描顺序
    pub async fn register_agent(&self, agent_id: &str, capabilities: Vec<String>) {
        let mut state = self.state.write().await;
        let profile = AgentProfile {
            agent_id: agent_id.to_string(),
            capabilities: capabilities.clone(),
            current_task_id: None,
            availability: AgentAvailability::Idle,
        };
        match state.profiles.iter_mut().find(|p| p.agent_id == agent_id) {
            Some(existing) => *existing = profile,
            None => state.profiles.push(profile),
        }
        tracing::info!(
            "Agent '{}' registered with capabilities: {:?}",
            agent_id,
            capabilities
        );
    }

    /// 更新 agent 可用性；未注册的 agent 只记 warning
    pub async fn update_status(
        &self,
        agent_id: &str,
        availability: AgentAvailability,
        current_task_id: Option<String>,
    ) {
        let mut state = self.state.write().await;
        match state.profiles.iter_mut().find(|p| p.agent_id == agent_id) {
            Some(profile) => {
                profile.availability = availability;
                profile.current_task_id = current_task_id.clone();
                tracing::debug!(
                    "Agent '{}' status updated to '{}' (task: {:?})",
                    agent_id,
                    availability,
                    current_task_id
                );
            }
            None => {
                tracing::warn!("Attempted to update status for unregistered agent '{}'", agent_id);
            }
        }
    }

    /// 发起互助：按注册顺序找第一个空闲且具备能力的帮手
    ///
    /// 找不到（或请求方未注册）返回 `None`，由调用方决定如何上报。
    pub async fn request_assistance(
        &self,
        requesting_agent_id: &str,
        original_task_id: &str,
        required_capability: &str,
        task_details: Value,
    ) -> Option<String> {
        let mut state = self.state.write().await;
        if !state.profiles.iter().any(|p| p.agent_id == requesting_agent_id) {
            tracing::error!(
                "Unregistered agent '{}' cannot request assistance",
                requesting_agent_id
            );
            return None;
        }
        tracing::info!(
            "Agent '{}' requests assistance for task '{}' requiring capability '{}'",
            requesting_agent_id,
            original_task_id,
            required_capability
        );

        let helper_id = state
            .profiles
            .iter()
            .find(|p| {
                p.agent_id != requesting_agent_id
                    && p.availability == AgentAvailability::Idle
                    && p.capabilities.iter().any(|c| c == required_capability)
            })
            .map(|p| p.agent_id.clone());
        let Some(helper_id) = helper_id else {
            tracing::warn!(
                "No suitable idle agent with capability '{}' for task '{}'",
                required_capability,
                original_task_id
            );
            return None;
        };

        let request_id = format!("assist_{}_{}", original_task_id, Utc::now().timestamp());
        let sub_task_id = format!("subtask_{}", request_id);
        let request = AssistanceRequest {
            request_id: request_id.clone(),
            requesting_agent_id: requesting_agent_id.to_string(),
            original_task_id: original_task_id.to_string(),
            required_capability: required_capability.to_string(),
            task_details,
            status: AssistStatus::DispatchedToMcp,
            assigned_agent_id: Some(helper_id.clone()),
        };
        state.requests.insert(request_id.clone(), request);
        if let Some(helper) = state.profiles.iter_mut().find(|p| p.agent_id == helper_id) {
            helper.availability = AgentAvailability::ProcessingTask;
            helper.current_task_id = Some(sub_task_id.clone());
        }
        tracing::info!(
            "Dispatched assistance sub-task '{}' to agent '{}' for request '{}'",
            sub_task_id,
            helper_id,
            request_id
        );
        Some(request_id)
    }

    /// 更新互助请求状态；终态会释放帮手
    pub async fn update_request_status(
        &self,
        request_id: &str,
        status: AssistStatus,
        result_data: Option<Value>,
    ) {
        let mut state = self.state.write().await;
        let Some(request) = state.requests.get_mut(request_id) else {
            tracing::warn!("Attempted to update unknown assistance request '{}'", request_id);
            return;
        };
        request.status = status;
        let helper = request.assigned_agent_id.clone();
        tracing::info!(
            "Assistance request '{}' status updated to '{}' (result: {:?})",
            request_id,
            status,
            result_data
        );
        if status.is_terminal() {
            if let Some(helper_id) = helper {
                if let Some(profile) =
                    state.profiles.iter_mut().find(|p| p.agent_id == helper_id)
                {
                    profile.availability = AgentAvailability::Idle;
                    profile.current_task_id = None;
                    tracing::debug!("Assisting agent '{}' released back to idle", helper_id);
                }
            }
        }
    }

    pub async fn get_request(&self, request_id: &str) -> Option<AssistanceRequest> {
        self.state.read().await.requests.get(request_id).cloned()
    }

    pub async fn profiles(&self) -> Vec<AgentProfile> {
        self.state.read().await.profiles.clone()
    }
}
