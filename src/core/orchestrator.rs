//! 控制平面门面
//!
//! 组合根：把检查点存储、任务图、agent 注册表、协作管理器、事件总线
//! 与提示词注册表装配成一个对外的任务编排接口。调用方只和这里的
//! 五个操作打交道：创建任务、投递事件、查询状态、注册 agent、列举 agent。

use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::agents::{Agent, AgentDescriptor, AgentRegistry};
use crate::collab::{CollaborationManager, EventBus};
use crate::core::checkpoint::CheckpointStore;
use crate::core::error::OrchestratorError;
use crate::core::graph::GraphEngine;
use crate::core::state::TaskState;
use crate::prompts::PromptRegistry;

/// 关卡设计提示词，随控制平面一起预置
const LEVEL_ARCHITECT_PROMPT: &str = r#"System: You are a virtual environment architect specializing in residential spaces.
- Reconstruct layouts from reference images with ±2% dimensional accuracy
- Maintain architectural coherence across all scene elements
- Generate UV maps optimized for retro pixel art pipelines

User Input:
{
  "reference_image": "{reference_image}",
  "style_constraints": "{style_constraints}",
  "interactive_elements": "{interactive_elements}"
}
"#;

/// 任务编排门面
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    graph: GraphEngine,
    collaboration: Arc<CollaborationManager>,
    events: Arc<EventBus>,
    prompts: Arc<PromptRegistry>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn CheckpointStore>) -> Self {
        Self::with_event_history_limit(store, crate::collab::events::EVENT_HISTORY_LIMIT)
    }

    pub fn with_event_history_limit(store: Arc<dyn CheckpointStore>, limit: usize) -> Self {
        let registry = Arc::new(AgentRegistry::new());
        let graph = GraphEngine::new(store, Arc::clone(&registry));
        Self {
            registry,
            graph,
            collaboration: Arc::new(CollaborationManager::new()),
            events: Arc::new(EventBus::with_history_limit(limit)),
            prompts: Arc::new(PromptRegistry::new()),
        }
    }

    /// 预置内置提示词；重复调用会因重名注册而报错
    pub async fn seed_default_prompts(&self) -> Result<(), OrchestratorError> {
        self.prompts
            .register(
                "level_architect_design_prompt",
                LEVEL_ARCHITECT_PROMPT,
                vec![
                    "reference_image".to_string(),
                    "style_constraints".to_string(),
                    "interactive_elements".to_string(),
                ],
                Some("level_architect".to_string()),
            )
            .await?;
        tracing::info!("Registered 'level_architect_design_prompt' with prompt registry");
        Ok(())
    }

    /// 注册全部内置 agent（关卡设计 agent 接上提示词注册表）
    pub async fn install_builtin_agents(&self) {
        use crate::agents::{
            CodeWeaverAgent, DocumentationSentinelAgent, LevelArchitectAgent, PixelForgeAgent,
        };
        self.register_agent(Arc::new(PixelForgeAgent::new())).await;
        self.register_agent(Arc::new(LevelArchitectAgent::new(Some(Arc::clone(
            &self.prompts,
        )))))
        .await;
        self.register_agent(Arc::new(CodeWeaverAgent::new())).await;
        self.register_agent(Arc::new(DocumentationSentinelAgent::default()))
            .await;
    }

    /// 创建任务并立刻推进一轮
    ///
    /// 目标 agent 未注册时不在这里拦截：图会把 AGENT_NOT_FOUND 记进
    /// 任务状态并照常持久化，调用方从返回的状态里看到错误。
    pub async fn create_task(
        &self,
        action_type: &str,
        target_agent_id: &str,
        parameters: Value,
    ) -> Result<TaskState, OrchestratorError> {
        let task_id = Uuid::new_v4().to_string();
        let initial_input = json!({
            "task_id": task_id,
            "action_type": action_type,
            "target_agent_id": target_agent_id,
            "parameters": parameters,
            "original_request_id": Uuid::new_v4().to_string(),
        });
        tracing::info!(
            "Creating task {} (action '{}', target '{}')",
            task_id,
            action_type,
            target_agent_id
        );

        self.graph.initialize(&task_id, &initial_input);
        self.graph.advance(&task_id, initial_input).await
    }

    /// 向既有任务投递一条事件，完整跑一轮节点序列
    pub async fn post_event(
        &self,
        task_id: &str,
        event_payload: Value,
    ) -> Result<TaskState, OrchestratorError> {
        tracing::info!("Posting event to task {}", task_id);
        self.graph.advance(task_id, event_payload).await
    }

    /// 查询任务当前状态；没有检查点视为任务不存在
    pub async fn get_task_status(&self, task_id: &str) -> Result<TaskState, OrchestratorError> {
        self.graph
            .get_state(task_id)
            .await?
            .ok_or_else(|| OrchestratorError::TaskNotFound(task_id.to_string()))
    }

    /// 同时登记执行注册表与协作档案
    pub async fn register_agent(&self, agent: Arc<dyn Agent>) {
        let agent_id = agent.agent_id().to_string();
        let capabilities = agent.capabilities();
        self.registry.register(agent).await;
        self.collaboration
            .register_agent(&agent_id, capabilities)
            .await;
    }

    pub async fn list_agents(&self) -> Vec<AgentDescriptor> {
        self.registry.list().await
    }

    pub async fn register_prompt(
        &self,
        name: &str,
        template: &str,
        required_variables: Vec<String>,
        agent_type: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.prompts
            .register(name, template, required_variables, agent_type)
            .await
    }

    pub async fn resolve_prompt(
        &self,
        name: &str,
        variables: &serde_json::Map<String, Value>,
    ) -> Result<String, OrchestratorError> {
        self.prompts.resolve(name, variables).await
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn collaboration(&self) -> Arc<CollaborationManager> {
        Arc::clone(&self.collaboration)
    }

    pub fn prompts(&self) -> Arc<PromptRegistry> {
        Arc::clone(&self.prompts)
    }
}
