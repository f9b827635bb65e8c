//! 内置游戏开发 agent：确定性 mock 实现
//!
//! 覆盖四个典型角色：像素资产生成（pixel_forge）、关卡设计（level_architect）、
//! 脚本编写（code_weaver）、文档哨兵（documentation_sentinel）。
//! 全部离线确定性运行，不调用任何生成后端。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Agent, AgentReply, TaskDetails};
use crate::prompts::PromptRegistry;

/// 从任务参数或触发事件里取出描述文本
fn prompt_from(task: &TaskDetails) -> String {
    for key in ["description", "prompt"] {
        if let Some(text) = task.parameters.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
        if let Some(text) = task.current_event.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    "a generic game asset".to_string()
}

/// 进程内确定性哈希，用于生成稳定的 mock 资产路径
fn stable_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// 2D/3D 占位资产生成与摆放
#[derive(Default)]
pub struct PixelForgeAgent;

impl PixelForgeAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for PixelForgeAgent {
    fn agent_id(&self) -> &str {
        "pixel_forge"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "asset_generation_2d".to_string(),
            "asset_generation_3d_placeholder".to_string(),
            "asset_placement".to_string(),
        ]
    }

    async fn process(&self, task: TaskDetails) -> Result<AgentReply, String> {
        let prompt = prompt_from(&task);
        let action = task
            .current_event
            .get("action_type")
            .and_then(Value::as_str)
            .unwrap_or("generate_asset");
        tracing::info!(
            "pixel_forge: task {} action '{}' for prompt '{}'",
            task.task_id,
            action,
            prompt
        );

        let path = format!(
            "generated_assets/pixel_forge/asset_{:08x}.png",
            stable_hash(&prompt) as u32
        );
        Ok(AgentReply::completed(format!("Asset generated for prompt '{}'.", prompt))
            .with_output(json!({
                "asset_type": "image",
                "prompt": prompt,
                "path": path,
            }))
            .with_event_type("pixel_forge_complete"))
    }
}

/// 关卡结构设计；可选接入提示词注册表解析设计模板
pub struct LevelArchitectAgent {
    prompts: Option<Arc<PromptRegistry>>,
}

impl LevelArchitectAgent {
    pub fn new(prompts: Option<Arc<PromptRegistry>>) -> Self {
        Self { prompts }
    }
}

#[async_trait]
impl Agent for LevelArchitectAgent {
    fn agent_id(&self) -> &str {
        "level_architect"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "level_design".to_string(),
            "procedural_generation_guidance".to_string(),
        ]
    }

    async fn process(&self, task: TaskDetails) -> Result<AgentReply, String> {
        let mut variables = serde_json::Map::new();
        for key in ["reference_image", "style_constraints", "interactive_elements"] {
            let value = task
                .parameters
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::String("unspecified".to_string()));
            variables.insert(key.to_string(), value);
        }

        let resolved_prompt = match &self.prompts {
            Some(registry) => match registry
                .resolve("level_architect_design_prompt", &variables)
                .await
            {
                Ok(prompt) => Some(prompt),
                Err(e) => {
                    tracing::warn!("level_architect: prompt resolution failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(AgentReply::completed("Level layout concept generated.")
            .with_output(json!({
                "concept": format!("Blocked-out layout for '{}'", prompt_from(&task)),
                "rooms": ["entry", "main_hall", "workshop"],
                "resolved_prompt": resolved_prompt,
            }))
            .with_event_type("level_architect_complete"))
    }
}

/// 游戏脚本与逻辑生成
#[derive(Default)]
pub struct CodeWeaverAgent;

impl CodeWeaverAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Agent for CodeWeaverAgent {
    fn agent_id(&self) -> &str {
        "code_weaver"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "script_generation".to_string(),
            "game_logic_implementation".to_string(),
            "ui_scripting".to_string(),
        ]
    }

    async fn process(&self, task: TaskDetails) -> Result<AgentReply, String> {
        let prompt = prompt_from(&task);
        let snippet = format!(
            "public class GeneratedBehaviour : MonoBehaviour {{\n    // {}\n}}",
            prompt
        );
        Ok(AgentReply::completed("Script generated.")
            .with_output(json!({
                "language": "csharp",
                "script": snippet,
            }))
            .with_event_type("code_weaver_complete"))
    }
}

/// 文档变更监控
pub struct DocumentationSentinelAgent {
    watch_paths: Vec<String>,
}

impl Default for DocumentationSentinelAgent {
    fn default() -> Self {
        Self {
            watch_paths: vec!["docs/".to_string()],
        }
    }
}

impl DocumentationSentinelAgent {
    pub fn new(watch_paths: Vec<String>) -> Self {
        Self { watch_paths }
    }
}

#[async_trait]
impl Agent for DocumentationSentinelAgent {
    fn agent_id(&self) -> &str {
        "documentation_sentinel"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "documentation_monitoring".to_string(),
            "change_detection".to_string(),
        ]
    }

    async fn process(&self, _task: TaskDetails) -> Result<AgentReply, String> {
        Ok(AgentReply::completed("Documentation sources checked.")
            .with_output(json!({
                "monitored_paths": self.watch_paths,
                "changes_detected": 0,
            }))
            .with_event_type("documentation_sentinel_complete"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentStatus;

    fn task_with_description(desc: &str) -> TaskDetails {
        TaskDetails {
            task_id: "t-1".to_string(),
            parameters: json!({ "description": desc }),
            current_event: json!({}),
        }
    }

    #[tokio::test]
    async fn pixel_forge_output_is_deterministic() {
        let agent = PixelForgeAgent::new();
        let a = agent.process(task_with_description("mossy stone")).await.unwrap();
        let b = agent.process(task_with_description("mossy stone")).await.unwrap();

        assert_eq!(a.status, AgentStatus::CompletedSuccessfully);
        assert_eq!(a.event_type.as_deref(), Some("pixel_forge_complete"));
        assert_eq!(
            a.output.unwrap()["path"].as_str().unwrap(),
            b.output.unwrap()["path"].as_str().unwrap()
        );
    }

    #[tokio::test]
    async fn level_architect_resolves_registered_prompt() {
        let prompts = Arc::new(PromptRegistry::new());
        prompts
            .register(
                "level_architect_design_prompt",
                "Design from {reference_image} with {style_constraints} and {interactive_elements}",
                vec![
                    "reference_image".into(),
                    "style_constraints".into(),
                    "interactive_elements".into(),
                ],
                Some("level_architect".into()),
            )
            .await
            .unwrap();

        let agent = LevelArchitectAgent::new(Some(prompts));
        let reply = agent
            .process(TaskDetails {
                task_id: "t-2".to_string(),
                parameters: json!({
                    "reference_image": "ref.png",
                    "style_constraints": "retro",
                    "interactive_elements": "doors",
                }),
                current_event: json!({}),
            })
            .await
            .unwrap();

        let output = reply.output.unwrap();
        let resolved = output["resolved_prompt"].as_str().unwrap();
        assert!(resolved.contains("ref.png"));
        assert!(resolved.contains("retro"));
    }

    #[tokio::test]
    async fn level_architect_survives_missing_registry() {
        let agent = LevelArchitectAgent::new(None);
        let reply = agent.process(task_with_description("a cellar")).await.unwrap();
        assert_eq!(reply.status, AgentStatus::CompletedSuccessfully);
        assert!(reply.output.unwrap()["resolved_prompt"].is_null());
    }

    #[tokio::test]
    async fn code_weaver_emits_script() {
        let agent = CodeWeaverAgent::new();
        let reply = agent.process(task_with_description("door toggle")).await.unwrap();
        let output = reply.output.unwrap();
        assert_eq!(output["language"], "csharp");
        assert!(output["script"].as_str().unwrap().contains("door toggle"));
    }

    #[tokio::test]
    async fn documentation_sentinel_reports_watched_paths() {
        let agent = DocumentationSentinelAgent::default();
        let reply = agent.process(task_with_description("x")).await.unwrap();
        let output = reply.output.unwrap();
        assert_eq!(output["monitored_paths"][0], "docs/");
    }
}
