//! 提示词注册表
//!
//! 模板以 {var} 占位，注册时声明必填变量，解析前逐一校验；
//! 也可从目录加载 *.toml 清单（[prompt] 段：name / template / required_variables / agent_type）。

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::error::OrchestratorError;

/// 单条提示词记录
#[derive(Debug, Clone)]
pub struct PromptEntry {
    pub template: String,
    pub required_variables: Vec<String>,
    pub agent_type: Option<String>,
}

/// 提示词清单（prompt.toml）
#[derive(Debug, Deserialize)]
struct PromptManifest {
    prompt: PromptManifestEntry,
}

#[derive(Debug, Deserialize)]
struct PromptManifestEntry {
    name: String,
    template: String,
    #[serde(default)]
    required_variables: Vec<String>,
    #[serde(default)]
    agent_type: Option<String>,
}

/// 提示词注册表：register / template / resolve / list / load_dir
#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<HashMap<String, PromptEntry>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模板；重名视为校验错误
    pub async fn register(
        &self,
        name: &str,
        template: &str,
        required_variables: Vec<String>,
        agent_type: Option<String>,
    ) -> Result<(), OrchestratorError> {
        let mut prompts = self.prompts.write().await;
        if prompts.contains_key(name) {
            return Err(OrchestratorError::Validation(format!(
                "Prompt with name '{}' already registered.",
                name
            )));
        }
        prompts.insert(
            name.to_string(),
            PromptEntry {
                template: template.to_string(),
                required_variables,
                agent_type,
            },
        );
        tracing::info!("Registered prompt '{}'", name);
        Ok(())
    }

    /// 原始模板文本
    pub async fn template(&self, name: &str) -> Option<String> {
        self.prompts
            .read()
            .await
            .get(name)
            .map(|entry| entry.template.clone())
    }

    /// 解析模板：缺必填变量报错并列出缺失项；字符串变量原样替换，其余按 JSON 文本替换
    pub async fn resolve(
        &self,
        name: &str,
        variables: &serde_json::Map<String, Value>,
    ) -> Result<String, OrchestratorError> {
        let prompts = self.prompts.read().await;
        let entry = prompts.get(name).ok_or_else(|| {
            OrchestratorError::Validation(format!("Prompt with name '{}' not found.", name))
        })?;

        let missing: Vec<&str> = entry
            .required_variables
            .iter()
            .filter(|var| !variables.contains_key(var.as_str()))
            .map(|var| var.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(OrchestratorError::Validation(format!(
                "Missing required variables for prompt '{}': {}",
                name,
                missing.join(", ")
            )));
        }

        let mut resolved = entry.template.clone();
        for (key, value) in variables {
            let placeholder = format!("{{{}}}", key);
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            resolved = resolved.replace(&placeholder, &rendered);
        }
        Ok(resolved)
    }

    /// 按 agent_type 过滤的名称列表（排序输出）
    pub async fn list(&self, agent_type: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = self
            .prompts
            .read()
            .await
            .iter()
            .filter(|(_, entry)| match agent_type {
                Some(filter) => entry.agent_type.as_deref() == Some(filter),
                None => true,
            })
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// 从目录加载 *.toml 清单；目录不存在时按空处理，坏清单跳过并告警
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> anyhow::Result<usize> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            match toml::from_str::<PromptManifest>(&text) {
                Ok(manifest) => {
                    let p = manifest.prompt;
                    match self
                        .register(&p.name, &p.template, p.required_variables, p.agent_type)
                        .await
                    {
                        Ok(()) => loaded += 1,
                        Err(e) => tracing::warn!("Skipping prompt manifest {:?}: {}", path, e),
                    }
                }
                Err(e) => tracing::warn!("Skipping invalid prompt manifest {:?}: {}", path, e),
            }
        }
        Ok(loaded)
    }
}
