//! 场景/材质/动画概念生成处理器（确定性 mock）
//!
//! 模拟引擎侧概念设计工具链。概念输出依赖对话上下文，不参与
//! 结果缓存（`cache_key` 保持默认的 `None`）。

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{BridgeHandler, BridgeRequest};

pub const GENERATE_SCENE_CONCEPT: &str = "GENERATE_SCENE_CONCEPT";
pub const GENERATE_MATERIAL_CONCEPT: &str = "GENERATE_MATERIAL_CONCEPT";
pub const GET_ANIMATION_ADVICE: &str = "GET_ANIMATION_ADVICE";
pub const GENERATE_3D_MODEL_CONCEPT: &str = "GENERATE_3D_MODEL_CONCEPT";

const SUPPORTED: &[&str] = &[
    GENERATE_SCENE_CONCEPT,
    GENERATE_MATERIAL_CONCEPT,
    GET_ANIMATION_ADVICE,
    GENERATE_3D_MODEL_CONCEPT,
];

fn str_or<'a>(payload: &'a Value, key: &str, default: &'a str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// 概念设计工具链
#[derive(Default)]
pub struct MuseHandler;

impl MuseHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BridgeHandler for MuseHandler {
    fn name(&self) -> &str {
        "muse"
    }

    fn supported_types(&self) -> &[&str] {
        SUPPORTED
    }

    async fn handle(&self, request: &BridgeRequest) -> Result<Value, String> {
        let payload = &request.payload;
        tracing::info!(
            "muse: handling '{}' for agent {:?}",
            request.request_type,
            request.agent_id
        );

        let record = match request.request_type.as_str() {
            GENERATE_SCENE_CONCEPT => {
                let prompt = str_or(payload, "prompt", "a generic scene");
                let lighting = str_or(payload, "lighting", "daylight");
                json!({
                    "request_id": request.id,
                    "status": "success_mock",
                    "concept_type": "scene",
                    "description": format!("Conceptual scene based on: '{}'.", prompt),
                    "mood": str_or(payload, "mood", "neutral"),
                    "elements_suggested": [
                        "mock_tree_01",
                        "mock_rock_02",
                        format!("mock_lighting_{}", lighting),
                    ],
                })
            }
            GENERATE_MATERIAL_CONCEPT => {
                let prompt = str_or(payload, "prompt", "a generic material");
                json!({
                    "request_id": request.id,
                    "status": "success_mock",
                    "concept_type": "material",
                    "description": format!("Conceptual material for: '{}'.", prompt),
                    "base_color_idea": str_or(payload, "base_color", "#808080"),
                    "texture_style_idea": str_or(payload, "texture_style", "smooth_metallic"),
                })
            }
            GET_ANIMATION_ADVICE => {
                let query = str_or(payload, "query", "a generic animation");
                json!({
                    "request_id": request.id,
                    "status": "success_mock",
                    "advice_type": "animation",
                    "query": query,
                    "suggestion": format!(
                        "For '{}', block the key poses first and ease the in-betweens.",
                        query
                    ),
                    "estimated_complexity": "medium",
                })
            }
            GENERATE_3D_MODEL_CONCEPT => {
                let prompt = str_or(payload, "prompt", "a generic 3d model");
                let complexity = str_or(payload, "complexity", "low_poly");
                let primitives = if prompt.contains("simple") {
                    json!(["cube", "sphere"])
                } else {
                    json!(["custom_mesh_idea"])
                };
                json!({
                    "request_id": request.id,
                    "status": "success_mock",
                    "concept_type": "3d_model",
                    "description": format!("Conceptual 3D model for: '{}' ({}).", prompt, complexity),
                    "suggested_primitives": primitives,
                    "estimated_polycount_category": complexity,
                })
            }
            other => {
                return Err(format!("Unsupported request type for MuseHandler: {}", other))
            }
        };
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(request_type: &str, payload: Value) -> BridgeRequest {
        BridgeRequest::new(request_type, payload, Some("level_architect".to_string()))
    }

    #[tokio::test]
    async fn scene_concept_reflects_lighting() {
        let handler = MuseHandler::new();
        let record = handler
            .handle(&request(
                GENERATE_SCENE_CONCEPT,
                json!({ "prompt": "flooded cellar", "lighting": "torchlight" }),
            ))
            .await
            .unwrap();

        assert_eq!(record["concept_type"], "scene");
        assert_eq!(record["elements_suggested"][2], "mock_lighting_torchlight");
    }

    #[tokio::test]
    async fn animation_advice_uses_query_defaults() {
        let handler = MuseHandler::new();
        let record = handler
            .handle(&request(GET_ANIMATION_ADVICE, json!({})))
            .await
            .unwrap();

        assert_eq!(record["query"], "a generic animation");
        assert_eq!(record["estimated_complexity"], "medium");
    }

    #[tokio::test]
    async fn simple_model_concept_suggests_primitives() {
        let handler = MuseHandler::new();
        let record = handler
            .handle(&request(
                GENERATE_3D_MODEL_CONCEPT,
                json!({ "prompt": "simple barrel" }),
            ))
            .await
            .unwrap();

        assert_eq!(record["suggested_primitives"], json!(["cube", "sphere"]));
    }

    #[test]
    fn concepts_are_not_cached() {
        let handler = MuseHandler::new();
        assert!(handler
            .cache_key(GENERATE_SCENE_CONCEPT, &json!({ "prompt": "x" }))
            .is_none());
    }
}
