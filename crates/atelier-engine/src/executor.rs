//! Node executor with built-in handlers for every node kind.
//!
//! `NodeExecutor` dispatches on [`NodeKind`] and calls the generation
//! backend where a node needs it. Every backend call is bounded by the
//! executor's timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::backend::{BackendError, GenerateRequest, GenerationBackend};
use crate::config::defaults;
use crate::error::NodeError;
use crate::events::{EventSink, WorkflowEvent};
use crate::expansion::{expand_variables, TemplateVariable};
use crate::resolver::ResolvedInputs;
use crate::types::{GraphNode, NodeKind};
use crate::value::NodeValue;

type NodeResult = std::result::Result<NodeValue, NodeError>;

/// Runs single nodes against their resolved inputs
pub struct NodeExecutor {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
    /// Used by batch nodes that do not configure `parallelLimit`
    parallel_limit: usize,
}

impl NodeExecutor {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            timeout: Duration::from_secs(defaults::BACKEND_TIMEOUT_SECS),
            parallel_limit: defaults::PARALLEL_LIMIT,
        }
    }

    /// Set the per-call backend timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the batch chunk size used when a node does not configure one
    pub fn with_parallel_limit(mut self, limit: usize) -> Self {
        self.parallel_limit = limit.max(1);
        self
    }

    /// Execute one node
    pub async fn execute(
        &self,
        node: &GraphNode,
        inputs: &ResolvedInputs,
        sink: &dyn EventSink,
    ) -> NodeResult {
        let kind = node.kind()?;
        log::debug!("Executing node '{}' ({})", node.id, kind);

        match kind {
            NodeKind::ImageInput => Ok(NodeValue::image(config_literal(node, "image"))),
            NodeKind::TextInput => Ok(NodeValue::text(config_literal(node, "text"))),
            NodeKind::TextArrayInput => Ok(NodeValue::TextArray(config_strings(node, "texts"))),
            NodeKind::Generate => self.execute_generate(node, inputs).await,
            NodeKind::StyleTransfer => self.execute_style_transfer(inputs).await,
            NodeKind::Upscale => self.execute_upscale(node, inputs).await,
            NodeKind::Analyze => self.execute_analyze(inputs).await,
            NodeKind::Composite => self.execute_composite(node, inputs).await,
            NodeKind::Output => Ok(inputs
                .get("image")
                .cloned()
                .unwrap_or_else(|| NodeValue::text(""))),
            NodeKind::BatchGenerate => self.execute_batch_generate(node, inputs, sink).await,
            NodeKind::CompareGrid => execute_compare_grid(node, inputs),
            NodeKind::Inpaint => self.execute_inpaint(node, inputs).await,
        }
    }

    /// Await a backend call within the timeout
    async fn call<T, F>(&self, call: F) -> std::result::Result<T, NodeError>
    where
        F: Future<Output = std::result::Result<T, BackendError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(NodeError::from),
            Err(_) => Err(BackendError::Timeout(self.timeout).into()),
        }
    }

    async fn execute_generate(&self, node: &GraphNode, inputs: &ResolvedInputs) -> NodeResult {
        let prompt = text_input(inputs, "prompt")
            .or_else(|| node.config_str("prompt"))
            .ok_or_else(|| NodeError::missing("prompt"))?;

        let references = inputs
            .get("reference")
            .and_then(NodeValue::images)
            .unwrap_or_default();

        let request = GenerateRequest {
            prompt: prompt.to_string(),
            references,
            aspect_ratio: config_or(node, "aspectRatio", defaults::ASPECT_RATIO),
            quality: config_or(node, "quality", defaults::QUALITY),
        };

        let image = self.call(self.backend.generate(request)).await?;
        Ok(NodeValue::image(image))
    }

    async fn execute_style_transfer(&self, inputs: &ResolvedInputs) -> NodeResult {
        let content = image_input(inputs, "content").ok_or_else(|| NodeError::missing("content"))?;
        let style = image_input(inputs, "style").ok_or_else(|| NodeError::missing("style"))?;

        let image = self.call(self.backend.style_transfer(content, style)).await?;
        Ok(NodeValue::image(image))
    }

    async fn execute_upscale(&self, node: &GraphNode, inputs: &ResolvedInputs) -> NodeResult {
        let image = image_input(inputs, "image").ok_or_else(|| NodeError::missing("image"))?;
        let target_size = config_or(node, "targetSize", defaults::UPSCALE_TARGET_SIZE);
        let quality = config_or(node, "quality", defaults::UPSCALE_QUALITY);

        let instruction = upscale_instruction(&target_size);
        let upscaled = self
            .call(self.backend.edit_variation(image, &instruction, &quality))
            .await?;
        Ok(NodeValue::image(upscaled))
    }

    async fn execute_analyze(&self, inputs: &ResolvedInputs) -> NodeResult {
        let image = image_input(inputs, "image").ok_or_else(|| NodeError::missing("image"))?;
        let analysis = self.call(self.backend.analyze(image)).await?;

        Ok(NodeValue::bundle([
            ("palette", NodeValue::Palette(analysis.colors)),
            ("keywords", NodeValue::TextArray(analysis.keywords)),
            ("description", NodeValue::Text(analysis.description)),
        ]))
    }

    async fn execute_composite(&self, node: &GraphNode, inputs: &ResolvedInputs) -> NodeResult {
        let images: Vec<String> = ["image1", "image2", "image3", "image4"]
            .iter()
            .filter_map(|port| image_input(inputs, port))
            .map(str::to_string)
            .collect();

        if images.len() < 2 {
            return Err(NodeError::missing("at least two images"));
        }

        let prompt = text_input(inputs, "prompt").or_else(|| node.config_str("prompt"));
        let composed = self.call(self.backend.compose(&images, prompt)).await?;
        Ok(NodeValue::image(composed))
    }

    async fn execute_batch_generate(
        &self,
        node: &GraphNode,
        inputs: &ResolvedInputs,
        sink: &dyn EventSink,
    ) -> NodeResult {
        let prompts: Vec<String> = batch_prompts(node, inputs)
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        if prompts.is_empty() {
            return Err(NodeError::empty("no prompts to generate"));
        }

        let limit = node
            .config_u64("parallelLimit")
            .map(|n| n as usize)
            .unwrap_or(self.parallel_limit)
            .max(1);
        let aspect_ratio = config_or(node, "aspectRatio", defaults::ASPECT_RATIO);
        let quality = config_or(node, "quality", defaults::QUALITY);

        let total = prompts.len();
        let mut images = Vec::with_capacity(total);

        for chunk in prompts.chunks(limit) {
            let calls = chunk.iter().map(|prompt| {
                self.call(self.backend.generate(GenerateRequest {
                    prompt: prompt.clone(),
                    references: Vec::new(),
                    aspect_ratio: aspect_ratio.clone(),
                    quality: quality.clone(),
                }))
            });

            for result in join_all(calls).await {
                images.push(result?);
            }

            log::debug!("Batch '{}': {}/{} images", node.id, images.len(), total);
            if let Err(e) = sink.send(WorkflowEvent::node_progress(&node.id, images.len(), total)) {
                log::warn!("Failed to send progress for '{}': {}", node.id, e);
            }
        }

        Ok(NodeValue::ImageArray(images))
    }

    async fn execute_inpaint(&self, node: &GraphNode, inputs: &ResolvedInputs) -> NodeResult {
        // The mask input is accepted for wiring but not sent to the backend yet
        let image = image_input(inputs, "image").ok_or_else(|| NodeError::missing("image"))?;
        let instruction = text_input(inputs, "instruction")
            .or_else(|| node.config_str("instruction"))
            .ok_or_else(|| NodeError::missing("instruction"))?;
        let quality = config_or(node, "quality", defaults::QUALITY);

        let edited = self
            .call(self.backend.edit_variation(image, instruction, &quality))
            .await?;
        Ok(NodeValue::image(edited))
    }
}

fn execute_compare_grid(node: &GraphNode, inputs: &ResolvedInputs) -> NodeResult {
    let images = inputs
        .get("images")
        .and_then(NodeValue::images)
        .unwrap_or_default();

    let index = node.config_u64("selectedIndex").unwrap_or(0) as usize;
    let selected = images
        .get(index)
        .or_else(|| images.first())
        .cloned()
        .ok_or_else(|| NodeError::empty("no images to compare"))?;

    Ok(NodeValue::bundle([
        ("selected", NodeValue::Image(selected)),
        ("images", NodeValue::ImageArray(images)),
    ]))
}

/// Prompt used by upscale nodes
pub fn upscale_instruction(target_size: &str) -> String {
    format!(
        "Upscale this image to {} resolution. Preserve the composition exactly \
         and enhance fine detail, texture and edge sharpness.",
        target_size
    )
}

/// Prompt list for a batch node: connected array, template expansion, or
/// the literal list in config
fn batch_prompts(node: &GraphNode, inputs: &ResolvedInputs) -> Vec<String> {
    if let Some(prompts) = inputs.get("prompts").and_then(NodeValue::as_text_array) {
        return prompts.to_vec();
    }

    if node.config_flag("templateMode") {
        let template = config_literal(node, "template");
        let variables: Vec<TemplateVariable> = match node.config.get("variables") {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
                log::warn!("Ignoring malformed variables on '{}': {}", node.id, e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        return expand_variables(&template, &variables);
    }

    config_strings(node, "prompts")
}

/// Non-blank text on an input port
fn text_input<'a>(inputs: &'a ResolvedInputs, port: &str) -> Option<&'a str> {
    inputs
        .get(port)
        .and_then(NodeValue::as_text)
        .filter(|s| !s.trim().is_empty())
}

fn image_input<'a>(inputs: &'a ResolvedInputs, port: &str) -> Option<&'a str> {
    inputs.get(port).and_then(NodeValue::as_image)
}

/// String setting returned verbatim (empty when absent)
fn config_literal(node: &GraphNode, key: &str) -> String {
    node.config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn config_or(node: &GraphNode, key: &str, default: &str) -> String {
    node.config_str(key).unwrap_or(default).to_string()
}

fn config_strings(node: &GraphNode, key: &str) -> Vec<String> {
    node.config
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
