//! Tool and plugin abstractions for the agent harness.
//!
//! A plugin groups related tools, declares which chains its contracts are
//! deployed on, and dispatches execution by tool name. The registry is the
//! single entry point the harness talks to.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::ToolError;

/// One callable tool: name, human description, and a JSON-schema description
/// of its parameters.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A group of tools sharing contracts and configuration.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this plugin's contracts are deployed on `chain_id`.
    fn supports_chain(&self, chain_id: u64) -> bool;

    fn tools(&self) -> Vec<ToolSpec>;

    /// Execute one of this plugin's tools. Unknown names are an
    /// `UnknownTool` error; the registry routes by spec name first.
    async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError>;
}

/// Aggregates plugins and dispatches tool calls by name.
#[derive(Default)]
pub struct ToolRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "Plugin registered");
        self.plugins.push(plugin);
    }

    /// All tool specs across registered plugins.
    pub fn tools(&self) -> Vec<ToolSpec> {
        self.plugins.iter().flat_map(|p| p.tools()).collect()
    }

    #[instrument(skip(self, params))]
    pub async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
        for plugin in &self.plugins {
            if plugin.tools().iter().any(|spec| spec.name == tool) {
                return plugin.execute(tool, params).await;
            }
        }
        Err(ToolError::UnknownTool(tool.to_string()))
    }
}

/// Deserialize a tool's parameter record, mapping malformed input to a
/// validation error before anything touches the chain.
pub fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, ToolError> {
    serde_json::from_value(params.clone()).map_err(|e| ToolError::InvalidParameter {
        field: "params",
        reason: e.to_string(),
    })
}

/// Parse an address parameter.
pub fn parse_address(
    field: &'static str,
    value: &str,
) -> Result<alloy::primitives::Address, ToolError> {
    value.parse().map_err(|_| ToolError::InvalidParameter {
        field,
        reason: format!("`{value}` is not a valid address"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoPlugin;

    #[async_trait]
    impl Plugin for EchoPlugin {
        fn name(&self) -> &str {
            "echo"
        }
        fn supports_chain(&self, chain_id: u64) -> bool {
            chain_id == 34443
        }
        fn tools(&self) -> Vec<ToolSpec> {
            vec![ToolSpec::new(
                "echo_message",
                "Echo the message back",
                json!({"type": "object", "properties": {"message": {"type": "string"}}}),
            )]
        }
        async fn execute(&self, tool: &str, params: &Value) -> Result<Value, ToolError> {
            match tool {
                "echo_message" => Ok(json!({"echoed": params["message"]})),
                other => Err(ToolError::UnknownTool(other.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_tool_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoPlugin));

        assert_eq!(registry.tools().len(), 1);

        let result = registry
            .execute("echo_message", &json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(result["echoed"], "hi");
    }

    #[tokio::test]
    async fn registry_rejects_unknown_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoPlugin));

        let err = registry.execute("no_such_tool", &json!({})).await;
        assert!(matches!(err, Err(ToolError::UnknownTool(name)) if name == "no_such_tool"));
    }

    #[test]
    fn parse_address_validates() {
        assert!(parse_address("token", "0x0000000000000000000000000000000000000001").is_ok());
        assert!(parse_address("token", "not-an-address").is_err());
    }
}
