//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::services::ToolService;

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "geocode_location")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// Adapts a [`ToolService`] to a tool handler
#[derive(Debug, Clone)]
pub struct ServiceToolHandler {
    service: Arc<dyn ToolService>,
}

impl ServiceToolHandler {
    pub fn new(service: Arc<dyn ToolService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl ToolHandler for ServiceToolHandler {
    async fn execute(&self, args: Value) -> Result<Value, String> {
        let tool = self.service.kind().tool_name();
        tracing::info!(tool, "Executing tool");

        self.service.invoke(args).await.map_err(|e| {
            tracing::warn!(tool, error = %e, "Tool call failed");
            e.to_string()
        })
    }
}

/// Registry for all MCP tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry exposing the single tool of one service
    pub fn for_service(service: Arc<dyn ToolService>) -> Self {
        let mut registry = Self::new();
        registry.register_service(service);
        registry
    }

    /// Register a service's tool; its arguments are `{"request": <request object>}`
    pub fn register_service(&mut self, service: Arc<dyn ToolService>) {
        let kind = service.kind();
        self.register(Tool {
            name: kind.tool_name().to_string(),
            description: service.description().to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "request": service.request_schema()
                },
                "required": ["request"]
            }),
            handler: Arc::new(ServiceToolHandler::new(service)),
        });
    }

    /// Register a new tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get all tools
    pub fn all(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, String> {
        let tool = self
            .get(name)
            .ok_or_else(|| format!("Tool '{}' not found", name))?;

        tool.handler.execute(args).await
    }
}
