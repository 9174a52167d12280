//! Tool system: trait, registry, and the built-in tools.
//!
//! Every tool implements [`Tool`] and registers itself in the
//! [`ToolRegistry`]. The agent queries the registry for available tools and
//! dispatches tool calls by name. Tools only marshal arguments and delegate;
//! the work lives in [`crate::registrations`], [`crate::lookup`] and
//! [`crate::wallet`].

pub mod lookup;
pub mod registrations;
pub mod wallet;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::provider::types::{ToolDefinition, ToolFunctionDef};

pub type ToolArgs = Map<String, Value>;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{0}' parameter is required")]
    MissingArgument(&'static str),

    #[error("invalid '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{0}")]
    Upstream(#[from] anyhow::Error),
}

/// Trait that all agent tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name used in function calls.
    fn name(&self) -> &str;

    /// What the tool does, as shown to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Run the tool. `Ok` carries the serialized result.
    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Fetch a required string argument.
pub fn string_arg<'a>(args: &'a ToolArgs, name: &'static str) -> Result<&'a str, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Err(ToolError::MissingArgument(name)),
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ToolError::InvalidArgument {
            name,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Schema for tools that take exactly one string argument.
pub fn single_string_schema(name: &str, description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            name: { "type": "string", "description": description }
        },
        "required": [name]
    })
}

/// Dynamic registry for agent tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        debug!(tool = tool.name(), "Registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a tool by name. Failures come back as an `Error: ...` string
    /// so the model can read them and recover.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> String {
        let Some(tool) = self.tools.get(name) else {
            error!(tool = name, "Tool not found");
            return format!("Error: Tool '{}' not found", name);
        };

        debug!(tool = name, "Executing tool");
        match tool.execute(args).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = name, error = %e, "Tool failed");
                format!("Error: {}", e)
            }
        }
    }

    /// All tool definitions in OpenAI function-calling format, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|tool| ToolDefinition {
                def_type: "function".into(),
                function: ToolFunctionDef {
                    name: tool.name().into(),
                    description: tool.description().into(),
                    parameters: tool.parameters(),
                },
            })
            .collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
