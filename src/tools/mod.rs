mod projects;
mod tasks;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::TicktickApi;
use crate::args::suggest_tool;
use crate::error::TicktickError;
use crate::types::{CallResult, ToolDefinition};

pub use projects::{
    CreateProject, CreateProjectArgs, DeleteProject, GetProject, GetProjectTasks, GetProjects,
    ProjectArgs,
};
pub use tasks::{
    CompleteTask, CreateTask, CreateTaskArgs, DeleteTask, GetTask, TaskRefArgs, UpdateTask,
    UpdateTaskArgs,
};

/// A named operation over the TickTick API with a JSON argument schema.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Returns the provider's JSON.
    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError>;
}

/// Deserialize tool arguments into their typed form. A missing argument
/// object counts as `{}`.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, TicktickError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| TicktickError::InvalidArguments {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}

/// Name to handler mapping, fixed at startup.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// Every project and task tool.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(GetProjects));
        registry.register(Box::new(GetProject));
        registry.register(Box::new(GetProjectTasks));
        registry.register(Box::new(CreateProject));
        registry.register(Box::new(DeleteProject));
        registry.register(Box::new(GetTask));
        registry.register(Box::new(CreateTask));
        registry.register(Box::new(UpdateTask));
        registry.register(Box::new(CompleteTask));
        registry.register(Box::new(DeleteTask));
        registry
    }

    /// Add a tool, replacing any existing tool of the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.definition().name;
        self.tools.retain(|t| t.definition().name != name);
        self.tools.push(tool);
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.definition().name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.definition().name == name)
            .map(|t| t.as_ref())
    }

    /// Look up `name` and run it. Unknown names fail with
    /// [`TicktickError::ToolNotFound`] and the closest known name.
    pub async fn call(
        &self,
        api: &TicktickApi,
        name: &str,
        args: Value,
    ) -> Result<CallResult, TicktickError> {
        let Some(tool) = self.get(name) else {
            let names = self.names();
            let known: Vec<&str> = names.iter().map(String::as_str).collect();
            return Err(TicktickError::ToolNotFound {
                tool: name.to_string(),
                suggestion: suggest_tool(name, &known),
            });
        };
        tracing::debug!(tool = name, "calling tool");
        let value = tool.call(api, args).await?;
        Ok(CallResult::from_json(&value))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
