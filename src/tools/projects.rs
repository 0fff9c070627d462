use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool};
use crate::api::{NewProject, TicktickApi};
use crate::error::TicktickError;
use crate::types::ToolDefinition;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectArgs {
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProjectArgs {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub view_mode: Option<String>,
}

fn project_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": {"type": "string", "description": "ID of the project"}
        },
        "required": ["project_id"]
    })
}

pub struct GetProjects;

#[async_trait]
impl Tool for GetProjects {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_projects".into(),
            description: "List all projects".into(),
            input_schema: json!({"type": "object", "properties": {}}),
        }
    }

    async fn call(&self, api: &TicktickApi, _args: Value) -> Result<Value, TicktickError> {
        api.get_projects().await
    }
}

pub struct GetProject;

#[async_trait]
impl Tool for GetProject {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_project".into(),
            description: "Get details about a specific project".into(),
            input_schema: project_id_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: ProjectArgs = parse_args("get_project", args)?;
        api.get_project(&args.project_id).await
    }
}

pub struct GetProjectTasks;

#[async_trait]
impl Tool for GetProjectTasks {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_project_tasks".into(),
            description: "List the tasks in a project".into(),
            input_schema: project_id_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: ProjectArgs = parse_args("get_project_tasks", args)?;
        let data = api.get_project_data(&args.project_id).await?;
        Ok(data.get("tasks").cloned().unwrap_or_else(|| json!([])))
    }
}

pub struct CreateProject;

#[async_trait]
impl Tool for CreateProject {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_project".into(),
            description: "Create a new project".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string", "description": "Project name"},
                    "color": {"type": "string", "description": "Color code, e.g. #F18181"},
                    "view_mode": {"type": "string", "enum": ["list", "kanban", "timeline"]}
                },
                "required": ["name"]
            }),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: CreateProjectArgs = parse_args("create_project", args)?;
        let mut project = NewProject::new(args.name);
        if let Some(color) = args.color {
            project.color = color;
        }
        if let Some(view_mode) = args.view_mode {
            project.view_mode = view_mode;
        }
        api.create_project(&project).await
    }
}

pub struct DeleteProject;

#[async_trait]
impl Tool for DeleteProject {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete_project".into(),
            description: "Delete a project".into(),
            input_schema: project_id_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: ProjectArgs = parse_args("delete_project", args)?;
        api.delete_project(&args.project_id).await
    }
}
