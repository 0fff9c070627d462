use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, Tool};
use crate::api::{NewTask, TaskUpdate, TicktickApi};
use crate::error::TicktickError;
use crate::types::ToolDefinition;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskRefArgs {
    pub project_id: String,
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTaskArgs {
    pub title: String,
    pub project_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: u8,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTaskArgs {
    pub task_id: String,
    pub project_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Option<u8>,
}

fn task_ref_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "project_id": {"type": "string", "description": "ID of the project"},
            "task_id": {"type": "string", "description": "ID of the task"}
        },
        "required": ["project_id", "task_id"]
    })
}

fn priority_schema() -> Value {
    json!({
        "type": "integer",
        "enum": [0, 1, 3, 5],
        "description": "0 none, 1 low, 3 medium, 5 high"
    })
}

const DATE_HINT: &str = "ISO 8601, e.g. 2026-03-01T09:00:00+0000";

pub struct GetTask;

#[async_trait]
impl Tool for GetTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_task".into(),
            description: "Get details about a specific task".into(),
            input_schema: task_ref_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: TaskRefArgs = parse_args("get_task", args)?;
        api.get_task(&args.project_id, &args.task_id).await
    }
}

pub struct CreateTask;

#[async_trait]
impl Tool for CreateTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "create_task".into(),
            description: "Create a new task".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "title": {"type": "string", "description": "Task title"},
                    "project_id": {"type": "string", "description": "ID of the project"},
                    "content": {"type": "string", "description": "Task notes"},
                    "start_date": {"type": "string", "description": DATE_HINT},
                    "due_date": {"type": "string", "description": DATE_HINT},
                    "priority": priority_schema()
                },
                "required": ["title", "project_id"]
            }),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: CreateTaskArgs = parse_args("create_task", args)?;
        let task = NewTask {
            title: args.title,
            project_id: args.project_id,
            content: args.content,
            start_date: args.start_date,
            due_date: args.due_date,
            priority: args.priority,
            is_all_day: false,
        };
        api.create_task(&task).await
    }
}

pub struct UpdateTask;

#[async_trait]
impl Tool for UpdateTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "update_task".into(),
            description: "Update an existing task".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "task_id": {"type": "string", "description": "ID of the task"},
                    "project_id": {"type": "string", "description": "ID of the project"},
                    "title": {"type": "string"},
                    "content": {"type": "string"},
                    "start_date": {"type": "string", "description": DATE_HINT},
                    "due_date": {"type": "string", "description": DATE_HINT},
                    "priority": priority_schema()
                },
                "required": ["task_id", "project_id"]
            }),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: UpdateTaskArgs = parse_args("update_task", args)?;
        let update = TaskUpdate {
            id: args.task_id,
            project_id: args.project_id,
            title: args.title,
            content: args.content,
            start_date: args.start_date,
            due_date: args.due_date,
            priority: args.priority,
        };
        api.update_task(&update).await
    }
}

pub struct CompleteTask;

#[async_trait]
impl Tool for CompleteTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "complete_task".into(),
            description: "Mark a task as complete".into(),
            input_schema: task_ref_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: TaskRefArgs = parse_args("complete_task", args)?;
        api.complete_task(&args.project_id, &args.task_id).await
    }
}

pub struct DeleteTask;

#[async_trait]
impl Tool for DeleteTask {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "delete_task".into(),
            description: "Delete a task".into(),
            input_schema: task_ref_schema(),
        }
    }

    async fn call(&self, api: &TicktickApi, args: Value) -> Result<Value, TicktickError> {
        let args: TaskRefArgs = parse_args("delete_task", args)?;
        api.delete_task(&args.project_id, &args.task_id).await
    }
}
