use std::sync::Arc;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::AuthenticatedClient;
use crate::error::TicktickError;

pub const DEFAULT_PROJECT_COLOR: &str = "#F18181";
pub const DEFAULT_VIEW_MODE: &str = "list";
pub const VIEW_MODES: [&str; 3] = ["list", "kanban", "timeline"];
const VALID_PRIORITIES: [u8; 4] = [0, 1, 3, 5];
/// The date form the open API sends and accepts.
const TICKTICK_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Fields for `POST /task`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub is_all_day: bool,
}

/// Fields for `POST /task/{id}`. Unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

/// Fields for `POST /project`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    pub color: String,
    pub view_mode: String,
    pub kind: String,
}

impl NewProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: DEFAULT_PROJECT_COLOR.to_string(),
            view_mode: DEFAULT_VIEW_MODE.to_string(),
            kind: "TASK".to_string(),
        }
    }
}

pub fn validate_priority(tool: &str, priority: u8) -> Result<(), TicktickError> {
    if VALID_PRIORITIES.contains(&priority) {
        Ok(())
    } else {
        Err(TicktickError::InvalidArguments {
            tool: tool.to_string(),
            detail: format!(
                "invalid priority {priority}; expected 0 (none), 1 (low), 3 (medium) or 5 (high)"
            ),
        })
    }
}

pub fn validate_view_mode(tool: &str, view_mode: &str) -> Result<(), TicktickError> {
    if VIEW_MODES.contains(&view_mode) {
        return Ok(());
    }
    Err(TicktickError::InvalidArguments {
        tool: tool.to_string(),
        detail: format!("invalid view_mode '{view_mode}'; expected list, kanban or timeline"),
    })
}

/// Accepts `2026-03-01T09:00:00+0000` as well as RFC 3339 (`...Z`, `+00:00`).
pub fn validate_date(tool: &str, field: &str, value: &str) -> Result<(), TicktickError> {
    let parsed = DateTime::parse_from_str(value, TICKTICK_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value));
    parsed.map(|_| ()).map_err(|e| TicktickError::InvalidArguments {
        tool: tool.to_string(),
        detail: format!(
            "invalid {field} format '{value}' ({e}); expected e.g. 2026-03-01T09:00:00+0000"
        ),
    })
}

fn validate_dates(
    tool: &str,
    start_date: Option<&str>,
    due_date: Option<&str>,
) -> Result<(), TicktickError> {
    if let Some(start) = start_date {
        validate_date(tool, "start_date", start)?;
    }
    if let Some(due) = due_date {
        validate_date(tool, "due_date", due)?;
    }
    Ok(())
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, TicktickError> {
    serde_json::to_value(value).map_err(|e| TicktickError::TransportError(Box::new(e)))
}

/// Project and task endpoints of the TickTick open API. Responses are the
/// provider's JSON, unchanged.
#[derive(Debug, Clone)]
pub struct TicktickApi {
    client: Arc<AuthenticatedClient>,
}

impl TicktickApi {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    pub async fn get_projects(&self) -> Result<Value, TicktickError> {
        self.client.get("/project").await
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Value, TicktickError> {
        self.client.get(&format!("/project/{project_id}")).await
    }

    /// The project together with its tasks and columns.
    pub async fn get_project_data(&self, project_id: &str) -> Result<Value, TicktickError> {
        self.client.get(&format!("/project/{project_id}/data")).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Value, TicktickError> {
        validate_view_mode("create_project", &project.view_mode)?;
        self.client.post("/project", &to_body(project)?).await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<Value, TicktickError> {
        self.client.delete(&format!("/project/{project_id}")).await
    }

    pub async fn get_task(&self, project_id: &str, task_id: &str) -> Result<Value, TicktickError> {
        self.client
            .get(&format!("/project/{project_id}/task/{task_id}"))
            .await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Value, TicktickError> {
        validate_priority("create_task", task.priority)?;
        validate_dates(
            "create_task",
            task.start_date.as_deref(),
            task.due_date.as_deref(),
        )?;
        self.client.post("/task", &to_body(task)?).await
    }

    pub async fn update_task(&self, update: &TaskUpdate) -> Result<Value, TicktickError> {
        if let Some(priority) = update.priority {
            validate_priority("update_task", priority)?;
        }
        validate_dates(
            "update_task",
            update.start_date.as_deref(),
            update.due_date.as_deref(),
        )?;
        self.client
            .post(&format!("/task/{}", update.id), &to_body(update)?)
            .await
    }

    pub async fn complete_task(
        &self,
        project_id: &str,
        task_id: &str,
    ) -> Result<Value, TicktickError> {
        self.client
            .post(
                &format!("/project/{project_id}/task/{task_id}/complete"),
                &Value::Object(Default::default()),
            )
            .await
    }

    pub async fn delete_task(&self, project_id: &str, task_id: &str) -> Result<Value, TicktickError> {
        self.client
            .delete(&format!("/project/{project_id}/task/{task_id}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_task_serializes_camel_case_and_skips_unset() {
        let task = NewTask {
            title: "Buy milk".into(),
            project_id: "p1".into(),
            due_date: Some("2026-01-01T09:00:00+0000".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(&task).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Buy milk",
                "projectId": "p1",
                "dueDate": "2026-01-01T09:00:00+0000",
                "priority": 0,
                "isAllDay": false
            })
        );
    }

    #[test]
    fn task_update_only_sends_changed_fields() {
        let update = TaskUpdate {
            id: "t1".into(),
            project_id: "p1".into(),
            priority: Some(5),
            ..Default::default()
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, json!({"id": "t1", "projectId": "p1", "priority": 5}));
    }

    #[test]
    fn new_project_defaults() {
        let body = serde_json::to_value(NewProject::new("Inbox 2")).unwrap();
        assert_eq!(
            body,
            json!({"name": "Inbox 2", "color": "#F18181", "viewMode": "list", "kind": "TASK"})
        );
    }

    #[test]
    fn priority_validation() {
        for ok in [0, 1, 3, 5] {
            assert!(validate_priority("create_task", ok).is_ok());
        }
        let err = validate_priority("create_task", 2).unwrap_err();
        assert!(matches!(err, TicktickError::InvalidArguments { .. }));
        assert!(err.to_string().contains("invalid priority 2"));
    }

    #[test]
    fn view_mode_validation() {
        for ok in VIEW_MODES {
            assert!(validate_view_mode("create_project", ok).is_ok());
        }
        let err = validate_view_mode("create_project", "invalid_mode").unwrap_err();
        assert!(matches!(err, TicktickError::InvalidArguments { .. }));
        assert!(err.to_string().contains("invalid view_mode 'invalid_mode'"));
    }

    #[test]
    fn date_validation() {
        for ok in [
            "2026-03-01T09:00:00+0000",
            "2026-03-01T09:00:00+08:00",
            "2026-03-01T09:00:00Z",
        ] {
            assert!(validate_date("create_task", "start_date", ok).is_ok(), "{ok}");
        }
        for bad in ["invalid-date", "2026-03-01", "2026-13-01T09:00:00+0000"] {
            let err = validate_date("create_task", "start_date", bad).unwrap_err();
            assert!(err.to_string().contains("invalid start_date format"), "{bad}");
        }
    }
}
