use std::sync::Arc;

use tracing::{info, warn};

use taskpilot_core::domain::task::{CreatedTask, TaskRecord};
use taskpilot_core::errors::TaskCreationError;

use crate::api::{NewTask, TaskApi, TaskResponse};

pub struct TaskClient {
    api: Arc<dyn TaskApi>,
}

impl TaskClient {
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self { api }
    }

    /// Submits the record once. Nothing counts as created unless the provider returns an id.
    pub async fn create_task(
        &self,
        record: &TaskRecord,
        description: &str,
    ) -> Result<CreatedTask, TaskCreationError> {
        let task = NewTask {
            content: record.title.clone(),
            description: description.to_owned(),
            priority: record.priority.todoist_value(),
        };

        info!(
            event_name = "todoist.task.create.start",
            category = %record.category,
            priority = task.priority,
            "creating todoist task"
        );

        let response = match self.api.add_task(&task).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "todoist.task.create.failed",
                    error = %error,
                    "todoist task creation failed"
                );
                return Err(error);
            }
        };

        let created = normalize(response, &task)?;
        info!(
            event_name = "todoist.task.create.completed",
            task_id = %created.id,
            "todoist task created"
        );
        Ok(created)
    }
}

fn normalize(response: TaskResponse, submitted: &NewTask) -> Result<CreatedTask, TaskCreationError> {
    let id = response.id_string().ok_or_else(|| {
        TaskCreationError::InvalidResponse("response did not include a task id".to_owned())
    })?;

    let url = response
        .url
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| format!("https://todoist.com/showTask?id={id}"));

    Ok(CreatedTask {
        id,
        url,
        content: response.content.unwrap_or_else(|| submitted.content.clone()),
        priority: response.priority.unwrap_or(submitted.priority),
    })
}
