use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, instrument, warn};

use crate::client::TaskApi;
use crate::datetime::parse_deadline;
use crate::error::ValidationError;
use crate::lookup::UserLookup;
use crate::notice::Notice;
use crate::task::{Priority, Status, Task, TaskPayload, UserSummary};

pub const REQUIRED_FIELDS_MESSAGE: &str = "Please fill in all required fields.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    /// Editing an existing task; its status is carried into the update.
    Edit { id: u64, status: Status },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created,
    Updated(u64),
}

impl SubmitOutcome {
    pub fn notice(self) -> Notice {
        match self {
            SubmitOutcome::Created => Notice::success("Task created!"),
            SubmitOutcome::Updated(_) => Notice::success("Task updated!"),
        }
    }
}

/// Create/edit form for a single task.
pub struct TaskForm<A> {
    api: Arc<A>,
    mode: FormMode,
    pub title: String,
    pub description: String,
    deadline: Option<NaiveDate>,
    pub priority: Priority,
    assignee: UserLookup<A>,
}

impl<A> TaskForm<A>
where
    A: TaskApi + 'static,
{
    pub fn new(api: Arc<A>, debounce: Duration) -> Self {
        let assignee = UserLookup::new(Arc::clone(&api), debounce);
        Self {
            api,
            mode: FormMode::Create,
            title: String::new(),
            description: String::new(),
            deadline: None,
            priority: Priority::default(),
            assignee,
        }
    }

    pub fn edit(api: Arc<A>, debounce: Duration, task: &Task) -> Self {
        let mut form = Self::new(api, debounce);
        form.mode = FormMode::Edit {
            id: task.id,
            status: task.status,
        };
        form.title = task.title.clone();
        form.description = task.description.clone();
        form.deadline = Some(task.deadline);
        form.priority = task.priority;
        form.assignee.preset(task.assigned_to.clone());
        form
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn heading(&self) -> &'static str {
        match self.mode {
            FormMode::Create => "Create Task",
            FormMode::Edit { .. } => "Edit Task",
        }
    }

    pub fn deadline(&self) -> Option<NaiveDate> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<NaiveDate>) {
        self.deadline = deadline;
    }

    /// Parses typed input; blank input clears the deadline.
    pub fn set_deadline_input(&mut self, input: &str, today: NaiveDate) -> anyhow::Result<()> {
        if input.trim().is_empty() {
            self.deadline = None;
            return Ok(());
        }
        self.deadline = Some(parse_deadline(input, today)?);
        Ok(())
    }

    pub fn assignee(&self) -> Option<&UserSummary> {
        self.assignee.selected()
    }

    pub fn assignee_lookup(&mut self) -> &mut UserLookup<A> {
        &mut self.assignee
    }

    pub fn validate(&self) -> Result<TaskPayload, ValidationError> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.deadline.is_none() {
            missing.push("deadline");
        }
        if self.assignee.selected().is_none() {
            missing.push("assignee");
        }

        let (Some(deadline), Some(assignee), true) =
            (self.deadline, self.assignee.selected(), missing.is_empty())
        else {
            return Err(ValidationError::missing(REQUIRED_FIELDS_MESSAGE, missing));
        };

        let status = match self.mode {
            FormMode::Create => Status::Pending,
            FormMode::Edit { status, .. } => status,
        };

        Ok(TaskPayload {
            title: self.title.clone(),
            description: self.description.clone(),
            status,
            deadline,
            priority: self.priority,
            assigned_to: Some(assignee.id),
        })
    }

    /// Validates, then creates or updates. On failure the form is left as it
    /// was so the user can retry.
    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub async fn submit(&mut self) -> Result<SubmitOutcome, Notice> {
        let payload = self.validate().map_err(|err| {
            warn!(missing = ?err.missing, "task form rejected");
            Notice::from(err)
        })?;

        match self.mode {
            FormMode::Create => {
                self.api.create_task(&payload).await.map_err(|err| {
                    error!(error = %err, "task create failed");
                    Notice::for_api_error(&err, "Failed to create task.")
                })?;
                info!(title = %payload.title, "task created");
                self.reset();
                Ok(SubmitOutcome::Created)
            }
            FormMode::Edit { id, .. } => {
                self.api.update_task(id, &payload).await.map_err(|err| {
                    error!(task_id = id, error = %err, "task update failed");
                    Notice::for_api_error(&err, "Failed to update task.")
                })?;
                info!(task_id = id, "task updated");
                Ok(SubmitOutcome::Updated(id))
            }
        }
    }

    pub fn reset(&mut self) {
        self.title.clear();
        self.description.clear();
        self.deadline = None;
        self.priority = Priority::default();
        self.assignee.clear();
    }
}
