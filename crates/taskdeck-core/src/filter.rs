use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::{
  debug,
  trace
};

use crate::task::{
  Priority,
  Status,
  Task
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum PriorityFilter {
  #[default]
  All,
  Low,
  Medium,
  High
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum RoleFilter {
  #[default]
  All,
  Created,
  Assigned
}

impl StatusFilter {
  fn accepts(
    self,
    status: Status
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Pending => {
        status == Status::Pending
      }
      | StatusFilter::Completed => {
        status == Status::Completed
      }
    }
  }
}

impl PriorityFilter {
  fn accepts(
    self,
    priority: Priority
  ) -> bool {
    match self {
      | PriorityFilter::All => true,
      | PriorityFilter::Low => {
        priority == Priority::Low
      }
      | PriorityFilter::Medium => {
        priority == Priority::Medium
      }
      | PriorityFilter::High => {
        priority == Priority::High
      }
    }
  }
}

impl RoleFilter {
  fn accepts(
    self,
    task: &Task,
    profile_id: Option<u64>
  ) -> bool {
    match self {
      | RoleFilter::All => true,
      | RoleFilter::Created => {
        profile_id.is_some()
          && task.created_by_id()
            == profile_id
      }
      | RoleFilter::Assigned => {
        profile_id.is_some()
          && task.assigned_to_id()
            == profile_id
      }
    }
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "pending" => {
        Ok(StatusFilter::Pending)
      }
      | "completed" => {
        Ok(StatusFilter::Completed)
      }
      | other => Err(anyhow!(
        "invalid status filter: \
         {other}"
      ))
    }
  }
}

impl FromStr for PriorityFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(PriorityFilter::All),
      | "low" => Ok(PriorityFilter::Low),
      | "medium" => {
        Ok(PriorityFilter::Medium)
      }
      | "high" => {
        Ok(PriorityFilter::High)
      }
      | other => Err(anyhow!(
        "invalid priority filter: \
         {other}"
      ))
    }
  }
}

impl FromStr for RoleFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(RoleFilter::All),
      | "created" => {
        Ok(RoleFilter::Created)
      }
      | "assigned" => {
        Ok(RoleFilter::Assigned)
      }
      | other => Err(anyhow!(
        "invalid role filter: {other}"
      ))
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | StatusFilter::All => "all",
      | StatusFilter::Pending => {
        "pending"
      }
      | StatusFilter::Completed => {
        "completed"
      }
    })
  }
}

impl fmt::Display for PriorityFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | PriorityFilter::All => "all",
      | PriorityFilter::Low => "low",
      | PriorityFilter::Medium => {
        "medium"
      }
      | PriorityFilter::High => "high"
    })
  }
}

impl fmt::Display for RoleFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | RoleFilter::All => "all",
      | RoleFilter::Created => {
        "created"
      }
      | RoleFilter::Assigned => {
        "assigned"
      }
    })
  }
}

/// Filter values being edited in the
/// panel. Nothing is visible until
/// [`DraftFilter::commit`].
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub struct DraftFilter {
  pub status:   StatusFilter,
  pub priority: PriorityFilter,
  pub role:     RoleFilter
}

/// Filter values applied to the
/// visible list.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub struct ActiveFilter {
  status:   StatusFilter,
  priority: PriorityFilter,
  role:     RoleFilter
}

impl DraftFilter {
  #[must_use]
  pub fn with_status(
    self,
    status: StatusFilter
  ) -> Self {
    Self {
      status,
      ..self
    }
  }

  #[must_use]
  pub fn with_priority(
    self,
    priority: PriorityFilter
  ) -> Self {
    Self {
      priority,
      ..self
    }
  }

  #[must_use]
  pub fn with_role(
    self,
    role: RoleFilter
  ) -> Self {
    Self {
      role,
      ..self
    }
  }

  #[must_use]
  pub fn commit(self) -> ActiveFilter {
    ActiveFilter {
      status:   self.status,
      priority: self.priority,
      role:     self.role
    }
  }
}

impl ActiveFilter {
  pub fn status(&self) -> StatusFilter {
    self.status
  }

  pub fn priority(
    &self
  ) -> PriorityFilter {
    self.priority
  }

  pub fn role(&self) -> RoleFilter {
    self.role
  }

  pub fn is_unfiltered(&self) -> bool {
    *self == ActiveFilter::default()
  }

  pub fn matches(
    &self,
    task: &Task,
    profile_id: Option<u64>
  ) -> bool {
    self.status.accepts(task.status)
      && self
        .priority
        .accepts(task.priority)
      && self
        .role
        .accepts(task, profile_id)
  }
}

fn title_matches(
  task: &Task,
  needle: &str
) -> bool {
  needle.is_empty()
    || task
      .title
      .to_lowercase()
      .contains(needle)
}

/// Order-preserving subset of `tasks`
/// passing the query and every
/// committed dimension.
#[tracing::instrument(skip(
  tasks, active
))]
pub fn filter_tasks<'a>(
  tasks: &'a [Task],
  query: &str,
  active: &ActiveFilter,
  profile_id: Option<u64>
) -> Vec<&'a Task> {
  let needle = query.to_lowercase();

  let out: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      let keep =
        title_matches(task, &needle)
          && active
            .matches(task, profile_id);
      trace!(
        task_id = task.id,
        keep,
        "evaluated task filter"
      );
      keep
    })
    .collect();

  debug!(
    total = tasks.len(),
    visible = out.len(),
    "filtered tasks"
  );
  out
}

/// Search box plus the two-stage
/// filter panel of the task board.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FilterPanel {
  query:  String,
  draft:  DraftFilter,
  active: ActiveFilter
}

impl FilterPanel {
  pub fn query(&self) -> &str {
    &self.query
  }

  pub fn draft(&self) -> DraftFilter {
    self.draft
  }

  pub fn active(&self) -> ActiveFilter {
    self.active
  }

  pub fn set_query(
    &mut self,
    query: impl Into<String>
  ) {
    self.query = query.into();
  }

  pub fn set_draft(
    &mut self,
    draft: DraftFilter
  ) {
    self.draft = draft;
  }

  pub fn set_draft_status(
    &mut self,
    status: StatusFilter
  ) {
    self.draft =
      self.draft.with_status(status);
  }

  pub fn set_draft_priority(
    &mut self,
    priority: PriorityFilter
  ) {
    self.draft = self
      .draft
      .with_priority(priority);
  }

  pub fn set_draft_role(
    &mut self,
    role: RoleFilter
  ) {
    self.draft =
      self.draft.with_role(role);
  }

  #[tracing::instrument(skip(self))]
  pub fn apply(&mut self) {
    self.active = self.draft.commit();
    debug!(
      status = %self.active.status,
      priority = %self.active.priority,
      role = %self.active.role,
      "applied filters"
    );
  }

  #[tracing::instrument(skip(self))]
  pub fn clear(&mut self) {
    self.query.clear();
    self.draft = DraftFilter::default();
    self.active = ActiveFilter::default();
    debug!("cleared filters");
  }

  pub fn visible<'a>(
    &self,
    tasks: &'a [Task],
    profile_id: Option<u64>
  ) -> Vec<&'a Task> {
    filter_tasks(
      tasks,
      &self.query,
      &self.active,
      profile_id
    )
  }
}
