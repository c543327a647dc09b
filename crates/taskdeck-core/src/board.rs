use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};

use crate::auth;
use crate::client::TaskApi;
use crate::filter::FilterPanel;
use crate::form::TaskForm;
use crate::notice::Notice;
use crate::session::{Route, SessionStore};
use crate::task::{Profile, Status, Task};

/// The task list hub: last-fetched tasks, the caller's profile and the
/// filter panel applied over them.
pub struct TaskBoard<A> {
    api: Arc<A>,
    tasks: Vec<Task>,
    profile: Option<Profile>,
    filters: FilterPanel,
}

impl<A> TaskBoard<A>
where
    A: TaskApi + 'static,
{
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            tasks: Vec::new(),
            profile: None,
            filters: FilterPanel::default(),
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn filters(&self) -> &FilterPanel {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterPanel {
        &mut self.filters
    }

    pub fn visible(&self) -> Vec<&Task> {
        self.filters
            .visible(&self.tasks, self.profile.as_ref().map(|p| p.id))
    }

    pub async fn load(&mut self) {
        self.refresh().await;
        self.refresh_profile().await;
    }

    /// Re-fetches the task list. A failure keeps the previous list.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> bool {
        match self.api.list_tasks().await {
            Ok(tasks) => {
                debug!(count = tasks.len(), "task list refreshed");
                self.tasks = tasks;
                true
            }
            Err(err) => {
                warn!(error = %err, "task refresh failed; keeping stale list");
                false
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn refresh_profile(&mut self) -> bool {
        match self.api.profile().await {
            Ok(profile) => {
                debug!(profile_id = profile.id, "profile refreshed");
                self.profile = Some(profile);
                true
            }
            Err(err) => {
                warn!(error = %err, "profile refresh failed");
                false
            }
        }
    }

    /// Flips pending/completed on the server, then re-fetches.
    #[instrument(skip(self))]
    pub async fn toggle_status(&mut self, id: u64) -> Result<Status, Notice> {
        let task = self
            .task(id)
            .ok_or_else(|| Notice::error(format!("Task {id} not found.")))?;
        let payload = task.toggle_payload();

        self.api.update_task(id, &payload).await.map_err(|err| {
            error!(task_id = id, error = %err, "status toggle failed");
            Notice::error("Failed to update task status")
        })?;

        info!(task_id = id, status = %payload.status, "task status toggled");
        self.refresh().await;
        Ok(payload.status)
    }

    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: u64) -> Result<Notice, Notice> {
        self.api.delete_task(id).await.map_err(|err| {
            error!(task_id = id, error = %err, "task delete failed");
            Notice::error("Failed to delete task.")
        })?;

        info!(task_id = id, "task deleted");
        self.refresh().await;
        Ok(Notice::new("Deleted", "Task deleted successfully."))
    }

    /// Uploads the image at `path` as the new profile picture.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn change_picture(&mut self, path: &Path) -> Result<Notice, Notice> {
        let image = tokio::fs::read(path).await.map_err(|err| {
            error!(error = %err, "failed reading picture");
            Notice::something_went_wrong()
        })?;

        self.api.upload_picture(image).await.map_err(|err| {
            error!(error = %err, "picture upload failed");
            Notice::for_api_error(&err, "Upload failed!")
        })?;

        self.refresh_profile().await;
        Ok(Notice::success("Profile picture updated!"))
    }

    pub fn create_form(&self, debounce: Duration) -> TaskForm<A> {
        TaskForm::new(Arc::clone(&self.api), debounce)
    }

    pub fn edit_form(&self, id: u64, debounce: Duration) -> Option<TaskForm<A>> {
        self.task(id)
            .map(|task| TaskForm::edit(Arc::clone(&self.api), debounce, task))
    }

    pub fn logout(&mut self, store: &SessionStore) -> anyhow::Result<Route> {
        self.tasks.clear();
        self.profile = None;
        self.filters.clear();
        auth::logout(self.api.as_ref(), store)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;
    use crate::fake_api::FakeApi;
    use crate::filter::{RoleFilter, StatusFilter};
    use crate::session::Session;
    use crate::task::{Priority, UserSummary};

    fn user(id: u64) -> UserSummary {
        UserSummary {
            id,
            username: format!("user{id}"),
        }
    }

    fn task(id: u64, title: &str, status: Status, assigned_to: u64) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: String::new(),
            status,
            deadline: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            priority: Priority::Medium,
            created_by: Some(user(5)),
            assigned_to: Some(user(assigned_to)),
        }
    }

    fn board(profile_id: u64) -> (Arc<FakeApi>, TaskBoard<FakeApi>) {
        let profile = Profile {
            id: profile_id,
            username: format!("user{profile_id}"),
            profile_picture: None,
        };
        let api = Arc::new(FakeApi::with_tasks(
            vec![
                task(1, "Buy milk", Status::Pending, 5),
                task(2, "File taxes", Status::Completed, 9),
            ],
            profile,
        ));
        let board = TaskBoard::new(Arc::clone(&api));
        (api, board)
    }

    #[tokio::test]
    async fn load_fetches_tasks_and_profile() {
        let (_api, mut board) = board(9);
        board.load().await;
        assert_eq!(board.tasks().len(), 2);
        assert_eq!(board.profile().map(|p| p.id), Some(9));

        board.filters_mut().set_draft_role(RoleFilter::Assigned);
        board.filters_mut().apply();
        let ids: Vec<u64> = board.visible().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_stale_list() {
        let (api, mut board) = board(5);
        board.load().await;
        api.set_failing(true);
        assert!(!board.refresh().await);
        assert!(!board.refresh_profile().await);
        assert_eq!(board.tasks().len(), 2);
        assert!(board.profile().is_some());
    }

    #[tokio::test]
    async fn toggle_flips_status_and_refetches() {
        let (api, mut board) = board(5);
        board.load().await;

        assert_eq!(board.toggle_status(1).await.unwrap(), Status::Completed);
        assert_eq!(board.task(1).map(|t| t.status), Some(Status::Completed));
        let (id, payload) = api.updated().remove(0);
        assert_eq!(id, 1);
        assert_eq!(payload.assigned_to, Some(5));
        assert_eq!(payload.title, "Buy milk");

        assert_eq!(board.toggle_status(1).await.unwrap(), Status::Pending);
        assert_eq!(board.task(1).map(|t| t.status), Some(Status::Pending));
    }

    #[tokio::test]
    async fn toggle_failure_is_a_notice() {
        let (api, mut board) = board(5);
        board.load().await;
        api.set_failing(true);
        let notice = board.toggle_status(1).await.unwrap_err();
        assert_eq!(notice.message, "Failed to update task status");
        assert_eq!(board.task(1).map(|t| t.status), Some(Status::Pending));

        assert!(board.toggle_status(77).await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_after_refetch() {
        let (api, mut board) = board(5);
        board.load().await;
        let notice = board.delete(2).await.unwrap();
        assert_eq!(notice.message, "Task deleted successfully.");
        assert_eq!(api.deleted(), vec![2]);
        assert!(board.task(2).is_none());

        api.set_failing(true);
        let notice = board.delete(1).await.unwrap_err();
        assert_eq!(notice.message, "Failed to delete task.");
    }

    #[tokio::test]
    async fn filters_survive_refresh() {
        let (_api, mut board) = board(5);
        board.load().await;
        board.filters_mut().set_draft_status(StatusFilter::Completed);
        board.filters_mut().apply();
        board.refresh().await;
        let ids: Vec<u64> = board.visible().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn picture_upload_refreshes_profile() {
        let (api, mut board) = board(5);
        board.load().await;
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("me.jpg");
        std::fs::write(&path, [0xff_u8, 0xd8, 0xff, 0xe0]).unwrap();

        let notice = board.change_picture(&path).await.unwrap();
        assert_eq!(notice.message, "Profile picture updated!");
        assert_eq!(api.uploads(), vec![4]);
        assert!(
            board
                .profile()
                .and_then(|p| p.profile_picture.as_ref())
                .is_some()
        );

        let missing = temp.path().join("missing.jpg");
        let notice = board.change_picture(&missing).await.unwrap_err();
        assert_eq!(notice.message, "Something went wrong.");

        api.set_failing(true);
        let notice = board.change_picture(&path).await.unwrap_err();
        assert_eq!(notice.message, "Upload failed!");
    }

    #[tokio::test]
    async fn logout_clears_session_and_state() {
        let (api, mut board) = board(5);
        let temp = tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open");
        store.save(&Session::new("a", Some("r".to_string()))).unwrap();
        api.set_session(Some(Session::new("a", None)));
        board.load().await;

        let route = board.logout(&store).unwrap();
        assert_eq!(route, Route::Login);
        assert_eq!(store.load().unwrap(), None);
        assert!(api.session().is_none());
        assert!(board.tasks().is_empty());
    }

    #[tokio::test]
    async fn edit_form_is_prefilled_from_the_cache() {
        let (_api, mut board) = board(5);
        board.load().await;
        let form = board
            .edit_form(2, crate::lookup::DEFAULT_DEBOUNCE)
            .expect("task 2 cached");
        assert_eq!(form.title, "File taxes");
        assert!(board.edit_form(42, crate::lookup::DEFAULT_DEBOUNCE).is_none());
    }
}
