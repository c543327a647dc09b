//! In-memory stand-in for the remote service, used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use tokio::time::Instant;

use crate::client::TaskApi;
use crate::error::ApiError;
use crate::session::Session;
use crate::task::{Credentials, Profile, Task, TaskPayload, TokenPair, UserSummary};

#[derive(Default)]
struct FakeState {
    tasks: Vec<Task>,
    users: Vec<UserSummary>,
    profile: Option<Profile>,
    tokens: Option<TokenPair>,
    session: Option<Session>,
    failing: bool,
    search_calls: Vec<(String, Instant)>,
    created: Vec<TaskPayload>,
    updated: Vec<(u64, TaskPayload)>,
    deleted: Vec<u64>,
    registered: Vec<String>,
    uploads: Vec<usize>,
    requests: usize,
}

#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: "boom".to_string(),
    }
}

impl FakeApi {
    pub fn with_users(users: Vec<UserSummary>) -> Self {
        let api = Self::default();
        api.state.lock().users = users;
        api
    }

    pub fn with_tasks(tasks: Vec<Task>, profile: Profile) -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock();
            state.tasks = tasks;
            state.profile = Some(profile);
        }
        api
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn set_tokens(&self, tokens: TokenPair) {
        self.state.lock().tokens = Some(tokens);
    }

    pub fn set_users(&self, users: Vec<UserSummary>) {
        self.state.lock().users = users;
    }

    pub fn session(&self) -> Option<Session> {
        self.state.lock().session.clone()
    }

    pub fn search_calls(&self) -> Vec<(String, Instant)> {
        self.state.lock().search_calls.clone()
    }

    pub fn created(&self) -> Vec<TaskPayload> {
        self.state.lock().created.clone()
    }

    pub fn updated(&self) -> Vec<(u64, TaskPayload)> {
        self.state.lock().updated.clone()
    }

    pub fn deleted(&self) -> Vec<u64> {
        self.state.lock().deleted.clone()
    }

    pub fn registered(&self) -> Vec<String> {
        self.state.lock().registered.clone()
    }

    pub fn uploads(&self) -> Vec<usize> {
        self.state.lock().uploads.clone()
    }

    pub fn requests(&self) -> usize {
        self.state.lock().requests
    }

    fn begin(&self) -> Result<parking_lot::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state.lock();
        state.requests += 1;
        if state.failing {
            return Err(server_error());
        }
        Ok(state)
    }
}

fn user_by_id(users: &[UserSummary], id: Option<u64>) -> Option<UserSummary> {
    let id = id?;
    users
        .iter()
        .find(|u| u.id == id)
        .cloned()
        .or(Some(UserSummary {
            id,
            username: format!("user{id}"),
        }))
}

#[async_trait]
impl TaskApi for FakeApi {
    fn set_session(&self, session: Option<Session>) {
        self.state.lock().session = session;
    }

    async fn login(&self, _credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let state = self.begin()?;
        state.tokens.clone().ok_or(ApiError::Status {
            status: StatusCode::UNAUTHORIZED,
            body: "bad credentials".to_string(),
        })
    }

    async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let mut state = self.begin()?;
        state.registered.push(credentials.username.clone());
        Ok(())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let state = self.begin()?;
        Ok(state.tasks.clone())
    }

    async fn create_task(&self, payload: &TaskPayload) -> Result<(), ApiError> {
        let mut state = self.begin()?;
        let id = state.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let created_by = state.profile.as_ref().map(|p| UserSummary {
            id: p.id,
            username: p.username.clone(),
        });
        let assigned_to = user_by_id(&state.users, payload.assigned_to);
        state.tasks.push(Task {
            id,
            title: payload.title.clone(),
            description: payload.description.clone(),
            status: payload.status,
            deadline: payload.deadline,
            priority: payload.priority,
            created_by,
            assigned_to,
        });
        state.created.push(payload.clone());
        Ok(())
    }

    async fn update_task(&self, id: u64, payload: &TaskPayload) -> Result<(), ApiError> {
        let mut state = self.begin()?;
        let assigned_to = user_by_id(&state.users, payload.assigned_to);
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ApiError::Status {
                status: StatusCode::NOT_FOUND,
                body: "not found".to_string(),
            })?;
        task.title = payload.title.clone();
        task.description = payload.description.clone();
        task.status = payload.status;
        task.deadline = payload.deadline;
        task.priority = payload.priority;
        task.assigned_to = assigned_to;
        state.updated.push((id, payload.clone()));
        Ok(())
    }

    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let mut state = self.begin()?;
        state.tasks.retain(|t| t.id != id);
        state.deleted.push(id);
        Ok(())
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        let mut state = self.begin()?;
        state.search_calls.push((query.to_string(), Instant::now()));
        let needle = query.to_lowercase();
        Ok(state
            .users
            .iter()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn profile(&self) -> Result<Profile, ApiError> {
        let state = self.begin()?;
        state.profile.clone().ok_or(ApiError::NoSession)
    }

    async fn upload_picture(&self, image: Vec<u8>) -> Result<(), ApiError> {
        let mut state = self.begin()?;
        state.uploads.push(image.len());
        if let Some(profile) = state.profile.as_mut() {
            profile.profile_picture = Some("/media/profile.jpg".to_string());
        }
        Ok(())
    }
}
