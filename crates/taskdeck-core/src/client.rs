use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::session::Session;
use crate::task::{Credentials, Profile, Task, TaskPayload, TokenPair, UserSummary};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

const PICTURE_FIELD: &str = "profile_picture";
const PICTURE_FILE_NAME: &str = "profile.jpg";
const PICTURE_MIME: &str = "image/jpeg";

/// Remote task service consumed by the views.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Replaces the session used for authenticated calls.
    fn set_session(&self, session: Option<Session>);

    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;

    async fn register(&self, credentials: &Credentials) -> Result<(), ApiError>;

    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn create_task(&self, payload: &TaskPayload) -> Result<(), ApiError>;

    async fn update_task(&self, id: u64, payload: &TaskPayload) -> Result<(), ApiError>;

    async fn delete_task(&self, id: u64) -> Result<(), ApiError>;

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError>;

    async fn profile(&self) -> Result<Profile, ApiError>;

    async fn upload_picture(&self, image: Vec<u8>) -> Result<(), ApiError>;
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: RwLock<Option<Session>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        Url::parse(trimmed).map_err(|e| ApiError::Url(format!("{trimmed}: {e}")))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        debug!(base_url = trimmed, ?timeout, "built API client");
        Ok(Self {
            http,
            base_url: trimmed.to_string(),
            session: RwLock::new(None),
        })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let base_url = cfg
            .get("api.url")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let timeout = cfg.get_u64("api.timeout_secs")?.map(Duration::from_secs);
        Ok(Self::new(&base_url, timeout)?)
    }

    #[must_use]
    pub fn with_session(self, session: Option<Session>) -> Self {
        *self.session.write() = session;
        self
    }

    pub fn has_session(&self) -> bool {
        self.session.read().is_some()
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let joined = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| ApiError::Url(format!("{joined}: {e}")))
    }

    pub fn user_search_url(&self, query: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("getusers")?;
        url.query_pairs_mut().append_pair("search", query);
        Ok(url)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.access.clone())
            .ok_or(ApiError::NoSession)
    }
}

async fn expect_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "API returned non-success status");
    Err(ApiError::Status { status, body })
}

#[async_trait]
impl TaskApi for ApiClient {
    fn set_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let url = self.endpoint("token/")?;
        let response = self.http.post(url).json(credentials).send().await?;
        let response = expect_success(response).await?;
        let tokens = response.json::<TokenPair>().await?;
        debug!(has_access = tokens.access.is_some(), "received token pair");
        Ok(tokens)
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let url = self.endpoint("register/")?;
        let response = self.http.post(url).json(credentials).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint("tasks/")?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let tasks = expect_success(response).await?.json::<Vec<Task>>().await?;
        debug!(count = tasks.len(), "fetched tasks");
        Ok(tasks)
    }

    #[instrument(skip(self, payload), fields(title = %payload.title))]
    async fn create_task(&self, payload: &TaskPayload) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint("tasks/create/")?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self, payload), fields(status = %payload.status))]
    async fn update_task(&self, id: u64, payload: &TaskPayload) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint(&format!("tasks/update/{id}/"))?;
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: u64) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint(&format!("tasks/delete/{id}/"))?;
        let response = self.http.delete(url).bearer_auth(token).send().await?;
        expect_success(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        let token = self.bearer()?;
        let url = self.user_search_url(query)?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let users = expect_success(response)
            .await?
            .json::<Vec<UserSummary>>()
            .await?;
        debug!(count = users.len(), "fetched user candidates");
        Ok(users)
    }

    #[instrument(skip(self))]
    async fn profile(&self) -> Result<Profile, ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint("profile/")?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        Ok(expect_success(response).await?.json::<Profile>().await?)
    }

    #[instrument(skip(self, image), fields(bytes = image.len()))]
    async fn upload_picture(&self, image: Vec<u8>) -> Result<(), ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint("upload-picture/")?;
        let part = Part::bytes(image)
            .file_name(PICTURE_FILE_NAME)
            .mime_str(PICTURE_MIME)?;
        let form = Form::new().part(PICTURE_FIELD, part);
        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }
}
