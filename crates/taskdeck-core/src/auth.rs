use tracing::{error, info, instrument, warn};

use crate::client::TaskApi;
use crate::error::ValidationError;
use crate::notice::Notice;
use crate::session::{Route, Session, SessionStore};
use crate::task::Credentials;

pub const LOGIN_FIELDS_MESSAGE: &str = "Please fill in both fields.";
pub const SIGNUP_FIELDS_MESSAGE: &str = "Both fields are required.";

fn credentials(
    username: &str,
    password: &str,
    message: &str,
) -> Result<Credentials, ValidationError> {
    let mut missing = Vec::new();
    if username.trim().is_empty() {
        missing.push("username");
    }
    if password.is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(ValidationError::missing(message, missing));
    }
    Ok(Credentials {
        username: username.trim().to_string(),
        password: password.to_string(),
    })
}

/// Exchanges credentials for tokens, persists them and hands them to `api`.
#[instrument(skip(api, store, password))]
pub async fn login<A>(
    api: &A,
    store: &SessionStore,
    username: &str,
    password: &str,
) -> Result<Session, Notice>
where
    A: TaskApi + ?Sized,
{
    let creds = credentials(username, password, LOGIN_FIELDS_MESSAGE).map_err(|err| {
        warn!(missing = ?err.missing, "login rejected");
        Notice::from(err)
    })?;

    let tokens = api.login(&creds).await.map_err(|err| {
        error!(error = %err, "login failed");
        Notice::error("Invalid username or password.")
    })?;

    let Some(access) = tokens.access.filter(|a| !a.is_empty()) else {
        error!("login response carried no access token");
        return Err(Notice::error("Token not received."));
    };

    let session = Session::new(access, tokens.refresh);
    store.save(&session).map_err(|err| {
        error!(error = %err, "failed persisting session");
        Notice::something_went_wrong()
    })?;
    api.set_session(Some(session.clone()));

    info!(username = %creds.username, "logged in");
    Ok(session)
}

#[instrument(skip(api, password))]
pub async fn signup<A>(api: &A, username: &str, password: &str) -> Result<Notice, Notice>
where
    A: TaskApi + ?Sized,
{
    let creds = credentials(username, password, SIGNUP_FIELDS_MESSAGE).map_err(|err| {
        warn!(missing = ?err.missing, "signup rejected");
        Notice::from(err)
    })?;

    api.register(&creds).await.map_err(|err| {
        error!(error = %err, "signup failed");
        Notice::error("Try another username or check your internet.")
    })?;

    info!(username = %creds.username, "account created");
    Ok(Notice::success("Account created. You can now login."))
}

/// Drops both tokens locally and on the client.
pub fn logout<A>(api: &A, store: &SessionStore) -> anyhow::Result<Route>
where
    A: TaskApi + ?Sized,
{
    store.clear()?;
    api.set_session(None);
    info!("logged out");
    Ok(Route::Login)
}
