use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace, warn};

use crate::client::TaskApi;
use crate::config::Config;
use crate::task::UserSummary;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

pub fn debounce_from_config(cfg: &Config) -> anyhow::Result<Duration> {
    Ok(cfg
        .get_u64("lookup.debounce_ms")?
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_DEBOUNCE))
}

/// A single cancellable timer: scheduling a job replaces whatever job is
/// still waiting (or running), so at most one is ever in flight.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Starts the timer, or restarts it if a job is already pending.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.cancel() {
            trace!("debounce timer reset");
        }

        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        }));
    }

    /// Drops the pending job. Returns whether one was still outstanding.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                let outstanding = !handle.is_finished();
                handle.abort();
                outstanding
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Waits for the pending job, if any, to fire and finish.
    pub async fn settled(&mut self) {
        if let Some(handle) = self.pending.take()
            && let Err(err) = handle.await
            && !err.is_cancelled()
        {
            warn!(error = %err, "debounced job panicked");
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Search-as-you-type assignee picker backed by the remote user directory.
pub struct UserLookup<A> {
    api: Arc<A>,
    debouncer: Debouncer,
    query: String,
    candidates: Arc<Mutex<Vec<UserSummary>>>,
    selected: Option<UserSummary>,
    focused: bool,
}

impl<A> UserLookup<A>
where
    A: TaskApi + 'static,
{
    pub fn new(api: Arc<A>, delay: Duration) -> Self {
        Self {
            api,
            debouncer: Debouncer::new(delay),
            query: String::new(),
            candidates: Arc::new(Mutex::new(Vec::new())),
            selected: None,
            focused: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn candidates(&self) -> Vec<UserSummary> {
        self.candidates.lock().clone()
    }

    pub fn selected(&self) -> Option<&UserSummary> {
        self.selected.as_ref()
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_searching(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Shows `user` as the current choice without searching.
    pub fn preset(&mut self, user: Option<UserSummary>) {
        self.query = user.as_ref().map(|u| u.username.clone()).unwrap_or_default();
        self.selected = user;
    }

    /// One keystroke: the query updates now, the lookup waits for the quiet period.
    #[instrument(skip(self, text))]
    pub fn input(&mut self, text: impl Into<String>) {
        self.query = text.into();
        self.focused = true;

        let api = Arc::clone(&self.api);
        let slot = Arc::clone(&self.candidates);
        let query = self.query.clone();
        trace!(query = %query, "scheduling user lookup");

        self.debouncer.schedule(async move {
            let users = match api.search_users(&query).await {
                Ok(users) => users,
                Err(err) => {
                    warn!(query = %query, error = %err, "user lookup failed");
                    Vec::new()
                }
            };
            debug!(query = %query, count = users.len(), "user lookup finished");
            *slot.lock() = users;
        });
    }

    /// Commits `user` as the assignee and closes the picker.
    #[instrument(skip(self), fields(user_id = user.id))]
    pub fn select(&mut self, user: UserSummary) {
        self.debouncer.cancel();
        self.query = user.username.clone();
        self.candidates.lock().clear();
        self.selected = Some(user);
        self.focused = false;
    }

    pub fn clear(&mut self) {
        self.debouncer.cancel();
        self.query.clear();
        self.candidates.lock().clear();
        self.selected = None;
        self.focused = false;
    }

    pub async fn settled(&mut self) {
        self.debouncer.settled().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::{Instant, sleep};

    use super::*;
    use crate::fake_api::FakeApi;

    fn users() -> Vec<UserSummary> {
        vec![
            UserSummary {
                id: 9,
                username: "ali".to_string(),
            },
            UserSummary {
                id: 12,
                username: "alina".to_string(),
            },
            UserSummary {
                id: 5,
                username: "bob".to_string(),
            },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_fire_one_lookup_for_the_last_text() {
        let api = Arc::new(FakeApi::with_users(users()));
        let mut lookup = UserLookup::new(Arc::clone(&api), DEFAULT_DEBOUNCE);

        lookup.input("a");
        sleep(Duration::from_millis(40)).await;
        lookup.input("al");
        assert_eq!(lookup.query(), "al");
        sleep(Duration::from_millis(40)).await;
        lookup.input("ali");
        let last_keystroke = Instant::now();

        sleep(Duration::from_millis(399)).await;
        assert!(api.search_calls().is_empty());
        assert!(lookup.is_searching());

        lookup.settled().await;
        let calls = api.search_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ali");
        let waited = calls[0].1 - last_keystroke;
        assert!(waited >= DEFAULT_DEBOUNCE);
        assert!(waited < DEFAULT_DEBOUNCE + Duration::from_millis(5));

        let names: Vec<String> = lookup.candidates().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["ali".to_string(), "alina".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_keystrokes_each_trigger_a_lookup() {
        let api = Arc::new(FakeApi::with_users(users()));
        let mut lookup = UserLookup::new(Arc::clone(&api), DEFAULT_DEBOUNCE);

        lookup.input("b");
        lookup.settled().await;
        lookup.input("bo");
        lookup.settled().await;

        let queries: Vec<String> = api.search_calls().into_iter().map(|(q, _)| q).collect();
        assert_eq!(queries, vec!["b".to_string(), "bo".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_commits_and_clears_candidates() {
        let api = Arc::new(FakeApi::with_users(users()));
        let mut lookup = UserLookup::new(Arc::clone(&api), DEFAULT_DEBOUNCE);

        lookup.input("al");
        lookup.settled().await;
        assert!(lookup.is_focused());
        let pick = lookup.candidates()[1].clone();

        lookup.input("ali");
        lookup.select(pick.clone());
        assert_eq!(lookup.selected(), Some(&pick));
        assert_eq!(lookup.query(), "alina");
        assert!(lookup.candidates().is_empty());
        assert!(!lookup.is_focused());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(api.search_calls().len(), 1);
        assert!(lookup.candidates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lookup_yields_no_candidates() {
        let api = Arc::new(FakeApi::with_users(users()));
        let mut lookup = UserLookup::new(Arc::clone(&api), DEFAULT_DEBOUNCE);

        lookup.input("al");
        lookup.settled().await;
        assert_eq!(lookup.candidates().len(), 2);

        api.set_failing(true);
        lookup.input("ali");
        lookup.settled().await;
        assert!(lookup.candidates().is_empty());
        assert!(lookup.selected().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_the_pending_job() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let fired = Arc::new(Mutex::new(0_u32));

        let counter = Arc::clone(&fired);
        debouncer.schedule(async move {
            *counter.lock() += 1;
        });
        assert!(debouncer.is_pending());
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_millis(500)).await;
        debouncer.settled().await;
        assert_eq!(*fired.lock(), 0);
    }

    #[test]
    fn debounce_defaults_to_400ms_and_follows_config() {
        let mut cfg = Config::default();
        assert_eq!(debounce_from_config(&cfg).unwrap(), DEFAULT_DEBOUNCE);
        cfg.apply_overrides(vec![("lookup.debounce_ms".to_string(), "25".to_string())]);
        assert_eq!(
            debounce_from_config(&cfg).unwrap(),
            Duration::from_millis(25)
        );
    }
}
