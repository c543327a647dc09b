use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use tracing::{debug, info, instrument};

use crate::auth;
use crate::board::TaskBoard;
use crate::cli::{Command, ListArgs, TaskFields};
use crate::client::TaskApi;
use crate::config::Config;
use crate::datetime::today;
use crate::filter::DraftFilter;
use crate::form::TaskForm;
use crate::lookup::{UserLookup, debounce_from_config};
use crate::notice::Notice;
use crate::render::Renderer;
use crate::session::{Route, SessionStore};
use crate::task::UserSummary;

pub const LOGIN_HINT: &str = "Not logged in. Run `taskdeck login <username>` first.";

/// Shared handles every command runs against.
pub struct Ctx<'a, A> {
    pub api: Arc<A>,
    pub store: &'a SessionStore,
    pub renderer: &'a Renderer,
    pub debounce: Duration,
}

impl<'a, A> Ctx<'a, A>
where
    A: TaskApi + 'static,
{
    pub fn new(
        api: Arc<A>,
        store: &'a SessionStore,
        cfg: &Config,
        renderer: &'a Renderer,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            api,
            store,
            renderer,
            debounce: debounce_from_config(cfg)?,
        })
    }

    fn board(&self) -> TaskBoard<A> {
        TaskBoard::new(Arc::clone(&self.api))
    }
}

#[instrument(skip(ctx, command))]
pub async fn dispatch<A>(ctx: &Ctx<'_, A>, command: Option<Command>) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let Some(command) = command else {
        return match ctx.store.initial_route() {
            Route::Home => cmd_list(ctx, ListArgs::default()).await,
            Route::Login => {
                println!("{LOGIN_HINT}");
                Ok(())
            }
        };
    };

    debug!(?command, "dispatching command");
    match command {
        Command::Login { username, password } => {
            auth::login(ctx.api.as_ref(), ctx.store, &username, &password).await?;
            println!("Logged in as {}.", username.trim());
            Ok(())
        }
        Command::Signup { username, password } => {
            let notice = auth::signup(ctx.api.as_ref(), &username, &password).await?;
            ctx.renderer.print_notice(&notice)
        }
        Command::Logout => {
            auth::logout(ctx.api.as_ref(), ctx.store)?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => cmd_whoami(ctx).await,
        Command::List(args) => cmd_list(ctx, args).await,
        Command::Add(fields) => cmd_add(ctx, fields).await,
        Command::Edit { id, fields } => cmd_edit(ctx, id, fields).await,
        Command::Toggle { id } => cmd_toggle(ctx, id).await,
        Command::Delete { id } => {
            let notice = ctx.board().delete(id).await?;
            ctx.renderer.print_notice(&notice)
        }
        Command::Users { query } => {
            let users = ctx
                .api
                .search_users(&query)
                .await
                .context("user search failed")?;
            ctx.renderer.print_users(&users)
        }
        Command::Picture { path } => cmd_picture(ctx, &path).await,
    }
}

async fn cmd_whoami<A>(ctx: &Ctx<'_, A>) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let profile = ctx
        .api
        .profile()
        .await
        .context("failed to fetch profile")?;
    ctx.renderer.print_profile(&profile)
}

#[instrument(skip(ctx))]
async fn cmd_list<A>(ctx: &Ctx<'_, A>, args: ListArgs) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let mut board = ctx.board();
    if !board.refresh().await {
        bail!("failed to fetch tasks");
    }
    board.refresh_profile().await;

    let filters = board.filters_mut();
    filters.set_query(args.search.unwrap_or_default());
    filters.set_draft(
        DraftFilter::default()
            .with_status(args.status)
            .with_priority(args.priority)
            .with_role(args.role),
    );
    filters.apply();

    let visible = board.visible();
    info!(
        total = board.tasks().len(),
        shown = visible.len(),
        filtered = !board.filters().active().is_unfiltered(),
        "listing tasks"
    );
    ctx.renderer.print_task_table(&visible, today())
}

async fn cmd_add<A>(ctx: &Ctx<'_, A>, fields: TaskFields) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let mut form = TaskForm::new(Arc::clone(&ctx.api), ctx.debounce);
    apply_fields(&mut form, fields).await?;
    let outcome = form.submit().await?;
    ctx.renderer.print_notice(&outcome.notice())
}

async fn cmd_edit<A>(ctx: &Ctx<'_, A>, id: u64, fields: TaskFields) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let mut board = ctx.board();
    if !board.refresh().await {
        bail!("failed to fetch tasks");
    }
    let mut form = board
        .edit_form(id, ctx.debounce)
        .ok_or_else(|| anyhow!("no task with id {id}"))?;
    apply_fields(&mut form, fields).await?;
    let outcome = form.submit().await?;
    ctx.renderer.print_notice(&outcome.notice())
}

async fn cmd_toggle<A>(ctx: &Ctx<'_, A>, id: u64) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let mut board = ctx.board();
    if !board.refresh().await {
        bail!("failed to fetch tasks");
    }
    let status = board.toggle_status(id).await?;
    ctx.renderer
        .print_notice(&Notice::success(format!("Task {id} marked {status}.")))
}

async fn cmd_picture<A>(ctx: &Ctx<'_, A>, path: &Path) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    let mut board = ctx.board();
    let notice = board.change_picture(path).await?;
    ctx.renderer.print_notice(&notice)
}

/// Copies the flags that were given onto the form.
async fn apply_fields<A>(form: &mut TaskForm<A>, fields: TaskFields) -> anyhow::Result<()>
where
    A: TaskApi + 'static,
{
    if let Some(title) = fields.title {
        form.title = title;
    }
    if let Some(description) = fields.description {
        form.description = description;
    }
    if let Some(deadline) = fields.deadline {
        form.set_deadline_input(&deadline, today())?;
    }
    if let Some(priority) = fields.priority {
        form.priority = priority;
    }
    if let Some(query) = fields.assignee {
        resolve_assignee(form.assignee_lookup(), &query).await?;
    }
    Ok(())
}

/// Runs the typed query through the lookup and commits the one user it
/// identifies: an exact name match, else the only candidate.
pub async fn resolve_assignee<A>(
    lookup: &mut UserLookup<A>,
    query: &str,
) -> anyhow::Result<UserSummary>
where
    A: TaskApi + 'static,
{
    lookup.input(query.trim());
    lookup.settled().await;

    let candidates = lookup.candidates();
    let exact = candidates
        .iter()
        .find(|u| u.username.eq_ignore_ascii_case(query.trim()));
    let pick = match (exact, candidates.as_slice()) {
        (Some(user), _) => user.clone(),
        (None, [only]) => only.clone(),
        (None, []) => bail!("no user matches {query:?}"),
        (None, many) => {
            let names: Vec<&str> = many.iter().map(|u| u.username.as_str()).collect();
            bail!("{query:?} matches several users: {}", names.join(", "))
        }
    };

    lookup.select(pick.clone());
    Ok(pick)
}
