mod modifiers;
mod projects;
mod tasks;

use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::error::{KanbanError, KanbanResult};
use crate::render::Renderer;
use crate::session::{BoardSettings, Session, StderrNotifier};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "login",
        "logout",
        "whoami",
        "projects",
        "project",
        "columns",
        "column",
        "add",
        "list",
        "board",
        "info",
        "edit",
        "delete",
        "move",
        "drop",
        "reorder",
        "position",
        "stats",
        "tags",
        "categories",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command handler needs for one run.
pub(crate) struct Ctx<'a> {
    pub store: Arc<DataStore>,
    pub session: Session,
    pub renderer: &'a Renderer,
}

#[instrument(skip(store, cfg, renderer, inv))]
pub async fn dispatch(
    store: Arc<DataStore>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let session = Session::new(
        store.clone(),
        store.clone(),
        Arc::new(StderrNotifier),
        BoardSettings::from_config(cfg),
    );
    let ctx = Ctx {
        store,
        session,
        renderer,
    };
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();
    let filter = inv.filter_terms.as_slice();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "login" => projects::cmd_login(&ctx, args),
        "logout" => projects::cmd_logout(&ctx),
        "whoami" => projects::cmd_whoami(&ctx),
        "projects" => projects::cmd_projects(&ctx).await,
        "project" => projects::cmd_project(&ctx, args).await,
        "columns" => tasks::cmd_columns(&ctx).await,
        "column" => tasks::cmd_column(&ctx, args).await,
        "add" => tasks::cmd_add(&ctx, args).await,
        "list" => tasks::cmd_list(&ctx, filter).await,
        "board" => tasks::cmd_board(&ctx, filter).await,
        "info" => tasks::cmd_info(&ctx, args).await,
        "edit" => tasks::cmd_edit(&ctx, args).await,
        "delete" => tasks::cmd_delete(&ctx, args).await,
        "move" => tasks::cmd_move(&ctx, args).await,
        "drop" => tasks::cmd_drop(&ctx, args).await,
        "reorder" => tasks::cmd_reorder(&ctx, args).await,
        "position" => tasks::cmd_position(&ctx, args).await,
        "stats" => tasks::cmd_stats(&ctx, filter).await,
        "tags" => tasks::cmd_tags(&ctx).await,
        "categories" => tasks::cmd_categories(&ctx).await,
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Turns a rejected transition into a quiet no-op; every other error is
/// passed on.
pub(crate) fn settle<T>(result: KanbanResult<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_silent() => {
            info!(reason = %err, "request ignored");
            Ok(None)
        }
        Err(err) => Err(describe(err)),
    }
}

/// Adds a hint for the one failure the user can fix on the spot.
pub(crate) fn describe(err: KanbanError) -> anyhow::Error {
    let unauthenticated = matches!(
        &err,
        KanbanError::Collaborator(inner) if inner.is_unauthenticated()
    );
    if unauthenticated {
        anyhow!("not signed in; run `kanban login <name>` first")
    } else {
        err.into()
    }
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: kanban [options] [filter] <command> [args]

accounts
  login <name>                 sign in, creating the profile on first use
  logout | whoami

projects
  projects                     list your projects (* marks the active one)
  project add <title> [desc:..] [columns:A,B,C]
  project use <project>        make a project the active board
  project edit <project> [title:..] [desc:..]
  project delete <project>

columns
  columns                      list the active board's columns
  column add <label> [index]
  column remove <label>        tasks move to the neighbouring column

tasks (refer to a task by a prefix of its id)
  add <title> [mods]           mods: pri:<p> +tag -tag cat:<c> color:#hex
                               status:<column> desc:<text>
  list | board | stats         honour filter terms: +tag pri:high,urgent cat:x
  info <task> | edit <task> [mods] | delete <task>
  move <task> left|right       one column step
  drop <task> <column>         straight to a column
  reorder <column> <task>...   new order for a whole column
  position <task> <index>      move within its column
  tags | categories

options
  -v/-q, --rc key=value, --kanbanrc <file>, --data <dir>, rc.key=value"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand_when_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("bo", &known), Some("board"));
        assert_eq!(expand_command_abbrev("project", &known), Some("project"));
        assert_eq!(expand_command_abbrev("p", &known), None);
        assert_eq!(expand_command_abbrev("nope", &known), None);
    }
}
