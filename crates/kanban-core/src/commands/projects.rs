use anyhow::{anyhow, bail};
use tracing::{info, instrument, warn};

use super::{Ctx, describe};
use crate::board::Board;
use crate::columns;
use crate::project::{NewProject, Project, ProjectPatch};

#[instrument(skip(ctx, args))]
pub(super) fn cmd_login(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let name = args.join(" ");
    let profile = ctx.store.login(&name)?;
    info!(profile = %profile.id, "signed in");
    println!("Signed in as {}.", profile.name);
    Ok(())
}

pub(super) fn cmd_logout(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    ctx.store.logout()?;
    println!("Signed out.");
    Ok(())
}

pub(super) fn cmd_whoami(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    match ctx.store.current_profile()? {
        Some(profile) => println!("{} ({})", profile.name, profile.id),
        None => println!("Not signed in."),
    }
    Ok(())
}

#[instrument(skip(ctx))]
pub(super) async fn cmd_projects(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let projects = ctx.session.projects().await.map_err(describe)?;
    if projects.is_empty() {
        println!("No projects. Create one with `kanban project add <title>`.");
        return Ok(());
    }
    let active = ctx.store.active_project()?;
    ctx.renderer.print_projects(&projects, active)
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_project(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((action, rest)) = args.split_first() else {
        bail!("project: expected add, use, edit or delete");
    };

    match action.as_str() {
        "add" => project_add(ctx, rest).await,
        "use" => {
            let project = find_project(ctx, &rest.join(" ")).await?;
            ctx.store.set_active_project(Some(project.id))?;
            println!("Now using project '{}'.", project.title);
            Ok(())
        }
        "edit" => project_edit(ctx, rest).await,
        "delete" => {
            let project = find_project(ctx, &rest.join(" ")).await?;
            ctx.session
                .delete_project(project.id)
                .await
                .map_err(describe)?;
            if ctx.store.active_project()? == Some(project.id) {
                ctx.store.set_active_project(None)?;
            }
            println!("Deleted project '{}'.", project.title);
            Ok(())
        }
        other => Err(anyhow!("project: unknown action '{other}'")),
    }
}

async fn project_add(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let (words, fields) = split_fields(args);
    let mut new = NewProject::new(words.join(" "));
    for (key, value) in fields {
        match key.as_str() {
            "desc" | "description" => new.description = value,
            "columns" => new.columns = Some(columns::parse_column_list(&value)),
            other => bail!("project add: unknown field '{other}'"),
        }
    }

    let project = ctx.session.create_project(new).await.map_err(describe)?;
    ctx.store.set_active_project(Some(project.id))?;
    println!(
        "Created project '{}' ({}) with columns {}.",
        project.title,
        project.short_id(),
        project.columns.join(" | ")
    );
    Ok(())
}

async fn project_edit(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((reference, rest)) = args.split_first() else {
        bail!("project edit: which project?");
    };
    let project = find_project(ctx, reference).await?;

    let (words, fields) = split_fields(rest);
    if !words.is_empty() {
        warn!(?words, "ignoring bare words; use title:<text>");
    }
    let mut patch = ProjectPatch::default();
    for (key, value) in fields {
        match key.as_str() {
            "title" => patch.title = Some(value),
            "desc" | "description" => patch.description = Some(value),
            other => bail!("project edit: unknown field '{other}'"),
        }
    }
    if patch == ProjectPatch::default() {
        bail!("project edit: nothing to change");
    }

    let updated = ctx
        .session
        .update_project(project.id, patch)
        .await
        .map_err(describe)?;
    println!("Updated project '{}'.", updated.title);
    Ok(())
}

/// The board commands act on: the remembered project when it still exists,
/// otherwise the newest one.
#[instrument(skip(ctx))]
pub(super) async fn open_active_board(ctx: &Ctx<'_>) -> anyhow::Result<Board> {
    let projects = ctx.session.projects().await.map_err(describe)?;
    let remembered = ctx.store.active_project()?;
    let project = remembered
        .and_then(|id| projects.iter().find(|p| p.id == id))
        .or_else(|| projects.first())
        .ok_or_else(|| anyhow!("no projects yet; create one with `kanban project add <title>`"))?;

    if remembered != Some(project.id) {
        info!(project = %project.id, "switching to newest project");
        ctx.store.set_active_project(Some(project.id))?;
    }
    ctx.session.open_board(project.id).await.map_err(describe)
}

/// Matches a project by id prefix or by exact title, ignoring case.
async fn find_project(ctx: &Ctx<'_>, reference: &str) -> anyhow::Result<Project> {
    let reference = reference.trim();
    if reference.is_empty() {
        bail!("a project id or title is required");
    }
    let projects = ctx.session.projects().await.map_err(describe)?;
    pick_project(projects, reference)
}

fn pick_project(projects: Vec<Project>, reference: &str) -> anyhow::Result<Project> {
    let wanted = reference.replace('-', "").to_ascii_lowercase();
    let mut matches: Vec<Project> = projects
        .into_iter()
        .filter(|p| {
            p.title.eq_ignore_ascii_case(reference)
                || p.id.simple().to_string().starts_with(&wanted)
        })
        .collect();

    match matches.len() {
        0 => Err(anyhow!("no project matches '{reference}'")),
        1 => Ok(matches.remove(0)),
        _ => Err(anyhow!("'{reference}' matches more than one project")),
    }
}

/// Splits `key:value` fields from bare words.
fn split_fields(args: &[String]) -> (Vec<String>, Vec<(String, String)>) {
    let mut words = Vec::new();
    let mut fields = Vec::new();
    for arg in args {
        match arg.split_once(':') {
            Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
                fields.push((key.to_ascii_lowercase(), value.to_string()));
            }
            _ => words.push(arg.clone()),
        }
    }
    (words, fields)
}
