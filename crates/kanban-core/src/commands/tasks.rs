use anyhow::{Context as _, anyhow, bail};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::modifiers::{self, Mod};
use super::projects::open_active_board;
use super::{Ctx, describe, settle};
use crate::board::Board;
use crate::columns::{self, Direction};
use crate::filter::{self, FilterState};

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_add(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let (title, mods) = modifiers::parse_title_and_mods(args)?;
    let board = open_active_board(ctx).await?;

    let mut new = board.draft(title);
    modifiers::apply_to_new(&mut new, &mods);
    let task = board.create_task(new).await.map_err(describe)?;

    println!(
        "Created task {} in '{}': {}",
        task.short_id(),
        task.status,
        task.title
    );
    Ok(())
}

#[instrument(skip(ctx, filter_terms))]
pub(super) async fn cmd_list(ctx: &Ctx<'_>, filter_terms: &[String]) -> anyhow::Result<()> {
    let board = filtered_board(ctx, filter_terms).await?;
    ctx.renderer.print_task_table(&board.visible_tasks())
}

#[instrument(skip(ctx, filter_terms))]
pub(super) async fn cmd_board(ctx: &Ctx<'_>, filter_terms: &[String]) -> anyhow::Result<()> {
    let board = filtered_board(ctx, filter_terms).await?;
    let sections: Vec<(String, Vec<_>)> = board
        .columns()
        .into_iter()
        .map(|label| {
            let tasks = board.visible_column(&label);
            (label, tasks)
        })
        .collect();
    ctx.renderer
        .print_board(&board.project(), &sections, !board.filter().is_empty())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_info(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(task_ref(args, "info")?)?;
    ctx.renderer.print_task_info(&task)
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_edit(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((reference, rest)) = args.split_first() else {
        bail!("edit: which task?");
    };
    let mods = modifiers::parse_mods(rest)?;
    if mods.is_empty() {
        bail!("edit: nothing to change");
    }

    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(reference)?;

    // A column change goes through the transition rules like any other move.
    let target = mods.iter().rev().find_map(|m| match m {
        Mod::Status(status) => Some(status.clone()),
        _ => None,
    });
    let rest: Vec<Mod> = mods
        .into_iter()
        .filter(|m| !matches!(m, Mod::Status(_)))
        .collect();

    let patch = modifiers::patch_for(&task, &rest);
    if !patch.is_empty() {
        board.update_task(task.id, patch).await.map_err(describe)?;
    }
    if let Some(target) = target {
        let label = column_label(&board, &target)?;
        settle(board.move_to(task.id, &label).await)?;
    }

    println!("Modified task {}.", task.short_id());
    Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_delete(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(task_ref(args, "delete")?)?;
    board.delete_task(task.id).await.map_err(describe)?;
    println!("Deleted task {}: {}", task.short_id(), task.title);
    Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_move(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let [reference, direction] = args else {
        bail!("move: expected <task> left|right");
    };
    let direction: Direction = direction.parse()?;
    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(reference)?;

    report_move(settle(board.move_step(task.id, direction).await)?, &task.short_id());
    Ok(())
}

/// Moves a card as a drag and drop would: pick it up, hover the target,
/// drop.
#[instrument(skip(ctx, args))]
pub(super) async fn cmd_drop(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((reference, rest)) = args.split_first() else {
        bail!("drop: expected <task> <column>");
    };
    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(reference)?;

    board.begin_drag(task.id)?;
    let label = match column_label(&board, &rest.join(" ")) {
        Ok(label) => label,
        Err(err) => {
            board.cancel_drag();
            return Err(err);
        }
    };
    board.drag_over(&label);
    report_move(settle(board.drop_on(&label).await)?, &task.short_id());
    Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_reorder(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((column, refs)) = args.split_first() else {
        bail!("reorder: expected <column> <task>...");
    };
    let board = open_active_board(ctx).await?;
    let label = column_label(&board, column)?;
    let ids = refs
        .iter()
        .map(|r| board.resolve_task(r).map(|t| t.id))
        .collect::<Result<Vec<Uuid>, _>>()?;

    if settle(board.reorder(&label, &ids).await)?.is_some() {
        println!("Reordered '{label}'.");
    }
    Ok(())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_position(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let [reference, index] = args else {
        bail!("position: expected <task> <index>");
    };
    let index: usize = index
        .parse()
        .with_context(|| format!("position: '{index}' is not an index"))?;
    let board = open_active_board(ctx).await?;
    let task = board.resolve_task(reference)?;

    if settle(board.reposition(task.id, index).await)?.is_some() {
        println!("Task {} is now at position {index} of '{}'.", task.short_id(), task.status);
    }
    Ok(())
}

#[instrument(skip(ctx, filter_terms))]
pub(super) async fn cmd_stats(ctx: &Ctx<'_>, filter_terms: &[String]) -> anyhow::Result<()> {
    let board = filtered_board(ctx, filter_terms).await?;
    ctx.renderer.print_stats(&board.stats())
}

pub(super) async fn cmd_tags(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let board = open_active_board(ctx).await?;
    ctx.renderer.print_list(&filter::available_tags(&board.tasks()))
}

pub(super) async fn cmd_categories(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let board = open_active_board(ctx).await?;
    ctx.renderer
        .print_list(&filter::available_categories(&board.tasks()))
}

pub(super) async fn cmd_columns(ctx: &Ctx<'_>) -> anyhow::Result<()> {
    let board = open_active_board(ctx).await?;
    ctx.renderer.print_list(&board.columns())
}

#[instrument(skip(ctx, args))]
pub(super) async fn cmd_column(ctx: &Ctx<'_>, args: &[String]) -> anyhow::Result<()> {
    let Some((action, rest)) = args.split_first() else {
        bail!("column: expected add or remove");
    };
    let board = open_active_board(ctx).await?;

    match action.as_str() {
        "add" => {
            // A trailing number is the insert position.
            let (label, at) = match rest.split_last() {
                Some((last, words)) if !words.is_empty() => match last.parse::<usize>() {
                    Ok(at) => (words.join(" "), Some(at)),
                    Err(_) => (rest.join(" "), None),
                },
                _ => (rest.join(" "), None),
            };
            let project = board.add_column(&label, at).await.map_err(describe)?;
            println!("Columns: {}", project.columns.join(" | "));
            Ok(())
        }
        "remove" => {
            let label = column_label(&board, &rest.join(" "))?;
            let displaced = board.column(&label).len();
            let project = board.remove_column(&label).await.map_err(describe)?;
            if displaced > 0 {
                info!(column = %label, displaced, "column removed with tasks");
            }
            println!("Columns: {}", project.columns.join(" | "));
            Ok(())
        }
        other => Err(anyhow!("column: unknown action '{other}'")),
    }
}

async fn filtered_board(ctx: &Ctx<'_>, filter_terms: &[String]) -> anyhow::Result<Board> {
    let board = open_active_board(ctx).await?;
    let filter = FilterState::parse(filter_terms)?;
    debug!(active = filter.active_count(), "filter applied");
    board.set_filter(filter);
    Ok(board)
}

fn task_ref<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    match args {
        [reference] => Ok(reference),
        [] => Err(anyhow!("{command}: which task?")),
        _ => Err(anyhow!("{command}: expected a single task id")),
    }
}

fn column_label(board: &Board, raw: &str) -> anyhow::Result<String> {
    let columns = board.columns();
    columns::resolve_label(&columns, raw)
        .map(ToString::to_string)
        .ok_or_else(|| {
            anyhow!(
                "no column named '{raw}' (columns: {})",
                columns.join(", ")
            )
        })
}

fn report_move(moved: Option<crate::task::Task>, short_id: &str) {
    match moved {
        Some(task) => println!("Moved task {short_id} to '{}'.", task.status),
        None => println!("Task {short_id} stays where it is."),
    }
}
