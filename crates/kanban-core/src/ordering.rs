//! Order keys inside a (project, status) partition.
//!
//! Keys are only compared within one partition. Equal keys are legal and are
//! broken by creation time, then by id.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{KanbanError, KanbanResult};
use crate::task::Task;

pub fn display_cmp(a: &Task, b: &Task) -> Ordering {
    a.order_index
        .cmp(&b.order_index)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by(display_cmp);
}

/// Key for a task appended at the end of the partition.
pub fn next_order_index(tasks: &[Task], project_id: Uuid, status: &str) -> i64 {
    let next = tasks
        .iter()
        .filter(|t| t.project_id == project_id && t.status == status)
        .map(|t| t.order_index)
        .max()
        .map_or(0, |max| max.saturating_add(1));
    trace!(%project_id, status, next, "next order index");
    next
}

/// Tasks of one column, in display order.
pub fn partition<'a>(tasks: &'a [Task], status: &str) -> Vec<&'a Task> {
    let mut out: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
    out.sort_by(|a, b| display_cmp(a, b));
    out
}

/// Validates `new_order` against the current partition and returns the
/// `(id, order_index)` pairs that rewrite it. The sequence must name every
/// task of the partition exactly once.
pub fn plan_reorder(partition: &[&Task], new_order: &[Uuid]) -> KanbanResult<Vec<(Uuid, i64)>> {
    if new_order.len() != partition.len() {
        return Err(KanbanError::validation(format!(
            "reorder lists {} tasks but the column holds {}",
            new_order.len(),
            partition.len()
        )));
    }

    let members: HashSet<Uuid> = partition.iter().map(|t| t.id).collect();
    let mut seen = HashSet::with_capacity(new_order.len());
    for id in new_order {
        if !members.contains(id) {
            return Err(KanbanError::validation(format!(
                "task {id} is not in this column"
            )));
        }
        if !seen.insert(*id) {
            return Err(KanbanError::validation(format!(
                "task {id} is listed twice"
            )));
        }
    }

    let plan: Vec<(Uuid, i64)> = new_order
        .iter()
        .zip(0_i64..)
        .map(|(id, idx)| (*id, idx))
        .collect();
    debug!(count = plan.len(), "planned reorder");
    Ok(plan)
}

/// True when the partition already lists `ids` in that order.
pub fn is_current_order(partition: &[&Task], ids: &[Uuid]) -> bool {
    partition.len() == ids.len() && partition.iter().zip(ids).all(|(t, id)| t.id == *id)
}

/// Moves `id` to `target` (clamped to the end) and returns the new sequence.
/// Used when a card is dragged within its own column.
pub fn reposition(ids: &[Uuid], id: Uuid, target: usize) -> Option<Vec<Uuid>> {
    let from = ids.iter().position(|x| *x == id)?;
    let mut out = ids.to_vec();
    let moved = out.remove(from);
    let target = target.min(out.len());
    out.insert(target, moved);
    Some(out)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::task::{DEFAULT_CATEGORY, Priority};

    fn task(project: Uuid, status: &str, order: i64, minute: i64) -> Task {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).single().expect("date")
            + Duration::minutes(minute);
        Task {
            id: Uuid::new_v4(),
            project_id: project,
            title: format!("task {order}/{minute}"),
            description: String::new(),
            status: status.to_string(),
            priority: Priority::Medium,
            tags: vec![],
            category: DEFAULT_CATEGORY.to_string(),
            color: None,
            order_index: order,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn next_index_appends_within_partition_only() {
        let project = Uuid::new_v4();
        let other = Uuid::new_v4();
        let tasks = vec![
            task(project, "To Do", 3, 0),
            task(project, "Doing", 9, 1),
            task(other, "To Do", 40, 2),
        ];
        assert_eq!(next_order_index(&tasks, project, "To Do"), 4);
        assert_eq!(next_order_index(&tasks, project, "Done"), 0);
    }

    #[test]
    fn equal_keys_fall_back_to_creation_time() {
        let project = Uuid::new_v4();
        let late = task(project, "To Do", 1, 30);
        let early = task(project, "To Do", 1, 5);
        let first = task(project, "To Do", 0, 60);
        let mut tasks = vec![late.clone(), early.clone(), first.clone()];
        sort_for_display(&mut tasks);
        let ids: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.id, early.id, late.id]);
    }

    #[test]
    fn plan_reorder_requires_a_permutation() {
        let project = Uuid::new_v4();
        let tasks = vec![
            task(project, "To Do", 0, 0),
            task(project, "To Do", 1, 1),
            task(project, "Doing", 0, 2),
        ];
        let column = partition(&tasks, "To Do");
        let (a, b) = (tasks[0].id, tasks[1].id);

        let plan = plan_reorder(&column, &[b, a]).expect("plan");
        assert_eq!(plan, vec![(b, 0), (a, 1)]);

        assert!(plan_reorder(&column, &[a]).is_err());
        assert!(plan_reorder(&column, &[a, a]).is_err());
        assert!(plan_reorder(&column, &[a, tasks[2].id]).is_err());
        assert!(is_current_order(&column, &[a, b]));
        assert!(!is_current_order(&column, &[b, a]));
    }

    #[test]
    fn reposition_clamps_target() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let moved = reposition(&ids, ids[0], 10).expect("present");
        assert_eq!(moved, vec![ids[1], ids[2], ids[0]]);
        let moved = reposition(&ids, ids[2], 0).expect("present");
        assert_eq!(moved, vec![ids[2], ids[0], ids[1]]);
        assert!(reposition(&ids, Uuid::new_v4(), 0).is_none());
    }
}
