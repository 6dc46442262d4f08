use serde::Serialize;
use tracing::{instrument, warn};

use crate::columns;
use crate::task::{Priority, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnStat {
    pub label: String,
    pub count: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub urgent: usize,
}

impl PriorityCounts {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::Low => self.low,
            Priority::Medium => self.medium,
            Priority::High => self.high,
            Priority::Urgent => self.urgent,
        }
    }

    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
            Priority::Urgent => self.urgent += 1,
        }
    }
}

/// Aggregates over the full, unfiltered task set of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardStats {
    pub total: usize,
    pub completed: usize,
    pub completion_percent: u32,
    pub columns: Vec<ColumnStat>,
    pub priorities: PriorityCounts,
    /// Tasks whose status names no current column. Zero unless the column
    /// list changed under a stale task set.
    pub unplaced: usize,
}

/// `part / total` as a whole percentage, half rounded up; 0 when `total`
/// is 0.
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let part = part.min(total) as u64;
    let total = total as u64;
    ((200 * part + total) / (2 * total)) as u32
}

#[instrument(skip(tasks, columns), fields(tasks = tasks.len(), columns = columns.len()))]
pub fn compute(tasks: &[Task], columns: &[String]) -> BoardStats {
    let total = tasks.len();
    let completed = count_done(tasks, columns);

    // Repeated labels are reported once.
    let mut column_stats: Vec<ColumnStat> = Vec::with_capacity(columns.len());
    for label in columns {
        if column_stats.iter().any(|c| &c.label == label) {
            continue;
        }
        let count = tasks.iter().filter(|t| &t.status == label).count();
        column_stats.push(ColumnStat {
            label: label.clone(),
            count,
            percent: percent(count, total),
        });
    }

    let placed = tasks
        .iter()
        .filter(|t| columns::position(columns, &t.status).is_some())
        .count();
    let unplaced = total - placed;
    if unplaced > 0 {
        warn!(unplaced, "tasks reference columns that no longer exist");
    }

    let mut priorities = PriorityCounts::default();
    for task in tasks {
        priorities.bump(task.priority);
    }

    BoardStats {
        total,
        completed,
        completion_percent: percent(completed, total),
        columns: column_stats,
        priorities,
        unplaced,
    }
}

fn count_done(tasks: &[Task], columns: &[String]) -> usize {
    match columns.last() {
        Some(last) => tasks.iter().filter(|t| &t.status == last).count(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::columns::default_columns;

    fn task(status: &str, priority: Priority) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            title: "t".to_string(),
            description: String::new(),
            status: status.to_string(),
            priority,
            tags: vec![],
            category: "general".to_string(),
            color: None,
            order_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_board_is_zero_percent() {
        let stats = compute(&[], &default_columns());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.completion_percent, 0);
        assert!(stats.columns.iter().all(|c| c.count == 0 && c.percent == 0));
    }

    #[test]
    fn thirds_round_independently() {
        let tasks = vec![
            task("To Do", Priority::Low),
            task("Doing", Priority::Medium),
            task("Done", Priority::Urgent),
        ];
        let stats = compute(&tasks, &default_columns());
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.completion_percent, 33);
        let percents: Vec<u32> = stats.columns.iter().map(|c| c.percent).collect();
        assert_eq!(percents, vec![33, 33, 33]);
        assert_eq!(stats.columns.iter().map(|c| c.count).sum::<usize>(), stats.total);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 5), 100);
        assert_eq!(percent(0, 0), 0);
    }

    #[test]
    fn completion_stays_within_bounds() {
        let columns = default_columns();
        for done in 0..6 {
            let mut tasks: Vec<Task> = (0..done).map(|_| task("Done", Priority::High)).collect();
            tasks.extend((0..(5 - done)).map(|_| task("To Do", Priority::High)));
            let pct = compute(&tasks, &columns).completion_percent;
            assert!(pct <= 100);
        }
    }

    #[test]
    fn priority_counts_treat_unknown_as_medium() {
        let tasks = vec![
            task("To Do", Priority::parse_lenient("urgente")),
            task("To Do", Priority::parse_lenient("alta")),
            task("To Do", Priority::parse_lenient("someday")),
            task("To Do", Priority::parse_lenient("media")),
        ];
        let stats = compute(&tasks, &default_columns());
        assert_eq!(stats.priorities.urgent, 1);
        assert_eq!(stats.priorities.high, 1);
        assert_eq!(stats.priorities.medium, 2);
        assert_eq!(stats.priorities.low, 0);
    }

    #[test]
    fn unplaced_tasks_are_reported() {
        let tasks = vec![task("Archived", Priority::Low), task("Done", Priority::Low)];
        let stats = compute(&tasks, &default_columns());
        assert_eq!(stats.unplaced, 1);
        assert_eq!(
            stats.columns.iter().map(|c| c.count).sum::<usize>() + stats.unplaced,
            stats.total
        );
    }

    #[test]
    fn repeated_column_label_counts_each_task_once() {
        let columns = vec!["To Do".to_string(), "To Do".to_string()];
        let stats = compute(&[task("To Do", Priority::Medium)], &columns);
        assert_eq!(stats.total, 1);
        assert_eq!(stats.unplaced, 0);
        assert_eq!(stats.columns.len(), 1);
        assert_eq!(stats.columns[0].count, 1);
        assert_eq!(stats.columns[0].percent, 100);
    }
}
