//! Column labels of a board and the adjacency rules between them.

use std::str::FromStr;

use tracing::debug;

use crate::error::{KanbanError, KanbanResult};

pub const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "Doing", "Done"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl FromStr for Direction {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "prev" | "previous" | "back" => Ok(Direction::Left),
            "right" | "r" | "next" | "forward" => Ok(Direction::Right),
            other => Err(KanbanError::validation(format!(
                "unknown direction '{other}' (expected left or right)"
            ))),
        }
    }
}

pub fn default_columns() -> Vec<String> {
    DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect()
}

pub fn position(columns: &[String], label: &str) -> Option<usize> {
    columns.iter().position(|c| c == label)
}

pub fn first(columns: &[String]) -> Option<&str> {
    columns.first().map(String::as_str)
}

/// The neighbouring column in `direction`, or `None` at either edge or when
/// `current` is not one of `columns`.
pub fn adjacent<'a>(columns: &'a [String], current: &str, direction: Direction) -> Option<&'a str> {
    let idx = position(columns, current)?;
    let target = match direction {
        Direction::Left => idx.checked_sub(1)?,
        Direction::Right => idx + 1,
    };
    columns.get(target).map(String::as_str)
}

/// Matches a user-typed label: exact first, then a unique case-insensitive
/// match.
pub fn resolve_label<'a>(columns: &'a [String], raw: &str) -> Option<&'a str> {
    let wanted = raw.trim();
    if let Some(exact) = columns.iter().find(|c| c.as_str() == wanted) {
        return Some(exact);
    }

    let lowered = wanted.to_lowercase();
    let mut matches = columns.iter().filter(|c| c.to_lowercase() == lowered);
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Trims labels and checks the list is non-empty with non-blank entries
/// that stay distinct when case is ignored.
pub fn validate_columns(columns: &[String]) -> KanbanResult<Vec<String>> {
    if columns.is_empty() {
        return Err(KanbanError::validation("a board needs at least one column"));
    }

    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for raw in columns {
        let label = raw.trim();
        if label.is_empty() {
            return Err(KanbanError::validation("column labels cannot be blank"));
        }
        if out.iter().any(|existing| existing.to_lowercase() == label.to_lowercase()) {
            return Err(KanbanError::validation(format!(
                "duplicate column '{label}'"
            )));
        }
        out.push(label.to_string());
    }
    Ok(out)
}

/// Best-effort cleanup of a stored column list: trims labels, drops blank
/// ones and later case-insensitive repeats. Falls back to the defaults
/// when nothing is left.
pub fn repair_columns(columns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for raw in columns {
        let label = raw.trim();
        if label.is_empty()
            || out.iter().any(|existing| existing.to_lowercase() == label.to_lowercase())
        {
            continue;
        }
        out.push(label.to_string());
    }
    if out.is_empty() {
        return default_columns();
    }
    out
}

/// Splits a comma separated column list, as written in the rc file.
pub fn parse_column_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

pub fn with_column_added(
    columns: &[String],
    label: &str,
    at: Option<usize>,
) -> KanbanResult<Vec<String>> {
    let mut next = columns.to_vec();
    let at = at.unwrap_or(next.len()).min(next.len());
    next.insert(at, label.to_string());
    validate_columns(&next)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRemoval {
    pub removed: String,
    pub remaining: Vec<String>,
    /// Column that receives the tasks of the removed one.
    pub fallback: String,
}

/// Plans removing `label`: its tasks go to the left neighbour, or the right
/// one when the first column is removed. The last remaining column cannot
/// be removed.
pub fn plan_removal(columns: &[String], label: &str) -> KanbanResult<ColumnRemoval> {
    let idx = position(columns, label)
        .ok_or_else(|| KanbanError::validation(format!("no column named '{label}'")))?;
    if columns.len() == 1 {
        return Err(KanbanError::validation(
            "cannot remove the only column of a board",
        ));
    }

    let fallback = if idx > 0 {
        columns[idx - 1].clone()
    } else {
        columns[idx + 1].clone()
    };
    let remaining = columns
        .iter()
        .filter(|c| c.as_str() != label)
        .cloned()
        .collect();

    debug!(removed = %label, fallback = %fallback, "planned column removal");
    Ok(ColumnRemoval {
        removed: label.to_string(),
        remaining,
        fallback,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<String> {
        default_columns()
    }

    #[test]
    fn adjacent_stops_at_both_edges() {
        let columns = cols();
        assert_eq!(adjacent(&columns, "To Do", Direction::Left), None);
        assert_eq!(adjacent(&columns, "To Do", Direction::Right), Some("Doing"));
        assert_eq!(adjacent(&columns, "Doing", Direction::Left), Some("To Do"));
        assert_eq!(adjacent(&columns, "Done", Direction::Right), None);
        assert_eq!(adjacent(&columns, "Archived", Direction::Right), None);
    }

    #[test]
    fn resolve_label_prefers_exact_then_case_insensitive() {
        let columns = vec!["todo".to_string(), "Todo".to_string(), "Done".to_string()];
        assert_eq!(resolve_label(&columns, "Todo"), Some("Todo"));
        assert_eq!(resolve_label(&columns, "TODO"), None);
        assert_eq!(resolve_label(&columns, "done"), Some("Done"));
    }

    #[test]
    fn validate_columns_rejects_empty_blank_and_duplicates() {
        assert!(validate_columns(&[]).is_err());
        assert!(validate_columns(&["A".to_string(), "  ".to_string()]).is_err());
        assert!(validate_columns(&["A".to_string(), " A ".to_string()]).is_err());
        assert!(validate_columns(&["Done".to_string(), "done".to_string()]).is_err());
        assert_eq!(
            validate_columns(&[" A ".to_string(), "B".to_string()]).expect("valid"),
            vec!["A".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn removal_prefers_left_neighbour() {
        let plan = plan_removal(&cols(), "Doing").expect("plan");
        assert_eq!(plan.fallback, "To Do");
        assert_eq!(plan.remaining, vec!["To Do".to_string(), "Done".to_string()]);

        let plan = plan_removal(&cols(), "To Do").expect("plan");
        assert_eq!(plan.fallback, "Doing");

        assert!(plan_removal(&["Only".to_string()], "Only").is_err());
        assert!(plan_removal(&cols(), "Missing").is_err());
    }

    #[test]
    fn column_added_at_position_or_end() {
        let next = with_column_added(&cols(), "Review", Some(2)).expect("add");
        assert_eq!(next[2], "Review");
        let next = with_column_added(&cols(), "Archive", None).expect("add");
        assert_eq!(next.last().map(String::as_str), Some("Archive"));
        assert!(with_column_added(&cols(), "Done", None).is_err());
    }

    #[test]
    fn parse_column_list_skips_blanks() {
        assert_eq!(
            parse_column_list("Backlog, Doing,,Done "),
            vec!["Backlog".to_string(), "Doing".to_string(), "Done".to_string()]
        );
    }

    #[test]
    fn repair_columns_drops_blanks_and_repeats() {
        let stored: Vec<String> = ["To Do", "Doing", "doing", " ", "Done", "To Do"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(repair_columns(&stored), vec!["To Do", "Doing", "Done"]);
        assert_eq!(repair_columns(&[]), default_columns());
    }
}
