use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KanbanError, KanbanResult};

pub const DEFAULT_CATEGORY: &str = "general";

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hex color pattern is valid")
});

/// Task priority. Stored as `low|medium|high|urgent`; anything unrecognised
/// on the way in is read as `Medium`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "String", into = "&'static str")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Accepts the english names, their first letter, and the portuguese
    /// labels found in older board data.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "l" | "baixa" => Some(Priority::Low),
            "medium" | "m" | "media" | "média" => Some(Priority::Medium),
            "high" | "h" | "alta" => Some(Priority::High),
            "urgent" | "u" | "urgente" => Some(Priority::Urgent),
            _ => None,
        }
    }

    pub fn parse_lenient(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_default()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = KanbanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            KanbanError::validation(format!(
                "unknown priority '{s}' (expected low, medium, high or urgent)"
            ))
        })
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        Self::parse_lenient(&raw)
    }
}

impl From<Priority> for &'static str {
    fn from(priority: Priority) -> Self {
        priority.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,

    pub project_id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub status: String,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub order_index: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn short_id(&self) -> String {
        short_id(self.id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Fields for a task that does not exist yet. Ordering and timestamps are
/// assigned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub color: Option<String>,
}

impl NewTask {
    pub fn new(project_id: Uuid, title: impl Into<String>) -> Self {
        Self {
            project_id,
            title: title.into(),
            description: String::new(),
            status: None,
            priority: Priority::default(),
            tags: vec![],
            category: None,
            color: None,
        }
    }

    /// Trims and checks every field that can be checked without the
    /// project's column list.
    pub fn normalized(mut self) -> KanbanResult<Self> {
        self.title = validate_title(&self.title)?;
        self.tags = normalize_tags(self.tags);
        self.category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.color = self.color.as_deref().map(validate_color).transpose()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub color: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self == &TaskPatch::default()
    }

    pub fn normalized(mut self) -> KanbanResult<Self> {
        if let Some(title) = self.title.as_deref() {
            self.title = Some(validate_title(title)?);
        }
        self.tags = self.tags.map(normalize_tags);
        if let Some(category) = self.category.as_deref() {
            let trimmed = category.trim();
            self.category = Some(if trimmed.is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                trimmed.to_string()
            });
        }
        if let Some(Some(color)) = &self.color {
            let color = validate_color(color)?;
            self.color = Some(Some(color));
        }
        Ok(self)
    }

    /// Copies every present field onto `task`. Status changes are applied
    /// by the caller, which also owns the order key.
    pub fn apply(&self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(category) = &self.category {
            task.category = category.clone();
        }
        if let Some(color) = &self.color {
            task.color = color.clone();
        }
        task.updated_at = now;
    }
}

pub fn validate_title(raw: &str) -> KanbanResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(KanbanError::validation("title is required"));
    }
    Ok(title.to_string())
}

pub fn validate_color(raw: &str) -> KanbanResult<String> {
    let color = raw.trim();
    if !HEX_COLOR.is_match(color) {
        return Err(KanbanError::validation(format!(
            "invalid color '{raw}' (expected #rgb or #rrggbb)"
        )));
    }
    Ok(color.to_ascii_lowercase())
}

/// Parses a validated accent color into RGB components.
pub fn color_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#').filter(|h| h.is_ascii())?;
    let expand = |s: &str| u8::from_str_radix(&s.repeat(2), 16).ok();
    match hex.len() {
        3 => Some((
            expand(&hex[0..1])?,
            expand(&hex[1..2])?,
            expand(&hex[2..3])?,
        )),
        6 => Some((
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        _ => None,
    }
}

/// Trims tags, drops empty ones and duplicates, keeps first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|existing| existing == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_reads_legacy_labels_and_falls_back_to_medium() {
        assert_eq!(Priority::parse_lenient("urgente"), Priority::Urgent);
        assert_eq!(Priority::parse_lenient("alta"), Priority::High);
        assert_eq!(Priority::parse_lenient("média"), Priority::Medium);
        assert_eq!(Priority::parse_lenient("baixa"), Priority::Low);
        assert_eq!(Priority::parse_lenient("HIGH"), Priority::High);
        assert_eq!(Priority::parse_lenient("whenever"), Priority::Medium);
        assert!("whenever".parse::<Priority>().is_err());
    }

    #[test]
    fn task_deserializes_with_defaults() {
        let raw = r#"{
            "id": "6a3c1f7e-3d7e-4f43-9f0e-1c2b3a4d5e6f",
            "project_id": "0b0e1c2d-3e4f-4a5b-8c7d-9e0f1a2b3c4d",
            "title": "Ship it",
            "status": "Doing",
            "priority": "alta",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert!(task.tags.is_empty());
        assert_eq!(task.order_index, 0);

        let back = serde_json::to_value(&task).expect("serialize task");
        assert_eq!(back["priority"], "high");
    }

    #[test]
    fn tags_keep_first_seen_order_without_duplicates() {
        let tags = normalize_tags(vec![
            "ui".to_string(),
            " backend ".to_string(),
            "ui".to_string(),
            "".to_string(),
            "backend".to_string(),
        ]);
        assert_eq!(tags, vec!["ui".to_string(), "backend".to_string()]);
    }

    #[test]
    fn new_task_rejects_blank_title_and_bad_color() {
        let project = Uuid::new_v4();
        assert!(NewTask::new(project, "   ").normalized().is_err());

        let mut bad_color = NewTask::new(project, "Paint");
        bad_color.color = Some("red".to_string());
        assert!(bad_color.normalized().is_err());

        let mut ok = NewTask::new(project, "  Paint  ");
        ok.color = Some("#FFAA00".to_string());
        ok.category = Some("  ".to_string());
        let ok = ok.normalized().expect("valid task");
        assert_eq!(ok.title, "Paint");
        assert_eq!(ok.color.as_deref(), Some("#ffaa00"));
        assert_eq!(ok.category, None);
    }

    #[test]
    fn color_rgb_expands_short_form() {
        assert_eq!(color_rgb("#fa0"), Some((0xff, 0xaa, 0x00)));
        assert_eq!(color_rgb("#102030"), Some((0x10, 0x20, 0x30)));
        assert_eq!(color_rgb("102030"), None);
    }
}
