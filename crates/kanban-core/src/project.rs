use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::columns;
use crate::error::KanbanResult;
use crate::task::{short_id, validate_title};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,

    pub owner_id: Uuid,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "columns::default_columns")]
    pub columns: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn short_id(&self) -> String {
        short_id(self.id)
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.columns.iter().any(|c| c == label)
    }

    pub fn first_column(&self) -> Option<&str> {
        columns::first(&self.columns)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub columns: Option<Vec<String>>,
}

impl NewProject {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            columns: None,
        }
    }

    pub fn normalized(mut self) -> KanbanResult<Self> {
        self.title = validate_title(&self.title)?;
        self.description = self.description.trim().to_string();
        self.columns = self
            .columns
            .map(|cols| columns::validate_columns(&cols))
            .transpose()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub columns: Option<Vec<String>>,
}

impl ProjectPatch {
    pub fn columns(columns: Vec<String>) -> Self {
        Self {
            columns: Some(columns),
            ..Self::default()
        }
    }

    pub fn normalized(mut self) -> KanbanResult<Self> {
        if let Some(title) = self.title.as_deref() {
            self.title = Some(validate_title(title)?);
        }
        if let Some(cols) = self.columns.as_deref() {
            self.columns = Some(columns::validate_columns(cols)?);
        }
        Ok(self)
    }

    pub fn apply(&self, project: &mut Project, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            project.title = title.clone();
        }
        if let Some(description) = &self.description {
            project.description = description.clone();
        }
        if let Some(cols) = &self.columns {
            project.columns = cols.clone();
        }
        project.updated_at = now;
    }
}

/// A local user. Stands in for an identity provider account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
