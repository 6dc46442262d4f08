use std::collections::BTreeSet;

use tracing::trace;

use crate::error::{
  KanbanError,
  KanbanResult
};
use crate::task::{
  Priority,
  Task
};

#[derive(Debug, Clone)]
enum Atom {
  Priority(Vec<Priority>),
  Tag(String),
  Category(String)
}

/// Active filters of one viewing
/// session. Empty sets and an unset
/// category match everything.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FilterState {
  priorities: BTreeSet<Priority>,
  tags:       BTreeSet<String>,
  category:   Option<String>
}

impl FilterState {
  /// Parses command line terms:
  /// `+tag`, `tag:x`,
  /// `priority:high,urgent`,
  /// `category:work`.
  #[tracing::instrument(skip(terms))]
  pub fn parse(
    terms: &[String]
  ) -> KanbanResult<Self> {
    let mut state = Self::default();
    for term in terms {
      match parse_atom(term)? {
        | Atom::Priority(list) => {
          state.priorities.extend(list);
        }
        | Atom::Tag(tag) => {
          state.tags.insert(tag);
        }
        | Atom::Category(category) => {
          state.set_category(&category);
        }
      }
    }
    Ok(state)
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let priority_ok = self
      .priorities
      .is_empty()
      || self
        .priorities
        .contains(&task.priority);

    let tags_ok = self.tags.is_empty()
      || task
        .tags
        .iter()
        .any(|t| self.tags.contains(t));

    let category_ok = match self
      .category
      .as_deref()
    {
      | None => true,
      | Some(category) => {
        task.category == category
      }
    };

    trace!(
      task = %task.id,
      priority_ok,
      tags_ok,
      category_ok,
      "filter evaluated"
    );
    priority_ok && tags_ok && category_ok
  }

  pub fn priorities(
    &self
  ) -> &BTreeSet<Priority> {
    &self.priorities
  }

  pub fn tags(&self) -> &BTreeSet<String> {
    &self.tags
  }

  pub fn category(&self) -> Option<&str> {
    self.category.as_deref()
  }

  pub fn toggle_priority(
    &mut self,
    priority: Priority
  ) {
    if !self.priorities.remove(&priority)
    {
      self.priorities.insert(priority);
    }
  }

  pub fn toggle_tag(
    &mut self,
    tag: &str
  ) {
    if !self.tags.remove(tag) {
      self.tags.insert(tag.to_string());
    }
  }

  /// `""` and `"all"` clear the
  /// category filter.
  pub fn set_category(
    &mut self,
    category: &str
  ) {
    let trimmed = category.trim();
    self.category = if trimmed.is_empty()
      || trimmed
        .eq_ignore_ascii_case("all")
    {
      None
    } else {
      Some(trimmed.to_string())
    };
  }

  pub fn clear(&mut self) {
    *self = Self::default();
  }

  pub fn active_count(&self) -> usize {
    self.priorities.len()
      + self.tags.len()
      + usize::from(
        self.category.is_some()
      )
  }

  pub fn is_empty(&self) -> bool {
    self.active_count() == 0
  }
}

/// Tasks of `tasks` that pass `filter`,
/// in their original order.
pub fn visible_tasks<'a>(
  tasks: &'a [Task],
  filter: &FilterState
) -> Vec<&'a Task> {
  tasks
    .iter()
    .filter(|task| filter.matches(task))
    .collect()
}

pub fn available_tags(
  tasks: &[Task]
) -> Vec<String> {
  tasks
    .iter()
    .flat_map(|t| t.tags.iter().cloned())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

pub fn available_categories(
  tasks: &[Task]
) -> Vec<String> {
  tasks
    .iter()
    .map(|t| t.category.clone())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

fn parse_atom(
  term: &str
) -> KanbanResult<Atom> {
  if let Some(tag) =
    term.strip_prefix('+')
  {
    return non_empty(tag, "tag")
      .map(Atom::Tag);
  }

  let (key, value) =
    term.split_once(':').ok_or_else(
      || {
        KanbanError::validation(format!(
          "unrecognized filter term \
           '{term}'"
        ))
      }
    )?;

  match key
    .to_ascii_lowercase()
    .as_str()
  {
    | "pri" | "priority" => {
      let list = value
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(str::parse::<Priority>)
        .collect::<KanbanResult<Vec<_>>>(
        )?;
      Ok(Atom::Priority(list))
    }
    | "tag" | "tags" => {
      non_empty(value, "tag")
        .map(Atom::Tag)
    }
    | "cat" | "category" => {
      Ok(Atom::Category(
        value.to_string()
      ))
    }
    | other => {
      Err(KanbanError::validation(
        format!(
          "unknown filter key \
           '{other}'"
        )
      ))
    }
  }
}

fn non_empty(
  value: &str,
  what: &str
) -> KanbanResult<String> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(KanbanError::validation(
      format!("empty {what} in filter")
    ));
  }
  Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn task(
    priority: &str,
    tags: &[&str],
    category: &str
  ) -> Task {
    let now = Utc::now();
    Task {
      id:          Uuid::new_v4(),
      project_id:  Uuid::nil(),
      title:       format!("{priority} task"),
      description: String::new(),
      status:      "To Do".to_string(),
      priority:    Priority::parse_lenient(
        priority
      ),
      tags:        tags
        .iter()
        .map(|t| t.to_string())
        .collect(),
      category:    category.to_string(),
      color:       None,
      order_index: 0,
      created_at:  now,
      updated_at:  now
    }
  }

  #[test]
  fn legacy_priority_filter_keeps_only_urgent()
   {
    let tasks = vec![
      task("urgente", &[], "general"),
      task("alta", &[], "general"),
      task("media", &[], "general"),
    ];
    let filter = FilterState::parse(&[
      "priority:urgente".to_string()
    ])
    .expect("parse filter");

    let visible =
      visible_tasks(&tasks, &filter);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, tasks[0].id);
  }

  #[test]
  fn every_visible_task_satisfies_all_predicates()
   {
    let tasks = vec![
      task("high", &["ui"], "work"),
      task("high", &["api"], "work"),
      task("low", &["ui", "api"], "home"),
      task("urgent", &["ui"], "work"),
      task("high", &[], "work"),
    ];
    let mut filter = FilterState::default();
    filter.toggle_priority(Priority::High);
    filter.toggle_priority(Priority::Urgent);
    filter.toggle_tag("ui");
    filter.set_category("work");

    let visible =
      visible_tasks(&tasks, &filter);
    assert_eq!(visible.len(), 2);
    for task in &visible {
      assert!(tasks.iter().any(|t| t.id == task.id));
      assert!(matches!(
        task.priority,
        Priority::High | Priority::Urgent
      ));
      assert!(task.has_tag("ui"));
      assert_eq!(task.category, "work");
    }
  }

  #[test]
  fn empty_filter_shows_everything() {
    let tasks = vec![
      task("low", &[], "a"),
      task("high", &["x"], "b"),
    ];
    let filter = FilterState::default();
    assert!(filter.is_empty());
    assert_eq!(
      visible_tasks(&tasks, &filter)
        .len(),
      2
    );
  }

  #[test]
  fn toggles_and_category_all() {
    let mut filter = FilterState::default();
    filter.toggle_tag("ui");
    filter.toggle_priority(Priority::Low);
    filter.set_category("work");
    assert_eq!(filter.active_count(), 3);

    filter.toggle_tag("ui");
    filter.set_category("All");
    assert_eq!(filter.active_count(), 1);
    assert_eq!(filter.category(), None);

    filter.clear();
    assert!(filter.is_empty());
  }

  #[test]
  fn parse_terms() {
    let filter = FilterState::parse(&[
      "+ui".to_string(),
      "pri:high,urgent".to_string(),
      "cat:work".to_string(),
    ])
    .expect("parse");
    assert!(filter.tags().contains("ui"));
    assert_eq!(filter.priorities().len(), 2);
    assert_eq!(filter.category(), Some("work"));

    assert!(
      FilterState::parse(&[
        "pri:soon".to_string()
      ])
      .is_err()
    );
    assert!(
      FilterState::parse(&[
        "bogus".to_string()
      ])
      .is_err()
    );
  }

  #[test]
  fn available_tags_and_categories_are_sorted_and_distinct()
   {
    let tasks = vec![
      task("low", &["b", "a"], "work"),
      task("low", &["a"], "home"),
    ];
    assert_eq!(
      available_tags(&tasks),
      vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(
      available_categories(&tasks),
      vec![
        "home".to_string(),
        "work".to_string()
      ]
    );
  }
}
