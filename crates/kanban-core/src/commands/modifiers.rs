use anyhow::anyhow;
use tracing::{
  instrument,
  warn
};

use crate::task::{
  NewTask,
  Priority,
  Task,
  TaskPatch
};

/// A single `key:value` or `+tag`
/// argument to `add` and `edit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Mod {
  TagAdd(String),
  TagRemove(String),
  Priority(Priority),
  Category(String),
  Color(Option<String>),
  Status(String),
  Description(String),
  Title(String)
}

/// Splits `add` arguments into the
/// title words and modifiers. Everything
/// after `--` is title text.
#[instrument(skip(args))]
pub(crate) fn parse_title_and_mods(
  args: &[String]
) -> anyhow::Result<(String, Vec<Mod>)>
{
  let mut title_parts = Vec::new();
  let mut mods = Vec::new();

  let mut literal = false;
  for arg in args {
    if arg == "--" {
      literal = true;
      continue;
    }

    if !literal
      && let Some(one_mod) =
        parse_one_mod(arg)?
    {
      mods.push(one_mod);
      continue;
    }

    title_parts.push(arg.clone());
  }

  let title = title_parts.join(" ");
  if title.trim().is_empty()
    && !mods.iter().any(|m| {
      matches!(m, Mod::Title(_))
    })
  {
    return Err(anyhow!(
      "add: title is required"
    ));
  }

  Ok((title, mods))
}

#[instrument(skip(args))]
pub(crate) fn parse_mods(
  args: &[String]
) -> anyhow::Result<Vec<Mod>> {
  let mut mods = Vec::new();
  for arg in args {
    if let Some(one_mod) =
      parse_one_mod(arg)?
    {
      mods.push(one_mod);
    } else {
      warn!(arg = %arg, "unrecognized modifier token ignored");
    }
  }
  Ok(mods)
}

fn parse_one_mod(
  tok: &str
) -> anyhow::Result<Option<Mod>> {
  if let Some(tag) =
    tok.strip_prefix('+')
    && !tag.is_empty()
  {
    return Ok(Some(Mod::TagAdd(
      tag.to_string()
    )));
  }
  if let Some(tag) =
    tok.strip_prefix('-')
    && !tag.is_empty()
    && !tag.starts_with('-')
  {
    return Ok(Some(Mod::TagRemove(
      tag.to_string()
    )));
  }

  let Some((key, value)) =
    tok.split_once(':')
  else {
    return Ok(None);
  };

  let key = key.to_ascii_lowercase();

  match key.as_str() {
    | "pri" | "priority" => {
      Ok(Some(Mod::Priority(
        value.parse()?
      )))
    }
    | "cat" | "category" => {
      Ok(Some(Mod::Category(
        value.to_string()
      )))
    }
    | "color" | "colour" => {
      let value = value.trim();
      Ok(Some(Mod::Color(
        if value.is_empty()
          || value == "none"
        {
          None
        } else {
          Some(value.to_string())
        }
      )))
    }
    | "status" | "column" => {
      Ok(Some(Mod::Status(
        value.to_string()
      )))
    }
    | "desc" | "description" => {
      Ok(Some(Mod::Description(
        value.to_string()
      )))
    }
    | "title" => {
      Ok(Some(Mod::Title(
        value.to_string()
      )))
    }
    | _ => Ok(None)
  }
}

pub(crate) fn apply_to_new(
  new: &mut NewTask,
  mods: &[Mod]
) {
  for one_mod in mods {
    match one_mod {
      | Mod::TagAdd(tag) => {
        if new.tags.iter().all(
          |existing| existing != tag
        ) {
          new.tags.push(tag.clone());
        }
      }
      | Mod::TagRemove(tag) => {
        new.tags.retain(|existing| {
          existing != tag
        });
      }
      | Mod::Priority(priority) => {
        new.priority = *priority;
      }
      | Mod::Category(category) => {
        new.category =
          Some(category.clone());
      }
      | Mod::Color(color) => {
        new.color = color.clone();
      }
      | Mod::Status(status) => {
        new.status =
          Some(status.clone());
      }
      | Mod::Description(text) => {
        new.description = text.clone();
      }
      | Mod::Title(title) => {
        new.title = title.clone();
      }
    }
  }
}

/// Builds the patch that turns `task`
/// into its modified form. Tag edits
/// are resolved against the current
/// tags.
pub(crate) fn patch_for(
  task: &Task,
  mods: &[Mod]
) -> TaskPatch {
  let mut patch = TaskPatch::default();
  let mut tags = task.tags.clone();
  let mut tags_changed = false;

  for one_mod in mods {
    match one_mod {
      | Mod::TagAdd(tag) => {
        if tags.iter().all(|existing| {
          existing != tag
        }) {
          tags.push(tag.clone());
          tags_changed = true;
        }
      }
      | Mod::TagRemove(tag) => {
        let before = tags.len();
        tags.retain(|existing| {
          existing != tag
        });
        tags_changed |=
          tags.len() != before;
      }
      | Mod::Priority(priority) => {
        patch.priority = Some(*priority);
      }
      | Mod::Category(category) => {
        patch.category =
          Some(category.clone());
      }
      | Mod::Color(color) => {
        patch.color = Some(color.clone());
      }
      | Mod::Status(status) => {
        patch.status =
          Some(status.clone());
      }
      | Mod::Description(text) => {
        patch.description =
          Some(text.clone());
      }
      | Mod::Title(title) => {
        patch.title = Some(title.clone());
      }
    }
  }

  if tags_changed {
    patch.tags = Some(tags);
  }
  patch
}
