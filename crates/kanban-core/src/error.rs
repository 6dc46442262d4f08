use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::backend::BackendError;

pub type KanbanResult<T> =
  Result<T, KanbanError>;

/// Why a requested column change was
/// dropped without reaching the backend.
#[derive(
  Debug, Clone, PartialEq, Eq,
)]
pub enum RejectReason {
  AtBoundary,
  SameColumn,
  InFlight(Uuid),
  UnknownColumn(String),
  UnknownTask(Uuid),
  NoDragInProgress
}

impl fmt::Display for RejectReason {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::AtBoundary => {
        write!(f, "already at the edge of the board")
      }
      | Self::SameColumn => {
        write!(f, "task is already in that column")
      }
      | Self::InFlight(id) => {
        write!(f, "a move for task {id} is still in flight")
      }
      | Self::UnknownColumn(label) => {
        write!(f, "no column named '{label}'")
      }
      | Self::UnknownTask(id) => {
        write!(f, "task {id} is not on this board")
      }
      | Self::NoDragInProgress => {
        write!(f, "no drag in progress")
      }
    }
  }
}

#[derive(Debug, Error)]
pub enum KanbanError {
  /// Input refused before any backend
  /// call was made.
  #[error("{0}")]
  Validation(String),

  #[error("transition rejected: {0}")]
  TransitionRejected(RejectReason),

  #[error(
    "backend request failed: {0}"
  )]
  Collaborator(#[from] BackendError)
}

impl KanbanError {
  pub fn validation(
    message: impl Into<String>
  ) -> Self {
    Self::Validation(message.into())
  }

  pub fn rejected(
    reason: RejectReason
  ) -> Self {
    Self::TransitionRejected(reason)
  }

  /// Rejected transitions are dropped
  /// quietly; the user never sees them.
  pub fn is_silent(&self) -> bool {
    matches!(
      self,
      Self::TransitionRejected(_)
    )
  }

  pub fn notifies_user(&self) -> bool {
    matches!(self, Self::Collaborator(_))
  }

  pub fn reject_reason(
    &self
  ) -> Option<&RejectReason> {
    match self {
      | Self::TransitionRejected(
        reason
      ) => Some(reason),
      | _ => None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn propagation_policy_by_variant() {
    let validation =
      KanbanError::validation(
        "title is required"
      );
    assert!(!validation.is_silent());
    assert!(
      !validation.notifies_user()
    );

    let rejected = KanbanError::rejected(
      RejectReason::AtBoundary
    );
    assert!(rejected.is_silent());
    assert!(!rejected.notifies_user());
    assert_eq!(
      rejected.reject_reason(),
      Some(&RejectReason::AtBoundary)
    );

    let backend = KanbanError::from(
      BackendError::new("timeout")
    );
    assert!(backend.notifies_user());
    assert_eq!(
      backend.to_string(),
      "backend request failed: timeout"
    );
  }
}
