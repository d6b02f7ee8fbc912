//! Error types for `batchline-core`.
//!
//! Everything here is an expected precondition failure surfaced to the
//! caller; infrastructure faults travel separately through the repository's
//! own error type.

use thiserror::Error;
use uuid::Uuid;

use crate::document::Branch;

#[derive(Debug, Error)]
pub enum Error {
  #[error("document not found: {0}")]
  NotFound(Uuid),

  #[error("document {id} is on {found}, expected {expected}")]
  WrongBranch {
    id:       Uuid,
    expected: &'static str,
    found:    String,
  },

  #[error("document {id} is {found}, expected a {expected} revision")]
  WrongRevisionKind {
    id:       Uuid,
    expected: &'static str,
    found:    String,
  },

  /// `detach_to_root` on a node whose `parent_id` is already null.
  #[error("document {0} is already a root")]
  AlreadyRoot(Uuid),

  /// In-place transition attempted on a manually locked node.
  #[error("document {0} is locked for editing")]
  Locked(Uuid),

  /// Rebase inputs do not belong to the same recipe group.
  #[error("documents belong to different groups")]
  GroupMismatch,

  /// Rebase target is not strictly newer than the variation's base master.
  #[error("new master v{new_version} is not newer than base master v{old_version}")]
  StaleRebase {
    old_version: u32,
    new_version: u32,
  },

  /// Two writers raced on the same version bucket. The caller must retry
  /// the whole operation with a freshly computed number; the engine never
  /// retries on its own.
  #[error("version {version} already taken in bucket ({group_id}, {branch})")]
  VersionConflict {
    group_id: Uuid,
    branch:   Branch,
    version:  u32,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
