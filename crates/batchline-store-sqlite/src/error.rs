//! Error type for `batchline-store-sqlite`.

use batchline_core::document::Branch;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] batchline_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A row violated the Published-XOR-Draft shape on decode.
  #[error("document {0} has neither a version number nor a test sequence")]
  MalformedRevision(String),

  /// An event row carried a kind string we do not recognise.
  #[error("unknown lineage event kind {0:?}")]
  MalformedEvent(String),

  /// Two writers raced on the same version bucket: the published-version
  /// UNIQUE index rejected the insert. The caller must retry the whole
  /// operation with a freshly computed number.
  #[error("version {version} already taken in bucket ({group_id}, {branch})")]
  VersionConflict {
    group_id: Uuid,
    branch:   Branch,
    version:  u32,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
