//! The `Repository` trait — the engine's only window onto persistence.
//!
//! Implemented by storage backends (e.g. `batchline-store-sqlite`). The
//! engine runs every state-machine operation synchronously against this
//! trait; atomicity and isolation for a single operation are the backend's
//! responsibility. A backend must surface a published-version uniqueness
//! violation as its own version-conflict error so callers can retry.

use std::future::Future;

use uuid::Uuid;

use crate::{
  document::{Branch, VersionedDocument},
  event::LineageEvent,
};

/// Abstraction over a versioned-document store backend.
///
/// Documents are append-mostly: promotions only ever insert new nodes, and
/// the two in-place transitions (`publish_test`, `detach_to_root`) flip a
/// single node's revision kind or parent pointer. Lineage events are
/// strictly append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait Repository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve a document by id. Returns `None` if not found.
  fn get_node(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<VersionedDocument>, Self::Error>> + Send + '_;

  /// Insert a new document, or update an existing one in place.
  ///
  /// Must reject a second published document with the same
  /// `(group_id, branch, version)` with a version-conflict error.
  fn save_node(
    &self,
    node: VersionedDocument,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// All documents in one `(group, branch)` version bucket.
  /// With `published_only`, drafts are excluded.
  fn query_bucket(
    &self,
    group_id: Uuid,
    branch: Branch,
    published_only: bool,
  ) -> impl Future<Output = Result<Vec<VersionedDocument>, Self::Error>> + Send + '_;

  /// Every document in a recipe group, across all branches. Used by the
  /// lineage graph builder to assemble the display tree.
  fn query_group(
    &self,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VersionedDocument>, Self::Error>> + Send + '_;

  /// Append one lineage event. Events are never updated or deleted.
  fn append_lineage_event(
    &self,
    event: LineageEvent,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
