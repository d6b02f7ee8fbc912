//! Version-bucket resolution.
//!
//! A bucket is the `(group, branch)` partition within which version
//! numbers are assigned. Published numbers in a bucket form a
//! monotonically increasing sequence starting at 1; draft test sequences
//! are numbered independently and never consume a published number.
//!
//! `next_published_version` is a read-then-use MAX-scan: two concurrent
//! writers against the same bucket can both compute `N + 1`. The
//! repository's uniqueness constraint turns the loser into a
//! version-conflict error; the caller retries the whole operation.

use batchline_core::{
  document::{Branch, BucketKey, VersionedDocument},
  repo::Repository,
};
use uuid::Uuid;

use crate::EngineError;

/// The partition key for a document's version numbering.
pub fn bucket_key(doc: &VersionedDocument) -> BucketKey {
  doc.bucket_key()
}

/// 1 + the highest published version among `nodes`, or 1 for an empty or
/// all-draft bucket. Drafts are ignored.
pub fn next_version(nodes: &[VersionedDocument]) -> u32 {
  nodes
    .iter()
    .filter_map(|n| n.revision_kind.version())
    .max()
    .map_or(1, |max| max + 1)
}

/// 1 + the highest draft test sequence among `nodes`, or 1. Published
/// revisions are ignored — the two counters are independent.
pub fn next_test_sequence(nodes: &[VersionedDocument]) -> u32 {
  nodes
    .iter()
    .filter_map(|n| n.revision_kind.test_sequence())
    .max()
    .map_or(1, |max| max + 1)
}

/// The next published version number for a bucket, from a live scan.
pub async fn next_published_version<R: Repository>(
  repo: &R,
  group_id: Uuid,
  branch: Branch,
) -> Result<u32, EngineError<R::Error>> {
  let published = repo
    .query_bucket(group_id, branch, true)
    .await
    .map_err(EngineError::Repository)?;
  Ok(next_version(&published))
}

/// The next free draft test sequence for a bucket, from a live scan.
pub async fn next_draft_sequence<R: Repository>(
  repo: &R,
  group_id: Uuid,
  branch: Branch,
) -> Result<u32, EngineError<R::Error>> {
  let all = repo
    .query_bucket(group_id, branch, false)
    .await
    .map_err(EngineError::Repository)?;
  Ok(next_test_sequence(&all))
}
