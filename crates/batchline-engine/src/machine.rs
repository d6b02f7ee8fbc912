//! The version state machine.
//!
//! Orchestrates the lifecycle transitions of versioned documents against a
//! [`Repository`]: branching a variation off the trunk, publishing a
//! draft/test revision into its bucket, promoting a published variation
//! into a brand-new trunk revision, detaching a node into a root, and
//! rebasing a variation onto a newer master.
//!
//! Promotions never mutate or delete existing nodes — trunk advancement
//! always creates a new document, and both the prior master and the
//! promoted variation remain queryable as history. The only in-place
//! transitions are `publish_test` (flips the revision kind) and
//! `detach_to_root` (clears the parent pointer); both refuse manually
//! locked nodes.
//!
//! Each operation runs inside whatever atomicity the repository provides.
//! The engine performs no retries: a version-bucket race surfaces as the
//! repository's version-conflict error and the caller re-runs the whole
//! operation.

use std::collections::BTreeSet;

use batchline_core::{
  Error,
  document::{
    Branch, IngredientLine, ItemRef, RevisionKind, VersionedDocument,
    strip_variation_suffix, variation_display_name,
  },
  event::{LineageEvent, LineageEventKind},
  repo::Repository,
};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{EngineError, bucket, delta};

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn fetch<R: Repository>(
  repo: &R,
  id: Uuid,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  repo
    .get_node(id)
    .await
    .map_err(EngineError::Repository)?
    .ok_or_else(|| Error::NotFound(id).into())
}

fn require_master(doc: &VersionedDocument) -> Result<(), Error> {
  if doc.branch.is_master() {
    Ok(())
  } else {
    Err(Error::WrongBranch {
      id:       doc.id,
      expected: "master",
      found:    doc.branch.to_string(),
    })
  }
}

fn require_variation(doc: &VersionedDocument) -> Result<&str, Error> {
  doc.branch.variation_name().ok_or(Error::WrongBranch {
    id:       doc.id,
    expected: "a variation",
    found:    doc.branch.to_string(),
  })
}

fn require_unlocked(doc: &VersionedDocument) -> Result<(), Error> {
  if doc.is_locked {
    Err(Error::Locked(doc.id))
  } else {
    Ok(())
  }
}

// ─── create_variation ────────────────────────────────────────────────────────

/// Branch a named variation off a master revision.
///
/// The new document starts as `Draft(n)` where `n` is the next free test
/// sequence in the variation's own bucket, carries a copy of the master's
/// lines, points back at the master via `parent_id`, and inherits the
/// group root. No lineage event is recorded — branching is not an audited
/// transition.
pub async fn create_variation<R: Repository>(
  repo: &R,
  master_id: Uuid,
  variation_name: &str,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  let master = fetch(repo, master_id).await?;
  require_master(&master)?;

  let branch = Branch::Variation(variation_name.to_owned());
  let sequence =
    bucket::next_draft_sequence(repo, master.group_id, branch.clone()).await?;

  let variation = VersionedDocument {
    id: Uuid::new_v4(),
    group_id: master.group_id,
    branch,
    revision_kind: RevisionKind::Draft { test_sequence: sequence },
    parent_id: Some(master.id),
    clone_source_id: None,
    root_id: master.root_id.or(Some(master.id)),
    is_locked: false,
    name: variation_display_name(&master.name, variation_name),
    lines: master.lines.clone(),
    created_at: Utc::now(),
  };

  repo
    .save_node(variation.clone())
    .await
    .map_err(EngineError::Repository)?;

  debug!(
    variation = %variation.id,
    master = %master.id,
    name = variation_name,
    "created variation draft"
  );
  Ok(variation)
}

// ─── publish_test ────────────────────────────────────────────────────────────

/// Publish a draft/test revision into its version bucket.
///
/// The node's revision kind flips in place from `Draft(_)` to
/// `Published(v)` where `v` is the bucket's next version number. A
/// `PublishTest` lineage event is appended.
pub async fn publish_test<R: Repository>(
  repo: &R,
  node_id: Uuid,
  actor_id: Uuid,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  let mut node = fetch(repo, node_id).await?;
  require_unlocked(&node)?;
  if !node.revision_kind.is_draft() {
    return Err(
      Error::WrongRevisionKind {
        id:       node.id,
        expected: "draft",
        found:    node.revision_kind.label(),
      }
      .into(),
    );
  }

  let version =
    bucket::next_published_version(repo, node.group_id, node.branch.clone())
      .await?;
  node.revision_kind = RevisionKind::Published { version };

  repo
    .save_node(node.clone())
    .await
    .map_err(EngineError::Repository)?;
  repo
    .append_lineage_event(LineageEvent::record(
      LineageEventKind::PublishTest,
      node.id,
      None,
      actor_id,
      Some(format!("published as v{version}")),
    ))
    .await
    .map_err(EngineError::Repository)?;

  debug!(node = %node.id, version, branch = %node.branch, "published test revision");
  Ok(node)
}

// ─── promote_variation_to_master ─────────────────────────────────────────────

/// Promote a published variation's content into a brand-new trunk revision.
///
/// The variation's lines are copied verbatim — a direct copy, not a rebase:
/// the variation's content becomes the new trunk state as-is. Neither the
/// prior master nor the promoted variation is mutated or retired. A
/// `PromoteVariationToMaster` lineage event links the new trunk node back
/// to the variation.
pub async fn promote_variation_to_master<R: Repository>(
  repo: &R,
  variation_id: Uuid,
  actor_id: Uuid,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  let variation = fetch(repo, variation_id).await?;
  let variation_name = require_variation(&variation)?.to_owned();
  if !variation.revision_kind.is_published() {
    return Err(
      Error::WrongRevisionKind {
        id:       variation.id,
        expected: "published",
        found:    variation.revision_kind.label(),
      }
      .into(),
    );
  }

  let version =
    bucket::next_published_version(repo, variation.group_id, Branch::Master)
      .await?;

  let master = VersionedDocument {
    id: Uuid::new_v4(),
    group_id: variation.group_id,
    branch: Branch::Master,
    revision_kind: RevisionKind::Published { version },
    parent_id: None,
    clone_source_id: None,
    root_id: variation.root_id,
    is_locked: false,
    name: strip_variation_suffix(&variation.name).to_owned(),
    lines: variation.lines.clone(),
    created_at: Utc::now(),
  };

  repo
    .save_node(master.clone())
    .await
    .map_err(EngineError::Repository)?;
  repo
    .append_lineage_event(LineageEvent::record(
      LineageEventKind::PromoteVariationToMaster,
      master.id,
      Some(variation.id),
      actor_id,
      Some(format!("promoted variation {variation_name:?} to master v{version}")),
    ))
    .await
    .map_err(EngineError::Repository)?;

  debug!(
    master = %master.id,
    variation = %variation.id,
    version,
    "promoted variation to master"
  );
  Ok(master)
}

// ─── detach_to_root ──────────────────────────────────────────────────────────

/// Detach a node from its parent, making it a root ("make parent").
///
/// The parent pointer is cleared in place, the conventional
/// variation-name suffix is stripped from the name, and the node's
/// `root_id` becomes self-referential. A `PromoteToParent` lineage event
/// records the abandoned parent.
pub async fn detach_to_root<R: Repository>(
  repo: &R,
  node_id: Uuid,
  actor_id: Uuid,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  let mut node = fetch(repo, node_id).await?;
  require_unlocked(&node)?;
  let Some(old_parent) = node.parent_id else {
    return Err(Error::AlreadyRoot(node.id).into());
  };

  node.parent_id = None;
  node.root_id = Some(node.id);
  node.name = strip_variation_suffix(&node.name).to_owned();

  repo
    .save_node(node.clone())
    .await
    .map_err(EngineError::Repository)?;
  repo
    .append_lineage_event(LineageEvent::record(
      LineageEventKind::PromoteToParent,
      node.id,
      Some(old_parent),
      actor_id,
      None,
    ))
    .await
    .map_err(EngineError::Repository)?;

  debug!(node = %node.id, old_parent = %old_parent, "detached node to root");
  Ok(node)
}

// ─── rebase_on_new_master ────────────────────────────────────────────────────

/// An unsaved draft produced by a rebase. Nothing is persisted: the caller
/// inspects the merged lines (with `touched` as a UI hint-set for items
/// whose quantity combines both sides) and explicitly saves a document
/// built from the template if it accepts the result.
#[derive(Debug, Clone, Serialize)]
pub struct DraftTemplate {
  pub group_id:  Uuid,
  pub branch:    Branch,
  pub parent_id: Option<Uuid>,
  pub root_id:   Option<Uuid>,
  pub name:      String,
  pub lines:     Vec<IngredientLine>,
  /// Items whose merged quantity combines the new master's value with the
  /// variation's delta — as opposed to being purely new or purely
  /// inherited.
  pub touched:   BTreeSet<ItemRef>,
}

/// Replay a variation's own changes onto a newer master revision.
///
/// Pure: never touches the repository and never silently overwrites the
/// existing variation. Preconditions: all three documents share a group,
/// both masters are published trunk revisions, and the new master is
/// strictly newer than the one the variation branched from.
pub fn rebase_on_new_master(
  variation: &VersionedDocument,
  old_master: &VersionedDocument,
  new_master: &VersionedDocument,
) -> Result<DraftTemplate, Error> {
  if old_master.group_id != variation.group_id
    || new_master.group_id != variation.group_id
  {
    return Err(Error::GroupMismatch);
  }
  require_master(old_master)?;
  require_master(new_master)?;

  let published_version = |doc: &VersionedDocument| {
    doc.revision_kind.version().ok_or(Error::WrongRevisionKind {
      id:       doc.id,
      expected: "published",
      found:    doc.revision_kind.label(),
    })
  };
  let old_version = published_version(old_master)?;
  let new_version = published_version(new_master)?;
  if new_version <= old_version {
    return Err(Error::StaleRebase { old_version, new_version });
  }

  let (lines, touched) = delta::rebase_variation(variation, old_master, new_master);

  Ok(DraftTemplate {
    group_id: variation.group_id,
    branch: variation.branch.clone(),
    parent_id: Some(new_master.id),
    root_id: new_master.root_id.or(Some(new_master.id)),
    name: variation.name.clone(),
    lines,
    touched,
  })
}

// ─── duplicate_document ──────────────────────────────────────────────────────

/// Duplicate a document into a brand-new recipe group.
///
/// The copy starts as `Draft(1)` on its own trunk with a self-referential
/// root and `clone_source_id` pointing back at the source. No lineage
/// event is recorded — duplication starts a new history rather than
/// extending an existing one.
pub async fn duplicate_document<R: Repository>(
  repo: &R,
  source_id: Uuid,
) -> Result<VersionedDocument, EngineError<R::Error>> {
  let source = fetch(repo, source_id).await?;

  let id = Uuid::new_v4();
  let copy = VersionedDocument {
    id,
    group_id: Uuid::new_v4(),
    branch: Branch::Master,
    revision_kind: RevisionKind::Draft { test_sequence: 1 },
    parent_id: None,
    clone_source_id: Some(source.id),
    root_id: Some(id),
    is_locked: false,
    name: format!("{} (copy)", source.name),
    lines: source.lines.clone(),
    created_at: Utc::now(),
  };

  repo
    .save_node(copy.clone())
    .await
    .map_err(EngineError::Repository)?;

  debug!(copy = %copy.id, source = %source.id, "duplicated document");
  Ok(copy)
}
