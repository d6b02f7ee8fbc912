//! Versioned recipe documents — the fundamental unit of the lineage engine.
//!
//! A document is one revision of one recipe. All revisions of "the same
//! recipe" share a `group_id`; within a group, the `branch` partitions
//! revisions into independent version histories (the trunk plus any number
//! of named variations). Trunk advancement never rewrites a node: every
//! promotion creates a new document, so history is permanent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Item references ─────────────────────────────────────────────────────────

/// Opaque, comparable key into the external item catalog.
///
/// The engine never resolves what an item *is* — it only needs equality,
/// ordering, and hashing to line up quantities across revisions.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemRef(pub String);

impl ItemRef {
  pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ItemRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// One structured quantity line of a recipe revision.
///
/// Units are carried as opaque strings; the engine performs no conversion
/// and assumes compatible units per item when merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
  pub item:     ItemRef,
  pub quantity: f64,
  pub unit:     String,
}

impl IngredientLine {
  pub fn new(item: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
    Self {
      item: ItemRef::new(item),
      quantity,
      unit: unit.into(),
    }
  }
}

// ─── Branch ──────────────────────────────────────────────────────────────────

/// The line a revision lives on: the trunk, or a named side-branch.
///
/// Two documents share a version bucket iff their `group_id`s are equal and
/// their branches compare equal — variation names must match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Branch {
  Master,
  Variation(String),
}

impl Branch {
  pub fn is_master(&self) -> bool { matches!(self, Self::Master) }

  /// The variation name, if this is a variation branch.
  pub fn variation_name(&self) -> Option<&str> {
    match self {
      Self::Master => None,
      Self::Variation(name) => Some(name),
    }
  }
}

impl std::fmt::Display for Branch {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Master => f.write_str("master"),
      Self::Variation(name) => write!(f, "variation {name:?}"),
    }
  }
}

/// The partition within which published version numbers are assigned.
pub type BucketKey = (Uuid, Branch);

// ─── Revision kind ───────────────────────────────────────────────────────────

/// Exactly one of: a published revision carrying a version number, or a
/// draft/test revision carrying an independent test sequence. Drafts never
/// consume a published number until promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RevisionKind {
  Published { version: u32 },
  Draft { test_sequence: u32 },
}

impl RevisionKind {
  pub fn is_published(&self) -> bool { matches!(self, Self::Published { .. }) }

  pub fn is_draft(&self) -> bool { matches!(self, Self::Draft { .. }) }

  /// The published version number, if any.
  pub fn version(&self) -> Option<u32> {
    match self {
      Self::Published { version } => Some(*version),
      Self::Draft { .. } => None,
    }
  }

  /// The draft test sequence, if any.
  pub fn test_sequence(&self) -> Option<u32> {
    match self {
      Self::Published { .. } => None,
      Self::Draft { test_sequence } => Some(*test_sequence),
    }
  }

  /// Short human-readable form, e.g. `v3` or `draft 2`. Used in lineage
  /// display labels.
  pub fn label(&self) -> String {
    match self {
      Self::Published { version } => format!("v{version}"),
      Self::Draft { test_sequence } => format!("draft {test_sequence}"),
    }
  }
}

impl std::fmt::Display for RevisionKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.label())
  }
}

// ─── VersionedDocument ───────────────────────────────────────────────────────

/// A single recipe revision.
///
/// Ancestry pointers (`parent_id`, `clone_source_id`, `root_id`) are plain
/// nullable references with no storage-enforced acyclicity; they must only
/// be consumed through the cycle-safe walks in the lineage graph builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedDocument {
  pub id:              Uuid,
  /// Groups all revisions of "the same recipe" over time.
  pub group_id:        Uuid,
  pub branch:          Branch,
  pub revision_kind:   RevisionKind,
  /// The node this was branched from (e.g. a variation's originating
  /// master). `None` for root/trunk nodes.
  pub parent_id:       Option<Uuid>,
  /// Set on nodes created by duplication rather than branching.
  pub clone_source_id: Option<Uuid>,
  /// The group's top-level ancestor; self-referential on root nodes.
  pub root_id:         Option<Uuid>,
  /// Manual edit lock. The state machine refuses in-place transitions on
  /// locked nodes; the flag is otherwise opaque to the engine.
  pub is_locked:       bool,
  pub name:            String,
  pub lines:           Vec<IngredientLine>,
  pub created_at:      DateTime<Utc>,
}

impl VersionedDocument {
  /// The `(group, branch)` partition this document's version numbers are
  /// assigned in.
  pub fn bucket_key(&self) -> BucketKey {
    (self.group_id, self.branch.clone())
  }

  pub fn is_root(&self) -> bool { self.parent_id.is_none() }
}

// ─── Naming convention ───────────────────────────────────────────────────────

/// Compose the conventional display name for a variation branched off
/// `base`: `"{base} ({variation})"`.
pub fn variation_display_name(base: &str, variation: &str) -> String {
  format!("{base} ({variation})")
}

/// Strip a trailing conventional variation-name suffix, if present.
///
/// `"Sourdough (spelt)"` becomes `"Sourdough"`; names without the suffix
/// are returned unchanged.
pub fn strip_variation_suffix(name: &str) -> &str {
  if let Some(stripped) = name.strip_suffix(')')
    && let Some(idx) = stripped.rfind(" (")
  {
    return &name[..idx];
  }
  name
}
