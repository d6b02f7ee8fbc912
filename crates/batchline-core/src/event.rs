//! Lineage events — the append-only audit edges of the version graph.
//!
//! Documents are never rewritten by promotions; the relationship between
//! the node a transition produced (or flipped in place) and the node it
//! came from is recorded here instead. Events are written once and never
//! updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEventKind {
  /// A node was detached from its parent and became a root.
  PromoteToParent,
  /// A published variation's content became a brand-new trunk revision.
  PromoteVariationToMaster,
  /// A draft/test revision was published into its bucket.
  PublishTest,
}

impl LineageEventKind {
  /// The discriminant string stored in the `event_kind` column.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::PromoteToParent => "promote_to_parent",
      Self::PromoteVariationToMaster => "promote_variation_to_master",
      Self::PublishTest => "publish_test",
    }
  }
}

/// One append-only audit edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageEvent {
  pub id:          Uuid,
  /// The node the transition produced or acted on.
  pub subject_id:  Uuid,
  /// The node the transition came from, when the transition has one
  /// (e.g. the promoted variation, or the abandoned parent).
  pub source_id:   Option<Uuid>,
  pub kind:        LineageEventKind,
  pub actor_id:    Uuid,
  pub occurred_at: DateTime<Utc>,
  pub notes:       Option<String>,
}

impl LineageEvent {
  /// Build a new event with a fresh id and the current timestamp.
  pub fn record(
    kind: LineageEventKind,
    subject_id: Uuid,
    source_id: Option<Uuid>,
    actor_id: Uuid,
    notes: Option<String>,
  ) -> Self {
    Self {
      id: Uuid::new_v4(),
      subject_id,
      source_id,
      kind,
      actor_id,
      occurred_at: Utc::now(),
      notes,
    }
  }
}
