//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Ingredient lines are
//! stored as compact JSON. UUIDs are stored as hyphenated lowercase
//! strings. The branch is stored as a nullable variation name (NULL =
//! master), and the revision kind as a pair of nullable integers of which
//! exactly one is set.

use batchline_core::{
  document::{Branch, IngredientLine, RevisionKind, VersionedDocument},
  event::{LineageEvent, LineageEventKind},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Branch ──────────────────────────────────────────────────────────────────

/// The nullable `variation` column value for a branch.
pub fn encode_branch(branch: &Branch) -> Option<String> {
  branch.variation_name().map(str::to_owned)
}

pub fn decode_branch(variation: Option<String>) -> Branch {
  match variation {
    None => Branch::Master,
    Some(name) => Branch::Variation(name),
  }
}

// ─── Lines ───────────────────────────────────────────────────────────────────

pub fn encode_lines(lines: &[IngredientLine]) -> Result<String> {
  Ok(serde_json::to_string(lines)?)
}

pub fn decode_lines(s: &str) -> Result<Vec<IngredientLine>> {
  Ok(serde_json::from_str(s)?)
}

// ─── LineageEventKind ────────────────────────────────────────────────────────

pub fn decode_event_kind(s: &str) -> Result<LineageEventKind> {
  match s {
    "promote_to_parent" => Ok(LineageEventKind::PromoteToParent),
    "promote_variation_to_master" => Ok(LineageEventKind::PromoteVariationToMaster),
    "publish_test" => Ok(LineageEventKind::PublishTest),
    other => Err(Error::MalformedEvent(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub doc_id:          String,
  pub group_id:        String,
  pub variation:       Option<String>,
  pub version_number:  Option<u32>,
  pub test_sequence:   Option<u32>,
  pub parent_id:       Option<String>,
  pub clone_source_id: Option<String>,
  pub root_id:         Option<String>,
  pub locked:          bool,
  pub name:            String,
  pub lines_json:      String,
  pub created_at:      String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<VersionedDocument> {
    let revision_kind = match (self.version_number, self.test_sequence) {
      (Some(version), None) => RevisionKind::Published { version },
      (None, Some(test_sequence)) => RevisionKind::Draft { test_sequence },
      // The CHECK constraint makes these unreachable for rows we wrote.
      _ => return Err(Error::MalformedRevision(self.doc_id)),
    };

    Ok(VersionedDocument {
      id: decode_uuid(&self.doc_id)?,
      group_id: decode_uuid(&self.group_id)?,
      branch: decode_branch(self.variation),
      revision_kind,
      parent_id: decode_opt_uuid(self.parent_id.as_deref())?,
      clone_source_id: decode_opt_uuid(self.clone_source_id.as_deref())?,
      root_id: decode_opt_uuid(self.root_id.as_deref())?,
      is_locked: self.locked,
      name: self.name,
      lines: decode_lines(&self.lines_json)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `lineage_events` row.
pub struct RawEvent {
  pub event_id:    String,
  pub subject_id:  String,
  pub source_id:   Option<String>,
  pub event_kind:  String,
  pub actor_id:    String,
  pub occurred_at: String,
  pub notes:       Option<String>,
}

impl RawEvent {
  pub fn into_event(self) -> Result<LineageEvent> {
    Ok(LineageEvent {
      id: decode_uuid(&self.event_id)?,
      subject_id: decode_uuid(&self.subject_id)?,
      source_id: decode_opt_uuid(self.source_id.as_deref())?,
      kind: decode_event_kind(&self.event_kind)?,
      actor_id: decode_uuid(&self.actor_id)?,
      occurred_at: decode_dt(&self.occurred_at)?,
      notes: self.notes,
    })
  }
}
