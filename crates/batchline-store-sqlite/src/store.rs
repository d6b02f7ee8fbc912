//! [`SqliteRepository`] — the SQLite implementation of [`Repository`].

use std::path::Path;

use batchline_core::{
  document::{Branch, VersionedDocument},
  event::LineageEvent,
  repo::Repository,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawDocument, RawEvent, encode_branch, encode_dt, encode_lines, encode_uuid,
  },
  schema::SCHEMA,
};

const DOCUMENT_COLUMNS: &str = "doc_id, group_id, variation, version_number, \
                                test_sequence, parent_id, clone_source_id, \
                                root_id, locked, name, lines_json, created_at";

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    doc_id:          row.get(0)?,
    group_id:        row.get(1)?,
    variation:       row.get(2)?,
    version_number:  row.get(3)?,
    test_sequence:   row.get(4)?,
    parent_id:       row.get(5)?,
    clone_source_id: row.get(6)?,
    root_id:         row.get(7)?,
    locked:          row.get(8)?,
    name:            row.get(9)?,
    lines_json:      row.get(10)?,
    created_at:      row.get(11)?,
  })
}

/// True when a failed write tripped one of the per-bucket uniqueness
/// indexes — the signature of two writers racing on the same version
/// bucket.
fn is_bucket_conflict(e: &tokio_rusqlite::Error) -> bool {
  if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, Some(msg))) = e {
    err.code == rusqlite::ErrorCode::ConstraintViolation
      && (msg.contains("documents_bucket_version_idx")
        || msg.contains("documents_bucket_draft_idx"))
  } else {
    false
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Batchline document repository backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All
/// statements for one `Repository` call run on the connection's dedicated
/// thread, which serialises writes; the per-bucket UNIQUE indexes turn any
/// remaining version race into [`Error::VersionConflict`].
#[derive(Clone)]
pub struct SqliteRepository {
  conn: tokio_rusqlite::Connection,
}

impl SqliteRepository {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// All lineage events recorded against `subject_id`, oldest first.
  /// Not part of the [`Repository`] trait — this is the audit read surface.
  pub async fn events_for_subject(&self, subject_id: Uuid) -> Result<Vec<LineageEvent>> {
    let id_str = encode_uuid(subject_id);

    let raws: Vec<RawEvent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, subject_id, source_id, event_kind, actor_id,
                  occurred_at, notes
           FROM lineage_events
           WHERE subject_id = ?1
           ORDER BY occurred_at, event_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawEvent {
              event_id:    row.get(0)?,
              subject_id:  row.get(1)?,
              source_id:   row.get(2)?,
              event_kind:  row.get(3)?,
              actor_id:    row.get(4)?,
              occurred_at: row.get(5)?,
              notes:       row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEvent::into_event).collect()
  }
}

// ─── Repository impl ─────────────────────────────────────────────────────────

impl Repository for SqliteRepository {
  type Error = Error;

  async fn get_node(&self, id: Uuid) -> Result<Option<VersionedDocument>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE doc_id = ?1"),
              rusqlite::params![id_str],
              document_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn save_node(&self, node: VersionedDocument) -> Result<()> {
    let group_id = node.group_id;
    let branch = node.branch.clone();
    let version = node
      .revision_kind
      .version()
      .or(node.revision_kind.test_sequence())
      .unwrap_or(0);

    let doc_id_str      = encode_uuid(node.id);
    let group_id_str    = encode_uuid(node.group_id);
    let variation       = encode_branch(&node.branch);
    let version_number  = node.revision_kind.version();
    let test_sequence   = node.revision_kind.test_sequence();
    let parent_str      = node.parent_id.map(encode_uuid);
    let clone_str       = node.clone_source_id.map(encode_uuid);
    let root_str        = node.root_id.map(encode_uuid);
    let locked          = node.is_locked;
    let name            = node.name.clone();
    let lines_json      = encode_lines(&node.lines)?;
    let created_at_str  = encode_dt(node.created_at);

    let saved = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (
             doc_id, group_id, variation, version_number, test_sequence,
             parent_id, clone_source_id, root_id, locked, name,
             lines_json, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT(doc_id) DO UPDATE SET
             variation       = excluded.variation,
             version_number  = excluded.version_number,
             test_sequence   = excluded.test_sequence,
             parent_id       = excluded.parent_id,
             clone_source_id = excluded.clone_source_id,
             root_id         = excluded.root_id,
             locked          = excluded.locked,
             name            = excluded.name,
             lines_json      = excluded.lines_json",
          rusqlite::params![
            doc_id_str,
            group_id_str,
            variation,
            version_number,
            test_sequence,
            parent_str,
            clone_str,
            root_str,
            locked,
            name,
            lines_json,
            created_at_str,
          ],
        )?;
        Ok(())
      })
      .await;

    match saved {
      Ok(()) => Ok(()),
      Err(e) if is_bucket_conflict(&e) => Err(Error::VersionConflict {
        group_id,
        branch,
        version,
      }),
      Err(e) => Err(e.into()),
    }
  }

  async fn query_bucket(
    &self,
    group_id: Uuid,
    branch: Branch,
    published_only: bool,
  ) -> Result<Vec<VersionedDocument>> {
    let group_str = encode_uuid(group_id);
    let variation = encode_branch(&branch);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        // `IS` rather than `=` so a NULL variation matches the master
        // branch.
        let sql = if published_only {
          format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE group_id = ?1 AND variation IS ?2
               AND version_number IS NOT NULL
             ORDER BY version_number"
          )
        } else {
          format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents
             WHERE group_id = ?1 AND variation IS ?2
             ORDER BY created_at, doc_id"
          )
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![group_str, variation], document_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn query_group(&self, group_id: Uuid) -> Result<Vec<VersionedDocument>> {
    let group_str = encode_uuid(group_id);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {DOCUMENT_COLUMNS} FROM documents
           WHERE group_id = ?1
           ORDER BY created_at, doc_id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![group_str], document_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn append_lineage_event(&self, event: LineageEvent) -> Result<()> {
    let event_id_str   = encode_uuid(event.id);
    let subject_id_str = encode_uuid(event.subject_id);
    let source_id_str  = event.source_id.map(encode_uuid);
    let kind_str       = event.kind.discriminant().to_owned();
    let actor_id_str   = encode_uuid(event.actor_id);
    let occurred_str   = encode_dt(event.occurred_at);
    let notes          = event.notes;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lineage_events (
             event_id, subject_id, source_id, event_kind, actor_id,
             occurred_at, notes
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            event_id_str,
            subject_id_str,
            source_id_str,
            kind_str,
            actor_id_str,
            occurred_str,
            notes,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
