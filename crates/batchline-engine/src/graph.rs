//! Lineage graph building — the display tree and root-to-node paths.
//!
//! Ancestry pointers are plain nullable references with no
//! storage-enforced acyclicity, so nothing here trusts the data to be a
//! tree. [`build_path`] walks pointers under a seen-set guard and
//! truncates rather than loops; [`group_adjacency`] pre-validates the
//! child map with a BFS seen set so [`build_tree`] can recurse freely.
//! Lineage display is diagnostic: malformed ancestry degrades to a
//! truncated path or a partial tree, never an error.

use std::collections::{HashMap, HashSet, VecDeque};

use batchline_core::{
  document::{Branch, RevisionKind, VersionedDocument},
  repo::Repository,
};
use serde::Serialize;
use uuid::Uuid;

use crate::EngineError;

// ─── Tree view ───────────────────────────────────────────────────────────────

/// How a child node hangs off its parent in the display tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageEdge {
  /// The child was branched from the parent (`parent_id`).
  Branch,
  /// The child was duplicated from the parent (`clone_source_id`).
  Clone,
}

/// One rendered node of the lineage display tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeView {
  pub id:         Uuid,
  pub name:       String,
  pub branch:     Branch,
  pub revision:   RevisionKind,
  pub is_current: bool,
  pub children:   Vec<(LineageEdge, TreeView)>,
}

/// Caller-supplied child map: node id → outgoing edges in display order.
pub type Adjacency = HashMap<Uuid, Vec<(LineageEdge, Uuid)>>;

/// Render the subtree rooted at `root_id` by depth-first descent.
///
/// The adjacency map must be pre-validated (see [`group_adjacency`]);
/// children are rendered in the given order. Returns `None` if `root_id`
/// does not resolve, and silently skips unresolvable children.
pub fn build_tree(
  root_id: Uuid,
  nodes: &HashMap<Uuid, VersionedDocument>,
  children: &Adjacency,
  current_id: Uuid,
) -> Option<TreeView> {
  let doc = nodes.get(&root_id)?;

  let mut rendered = Vec::new();
  if let Some(edges) = children.get(&root_id) {
    for (edge, child_id) in edges {
      if let Some(subtree) = build_tree(*child_id, nodes, children, current_id) {
        rendered.push((*edge, subtree));
      }
    }
  }

  Some(TreeView {
    id:         root_id,
    name:       doc.name.clone(),
    branch:     doc.branch.clone(),
    revision:   doc.revision_kind,
    is_current: root_id == current_id,
    children:   rendered,
  })
}

// ─── Path reconstruction ─────────────────────────────────────────────────────

/// Reconstruct the root-first path from the group's root down to `target_id`.
///
/// From each node the next hop is picked by priority: `parent_id` if
/// present and resolvable, else `clone_source_id` if present and
/// resolvable, else `root_id` if present, resolvable, and different from
/// the node itself. The walk stops at the first dead end or the first
/// already-seen node, so it terminates within `N + 1` steps on an `N`-node
/// graph even when pointers form a cycle — at the cost of a
/// possibly-truncated path.
///
/// `fallback_root_id`, if given and not already on the path, is appended
/// as the final (outermost) ancestor.
pub fn build_path(
  target_id: Uuid,
  nodes_by_id: &HashMap<Uuid, VersionedDocument>,
  fallback_root_id: Option<Uuid>,
) -> Vec<Uuid> {
  let mut path = vec![target_id];
  let mut seen: HashSet<Uuid> = HashSet::from([target_id]);
  let mut current = target_id;

  while let Some(doc) = nodes_by_id.get(&current) {
    let next = doc
      .parent_id
      .filter(|p| nodes_by_id.contains_key(p))
      .or_else(|| doc.clone_source_id.filter(|c| nodes_by_id.contains_key(c)))
      .or_else(|| {
        doc
          .root_id
          .filter(|r| *r != current && nodes_by_id.contains_key(r))
      });

    let Some(next) = next else { break };
    if !seen.insert(next) {
      // Cycle — truncate here.
      break;
    }
    path.push(next);
    current = next;
  }

  if let Some(fallback) = fallback_root_id
    && !path.contains(&fallback)
  {
    path.push(fallback);
  }

  path.reverse();
  path
}

// ─── Adjacency construction ──────────────────────────────────────────────────

/// Build a pre-validated adjacency map for [`build_tree`] from a group's
/// documents.
///
/// Each document attaches to its `parent_id` with a [`LineageEdge::Branch`]
/// edge, or failing that to its `clone_source_id` with a
/// [`LineageEdge::Clone`] edge. The raw child lists are then re-walked
/// breadth-first from `root_id` with a seen set, dropping any edge that
/// would revisit a node, so the result is guaranteed acyclic and entirely
/// reachable from the root. Children keep creation order.
pub fn group_adjacency(root_id: Uuid, docs: &[VersionedDocument]) -> Adjacency {
  let mut raw: Adjacency = HashMap::new();
  let mut ordered: Vec<&VersionedDocument> = docs.iter().collect();
  ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

  for doc in ordered {
    let attachment = doc
      .parent_id
      .map(|p| (LineageEdge::Branch, p))
      .or_else(|| doc.clone_source_id.map(|c| (LineageEdge::Clone, c)));
    if let Some((edge, under)) = attachment
      && under != doc.id
    {
      raw.entry(under).or_default().push((edge, doc.id));
    }
  }

  // BFS from the root, keeping only first-visit edges.
  let mut validated = Adjacency::new();
  let mut seen: HashSet<Uuid> = HashSet::from([root_id]);
  let mut queue: VecDeque<Uuid> = VecDeque::from([root_id]);
  while let Some(id) = queue.pop_front() {
    let Some(edges) = raw.get(&id) else { continue };
    let kept: Vec<(LineageEdge, Uuid)> = edges
      .iter()
      .filter(|(_, child)| seen.insert(*child))
      .copied()
      .collect();
    for (_, child) in &kept {
      queue.push_back(*child);
    }
    if !kept.is_empty() {
      validated.insert(id, kept);
    }
  }
  validated
}

// ─── Repository-backed view ──────────────────────────────────────────────────

/// Render the full lineage tree for the group containing `doc_id`, with
/// `doc_id` marked current.
///
/// The root is reconstructed with [`build_path`] over the group's
/// documents (using the document's own `root_id` as fallback), so a
/// malformed group still renders — possibly partially — rather than
/// failing. Returns `None` only when `doc_id` itself does not resolve.
pub async fn lineage_view<R: Repository>(
  repo: &R,
  doc_id: Uuid,
) -> Result<Option<TreeView>, EngineError<R::Error>> {
  let Some(doc) = repo.get_node(doc_id).await.map_err(EngineError::Repository)?
  else {
    return Ok(None);
  };

  let group = repo
    .query_group(doc.group_id)
    .await
    .map_err(EngineError::Repository)?;
  let nodes: HashMap<Uuid, VersionedDocument> =
    group.iter().map(|d| (d.id, d.clone())).collect();

  // Root-first: take the outermost ancestor that actually resolves (the
  // fallback root may dangle). `doc_id` itself always resolves.
  let path = build_path(doc_id, &nodes, doc.root_id);
  let root_id = path
    .iter()
    .copied()
    .find(|id| nodes.contains_key(id))
    .unwrap_or(doc_id);

  let children = group_adjacency(root_id, &group);
  Ok(build_tree(root_id, &nodes, &children, doc_id))
}
