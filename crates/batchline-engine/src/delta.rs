//! Quantity-line deltas — the rebase core.
//!
//! A rebase captures "what the variation changed relative to the master it
//! branched from" and replays that change onto a newer master, so
//! variation-specific customizations survive trunk updates without a
//! manual conflict-resolution UI. This is deliberately not a general diff
//! tool: it favours additive safety over exact diff fidelity. In
//! particular, lines the variation *removed* produce no delta entry and
//! therefore reappear from the new base.
//!
//! All functions here are pure and side-effect-free.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use batchline_core::document::{IngredientLine, ItemRef, VersionedDocument};
use serde::Serialize;

/// Quantity differences smaller than this are treated as unchanged.
pub const QTY_EPSILON: f64 = 1e-9;

/// One delta entry: how much an item's quantity moved, and the unit it was
/// expressed in on the modified side. The unit matters only when the item
/// is absent from the base the delta is replayed onto; for overlapping
/// items the base's unit is carried forward unchanged (the engine performs
/// no unit conversion).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaQty {
  pub amount: f64,
  pub unit:   String,
}

/// An item-keyed delta. A `BTreeMap` so iteration (and therefore the order
/// of lines inserted by [`apply_delta`]) is deterministic.
pub type Delta = BTreeMap<ItemRef, DeltaQty>;

// ─── compute ─────────────────────────────────────────────────────────────────

/// The per-item quantity change from `base` to `modified`.
///
/// For each item in `modified`, the delta is `modified − base` (with a
/// missing base quantity counted as 0). Entries within [`QTY_EPSILON`] of
/// zero are omitted. Items present in `base` but absent from `modified`
/// produce no entry: removals are not represented.
pub fn compute_delta(base: &[IngredientLine], modified: &[IngredientLine]) -> Delta {
  let base_qty: HashMap<&ItemRef, f64> =
    base.iter().map(|line| (&line.item, line.quantity)).collect();

  let mut delta = Delta::new();
  for line in modified {
    let before = base_qty.get(&line.item).copied().unwrap_or(0.0);
    let amount = line.quantity - before;
    if amount.abs() < QTY_EPSILON {
      continue;
    }
    delta.insert(
      line.item.clone(),
      DeltaQty {
        amount,
        unit: line.unit.clone(),
      },
    );
  }
  delta
}

// ─── apply ───────────────────────────────────────────────────────────────────

/// Replay `delta` onto `new_base`.
///
/// Returns the merged lines plus the *touched* set: items whose merged
/// quantity combines the new base's value with the variation's delta.
/// Items inserted fresh (present only in the delta) are not touched — they
/// are new, not overlapping — and a non-positive delta for an absent item
/// is skipped entirely so nothing is ever driven negative from scratch.
/// Any resulting line with quantity ≤ 0 is dropped.
///
/// Output order: `new_base`'s original order, then newly-inserted items in
/// delta-iteration order.
pub fn apply_delta(
  new_base: &[IngredientLine],
  delta: &Delta,
) -> (Vec<IngredientLine>, BTreeSet<ItemRef>) {
  let mut merged: Vec<IngredientLine> = new_base.to_vec();
  let index: HashMap<ItemRef, usize> = merged
    .iter()
    .enumerate()
    .map(|(i, line)| (line.item.clone(), i))
    .collect();

  let mut touched = BTreeSet::new();
  for (item, d) in delta {
    match index.get(item) {
      Some(&i) => {
        merged[i].quantity += d.amount;
        touched.insert(item.clone());
      }
      None if d.amount > 0.0 => {
        merged.push(IngredientLine {
          item:     item.clone(),
          quantity: d.amount,
          unit:     d.unit.clone(),
        });
      }
      // Negative delta for an item the new base no longer has: skip.
      None => {}
    }
  }

  merged.retain(|line| line.quantity > 0.0);
  (merged, touched)
}

/// Replay a variation's own changes onto a newer master:
/// `apply_delta(new_master, compute_delta(old_master, variation))`.
pub fn rebase_variation(
  variation: &VersionedDocument,
  old_master: &VersionedDocument,
  new_master: &VersionedDocument,
) -> (Vec<IngredientLine>, BTreeSet<ItemRef>) {
  let delta = compute_delta(&old_master.lines, &variation.lines);
  apply_delta(&new_master.lines, &delta)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(item: &str, quantity: f64, unit: &str) -> IngredientLine {
    IngredientLine::new(item, quantity, unit)
  }

  fn item(key: &str) -> ItemRef {
    ItemRef::new(key)
  }

  #[test]
  fn delta_of_identical_lists_is_empty() {
    let lines = vec![line("flour", 500.0, "g"), line("water", 300.0, "g")];
    assert!(compute_delta(&lines, &lines).is_empty());
  }

  #[test]
  fn delta_captures_increases_and_additions() {
    let base = vec![line("flour", 500.0, "g"), line("water", 300.0, "g")];
    let modified = vec![
      line("flour", 550.0, "g"),
      line("water", 300.0, "g"),
      line("salt", 5.0, "g"),
    ];

    let delta = compute_delta(&base, &modified);
    assert_eq!(delta.len(), 2);
    assert_eq!(delta[&item("flour")].amount, 50.0);
    assert_eq!(delta[&item("salt")].amount, 5.0);
    // water moved by 0 — omitted.
    assert!(!delta.contains_key(&item("water")));
  }

  #[test]
  fn sub_epsilon_changes_are_omitted() {
    let base = vec![line("dye", 1.0, "ml")];
    let modified = vec![line("dye", 1.0 + 1e-12, "ml")];
    assert!(compute_delta(&base, &modified).is_empty());
  }

  // Pins the additive-only model: lines dropped by the variation produce
  // no delta entry and come back from the new base on replay.
  #[test]
  fn removing_a_line_produces_no_delta() {
    let base = vec![line("flour", 500.0, "g"), line("yeast", 7.0, "g")];
    let modified = vec![line("flour", 500.0, "g")];

    let delta = compute_delta(&base, &modified);
    assert!(delta.is_empty());

    let (merged, touched) = apply_delta(&base, &delta);
    assert_eq!(merged, base);
    assert!(touched.is_empty());
  }

  #[test]
  fn apply_adds_overlaps_and_inserts_new_items() {
    let new_base = vec![line("flour", 600.0, "g"), line("water", 320.0, "g")];
    let mut delta = Delta::new();
    delta.insert(item("flour"), DeltaQty { amount: 50.0, unit: "g".into() });
    delta.insert(item("salt"), DeltaQty { amount: 5.0, unit: "g".into() });

    let (merged, touched) = apply_delta(&new_base, &delta);

    assert_eq!(merged, vec![
      line("flour", 650.0, "g"),
      line("water", 320.0, "g"),
      line("salt", 5.0, "g"),
    ]);
    // flour overlaps; salt is new, not touched.
    assert_eq!(touched.into_iter().collect::<Vec<_>>(), vec![item("flour")]);
  }

  #[test]
  fn negative_delta_for_absent_item_is_skipped() {
    let new_base = vec![line("wax", 100.0, "g")];
    let mut delta = Delta::new();
    delta.insert(item("fragrance"), DeltaQty { amount: -3.0, unit: "ml".into() });

    let (merged, touched) = apply_delta(&new_base, &delta);
    assert_eq!(merged, vec![line("wax", 100.0, "g")]);
    assert!(touched.is_empty());
  }

  #[test]
  fn lines_driven_to_zero_or_below_are_dropped() {
    let new_base = vec![line("wax", 100.0, "g"), line("dye", 2.0, "g")];
    let mut delta = Delta::new();
    delta.insert(item("dye"), DeltaQty { amount: -2.0, unit: "g".into() });
    delta.insert(item("wax"), DeltaQty { amount: -150.0, unit: "g".into() });

    let (merged, touched) = apply_delta(&new_base, &delta);
    assert!(merged.is_empty());
    assert_eq!(touched.len(), 2);
  }

  #[test]
  fn every_merged_quantity_is_positive() {
    let new_base = vec![
      line("a", 1.0, "g"),
      line("b", 0.5, "g"),
      line("c", 10.0, "g"),
    ];
    let mut delta = Delta::new();
    delta.insert(item("a"), DeltaQty { amount: -1.0, unit: "g".into() });
    delta.insert(item("b"), DeltaQty { amount: -0.2, unit: "g".into() });
    delta.insert(item("d"), DeltaQty { amount: 2.0, unit: "g".into() });

    let (merged, _) = apply_delta(&new_base, &delta);
    assert!(merged.iter().all(|l| l.quantity > 0.0));
  }

  #[test]
  fn inserted_items_keep_the_delta_unit() {
    let new_base = vec![line("wax", 100.0, "g")];
    let mut delta = Delta::new();
    delta.insert(item("fragrance"), DeltaQty { amount: 3.0, unit: "ml".into() });

    let (merged, _) = apply_delta(&new_base, &delta);
    assert_eq!(merged[1], line("fragrance", 3.0, "ml"));
  }

  #[test]
  fn overlapping_items_keep_the_new_base_unit() {
    // No unit conversion: the new base's unit wins for overlaps.
    let new_base = vec![line("flour", 0.6, "kg")];
    let mut delta = Delta::new();
    delta.insert(item("flour"), DeltaQty { amount: 0.05, unit: "g".into() });

    let (merged, _) = apply_delta(&new_base, &delta);
    assert_eq!(merged[0].unit, "kg");
  }

  // The worked example from the engine's documentation.
  #[test]
  fn rebase_replays_variation_changes_onto_new_master() {
    let doc = |lines: Vec<IngredientLine>| VersionedDocument {
      id: uuid::Uuid::new_v4(),
      group_id: uuid::Uuid::new_v4(),
      branch: batchline_core::document::Branch::Master,
      revision_kind: batchline_core::document::RevisionKind::Published { version: 1 },
      parent_id: None,
      clone_source_id: None,
      root_id: None,
      is_locked: false,
      name: "Bread".into(),
      lines,
      created_at: chrono::Utc::now(),
    };

    let old_master = doc(vec![line("flour", 500.0, "g"), line("water", 300.0, "g")]);
    let variation = doc(vec![
      line("flour", 550.0, "g"),
      line("water", 300.0, "g"),
      line("salt", 5.0, "g"),
    ]);
    let new_master = doc(vec![line("flour", 600.0, "g"), line("water", 320.0, "g")]);

    let (merged, touched) = rebase_variation(&variation, &old_master, &new_master);

    assert_eq!(merged, vec![
      line("flour", 650.0, "g"),
      line("water", 320.0, "g"),
      line("salt", 5.0, "g"),
    ]);
    assert_eq!(touched.into_iter().collect::<Vec<_>>(), vec![item("flour")]);
  }

  // Rebase neutrality: an unchanged variation rebases to exactly the new
  // master's lines with nothing touched.
  #[test]
  fn unchanged_variation_rebases_to_new_master_verbatim() {
    let doc = |lines: Vec<IngredientLine>| VersionedDocument {
      id: uuid::Uuid::new_v4(),
      group_id: uuid::Uuid::new_v4(),
      branch: batchline_core::document::Branch::Master,
      revision_kind: batchline_core::document::RevisionKind::Published { version: 1 },
      parent_id: None,
      clone_source_id: None,
      root_id: None,
      is_locked: false,
      name: "Bread".into(),
      lines,
      created_at: chrono::Utc::now(),
    };

    let old_lines = vec![line("flour", 500.0, "g"), line("water", 300.0, "g")];
    let old_master = doc(old_lines.clone());
    let variation = doc(old_lines);
    let new_master = doc(vec![line("flour", 600.0, "g"), line("water", 320.0, "g")]);

    let (merged, touched) = rebase_variation(&variation, &old_master, &new_master);
    assert_eq!(merged, new_master.lines);
    assert!(touched.is_empty());
  }
}
