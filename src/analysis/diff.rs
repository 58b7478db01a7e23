//! Snapshot differ.
//!
//! `diff` compares two consecutive snapshots. It answers two questions:
//! did anything at all change (`overall_changed`), and which keyed
//! forecast slots changed or disappeared.
//!
//! Slots that appear for the first time in the new snapshot are not
//! reported. The feed occasionally grows new slots and announcing them
//! would be noise.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::model::{BandCondition, BandKey, PhenomenonKey, Snapshot, VhfCondition};

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Builds BandKey → condition. On duplicate keys the last item wins.
pub fn band_lookup(conditions: &[BandCondition]) -> HashMap<BandKey, &str> {
    conditions
        .iter()
        .map(|c| (c.key(), c.condition.as_str()))
        .collect()
}

/// Builds PhenomenonKey → condition. On duplicate keys the last item wins.
pub fn vhf_lookup(conditions: &[VhfCondition]) -> HashMap<PhenomenonKey, &str> {
    conditions
        .iter()
        .map(|c| (c.key(), c.condition.as_str()))
        .collect()
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    /// True when the snapshots are not structurally identical.
    pub overall_changed: bool,
    /// Tags of the scalar fields whose text differs, in feed order.
    pub changed_fields: Vec<&'static str>,
    pub changed_band_keys: HashSet<BandKey>,
    pub removed_band_keys: HashSet<BandKey>,
    pub changed_phenomenon_keys: HashSet<PhenomenonKey>,
    pub removed_phenomenon_keys: HashSet<PhenomenonKey>,
}

impl DiffResult {
    /// True when at least one keyed slot changed or disappeared.
    pub fn has_keyed_changes(&self) -> bool {
        !(self.changed_band_keys.is_empty()
            && self.removed_band_keys.is_empty()
            && self.changed_phenomenon_keys.is_empty()
            && self.removed_phenomenon_keys.is_empty())
    }
}

/// Compares `old` against `new`.
///
/// `overall_changed` is strict structural inequality: any scalar, or any
/// difference in either collection (including order and duplicates),
/// flips it. The keyed sets use last-wins lookups and compare condition
/// strings case-sensitively.
pub fn diff(old: &Snapshot, new: &Snapshot) -> DiffResult {
    let changed_fields = old
        .scalars()
        .zip(new.scalars())
        .filter(|((_, before), (_, after))| before != after)
        .map(|((tag, _), _)| tag)
        .collect();

    let (changed_band_keys, removed_band_keys) = keyed_changes(
        &band_lookup(&old.band_conditions),
        &band_lookup(&new.band_conditions),
    );
    let (changed_phenomenon_keys, removed_phenomenon_keys) = keyed_changes(
        &vhf_lookup(&old.vhf_conditions),
        &vhf_lookup(&new.vhf_conditions),
    );

    DiffResult {
        overall_changed: old != new,
        changed_fields,
        changed_band_keys,
        removed_band_keys,
        changed_phenomenon_keys,
        removed_phenomenon_keys,
    }
}

/// Splits the old keys into (changed, removed). Keys only in `new` are
/// ignored.
fn keyed_changes<K: Eq + Hash + Clone>(
    old: &HashMap<K, &str>,
    new: &HashMap<K, &str>,
) -> (HashSet<K>, HashSet<K>) {
    let mut changed = HashSet::new();
    let mut removed = HashSet::new();

    for (key, before) in old {
        match new.get(key) {
            Some(after) if after != before => {
                changed.insert(key.clone());
            }
            Some(_) => {}
            None => {
                removed.insert(key.clone());
            }
        }
    }

    (changed, removed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
