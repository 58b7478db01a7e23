//! User-tracked forecast slots and the change detector that watches them.
//!
//! A `TrackedSelection` is the subset of band and phenomenon slots the user
//! asked to hear about. `tracked_changes` reports which of those slots moved
//! between two snapshots. A slot is only reported when it is present on both
//! sides; a slot the feed dropped for one cycle is not a change.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::diff::{band_lookup, vhf_lookup};
use crate::model::{BandKey, ConditionLevel, PhenomenonKey, Snapshot};

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Slots the user wants surfaced on change. Lives for the session only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSelection {
    bands: HashSet<BandKey>,
    phenomena: HashSet<PhenomenonKey>,
}

impl TrackedSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the key if absent, removes it if present. Returns whether the
    /// key is tracked afterwards.
    pub fn toggle_band(&mut self, key: BandKey) -> bool {
        if self.bands.remove(&key) {
            false
        } else {
            self.bands.insert(key);
            true
        }
    }

    /// Same toggle semantics as [`TrackedSelection::toggle_band`].
    pub fn toggle_phenomenon(&mut self, key: PhenomenonKey) -> bool {
        if self.phenomena.remove(&key) {
            false
        } else {
            self.phenomena.insert(key);
            true
        }
    }

    pub fn is_band_tracked(&self, key: &BandKey) -> bool {
        self.bands.contains(key)
    }

    pub fn is_phenomenon_tracked(&self, key: &PhenomenonKey) -> bool {
        self.phenomena.contains(key)
    }

    pub fn bands(&self) -> impl Iterator<Item = &BandKey> {
        self.bands.iter()
    }

    pub fn phenomena(&self) -> impl Iterator<Item = &PhenomenonKey> {
        self.phenomena.iter()
    }

    pub fn len(&self) -> usize {
        self.bands.len() + self.phenomena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty() && self.phenomena.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Change descriptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Band,
    Phenomenon,
}

/// The slot a change refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TrackedKey {
    Band(BandKey),
    Phenomenon(PhenomenonKey),
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedKey::Band(key) => write!(f, "{}", key),
            TrackedKey::Phenomenon(key) => write!(f, "{}", key),
        }
    }
}

/// One tracked slot whose condition changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDescription {
    pub key: TrackedKey,
    pub old_condition: String,
    pub new_condition: String,
}

impl ChangeDescription {
    pub fn kind(&self) -> ChangeKind {
        match self.key {
            TrackedKey::Band(_) => ChangeKind::Band,
            TrackedKey::Phenomenon(_) => ChangeKind::Phenomenon,
        }
    }

    /// `Some(true)` when an HF condition got better, `Some(false)` when it
    /// got worse, `None` when either label is not a Good/Fair/Poor grade or
    /// both map to the same grade.
    pub fn is_improvement(&self) -> Option<bool> {
        ConditionLevel::improvement(&self.old_condition, &self.new_condition)
    }
}

/// `80m-40m (day) changed from Poor to Good`
impl fmt::Display for ChangeDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changed from {} to {}",
            self.key, self.old_condition, self.new_condition
        )
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Returns the tracked slots whose condition differs between `old` and
/// `new`. Uses the same last-wins lookups as `diff`. The order of the
/// returned changes is unspecified.
pub fn tracked_changes(
    old: &Snapshot,
    new: &Snapshot,
    tracked: &TrackedSelection,
) -> Vec<ChangeDescription> {
    let mut changes = Vec::new();

    if !tracked.bands.is_empty() {
        let old_bands = band_lookup(&old.band_conditions);
        let new_bands = band_lookup(&new.band_conditions);

        for key in &tracked.bands {
            if let (Some(before), Some(after)) = (old_bands.get(key), new_bands.get(key)) {
                if before != after {
                    changes.push(ChangeDescription {
                        key: TrackedKey::Band(key.clone()),
                        old_condition: before.to_string(),
                        new_condition: after.to_string(),
                    });
                }
            }
        }
    }

    if !tracked.phenomena.is_empty() {
        let old_vhf = vhf_lookup(&old.vhf_conditions);
        let new_vhf = vhf_lookup(&new.vhf_conditions);

        for key in &tracked.phenomena {
            if let (Some(before), Some(after)) = (old_vhf.get(key), new_vhf.get(key)) {
                if before != after {
                    changes.push(ChangeDescription {
                        key: TrackedKey::Phenomenon(key.clone()),
                        old_condition: before.to_string(),
                        new_condition: after.to_string(),
                    });
                }
            }
        }
    }

    changes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BandCondition, VhfCondition};

    fn bands(entries: &[(&str, &str, &str)]) -> Snapshot {
        Snapshot {
            band_conditions: entries
                .iter()
                .map(|(band, time, condition)| BandCondition {
                    band: band.to_string(),
                    time: time.to_string(),
                    condition: condition.to_string(),
                })
                .collect(),
            ..Snapshot::default()
        }
    }

    fn phenomena(entries: &[(&str, &str, &str)]) -> Snapshot {
        Snapshot {
            vhf_conditions: entries
                .iter()
                .map(|(name, location, condition)| VhfCondition {
                    phenomenon: name.to_string(),
                    location: location.to_string(),
                    condition: condition.to_string(),
                })
                .collect(),
            ..Snapshot::default()
        }
    }

    fn tracking_band(band: &str, time: &str) -> TrackedSelection {
        let mut tracked = TrackedSelection::new();
        tracked.toggle_band(BandKey::new(band, time));
        tracked
    }

    // --- Selection ----------------------------------------------------------

    #[test]
    fn test_toggle_adds_then_removes() {
        let mut tracked = TrackedSelection::new();
        let key = BandKey::new("80m-40m", "day");

        assert!(tracked.toggle_band(key.clone()), "first toggle tracks");
        assert!(tracked.is_band_tracked(&key));
        assert!(!tracked.toggle_band(key.clone()), "second toggle untracks");
        assert!(!tracked.is_band_tracked(&key));
        assert!(tracked.is_empty());
    }

    #[test]
    fn test_toggle_band_ignores_time_casing() {
        let mut tracked = TrackedSelection::new();
        tracked.toggle_band(BandKey::new("80m-40m", "DAY"));
        assert!(tracked.is_band_tracked(&BandKey::new("80m-40m", "day")));
    }

    #[test]
    fn test_toggle_phenomenon() {
        let mut tracked = TrackedSelection::new();
        let key = PhenomenonKey::new("E-Skip", "europe");
        assert!(tracked.toggle_phenomenon(key.clone()));
        assert_eq!(tracked.len(), 1);
        assert!(!tracked.toggle_phenomenon(key));
        assert_eq!(tracked.len(), 0);
    }

    // --- Detection ----------------------------------------------------------

    #[test]
    fn test_tracked_band_change_is_reported() {
        let old = bands(&[("80m-40m", "day", "Poor"), ("30m-20m", "day", "Good")]);
        let new = bands(&[("80m-40m", "day", "Good"), ("30m-20m", "day", "Fair")]);

        let changes = tracked_changes(&old, &new, &tracking_band("80m-40m", "day"));

        assert_eq!(changes.len(), 1, "only the tracked slot should be reported");
        let change = &changes[0];
        assert_eq!(change.kind(), ChangeKind::Band);
        assert_eq!(change.key, TrackedKey::Band(BandKey::new("80m-40m", "day")));
        assert_eq!(change.old_condition, "Poor");
        assert_eq!(change.new_condition, "Good");
        assert_eq!(change.to_string(), "80m-40m (day) changed from Poor to Good");
        assert_eq!(change.is_improvement(), Some(true));
    }

    #[test]
    fn test_tracked_key_missing_from_new_reports_nothing() {
        let old = bands(&[("80m-40m", "day", "Poor")]);
        let new = bands(&[("30m-20m", "day", "Good")]);

        let changes = tracked_changes(&old, &new, &tracking_band("80m-40m", "day"));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_tracked_key_missing_from_old_reports_nothing() {
        let old = bands(&[]);
        let new = bands(&[("80m-40m", "day", "Good")]);

        let changes = tracked_changes(&old, &new, &tracking_band("80m-40m", "day"));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_tracked_unchanged_key_reports_nothing() {
        let snapshot = bands(&[("80m-40m", "day", "Poor")]);
        let changes = tracked_changes(&snapshot, &snapshot, &tracking_band("80m-40m", "day"));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_tracked_lookup_matches_mixed_case_time_in_feed() {
        let old = bands(&[("80m-40m", "Day", "Poor")]);
        let new = bands(&[("80m-40m", "day", "Fair")]);

        let changes = tracked_changes(&old, &new, &tracking_band("80m-40m", "day"));
        assert_eq!(changes.len(), 1);
    }

    #[test]
    fn test_tracked_phenomenon_change() {
        let old = phenomena(&[("E-Skip", "europe", "Band Closed")]);
        let new = phenomena(&[("E-Skip", "europe", "50MHz ES")]);

        let mut tracked = TrackedSelection::new();
        tracked.toggle_phenomenon(PhenomenonKey::new("E-Skip", "europe"));

        let changes = tracked_changes(&old, &new, &tracked);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind(), ChangeKind::Phenomenon);
        assert_eq!(
            changes[0].to_string(),
            "E-Skip (europe) changed from Band Closed to 50MHz ES"
        );
        assert_eq!(changes[0].is_improvement(), None);
    }

    #[test]
    fn test_tracked_multiple_changes_as_multiset() {
        let old = bands(&[("80m-40m", "day", "Poor"), ("12m-10m", "night", "Good")]);
        let new = bands(&[("80m-40m", "day", "Fair"), ("12m-10m", "night", "Poor")]);

        let mut tracked = tracking_band("80m-40m", "day");
        tracked.toggle_band(BandKey::new("12m-10m", "night"));

        let mut lines: Vec<String> = tracked_changes(&old, &new, &tracked)
            .iter()
            .map(|c| c.to_string())
            .collect();
        lines.sort();

        assert_eq!(
            lines,
            vec![
                "12m-10m (night) changed from Good to Poor".to_string(),
                "80m-40m (day) changed from Poor to Fair".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_selection_reports_nothing() {
        let old = bands(&[("80m-40m", "day", "Poor")]);
        let new = bands(&[("80m-40m", "day", "Good")]);
        assert!(tracked_changes(&old, &new, &TrackedSelection::new()).is_empty());
    }
}
