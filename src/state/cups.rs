//! Cup layouts and the per-team cup set (standing cups plus provisional hits).

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Label pushed into a pending list when a hit has no standing cup left to claim.
pub const OVERKILL_LABEL: &str = "Overkill";

/// Named cup layouts, declared from the largest (match start) to the smallest (overtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CupFormat {
    /// Six cups in a 3-2-1 pyramid.
    Pyramid,
    /// Four cups in a 1-2-1 diamond.
    Diamond,
    /// Three cups in a 2-1 triangle.
    Triangle,
    /// Two cups one behind the other.
    VerticalLine,
    /// Two cups side by side.
    HorizontalLine,
    /// One cup in the centre.
    SingleCenter,
}

impl CupFormat {
    /// Every format, largest first.
    pub const ALL: [CupFormat; 6] = [
        CupFormat::Pyramid,
        CupFormat::Diamond,
        CupFormat::Triangle,
        CupFormat::VerticalLine,
        CupFormat::HorizontalLine,
        CupFormat::SingleCenter,
    ];

    /// Layout both teams start a match (and a rematch) with.
    pub const STARTING: CupFormat = CupFormat::Pyramid;

    /// Layout both teams are reset to when overtime starts.
    pub const OVERTIME: CupFormat = CupFormat::SingleCenter;

    /// Human readable name of the layout.
    pub fn display_name(self) -> &'static str {
        match self {
            CupFormat::Pyramid => "Pyramid",
            CupFormat::Diamond => "Diamond",
            CupFormat::Triangle => "Triangle",
            CupFormat::VerticalLine => "Vertical Line",
            CupFormat::HorizontalLine => "Horizontal Line",
            CupFormat::SingleCenter => "Single Center",
        }
    }

    /// Stable key used in configuration files and persisted records.
    pub fn key(self) -> &'static str {
        match self {
            CupFormat::Pyramid => "pyramid",
            CupFormat::Diamond => "diamond",
            CupFormat::Triangle => "triangle",
            CupFormat::VerticalLine => "vertical_line",
            CupFormat::HorizontalLine => "horizontal_line",
            CupFormat::SingleCenter => "single_center",
        }
    }

    /// Resolve a format from its stable key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.key() == key)
    }

    fn default_labels(self) -> &'static [&'static str] {
        match self {
            CupFormat::Pyramid => &[
                "3 Left", "3 Center", "3 Right", "2 Left", "2 Right", "1 Center",
            ],
            CupFormat::Diamond => &["D3 Center", "D2 Left", "D2 Right", "D1 Center"],
            CupFormat::Triangle => &["T2 Left", "T2 Right", "T1 Center"],
            CupFormat::VerticalLine => &["V2", "V1"],
            CupFormat::HorizontalLine => &["H Left", "H Right"],
            CupFormat::SingleCenter => &["Single"],
        }
    }
}

impl fmt::Display for CupFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Read-only lookup from a format to its labelled cup slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCatalog {
    layouts: IndexMap<CupFormat, Vec<String>>,
}

impl Default for FormatCatalog {
    fn default() -> Self {
        let layouts = CupFormat::ALL
            .into_iter()
            .map(|format| {
                let labels = format
                    .default_labels()
                    .iter()
                    .map(|label| (*label).to_owned())
                    .collect();
                (format, labels)
            })
            .collect();
        Self { layouts }
    }
}

impl FormatCatalog {
    /// Replace the labels of one layout, keeping the catalog order intact.
    pub fn with_layout(mut self, format: CupFormat, labels: Vec<String>) -> Self {
        self.layouts.insert(format, labels);
        self
    }

    /// Labelled slots of `format`.
    pub fn labels(&self, format: CupFormat) -> &[String] {
        self.layouts
            .get(&format)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterate over every layout, largest first.
    pub fn iter(&self) -> impl Iterator<Item = (CupFormat, &[String])> {
        self.layouts
            .iter()
            .map(|(format, labels)| (*format, labels.as_slice()))
    }
}

/// Multiset of cup labels. Order is kept for display, equality ignores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CupBag(Vec<String>);

impl CupBag {
    /// Number of entries, duplicates included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag holds no entry at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Occurrences of `label`.
    pub fn count(&self, label: &str) -> usize {
        self.0.iter().filter(|entry| entry.as_str() == label).count()
    }

    /// Add one occurrence of `label`.
    pub fn push(&mut self, label: impl Into<String>) {
        self.0.push(label.into());
    }

    /// Remove the most recently added occurrence of `label`, if any.
    pub fn remove_one(&mut self, label: &str) -> bool {
        match self.0.iter().rposition(|entry| entry == label) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Entries as a slice, in insertion order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl PartialEq for CupBag {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut left: Vec<&str> = self.iter().collect();
        let mut right: Vec<&str> = other.iter().collect();
        left.sort_unstable();
        right.sort_unstable();
        left == right
    }
}

impl Eq for CupBag {}

impl From<Vec<String>> for CupBag {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&[String]> for CupBag {
    fn from(value: &[String]) -> Self {
        Self(value.to_vec())
    }
}

impl From<CupBag> for Vec<String> {
    fn from(value: CupBag) -> Self {
        value.0
    }
}

/// Where the damage of a shot currently sits inside the target cup set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageStage {
    /// Still in the pending list, cups not yet removed from the table.
    Pending,
    /// Already committed: the hit cups left the active list.
    Committed,
}

/// Reasons a cup set can fail its consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CupSetCorruption {
    /// A standing cup does not belong to the layout the opponent is targeting.
    #[error("standing cup `{label}` is not part of the `{format}` layout")]
    UnknownLabel {
        /// Offending label.
        label: String,
        /// Layout the set was checked against.
        format: CupFormat,
    },
    /// A pending hit references more copies of a cup than are standing.
    #[error("pending hit on `{label}` has no standing cup behind it")]
    DanglingPending {
        /// Offending label.
        label: String,
    },
}

/// Ground truth of one team's cups: what stands and what was provisionally hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CupSet {
    active: CupBag,
    pending: CupBag,
}

impl CupSet {
    /// Build a full cup set for the given labels.
    pub fn full(labels: &[String]) -> Self {
        Self {
            active: labels.into(),
            pending: CupBag::default(),
        }
    }

    /// Rebuild a set from persisted lists.
    pub fn from_parts(active: Vec<String>, pending: Vec<String>) -> Self {
        Self {
            active: active.into(),
            pending: pending.into(),
        }
    }

    /// Cups currently standing, including those provisionally hit.
    pub fn active(&self) -> &CupBag {
        &self.active
    }

    /// Cups hit but not yet removed from the table.
    pub fn pending(&self) -> &CupBag {
        &self.pending
    }

    /// Standing cups minus provisional hits. Negative values mean overkill.
    pub fn live_count(&self) -> i32 {
        self.active.len() as i32 - self.pending.len() as i32
    }

    /// Replace the standing cups with a full layout and forget provisional hits.
    pub fn init(&mut self, labels: &[String]) {
        self.active = labels.into();
        self.pending.clear();
    }

    /// Empty both lists.
    pub fn clear(&mut self) {
        self.active.clear();
        self.pending.clear();
    }

    /// Register a hit worth `count` cups, preferring the shooter's chosen labels.
    ///
    /// A chosen label is claimed only while it still has a standing copy that is not already
    /// pending; anything missing to reach `count` is filled with [`OVERKILL_LABEL`] entries so
    /// the pending list always grows by exactly `count`. Returns the entries that were pushed.
    pub fn register_hits(&mut self, chosen: &[String], count: u8) -> Vec<String> {
        let count = usize::from(count);
        let mut damage: Vec<String> = Vec::with_capacity(count);

        for label in chosen {
            if damage.len() == count {
                break;
            }
            if damage.contains(label) || label == OVERKILL_LABEL {
                continue;
            }
            if self.active.count(label) > self.pending.count(label) {
                self.pending.push(label.clone());
                damage.push(label.clone());
            }
        }

        while damage.len() < count {
            self.pending.push(OVERKILL_LABEL);
            damage.push(OVERKILL_LABEL.to_owned());
        }

        damage
    }

    /// Lock provisional hits in: each pending cup leaves the active list once.
    ///
    /// Overkill entries have no standing cup to take down and stay pending so the live count
    /// does not move. Returns how many cups left the table.
    pub fn commit_pending(&mut self) -> usize {
        let mut removed = 0;
        let mut unresolved = CupBag::default();

        for label in self.pending.iter() {
            if label != OVERKILL_LABEL && self.active.remove_one(label) {
                removed += 1;
            } else {
                unresolved.push(label);
            }
        }

        self.pending = unresolved;
        removed
    }

    /// Undo the damage of one shot, wherever it currently sits.
    ///
    /// Entries still pending are withdrawn; committed cups are put back on the table (one
    /// append per occurrence, so a cup removed twice comes back twice).
    pub fn undo_hit(&mut self, damage: &[String]) -> DamageStage {
        let mut stage = DamageStage::Pending;
        for label in damage {
            if self.pending.remove_one(label) {
                continue;
            }
            if label != OVERKILL_LABEL {
                self.active.push(label.clone());
                stage = DamageStage::Committed;
            }
        }
        stage
    }

    /// Re-apply a hit at the given stage. Mirrors [`CupSet::undo_hit`].
    pub fn redo_hit(&mut self, chosen: &[String], count: u8, stage: DamageStage) -> Vec<String> {
        match stage {
            DamageStage::Pending => self.register_hits(chosen, count),
            DamageStage::Committed => {
                let count = usize::from(count);
                let mut damage: Vec<String> = Vec::with_capacity(count);
                for label in chosen {
                    if damage.len() == count {
                        break;
                    }
                    if damage.contains(label) || label == OVERKILL_LABEL {
                        continue;
                    }
                    if self.active.count(label) > self.pending.count(label)
                        && self.active.remove_one(label)
                    {
                        damage.push(label.clone());
                    }
                }
                while damage.len() < count {
                    self.pending.push(OVERKILL_LABEL);
                    damage.push(OVERKILL_LABEL.to_owned());
                }
                damage
            }
        }
    }

    /// Check the set against the layout the opposing team is targeting.
    ///
    /// An empty set always passes: it is what a completed reversal leaves behind.
    pub fn validate(&self, format: CupFormat, labels: &[String]) -> Result<(), CupSetCorruption> {
        if let Some(label) = self
            .active
            .iter()
            .find(|label| !labels.iter().any(|known| known.as_str() == *label))
        {
            return Err(CupSetCorruption::UnknownLabel {
                label: label.to_owned(),
                format,
            });
        }

        if let Some(label) = self.pending.iter().find(|label| {
            *label != OVERKILL_LABEL && self.pending.count(label) > self.active.count(label)
        }) {
            return Err(CupSetCorruption::DanglingPending {
                label: label.to_owned(),
            });
        }

        Ok(())
    }
}
