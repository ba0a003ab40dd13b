//! Pure rules for a build's component set: normalisation and diffing.
//!
//! Everything here is keyed by component id. Input order never influences the
//! outcome, which is what makes reconciliation repeatable.

use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

use super::entities::BuildComponentRecord;

/// A requested (component, quantity) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildLine {
    pub component_id: Uuid,
    pub quantity: i32,
}

impl BuildLine {
    pub fn new(component_id: Uuid, quantity: i32) -> Self {
        Self {
            component_id,
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("a build must contain at least one component")]
    Empty,
    #[error("quantity for component {component_id} must be positive, got {quantity}")]
    NonPositiveQuantity { component_id: Uuid, quantity: i32 },
    #[error("combined quantity for component {component_id} is too large")]
    QuantityOverflow { component_id: Uuid },
}

/// Fold repeated component ids into one line each, summing quantities.
///
/// Every problem is reported, not just the first one. The result is ordered by
/// component id.
pub fn normalize_lines(lines: &[BuildLine]) -> Result<Vec<BuildLine>, Vec<LineError>> {
    if lines.is_empty() {
        return Err(vec![LineError::Empty]);
    }

    let mut problems = Vec::new();
    let mut merged: BTreeMap<Uuid, i32> = BTreeMap::new();

    for line in lines {
        if line.quantity <= 0 {
            problems.push(LineError::NonPositiveQuantity {
                component_id: line.component_id,
                quantity: line.quantity,
            });
            continue;
        }

        let entry = merged.entry(line.component_id).or_insert(0);
        match entry.checked_add(line.quantity) {
            Some(total) => *entry = total,
            None => {
                let overflow = LineError::QuantityOverflow {
                    component_id: line.component_id,
                };
                if !problems.contains(&overflow) {
                    problems.push(overflow);
                }
            }
        }
    }

    if !problems.is_empty() {
        return Err(problems);
    }

    Ok(merged
        .into_iter()
        .map(|(component_id, quantity)| BuildLine::new(component_id, quantity))
        .collect())
}

/// Row-level changes that turn a stored component set into a desired one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDiff {
    pub remove: Vec<Uuid>,
    /// Rows present on both sides. Always rewritten, even when the quantity is unchanged.
    pub update: Vec<BuildLine>,
    pub insert: Vec<BuildLine>,
}

impl BuildDiff {
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty() && self.update.is_empty() && self.insert.is_empty()
    }

    /// Apply the diff to an in-memory row set for `build_id`.
    pub fn apply_to(&self, build_id: Uuid, rows: &mut Vec<BuildComponentRecord>) {
        rows.retain(|row| row.build_id != build_id || !self.remove.contains(&row.component_id));

        for line in &self.update {
            if let Some(row) = rows
                .iter_mut()
                .find(|row| row.build_id == build_id && row.component_id == line.component_id)
            {
                row.quantity = line.quantity;
            }
        }

        rows.extend(self.insert.iter().map(|line| BuildComponentRecord {
            build_id,
            component_id: line.component_id,
            quantity: line.quantity,
        }));
    }
}

/// Three-way diff by component id. `desired` is expected to be normalised.
pub fn plan_reconciliation(current: &[BuildComponentRecord], desired: &[BuildLine]) -> BuildDiff {
    let current: BTreeMap<Uuid, i32> = current
        .iter()
        .map(|row| (row.component_id, row.quantity))
        .collect();
    let desired: BTreeMap<Uuid, i32> = desired
        .iter()
        .map(|line| (line.component_id, line.quantity))
        .collect();

    let mut diff = BuildDiff::default();

    for component_id in current.keys() {
        if !desired.contains_key(component_id) {
            diff.remove.push(*component_id);
        }
    }

    for (component_id, quantity) in &desired {
        let line = BuildLine::new(*component_id, *quantity);
        if current.contains_key(component_id) {
            diff.update.push(line);
        } else {
            diff.insert.push(line);
        }
    }

    diff
}
