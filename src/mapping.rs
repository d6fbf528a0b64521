//! Bidirectional mapping between user identifiers and dense graph labels.

use std::collections::HashMap;

use crate::error::{Result, StoreError};

/// Reverse-table growth increment. Growing in steps rather than exact-fit
/// amortizes reallocation cost across inserts.
pub(crate) const LABEL_RESERVE_INCREMENT: usize = 1000;

/// Two synchronized views of one logical bijection: user id -> label and
/// label -> user id.
///
/// Labels are dense and monotonically increasing from 0, so the reverse
/// lookup is a plain vector indexed by label. `next_label` always equals the
/// number of committed entries. The forward and reverse structures must never
/// diverge: an entry is added to both or to neither, and only after the
/// underlying index has accepted the vector (see
/// [`commit`](MappingTable::commit)).
#[derive(Debug)]
pub struct MappingTable {
    /// user id -> dense label
    id_to_label: HashMap<u64, u64>,
    /// dense label -> user id, position = label
    label_to_id: Vec<u64>,
    /// The next label to allocate; equals the committed entry count.
    next_label: u64,
    /// Entries the reverse table is currently sized for.
    reserved: usize,
}

impl MappingTable {
    pub fn new() -> Self {
        Self {
            id_to_label: HashMap::new(),
            label_to_id: Vec::with_capacity(LABEL_RESERVE_INCREMENT),
            next_label: 0,
            reserved: LABEL_RESERVE_INCREMENT,
        }
    }

    /// Check that `user_id` is unbound and return the label it would be
    /// committed under, growing the reverse-table reservation if needed.
    ///
    /// Does NOT advance the allocator: `next_label` only moves on
    /// [`commit`](Self::commit), so a failed index insert spends no label.
    pub fn allocate(&mut self, user_id: u64) -> Result<u64> {
        if self.id_to_label.contains_key(&user_id) {
            return Err(StoreError::DuplicateIdentifier { user_id });
        }
        if self.next_label as usize >= self.reserved {
            self.reserved = self.next_label as usize + LABEL_RESERVE_INCREMENT;
            self.label_to_id
                .reserve(self.reserved - self.label_to_id.len());
        }
        Ok(self.next_label)
    }

    /// Record the binding after the index has accepted the vector under
    /// `label`. Inserts into both views and advances `next_label`.
    pub fn commit(&mut self, user_id: u64, label: u64) {
        debug_assert_eq!(
            label, self.next_label,
            "labels are committed in allocation order and never reused"
        );
        self.id_to_label.insert(user_id, label);
        self.label_to_id.push(user_id);
        self.next_label += 1;
    }

    pub fn lookup_label(&self, user_id: u64) -> Option<u64> {
        self.id_to_label.get(&user_id).copied()
    }

    pub fn lookup_user_id(&self, label: u64) -> Result<u64> {
        if label >= self.next_label {
            return Err(StoreError::LabelOutOfRange {
                label,
                next_label: self.next_label,
            });
        }
        Ok(self.label_to_id[label as usize])
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.id_to_label.contains_key(&user_id)
    }

    pub fn next_label(&self) -> u64 {
        self.next_label
    }

    pub fn len(&self) -> usize {
        self.next_label as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next_label == 0
    }

    /// Entries the reverse table is currently sized for. Persisted so a
    /// reloaded table starts with the same reservation.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Pre-size the reverse table for `additional` upcoming commits, so a
    /// batch grows the table once instead of per item.
    pub fn reserve_for(&mut self, additional: usize) {
        let wanted = self.next_label as usize + additional + LABEL_RESERVE_INCREMENT;
        if wanted > self.reserved {
            self.reserved = wanted;
            self.label_to_id.reserve(wanted - self.label_to_id.len());
        }
    }

    /// Empty both views and reset the allocator.
    ///
    /// Independent of the underlying index: clearing the mapping while the
    /// graph still holds vectors desynchronizes the two. Callers use this for
    /// rebuild and test workflows only.
    pub fn clear(&mut self) {
        self.id_to_label.clear();
        self.label_to_id.clear();
        self.next_label = 0;
    }

    /// The reverse table in label order.
    pub fn reverse_entries(&self) -> &[u64] {
        &self.label_to_id
    }

    /// Forward entries in arbitrary order.
    pub fn forward_entries(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.id_to_label.iter().map(|(&id, &label)| (id, label))
    }

    /// Owned snapshot of the forward map.
    pub fn id_to_label_snapshot(&self) -> HashMap<u64, u64> {
        self.id_to_label.clone()
    }

    /// Owned snapshot of the reverse table.
    pub fn label_to_id_snapshot(&self) -> Vec<u64> {
        self.label_to_id.clone()
    }

    /// Rebuild a table from persisted parts, validating the bijection.
    pub(crate) fn from_parts(
        label_to_id: Vec<u64>,
        id_to_label: HashMap<u64, u64>,
        reserved: usize,
    ) -> Result<Self> {
        let count = label_to_id.len();
        if id_to_label.len() != count {
            return Err(StoreError::PersistenceError(format!(
                "forward map has {} entries but reverse table has {}",
                id_to_label.len(),
                count
            )));
        }
        for (&user_id, &label) in &id_to_label {
            if label as usize >= count || label_to_id[label as usize] != user_id {
                return Err(StoreError::PersistenceError(format!(
                    "forward entry ({}, {}) does not match the reverse table",
                    user_id, label
                )));
            }
        }
        let reserved = reserved.max(count).max(LABEL_RESERVE_INCREMENT);
        let mut table = Self {
            id_to_label,
            label_to_id,
            next_label: count as u64,
            reserved,
        };
        table
            .label_to_id
            .reserve(reserved.saturating_sub(table.label_to_id.len()));
        Ok(table)
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::new()
    }
}
