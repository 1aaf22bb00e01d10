//! Structural seat identity across listings.
//!
//! Each listing owns its own seat rows, so the same physical seat is found in
//! another listing by (listing, structural key) rather than by row id.

use std::collections::{BTreeSet, HashMap};

use crate::models::{Seat, SeatId, StructuralKey};
use crate::store::{InventoryStore, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct SeatIndex {
    by_key: HashMap<(String, StructuralKey), SeatId>,
}

impl SeatIndex {
    pub fn from_seats<'a>(seats: impl IntoIterator<Item = &'a Seat>) -> Self {
        let mut index = SeatIndex::default();
        for seat in seats {
            index.insert(seat);
        }
        index
    }

    /// Returns the id previously registered under the same key, if any.
    pub fn insert(&mut self, seat: &Seat) -> Option<SeatId> {
        self.by_key.insert((seat.event_id.clone(), seat.key()), seat.id)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn lookup(&self, event_id: &str, key: &StructuralKey) -> Option<SeatId> {
        self.by_key.get(&(event_id.to_string(), key.clone())).copied()
    }

    /// Ids of the seats sharing `key` in each of `event_ids`. Listings with no
    /// such seat are skipped.
    pub fn matching<'a>(
        &self,
        key: &StructuralKey,
        event_ids: impl IntoIterator<Item = &'a String>,
    ) -> Vec<SeatId> {
        event_ids
            .into_iter()
            .filter_map(|event_id| self.lookup(event_id, key))
            .collect()
    }
}

/// Load the structural twins of `origin` in `related` listings.
pub async fn find_matching_seats(
    store: &dyn InventoryStore,
    origin: &Seat,
    related: &BTreeSet<String>,
) -> StoreResult<Vec<Seat>> {
    if related.is_empty() {
        return Ok(Vec::new());
    }
    let event_ids: Vec<String> = related.iter().cloned().collect();
    let mut matches = store.seats_with_key(&event_ids, &origin.key()).await?;
    matches.retain(|seat| seat.id != origin.id);
    Ok(matches)
}
