use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{ChangeSet, InventoryStore, ResetCounts, SeatSnapshot, StoreError, StoreResult};
use crate::inventory::index::SeatIndex;
use crate::inventory::state::SeatState;
use crate::models::{
    Effect, IndirectHold, IndirectKill, IndirectRecords, IndirectState, NewIndirect, NewSeat, Seat,
    SeatId, SeatStatus, StateCategory, StructuralKey,
};

#[derive(Debug, Default)]
struct MemoryState {
    seats: BTreeMap<SeatId, Seat>,
    index: SeatIndex,
    indirect: IndirectRecords,
    categories: BTreeMap<i64, StateCategory>,
    next_seat_id: i64,
    next_indirect_id: i64,
    next_category_id: i64,
}

impl MemoryState {
    fn next_indirect_id(&mut self) -> i64 {
        self.next_indirect_id += 1;
        self.next_indirect_id
    }

    /// Insert with the same uniqueness the database enforces: holds and kills
    /// per (seat, source), states per (seat, source, state).
    fn insert_indirect(&mut self, record: NewIndirect) {
        let id = self.next_indirect_id();
        let NewIndirect { seat_id, source_event, effect } = record;
        match effect {
            Effect::Hold(hold_name) => {
                self.indirect
                    .holds
                    .retain(|h| !(h.seat_id == seat_id && h.source_event == source_event));
                self.indirect.holds.push(IndirectHold { id, seat_id, hold_name, source_event });
            }
            Effect::Kill(kill_name) => {
                self.indirect
                    .kills
                    .retain(|k| !(k.seat_id == seat_id && k.source_event == source_event));
                self.indirect.kills.push(IndirectKill { id, seat_id, kill_name, source_event });
            }
            Effect::State(state) => {
                let exists = self.indirect.states.iter().any(|s| {
                    s.seat_id == seat_id && s.source_event == source_event && s.state == state
                });
                if !exists {
                    self.indirect.states.push(IndirectState { id, seat_id, state, source_event });
                }
            }
        }
    }

    fn sorted_categories(&self) -> Vec<StateCategory> {
        let mut categories: Vec<StateCategory> = self.categories.values().cloned().collect();
        categories.sort_by_key(|c| (c.display_order, c.id));
        categories
    }
}

/// Process-local store guarded by a single lock, so every [`ChangeSet`] is
/// applied as one step.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn seats_by_event(&self, event_id: &str) -> StoreResult<Vec<Seat>> {
        let state = self.state.read().await;
        Ok(state
            .seats
            .values()
            .filter(|seat| seat.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn seat_by_id(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        Ok(self.state.read().await.seats.get(&id).cloned())
    }

    async fn all_seats(&self) -> StoreResult<Vec<Seat>> {
        Ok(self.state.read().await.seats.values().cloned().collect())
    }

    async fn seats_with_key(
        &self,
        event_ids: &[String],
        key: &StructuralKey,
    ) -> StoreResult<Vec<Seat>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .matching(key, event_ids)
            .into_iter()
            .filter_map(|id| state.seats.get(&id).cloned())
            .collect())
    }

    async fn seat_count(&self) -> StoreResult<u64> {
        Ok(self.state.read().await.seats.len() as u64)
    }

    async fn insert_seats(&self, seats: &[NewSeat]) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut inserted = 0;
        for new in seats {
            if state.index.lookup(&new.event_id, &new.key).is_some() {
                continue;
            }
            state.next_seat_id += 1;
            let seat = Seat {
                id: state.next_seat_id,
                event_id: new.event_id.clone(),
                ticket_type: new.key.ticket_type.clone(),
                section: new.key.section.clone(),
                row: new.key.row.clone(),
                seat: new.key.seat,
                seating_type: new.seating_type,
                direct_hold_name: None,
                kill_name: None,
                not_for_sale: false,
                status: SeatStatus::Free,
                is_resale: false,
                is_reservation: false,
            };
            state.index.insert(&seat);
            state.seats.insert(seat.id, seat);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn indirect_for(&self, seat_ids: &[SeatId]) -> StoreResult<IndirectRecords> {
        let state = self.state.read().await;
        let wanted = |id: &SeatId| seat_ids.contains(id);
        Ok(IndirectRecords {
            holds: state.indirect.holds.iter().filter(|h| wanted(&h.seat_id)).cloned().collect(),
            kills: state.indirect.kills.iter().filter(|k| wanted(&k.seat_id)).cloned().collect(),
            states: state.indirect.states.iter().filter(|s| wanted(&s.seat_id)).cloned().collect(),
        })
    }

    async fn all_indirect(&self) -> StoreResult<IndirectRecords> {
        Ok(self.state.read().await.indirect.clone())
    }

    async fn commit(&self, change: ChangeSet) -> StoreResult<Option<Seat>> {
        let mut state = self.state.write().await;

        if let Some(expected) = &change.expected {
            let seat_id = expected.seat.id;
            let Some(current) = state.seats.get(&seat_id) else {
                return Ok(None);
            };
            let stored = SeatSnapshot::new(current.clone(), state.indirect.states_for(seat_id));
            if &stored != expected {
                return Err(StoreError::Conflict { seat_id });
            }
        }

        let updated = match &change.seat {
            Some((id, patch)) => match state.seats.get_mut(id) {
                Some(seat) => {
                    patch.apply(seat);
                    Some(seat.clone())
                }
                None => return Ok(None),
            },
            None => None,
        };

        for delete in &change.deletes {
            state
                .indirect
                .holds
                .retain(|h| !delete.matches(h.seat_id, &h.source_event, &Effect::Hold(h.hold_name)));
            state
                .indirect
                .kills
                .retain(|k| !delete.matches(k.seat_id, &k.source_event, &Effect::Kill(k.kill_name)));
            state
                .indirect
                .states
                .retain(|s| !delete.matches(s.seat_id, &s.source_event, &Effect::State(s.state)));
        }

        for insert in change.inserts {
            state.insert_indirect(insert);
        }

        Ok(updated)
    }

    async fn reset_all(&self) -> StoreResult<ResetCounts> {
        let mut state = self.state.write().await;
        let counts = ResetCounts {
            seats: state.seats.len() as u64,
            indirect_holds: state.indirect.holds.len() as u64,
            indirect_kills: state.indirect.kills.len() as u64,
            indirect_states: state.indirect.states.len() as u64,
        };
        for seat in state.seats.values_mut() {
            seat.direct_hold_name = None;
            seat.kill_name = None;
            seat.not_for_sale = false;
            seat.status = SeatStatus::Free;
            seat.is_resale = false;
            seat.is_reservation = false;
        }
        state.indirect = IndirectRecords::default();
        Ok(counts)
    }

    async fn categories(&self) -> StoreResult<Vec<StateCategory>> {
        Ok(self.state.read().await.sorted_categories())
    }

    async fn create_category(
        &self,
        name: &str,
        display_order: Option<i32>,
    ) -> StoreResult<StateCategory> {
        let mut state = self.state.write().await;
        let display_order = display_order.unwrap_or_else(|| {
            state
                .categories
                .values()
                .map(|c| c.display_order + 1)
                .max()
                .unwrap_or(0)
        });
        state.next_category_id += 1;
        let category = StateCategory {
            id: state.next_category_id,
            name: name.to_string(),
            display_order,
            states: Vec::new(),
        };
        state.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<StateCategory>> {
        let mut state = self.state.write().await;
        Ok(state.categories.get_mut(&id).map(|category| {
            category.name = name.to_string();
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        Ok(self.state.write().await.categories.remove(&id).is_some())
    }

    async fn set_memberships(&self, id: i64, states: &[SeatState]) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(category) = state.categories.get_mut(&id) else {
            return Ok(false);
        };
        category.states.clear();
        for s in states {
            if !category.states.contains(s) {
                category.states.push(*s);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EffectKind, HoldName, IndirectDelete, PropagatedState, SeatPatch, SeatingType};

    fn new_seat(event_id: &str, seat: i32) -> NewSeat {
        NewSeat {
            event_id: event_id.into(),
            key: StructuralKey {
                ticket_type: "Top".into(),
                section: "101".into(),
                row: "A".into(),
                seat,
            },
            seating_type: SeatingType::Row,
        }
    }

    #[tokio::test]
    async fn insert_skips_existing_keys() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_seats(&[new_seat("event1", 1), new_seat("event1", 2)]).await.unwrap(), 2);
        assert_eq!(store.insert_seats(&[new_seat("event1", 1), new_seat("event2", 1)]).await.unwrap(), 1);
        assert_eq!(store.seat_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn commit_on_missing_seat_writes_nothing() {
        let store = MemoryStore::new();
        store.insert_seats(&[new_seat("event1", 1)]).await.unwrap();
        let change = ChangeSet {
            seat: Some((99, SeatPatch { not_for_sale: Some(true), ..SeatPatch::default() })),
            inserts: vec![NewIndirect {
                seat_id: 1,
                source_event: "packageA".into(),
                effect: Effect::Hold(HoldName::Red),
            }],
            ..ChangeSet::default()
        };
        assert_eq!(store.commit(change).await.unwrap(), None);
        assert!(store.all_indirect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_snapshot_is_a_conflict_and_writes_nothing() {
        let store = MemoryStore::new();
        store.insert_seats(&[new_seat("event1", 1), new_seat("packageA", 1)]).await.unwrap();
        let seen = SeatSnapshot {
            seat: store.seat_by_id(1).await.unwrap().unwrap(),
            indirect_states: Default::default(),
        };

        let cart = SeatPatch { status: Some(SeatStatus::ReservedByToken), ..SeatPatch::default() };
        let first = ChangeSet::for_seat(1, cart).expecting(seen.clone());
        assert!(store.commit(first).await.unwrap().is_some());

        let sell = SeatPatch { status: Some(SeatStatus::Booked), ..SeatPatch::default() };
        let mut second = ChangeSet::for_seat(1, sell).expecting(seen);
        second.inserts.push(NewIndirect {
            seat_id: 2,
            source_event: "event1".into(),
            effect: Effect::State(PropagatedState::Booked),
        });
        assert!(matches!(
            store.commit(second).await,
            Err(StoreError::Conflict { seat_id: 1 })
        ));
        assert_eq!(store.seat_by_id(1).await.unwrap().unwrap().status, SeatStatus::ReservedByToken);
        assert!(store.all_indirect().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn states_are_unique_per_value_holds_per_source() {
        let store = MemoryStore::new();
        store.insert_seats(&[new_seat("event1", 1)]).await.unwrap();
        let record = |effect| NewIndirect { seat_id: 1, source_event: "packageA".into(), effect };
        let change = ChangeSet {
            inserts: vec![
                record(Effect::Hold(HoldName::Red)),
                record(Effect::Hold(HoldName::Blue)),
                record(Effect::State(PropagatedState::Booked)),
                record(Effect::State(PropagatedState::Booked)),
                record(Effect::State(PropagatedState::ReservedByToken)),
            ],
            ..ChangeSet::default()
        };
        store.commit(change).await.unwrap();
        let indirect = store.all_indirect().await.unwrap();
        assert_eq!(indirect.holds.len(), 1);
        assert_eq!(indirect.holds[0].hold_name, HoldName::Blue);
        assert_eq!(indirect.states.len(), 2);

        let delete = ChangeSet {
            deletes: vec![IndirectDelete::Matching {
                kind: EffectKind::State(PropagatedState::Booked),
                seat_ids: vec![1],
                source_event: "packageA".into(),
            }],
            ..ChangeSet::default()
        };
        store.commit(delete).await.unwrap();
        let indirect = store.all_indirect().await.unwrap();
        assert_eq!(indirect.states_for(1), vec![PropagatedState::ReservedByToken]);
        assert_eq!(indirect.holds.len(), 1);
    }

    #[tokio::test]
    async fn categories_append_after_highest_rank() {
        let store = MemoryStore::new();
        let first = store.create_category("All", None).await.unwrap();
        let pinned = store.create_category("Pinned", Some(10)).await.unwrap();
        let next = store.create_category("Next", None).await.unwrap();
        assert_eq!(first.display_order, 0);
        assert_eq!(pinned.display_order, 10);
        assert_eq!(next.display_order, 11);

        assert!(store
            .set_memberships(first.id, &[SeatState::Open, SeatState::Open, SeatState::Sold])
            .await
            .unwrap());
        let categories = store.categories().await.unwrap();
        assert_eq!(categories[0].states, vec![SeatState::Open, SeatState::Sold]);
        assert!(!store.set_memberships(404, &[SeatState::Open]).await.unwrap());
        assert!(store.delete_category(pinned.id).await.unwrap());
        assert!(!store.delete_category(pinned.id).await.unwrap());
    }
}
