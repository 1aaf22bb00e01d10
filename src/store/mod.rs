//! Persistence boundary for seats, indirect rows and state categories.
//!
//! [`postgres::PgStore`] is the production backend; [`memory::MemoryStore`]
//! backs tests and local runs without a database.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::inventory::propagation::PropagationPlan;
use crate::inventory::state::SeatState;
use crate::models::{
    IndirectDelete, IndirectRecords, NewIndirect, NewSeat, PropagatedState, Seat, SeatId,
    SeatPatch, StateCategory, StructuralKey,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt {table} row {id}: {reason}")]
    Corrupt {
        table: &'static str,
        id: i64,
        reason: String,
    },
    #[error("seat {seat_id} changed while the action was being applied")]
    Conflict { seat_id: SeatId },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// What an action was validated against: the seat's direct fields and the
/// indirect sale states attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatSnapshot {
    pub seat: Seat,
    pub indirect_states: BTreeSet<PropagatedState>,
}

impl SeatSnapshot {
    pub fn new(seat: Seat, indirect_states: impl IntoIterator<Item = PropagatedState>) -> Self {
        Self {
            seat,
            indirect_states: indirect_states.into_iter().collect(),
        }
    }
}

/// One unit of work: an optional direct seat update followed by indirect
/// deletes, then inserts. Backends apply it atomically.
///
/// When `expected` is set, the backend compares it with the seat as stored
/// under the same lock that guards the writes and fails with
/// [`StoreError::Conflict`] on any difference, writing nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub seat: Option<(SeatId, SeatPatch)>,
    pub expected: Option<SeatSnapshot>,
    pub deletes: Vec<IndirectDelete>,
    pub inserts: Vec<NewIndirect>,
}

impl ChangeSet {
    pub fn for_seat(id: SeatId, patch: SeatPatch) -> Self {
        ChangeSet {
            seat: Some((id, patch)),
            ..ChangeSet::default()
        }
    }

    pub fn expecting(mut self, snapshot: SeatSnapshot) -> Self {
        self.expected = Some(snapshot);
        self
    }

    /// Seats whose indirect rows this change writes, plus the updated seat.
    pub fn touched_seats(&self) -> BTreeSet<SeatId> {
        let mut ids: BTreeSet<SeatId> = self.seat.iter().map(|(id, _)| *id).collect();
        ids.extend(self.inserts.iter().map(|insert| insert.seat_id));
        for delete in &self.deletes {
            if let IndirectDelete::Matching { seat_ids, .. } = delete {
                ids.extend(seat_ids.iter().copied());
            }
        }
        ids
    }

    pub fn clears_everything(&self) -> bool {
        self.deletes.contains(&IndirectDelete::All)
    }

    pub fn with_plan(mut self, plan: &PropagationPlan) -> Self {
        self.deletes.extend(plan.deletes.iter().cloned());
        self.inserts.extend(plan.inserts.iter().cloned());
        self
    }
}

/// Row counts touched by a full reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCounts {
    pub seats: u64,
    pub indirect_holds: u64,
    pub indirect_kills: u64,
    pub indirect_states: u64,
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn seats_by_event(&self, event_id: &str) -> StoreResult<Vec<Seat>>;

    async fn seat_by_id(&self, id: SeatId) -> StoreResult<Option<Seat>>;

    async fn all_seats(&self) -> StoreResult<Vec<Seat>>;

    /// Seats carrying `key` in any of `event_ids`.
    async fn seats_with_key(
        &self,
        event_ids: &[String],
        key: &StructuralKey,
    ) -> StoreResult<Vec<Seat>>;

    async fn seat_count(&self) -> StoreResult<u64>;

    /// Insert seats, skipping any whose (listing, key) already exists.
    async fn insert_seats(&self, seats: &[NewSeat]) -> StoreResult<u64>;

    async fn indirect_for(&self, seat_ids: &[SeatId]) -> StoreResult<IndirectRecords>;

    async fn all_indirect(&self) -> StoreResult<IndirectRecords>;

    /// Apply `change` atomically. Returns the updated seat when the change
    /// carried a seat update, `None` when that seat does not exist (in which
    /// case nothing is written) or when there was no seat update. A stale
    /// `expected` snapshot fails with [`StoreError::Conflict`].
    async fn commit(&self, change: ChangeSet) -> StoreResult<Option<Seat>>;

    /// Restore every seat's direct defaults and drop all indirect rows.
    async fn reset_all(&self) -> StoreResult<ResetCounts>;

    async fn categories(&self) -> StoreResult<Vec<StateCategory>>;

    async fn create_category(
        &self,
        name: &str,
        display_order: Option<i32>,
    ) -> StoreResult<StateCategory>;

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<StateCategory>>;

    async fn delete_category(&self, id: i64) -> StoreResult<bool>;

    /// Replace the category's member states. `false` when the category is unknown.
    async fn set_memberships(&self, id: i64, states: &[SeatState]) -> StoreResult<bool>;
}
