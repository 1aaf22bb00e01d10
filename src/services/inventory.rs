//! Orchestration of direct seat actions, their propagation and the bulk
//! consistency operations.
//!
//! Every mutation is one unit of work: validate against the seat's current
//! effective state, compute the propagation plan, then commit the direct
//! patch together with every indirect delete and insert.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{InventoryError, InventoryResult};
use crate::inventory::category::{category_name, ALL_CATEGORY};
use crate::inventory::propagation::{self, actions_for, direct_effects, PropagationPlan};
use crate::inventory::state::{effective_state, transition, SeatAction, SeatState};
use crate::inventory::{RelationshipGraph, SeatIndex};
use crate::models::category::DEFAULT_CATEGORY_NAME;
use crate::models::{
    HoldName, IndirectDelete, IndirectRecords, Seat, SeatId, SeatWithIndirect, StateCategory,
};
use crate::store::{ChangeSet, InventoryStore, ResetCounts, SeatSnapshot, StoreError};

/// Attempts per action before a persistent conflict is reported.
const MAX_ATTEMPTS: usize = 5;

/// Result of one direct action.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub seat: Seat,
    /// Origin listing plus every listing whose indirect rows may have changed.
    pub touched_events: BTreeSet<String>,
    pub propagated_to: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotForSaleUpdate {
    #[serde(alias = "id")]
    pub seat_id: SeatId,
    pub not_for_sale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRejection {
    pub seat_id: SeatId,
    pub reason: String,
}

/// Per-item result of a best-effort batch: accepted updates are committed
/// even when others are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub updated: Vec<Seat>,
    pub rejected: Vec<BatchRejection>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RederiveSummary {
    pub seats_scanned: usize,
    pub records_written: usize,
}

#[derive(Clone)]
pub struct InventoryService {
    store: Arc<dyn InventoryStore>,
    graph: Arc<RelationshipGraph>,
    listings: Arc<Vec<String>>,
}

impl InventoryService {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        graph: RelationshipGraph,
        listings: Vec<String>,
    ) -> Self {
        Self {
            store,
            graph: Arc::new(graph),
            listings: Arc::new(listings),
        }
    }

    pub fn store(&self) -> &dyn InventoryStore {
        self.store.as_ref()
    }

    pub fn graph(&self) -> &RelationshipGraph {
        &self.graph
    }

    pub fn listings(&self) -> &[String] {
        &self.listings
    }

    fn ensure_listing(&self, event_id: &str) -> InventoryResult<()> {
        if self.listings.iter().any(|listing| listing == event_id) {
            Ok(())
        } else {
            Err(InventoryError::NotFound {
                entity: "Listing",
                id: event_id.to_string(),
            })
        }
    }

    // === Reads ===

    pub async fn seats_for_event(&self, event_id: &str) -> InventoryResult<Vec<Seat>> {
        self.ensure_listing(event_id)?;
        Ok(self.store.seats_by_event(event_id).await?)
    }

    pub async fn seat(&self, id: SeatId) -> InventoryResult<Seat> {
        self.store
            .seat_by_id(id)
            .await?
            .ok_or_else(|| InventoryError::seat_not_found(id))
    }

    pub async fn related_events(&self, event_id: &str) -> InventoryResult<BTreeSet<String>> {
        self.ensure_listing(event_id)?;
        Ok(self.graph.related_events(event_id))
    }

    /// Seats of a listing with their indirect rows, effective state and
    /// state category.
    pub async fn seats_with_indirect(&self, event_id: &str) -> InventoryResult<Vec<SeatWithIndirect>> {
        let seats = self.seats_for_event(event_id).await?;
        let ids: Vec<SeatId> = seats.iter().map(|seat| seat.id).collect();
        let indirect = self.store.indirect_for(&ids).await?;
        let categories = self.store.categories().await?;
        Ok(build_views(seats, indirect, &categories))
    }

    // === Direct actions ===

    /// Validate `action`, then commit the direct change and its propagation
    /// in one unit of work. A rejected action writes nothing.
    ///
    /// The commit carries the snapshot the action was validated against. If a
    /// concurrent action changed the seat first, the whole attempt is redone
    /// against the new state, where it usually fails validation.
    pub async fn perform(&self, id: SeatId, action: SeatAction) -> InventoryResult<MutationOutcome> {
        let mut attempt = 1;
        loop {
            match self.try_perform(id, action).await {
                Err(InventoryError::Storage(StoreError::Conflict { .. }))
                    if attempt < MAX_ATTEMPTS =>
                {
                    debug!(
                        seat_id = id,
                        action = action.name(),
                        attempt,
                        "Seat changed concurrently, retrying"
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_perform(&self, id: SeatId, action: SeatAction) -> InventoryResult<MutationOutcome> {
        let seat = self.seat(id).await?;
        let indirect = self.store.indirect_for(&[id]).await?;
        let states = indirect.states_for(id);
        let state = effective_state(&seat, &states);
        let snapshot = SeatSnapshot::new(seat.clone(), states);

        let patch = transition(&seat, state, action).map_err(|reason| {
            warn!(
                seat_id = id,
                event_id = %seat.event_id,
                action = action.name(),
                %state,
                %reason,
                "Rejected seat action"
            );
            InventoryError::IllegalTransition(reason)
        })?;

        let after = patch.applied_to(&seat);
        let actions = actions_for(action, &seat, &after);
        let plan = propagation::plan(self.store.as_ref(), &self.graph, &seat, &actions).await?;

        let change = ChangeSet::for_seat(id, patch)
            .expecting(snapshot)
            .with_plan(&plan);
        let updated = self
            .store
            .commit(change)
            .await?
            .ok_or_else(|| InventoryError::seat_not_found(id))?;

        let mut touched_events = BTreeSet::from([updated.event_id.clone()]);
        if !actions.is_empty() {
            touched_events.extend(self.graph.related_events(&updated.event_id));
        }

        info!(
            seat_id = id,
            event_id = %updated.event_id,
            action = action.name(),
            targets = plan.targets.len(),
            "Seat action applied"
        );

        Ok(MutationOutcome {
            seat: updated,
            touched_events,
            propagated_to: plan.targets.len(),
        })
    }

    pub async fn apply_hold(&self, id: SeatId, hold: HoldName) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::ApplyHold(hold)).await
    }

    pub async fn remove_hold(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::RemoveHold).await
    }

    pub async fn apply_kill(&self, id: SeatId, kill: HoldName) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::ApplyKill(kill)).await
    }

    pub async fn remove_kill(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::RemoveKill).await
    }

    pub async fn add_to_cart(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::AddToCart).await
    }

    pub async fn sell(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::Sell).await
    }

    pub async fn reserve(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::Reserve).await
    }

    pub async fn list(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::List).await
    }

    pub async fn resell(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::Resell).await
    }

    pub async fn release(&self, id: SeatId) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::Release).await
    }

    pub async fn set_not_for_sale(&self, id: SeatId, flag: bool) -> InventoryResult<MutationOutcome> {
        self.perform(id, SeatAction::SetNotForSale(flag)).await
    }

    // === Bulk operations ===

    /// Apply each update independently. Missing seats, illegal transitions and
    /// persistent conflicts are reported per item; any other storage failure
    /// aborts the remainder.
    pub async fn batch_update_not_for_sale(
        &self,
        updates: &[NotForSaleUpdate],
    ) -> InventoryResult<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for update in updates {
            match self.set_not_for_sale(update.seat_id, update.not_for_sale).await {
                Ok(done) => outcome.updated.push(done.seat),
                Err(InventoryError::Storage(e)) if !matches!(e, StoreError::Conflict { .. }) => {
                    return Err(InventoryError::Storage(e))
                }
                Err(rejected) => outcome.rejected.push(BatchRejection {
                    seat_id: update.seat_id,
                    reason: rejected.to_string(),
                }),
            }
        }
        info!(
            updated = outcome.updated.len(),
            rejected = outcome.rejected.len(),
            "Batch not-for-sale update finished"
        );
        Ok(outcome)
    }

    pub async fn reset_all(&self) -> InventoryResult<ResetCounts> {
        let counts = self.store.reset_all().await?;
        warn!(
            seats = counts.seats,
            indirect_holds = counts.indirect_holds,
            indirect_kills = counts.indirect_kills,
            indirect_states = counts.indirect_states,
            "Reset every seat and dropped all indirect records"
        );
        Ok(counts)
    }

    /// Drop every indirect row and rebuild them from the seats' current
    /// direct state.
    pub async fn rederive_indirect(&self) -> InventoryResult<RederiveSummary> {
        let seats = self.store.all_seats().await?;
        let plans = derive_plans(&self.graph, &seats);

        let mut change = ChangeSet {
            deletes: vec![IndirectDelete::All],
            ..ChangeSet::default()
        };
        for plan in &plans {
            change.inserts.extend(plan.inserts.iter().cloned());
        }
        let records_written = change.inserts.len();
        self.store.commit(change).await?;

        info!(seats = seats.len(), records_written, "Rederived indirect records");
        Ok(RederiveSummary {
            seats_scanned: seats.len(),
            records_written,
        })
    }

    // === State categories ===

    pub async fn categories(&self) -> InventoryResult<Vec<StateCategory>> {
        Ok(self.store.categories().await?)
    }

    pub async fn create_category(
        &self,
        name: Option<&str>,
        display_order: Option<i32>,
    ) -> InventoryResult<StateCategory> {
        let name = match name.map(str::trim) {
            Some("") => return Err(InventoryError::InvalidInput("Category name cannot be empty".into())),
            Some(name) => name,
            None => DEFAULT_CATEGORY_NAME,
        };
        let category = self.store.create_category(name, display_order).await?;
        debug!(category_id = category.id, name = %category.name, "Created state category");
        Ok(category)
    }

    pub async fn rename_category(&self, id: i64, name: &str) -> InventoryResult<StateCategory> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InventoryError::InvalidInput("Category name cannot be empty".into()));
        }
        self.store
            .rename_category(id, name)
            .await?
            .ok_or_else(|| InventoryError::category_not_found(id))
    }

    pub async fn delete_category(&self, id: i64) -> InventoryResult<()> {
        if self.store.delete_category(id).await? {
            debug!(category_id = id, "Deleted state category");
            Ok(())
        } else {
            Err(InventoryError::category_not_found(id))
        }
    }

    /// Replace the member states of a category. Names must come from the
    /// fixed state vocabulary; duplicates collapse.
    pub async fn set_category_memberships<S: AsRef<str>>(
        &self,
        id: i64,
        state_names: &[S],
    ) -> InventoryResult<StateCategory> {
        let mut states: Vec<SeatState> = Vec::with_capacity(state_names.len());
        for name in state_names {
            let state: SeatState = name.as_ref().parse().map_err(InventoryError::InvalidInput)?;
            if !states.contains(&state) {
                states.push(state);
            }
        }

        if !self.store.set_memberships(id, &states).await? {
            return Err(InventoryError::category_not_found(id));
        }
        self.store
            .categories()
            .await?
            .into_iter()
            .find(|category| category.id == id)
            .ok_or_else(|| InventoryError::category_not_found(id))
    }

    /// Create the `All` category holding every state, unless categories
    /// already exist.
    pub async fn initialize_default_categories(&self) -> InventoryResult<Vec<StateCategory>> {
        let existing = self.store.categories().await?;
        if !existing.is_empty() {
            return Ok(existing);
        }
        let all = self.store.create_category(ALL_CATEGORY, Some(0)).await?;
        self.store.set_memberships(all.id, &SeatState::ALL).await?;
        info!(category_id = all.id, "Initialized default state category");
        Ok(self.store.categories().await?)
    }
}

/// Plans that reproduce every seat's direct effects on its twins, resolved
/// against an in-memory index of `seats`.
pub fn derive_plans(graph: &RelationshipGraph, seats: &[Seat]) -> Vec<PropagationPlan> {
    let index = SeatIndex::from_seats(seats);
    let mut related_cache: HashMap<&str, BTreeSet<String>> = HashMap::new();

    seats
        .iter()
        .filter_map(|seat| {
            let actions = direct_effects(seat);
            if actions.is_empty() {
                return None;
            }
            let related = related_cache
                .entry(seat.event_id.as_str())
                .or_insert_with(|| graph.related_events(&seat.event_id));
            let mut targets = index.matching(&seat.key(), related.iter());
            targets.retain(|target| *target != seat.id);
            Some(PropagationPlan::build(seat, &actions, &targets))
        })
        .filter(|plan| !plan.is_empty())
        .collect()
}

pub fn build_views(
    seats: Vec<Seat>,
    indirect: IndirectRecords,
    categories: &[StateCategory],
) -> Vec<SeatWithIndirect> {
    let mut holds: HashMap<SeatId, Vec<_>> = HashMap::new();
    for hold in indirect.holds {
        holds.entry(hold.seat_id).or_default().push(hold);
    }
    let mut kills: HashMap<SeatId, Vec<_>> = HashMap::new();
    for kill in indirect.kills {
        kills.entry(kill.seat_id).or_default().push(kill);
    }
    let mut states: HashMap<SeatId, Vec<_>> = HashMap::new();
    for state in indirect.states {
        states.entry(state.seat_id).or_default().push(state);
    }

    seats
        .into_iter()
        .map(|seat| {
            let indirect_states = states.remove(&seat.id).unwrap_or_default();
            let propagated: Vec<_> = indirect_states.iter().map(|s| s.state).collect();
            let effective = effective_state(&seat, &propagated);
            SeatWithIndirect {
                indirect_holds: holds.remove(&seat.id).unwrap_or_default(),
                indirect_kills: kills.remove(&seat.id).unwrap_or_default(),
                indirect_states,
                effective_state: effective,
                state_category: category_name(effective, categories),
                seat,
            }
        })
        .collect()
}
