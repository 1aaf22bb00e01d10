//! Mirroring of direct seat changes onto structurally matching seats in
//! related listings.
//!
//! A plan is computed in one pass: the related listings come from the
//! [`RelationshipGraph`], which already encodes every listing that must see
//! the change, so newly written indirect rows are never propagated further.
//! Applying is delete-then-insert per (target seat, source listing), which
//! makes re-applying the same action idempotent.

use crate::inventory::hierarchy::RelationshipGraph;
use crate::inventory::index::find_matching_seats;
use crate::inventory::state::{propagated_state, SeatAction};
use crate::models::{
    Effect, EffectKind, HoldName, IndirectDelete, NewIndirect, PropagatedState, Seat, SeatId,
};
use crate::store::{ChangeSet, InventoryStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationAction {
    ApplyHold(HoldName),
    RemoveHold,
    ApplyKill(HoldName),
    RemoveKill,
    ApplyState(PropagatedState),
    RemoveState(PropagatedState),
}

impl PropagationAction {
    pub fn kind(&self) -> EffectKind {
        match self {
            PropagationAction::ApplyHold(_) | PropagationAction::RemoveHold => EffectKind::Hold,
            PropagationAction::ApplyKill(_) | PropagationAction::RemoveKill => EffectKind::Kill,
            PropagationAction::ApplyState(state) | PropagationAction::RemoveState(state) => {
                EffectKind::State(*state)
            }
        }
    }

    /// Value written on targets; `None` for removals.
    pub fn effect(&self) -> Option<Effect> {
        match self {
            PropagationAction::ApplyHold(name) => Some(Effect::Hold(*name)),
            PropagationAction::ApplyKill(name) => Some(Effect::Kill(*name)),
            PropagationAction::ApplyState(state) => Some(Effect::State(*state)),
            _ => None,
        }
    }
}

/// Indirect changes implied by `action` taking the seat from `before` to `after`.
pub fn actions_for(action: SeatAction, before: &Seat, after: &Seat) -> Vec<PropagationAction> {
    match action {
        SeatAction::ApplyHold(name) => vec![PropagationAction::ApplyHold(name)],
        SeatAction::RemoveHold => vec![PropagationAction::RemoveHold],
        SeatAction::ApplyKill(name) => vec![PropagationAction::ApplyKill(name)],
        SeatAction::RemoveKill => vec![PropagationAction::RemoveKill],
        SeatAction::AddToCart | SeatAction::Sell | SeatAction::Reserve | SeatAction::Release => {
            let previous = propagated_state(before);
            let next = propagated_state(after);
            let mut actions = Vec::with_capacity(2);
            if let Some(prev) = previous.filter(|prev| Some(*prev) != next) {
                actions.push(PropagationAction::RemoveState(prev));
            }
            if let Some(next) = next {
                actions.push(PropagationAction::ApplyState(next));
            }
            actions
        }
        SeatAction::List | SeatAction::Resell | SeatAction::SetNotForSale(_) => Vec::new(),
    }
}

/// Actions that reproduce a seat's current direct state on its twins.
pub fn direct_effects(seat: &Seat) -> Vec<PropagationAction> {
    let mut actions = Vec::new();
    if let Some(name) = seat.direct_hold_name {
        actions.push(PropagationAction::ApplyHold(name));
    }
    if let Some(name) = seat.kill_name {
        actions.push(PropagationAction::ApplyKill(name));
    }
    if let Some(state) = propagated_state(seat) {
        actions.push(PropagationAction::ApplyState(state));
    }
    actions
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationPlan {
    pub source_event: String,
    pub targets: Vec<SeatId>,
    pub deletes: Vec<IndirectDelete>,
    pub inserts: Vec<NewIndirect>,
}

impl PropagationPlan {
    pub fn build(origin: &Seat, actions: &[PropagationAction], targets: &[SeatId]) -> Self {
        let mut plan = PropagationPlan {
            source_event: origin.event_id.clone(),
            targets: targets.to_vec(),
            ..PropagationPlan::default()
        };
        if targets.is_empty() {
            return plan;
        }
        for action in actions {
            plan.deletes.push(IndirectDelete::Matching {
                kind: action.kind(),
                seat_ids: targets.to_vec(),
                source_event: origin.event_id.clone(),
            });
            if let Some(effect) = action.effect() {
                plan.inserts.extend(targets.iter().map(|&seat_id| NewIndirect {
                    seat_id,
                    source_event: origin.event_id.clone(),
                    effect,
                }));
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.inserts.is_empty()
    }
}

/// Resolve the twins of `origin` in its related listings and build the plan.
pub async fn plan(
    store: &dyn InventoryStore,
    graph: &RelationshipGraph,
    origin: &Seat,
    actions: &[PropagationAction],
) -> StoreResult<PropagationPlan> {
    if actions.is_empty() {
        return Ok(PropagationPlan::build(origin, actions, &[]));
    }
    let related = graph.related_events(&origin.event_id);
    let matches = find_matching_seats(store, origin, &related).await?;
    let targets: Vec<SeatId> = matches.iter().map(|seat| seat.id).collect();
    Ok(PropagationPlan::build(origin, actions, &targets))
}

/// Compute and commit the indirect changes of a single action. The origin's
/// own direct fields are the caller's business.
pub async fn propagate(
    store: &dyn InventoryStore,
    graph: &RelationshipGraph,
    origin: &Seat,
    action: PropagationAction,
) -> StoreResult<PropagationPlan> {
    let plan = plan(store, graph, origin, &[action]).await?;
    if !plan.is_empty() {
        store.commit(ChangeSet::default().with_plan(&plan)).await?;
    }
    tracing::debug!(
        source_event = %plan.source_event,
        targets = plan.targets.len(),
        ?action,
        "propagated"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SeatStatus, SeatingType};

    fn seat(status: SeatStatus) -> Seat {
        Seat {
            id: 7,
            event_id: "packageA".into(),
            ticket_type: "Top".into(),
            section: "101".into(),
            row: "A".into(),
            seat: 1,
            seating_type: SeatingType::Row,
            direct_hold_name: None,
            kill_name: None,
            not_for_sale: false,
            status,
            is_resale: false,
            is_reservation: false,
        }
    }

    #[test]
    fn apply_hold_replaces_per_target() {
        let origin = seat(SeatStatus::Free);
        let plan = PropagationPlan::build(
            &origin,
            &[PropagationAction::ApplyHold(HoldName::Blue)],
            &[11, 12],
        );
        assert_eq!(
            plan.deletes,
            vec![IndirectDelete::Matching {
                kind: EffectKind::Hold,
                seat_ids: vec![11, 12],
                source_event: "packageA".into(),
            }]
        );
        assert_eq!(plan.inserts.len(), 2);
        assert!(plan
            .inserts
            .iter()
            .all(|i| i.effect == Effect::Hold(HoldName::Blue) && i.source_event == "packageA"));
    }

    #[test]
    fn removal_only_deletes() {
        let origin = seat(SeatStatus::Free);
        let plan = PropagationPlan::build(&origin, &[PropagationAction::RemoveHold], &[11]);
        assert_eq!(plan.deletes.len(), 1);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn no_targets_means_empty_plan() {
        let origin = seat(SeatStatus::Free);
        let plan =
            PropagationPlan::build(&origin, &[PropagationAction::ApplyHold(HoldName::Red)], &[]);
        assert!(plan.is_empty());
    }

    #[test]
    fn sale_actions_swap_stale_state() {
        let reserved = Seat { is_reservation: true, ..seat(SeatStatus::Booked) };
        let in_cart = seat(SeatStatus::ReservedByToken);
        assert_eq!(
            actions_for(SeatAction::AddToCart, &reserved, &in_cart),
            vec![
                PropagationAction::RemoveState(PropagatedState::Booked),
                PropagationAction::ApplyState(PropagatedState::ReservedByToken),
            ]
        );
        assert_eq!(
            actions_for(SeatAction::Sell, &reserved, &seat(SeatStatus::Booked)),
            vec![PropagationAction::ApplyState(PropagatedState::Booked)]
        );
        assert_eq!(
            actions_for(SeatAction::Release, &in_cart, &seat(SeatStatus::Free)),
            vec![PropagationAction::RemoveState(PropagatedState::ReservedByToken)]
        );
    }

    #[test]
    fn list_and_resell_never_propagate() {
        let sold = seat(SeatStatus::Booked);
        let listed = Seat { is_resale: true, ..seat(SeatStatus::Resale) };
        assert!(actions_for(SeatAction::List, &sold, &listed).is_empty());
        assert!(actions_for(SeatAction::Resell, &listed, &sold).is_empty());
        assert!(actions_for(SeatAction::SetNotForSale(true), &sold, &sold).is_empty());
    }

    #[test]
    fn direct_effects_cover_hold_kill_and_state() {
        let origin = Seat {
            direct_hold_name: Some(HoldName::Green),
            kill_name: Some(HoldName::Orange),
            ..seat(SeatStatus::Resale)
        };
        assert_eq!(
            direct_effects(&origin),
            vec![
                PropagationAction::ApplyHold(HoldName::Green),
                PropagationAction::ApplyKill(HoldName::Orange),
                PropagationAction::ApplyState(PropagatedState::Booked),
            ]
        );
        assert!(direct_effects(&seat(SeatStatus::Free)).is_empty());
    }
}
