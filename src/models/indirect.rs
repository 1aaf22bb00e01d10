use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::seat::{HoldName, Seat, SeatId};

/// Sale state that travels to related listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagatedState {
    ReservedByToken,
    Booked,
}

impl PropagatedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropagatedState::ReservedByToken => "reserved_by_token",
            PropagatedState::Booked => "booked",
        }
    }
}

impl fmt::Display for PropagatedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropagatedState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved_by_token" => Ok(PropagatedState::ReservedByToken),
            "booked" => Ok(PropagatedState::Booked),
            other => Err(format!("unknown propagated state '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectHold {
    pub id: i64,
    pub seat_id: SeatId,
    pub hold_name: HoldName,
    pub source_event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectKill {
    pub id: i64,
    pub seat_id: SeatId,
    pub kill_name: HoldName,
    pub source_event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectState {
    pub id: i64,
    pub seat_id: SeatId,
    pub state: PropagatedState,
    pub source_event: String,
}

/// Value carried by an indirect record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Effect {
    Hold(HoldName),
    Kill(HoldName),
    State(PropagatedState),
}

impl Effect {
    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Hold(_) => EffectKind::Hold,
            Effect::Kill(_) => EffectKind::Kill,
            Effect::State(state) => EffectKind::State(*state),
        }
    }
}

/// Selector for indirect records of one kind. States are keyed by their value
/// as well, holds and kills only by (seat, source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Hold,
    Kill,
    State(PropagatedState),
}

/// Indirect record to be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NewIndirect {
    pub seat_id: SeatId,
    pub source_event: String,
    pub effect: Effect,
}

/// Indirect records to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndirectDelete {
    /// Every indirect hold, kill and state row.
    All,
    Matching {
        kind: EffectKind,
        seat_ids: Vec<SeatId>,
        source_event: String,
    },
}

impl IndirectDelete {
    pub fn matches(&self, seat_id: SeatId, source: &str, effect: &Effect) -> bool {
        match self {
            IndirectDelete::All => true,
            IndirectDelete::Matching { kind, seat_ids, source_event } => {
                *kind == effect.kind() && source_event == source && seat_ids.contains(&seat_id)
            }
        }
    }
}

/// All indirect rows attached to a set of seats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectRecords {
    pub holds: Vec<IndirectHold>,
    pub kills: Vec<IndirectKill>,
    pub states: Vec<IndirectState>,
}

impl IndirectRecords {
    pub fn is_empty(&self) -> bool {
        self.holds.is_empty() && self.kills.is_empty() && self.states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.holds.len() + self.kills.len() + self.states.len()
    }

    pub fn states_for(&self, seat_id: SeatId) -> Vec<PropagatedState> {
        self.states
            .iter()
            .filter(|s| s.seat_id == seat_id)
            .map(|s| s.state)
            .collect()
    }

    /// Flattened (seat, source, effect) triples, id-independent.
    pub fn effects(&self) -> Vec<NewIndirect> {
        let holds = self.holds.iter().map(|h| NewIndirect {
            seat_id: h.seat_id,
            source_event: h.source_event.clone(),
            effect: Effect::Hold(h.hold_name),
        });
        let kills = self.kills.iter().map(|k| NewIndirect {
            seat_id: k.seat_id,
            source_event: k.source_event.clone(),
            effect: Effect::Kill(k.kill_name),
        });
        let states = self.states.iter().map(|s| NewIndirect {
            seat_id: s.seat_id,
            source_event: s.source_event.clone(),
            effect: Effect::State(s.state),
        });
        let mut all: Vec<NewIndirect> = holds.chain(kills).chain(states).collect();
        all.sort();
        all
    }
}

/// Seat enriched with its indirect rows and computed display state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatWithIndirect {
    #[serde(flatten)]
    pub seat: Seat,
    pub indirect_holds: Vec<IndirectHold>,
    pub indirect_kills: Vec<IndirectKill>,
    pub indirect_states: Vec<IndirectState>,
    pub effective_state: crate::inventory::state::SeatState,
    /// Name of the first category listing the effective state.
    pub state_category: String,
}
