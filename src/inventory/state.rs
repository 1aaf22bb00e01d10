//! Seat display states and the rules for moving between them.
//!
//! A seat's state is never stored as one column: it is computed from the
//! direct status flags, the legacy kill name, and any indirect state rows.
//! Every caller that needs a display state goes through [`effective_state`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{HoldName, PropagatedState, Seat, SeatPatch, SeatStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeatState {
    Open,
    #[serde(rename = "In Cart")]
    InCart,
    Sold,
    Reserved,
    Resold,
    Killed,
    #[serde(rename = "Resale Listed")]
    ResaleListed,
}

impl SeatState {
    pub const ALL: [SeatState; 7] = [
        SeatState::Open,
        SeatState::InCart,
        SeatState::Sold,
        SeatState::Reserved,
        SeatState::Resold,
        SeatState::Killed,
        SeatState::ResaleListed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatState::Open => "Open",
            SeatState::InCart => "In Cart",
            SeatState::Sold => "Sold",
            SeatState::Reserved => "Reserved",
            SeatState::Resold => "Resold",
            SeatState::Killed => "Killed",
            SeatState::ResaleListed => "Resale Listed",
        }
    }

    /// States from which add-to-cart, sell and reserve are refused.
    pub fn blocks_sale(&self) -> bool {
        matches!(
            self,
            SeatState::Sold
                | SeatState::InCart
                | SeatState::Resold
                | SeatState::Killed
                | SeatState::ResaleListed
        )
    }

    /// States already committed to a sale; such seats cannot be pulled from sale.
    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            SeatState::Sold
                | SeatState::Resold
                | SeatState::Reserved
                | SeatState::InCart
                | SeatState::ResaleListed
        )
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeatState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown seat state '{s}'"))
    }
}

/// Display state of a seat given the indirect states attached to it.
///
/// Indirect states only show through when the direct status is `free`; a
/// seat's own booking, cart or resale always wins.
pub fn effective_state(seat: &Seat, indirect: &[PropagatedState]) -> SeatState {
    if seat.kill_name.is_some() {
        return SeatState::Killed;
    }
    match seat.status {
        SeatStatus::Resale => SeatState::ResaleListed,
        SeatStatus::ReservedByToken => SeatState::InCart,
        SeatStatus::Booked if seat.is_reservation => SeatState::Reserved,
        SeatStatus::Booked if seat.is_resale => SeatState::Resold,
        SeatStatus::Booked => SeatState::Sold,
        SeatStatus::Free => {
            if indirect.contains(&PropagatedState::Booked) {
                SeatState::Sold
            } else if indirect.contains(&PropagatedState::ReservedByToken) {
                SeatState::InCart
            } else {
                SeatState::Open
            }
        }
    }
}

/// Sale state this seat pushes onto its structural twins in related listings.
///
/// Listing and reselling keep the original booking in place, so `resale`
/// mirrors as `booked` just like the sale that preceded it.
pub fn propagated_state(seat: &Seat) -> Option<PropagatedState> {
    match seat.status {
        SeatStatus::Free => None,
        SeatStatus::ReservedByToken => Some(PropagatedState::ReservedByToken),
        SeatStatus::Booked | SeatStatus::Resale => Some(PropagatedState::Booked),
    }
}

/// A direct action requested on one seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatAction {
    ApplyHold(HoldName),
    RemoveHold,
    ApplyKill(HoldName),
    RemoveKill,
    AddToCart,
    Sell,
    Reserve,
    List,
    Resell,
    Release,
    SetNotForSale(bool),
}

impl SeatAction {
    pub fn name(&self) -> &'static str {
        match self {
            SeatAction::ApplyHold(_) => "apply_hold",
            SeatAction::RemoveHold => "remove_hold",
            SeatAction::ApplyKill(_) => "apply_kill",
            SeatAction::RemoveKill => "remove_kill",
            SeatAction::AddToCart => "add_to_cart",
            SeatAction::Sell => "sell",
            SeatAction::Reserve => "reserve",
            SeatAction::List => "list",
            SeatAction::Resell => "resell",
            SeatAction::Release => "release",
            SeatAction::SetNotForSale(_) => "set_not_for_sale",
        }
    }

    /// List, resell and the not-for-sale flag stay local to the seat.
    pub fn propagates(&self) -> bool {
        !matches!(
            self,
            SeatAction::List | SeatAction::Resell | SeatAction::SetNotForSale(_)
        )
    }
}

impl fmt::Display for SeatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            SeatAction::ApplyHold(_) => "hold",
            SeatAction::RemoveHold => "release hold on",
            SeatAction::ApplyKill(_) => "kill",
            SeatAction::RemoveKill => "release kill on",
            SeatAction::AddToCart => "add to cart",
            SeatAction::Sell => "sell",
            SeatAction::Reserve => "reserve",
            SeatAction::List => "list",
            SeatAction::Resell => "resell",
            SeatAction::Release => "release",
            SeatAction::SetNotForSale(_) => "mark",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Cannot {action} seat when it is marked as \"Not For Sale\"")]
    NotForSale { action: SeatAction },
    #[error("Cannot {action} seat while it is {state}")]
    Restricted { action: SeatAction, state: SeatState },
    #[error("Can only list seats that are in Sold state")]
    NotSold,
    #[error("Can only resell seats that are in Resale Listed state")]
    NotListed,
    #[error("Can only release seats that are In Cart")]
    NotInCart,
    #[error("Cannot mark seat as \"Not For Sale\" when it is {state}")]
    CommittedToSale { state: SeatState },
}

/// Validate `action` against the seat's current state and return the direct
/// field changes it implies. Nothing is written here.
pub fn transition(
    seat: &Seat,
    state: SeatState,
    action: SeatAction,
) -> Result<SeatPatch, TransitionError> {
    let patch = match action {
        SeatAction::ApplyHold(name) => SeatPatch {
            direct_hold_name: Some(Some(name)),
            ..SeatPatch::default()
        },
        SeatAction::RemoveHold => SeatPatch {
            direct_hold_name: Some(None),
            ..SeatPatch::default()
        },
        SeatAction::ApplyKill(name) => SeatPatch {
            kill_name: Some(Some(name)),
            ..SeatPatch::default()
        },
        SeatAction::RemoveKill => SeatPatch {
            kill_name: Some(None),
            ..SeatPatch::default()
        },
        SeatAction::AddToCart | SeatAction::Sell | SeatAction::Reserve => {
            if seat.not_for_sale {
                return Err(TransitionError::NotForSale { action });
            }
            if state.blocks_sale() {
                return Err(TransitionError::Restricted { action, state });
            }
            let (status, is_reservation) = match action {
                SeatAction::AddToCart => (SeatStatus::ReservedByToken, false),
                SeatAction::Reserve => (SeatStatus::Booked, true),
                _ => (SeatStatus::Booked, false),
            };
            SeatPatch {
                status: Some(status),
                is_resale: Some(false),
                is_reservation: Some(is_reservation),
                ..SeatPatch::default()
            }
        }
        SeatAction::List => {
            if seat.not_for_sale {
                return Err(TransitionError::NotForSale { action });
            }
            if seat.status != SeatStatus::Booked || seat.is_resale || seat.is_reservation {
                return Err(TransitionError::NotSold);
            }
            SeatPatch {
                status: Some(SeatStatus::Resale),
                is_resale: Some(true),
                ..SeatPatch::default()
            }
        }
        SeatAction::Resell => {
            if seat.not_for_sale {
                return Err(TransitionError::NotForSale { action });
            }
            if seat.status != SeatStatus::Resale {
                return Err(TransitionError::NotListed);
            }
            SeatPatch {
                status: Some(SeatStatus::Booked),
                is_resale: Some(true),
                ..SeatPatch::default()
            }
        }
        SeatAction::Release => {
            if seat.status != SeatStatus::ReservedByToken {
                return Err(TransitionError::NotInCart);
            }
            SeatPatch {
                status: Some(SeatStatus::Free),
                ..SeatPatch::default()
            }
        }
        SeatAction::SetNotForSale(flag) => {
            if flag && state.is_committed() {
                return Err(TransitionError::CommittedToSale { state });
            }
            SeatPatch {
                not_for_sale: Some(flag),
                ..SeatPatch::default()
            }
        }
    };
    Ok(patch)
}
