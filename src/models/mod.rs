pub mod category;
pub mod indirect;
pub mod seat;

pub use category::StateCategory;
pub use indirect::{
    Effect, EffectKind, IndirectDelete, IndirectHold, IndirectKill, IndirectRecords, IndirectState,
    NewIndirect, PropagatedState, SeatWithIndirect,
};
pub use seat::{HoldName, NewSeat, Seat, SeatId, SeatPatch, SeatStatus, SeatingType, StructuralKey};
