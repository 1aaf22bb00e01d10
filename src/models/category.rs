use serde::{Deserialize, Serialize};

use crate::inventory::state::SeatState;

/// User-defined grouping of display states, ordered by `display_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCategory {
    pub id: i64,
    pub name: String,
    pub display_order: i32,
    pub states: Vec<SeatState>,
}

impl StateCategory {
    pub fn contains(&self, state: SeatState) -> bool {
        self.states.contains(&state)
    }
}

pub const DEFAULT_CATEGORY_NAME: &str = "new state category";
