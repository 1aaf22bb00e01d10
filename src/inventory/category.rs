use crate::inventory::state::SeatState;
use crate::models::StateCategory;

pub const UNCATEGORIZED: &str = "Uncategorized";
pub const ALL_CATEGORY: &str = "All";

/// First category, by display order, that lists `state`.
///
/// Categories sharing a display order are tried in id order.
pub fn resolve_category(state: SeatState, categories: &[StateCategory]) -> Option<&StateCategory> {
    categories
        .iter()
        .filter(|category| category.contains(state))
        .min_by_key(|category| (category.display_order, category.id))
}

pub fn category_name(state: SeatState, categories: &[StateCategory]) -> String {
    resolve_category(state, categories)
        .map(|category| category.name.clone())
        .unwrap_or_else(|| UNCATEGORIZED.to_string())
}
