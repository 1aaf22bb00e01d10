use tracing::info;

use crate::models::{NewSeat, SeatingType, StructuralKey};
use crate::store::{InventoryStore, StoreResult};

pub const SECTIONS: [&str; 4] = ["101", "102", "103", "104"];
pub const ROWS: [&str; 5] = ["A", "B", "C", "D", "E"];
pub const SEATS_PER_ROW: i32 = 5;

/// Sections 101 and 102 are sold as "Top", the rest as "Bottom".
pub fn ticket_type(section: &str) -> &'static str {
    match section {
        "101" | "102" => "Top",
        _ => "Bottom",
    }
}

/// The venue layout repeated once per listing.
pub fn venue_layout(listings: &[String]) -> Vec<NewSeat> {
    let mut seats =
        Vec::with_capacity(listings.len() * SECTIONS.len() * ROWS.len() * SEATS_PER_ROW as usize);
    for event_id in listings {
        for section in SECTIONS {
            for row in ROWS {
                for seat in 1..=SEATS_PER_ROW {
                    seats.push(NewSeat {
                        event_id: event_id.clone(),
                        key: StructuralKey {
                            ticket_type: ticket_type(section).to_string(),
                            section: section.to_string(),
                            row: row.to_string(),
                            seat,
                        },
                        seating_type: SeatingType::Row,
                    });
                }
            }
        }
    }
    seats
}

/// Seed the venue when the store holds no seats yet. Returns the number of
/// rows inserted.
pub async fn seed_inventory(store: &dyn InventoryStore, listings: &[String]) -> StoreResult<u64> {
    let existing = store.seat_count().await?;
    if existing > 0 {
        info!(existing, "Inventory already seeded");
        return Ok(0);
    }
    let inserted = store.insert_seats(&venue_layout(listings)).await?;
    info!(inserted, listings = listings.len(), "Seeded seat inventory");
    Ok(inserted)
}
