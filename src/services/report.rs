//! Availability report: every seat of the related listings, grouped into
//! blocks of consecutive seats that read the same.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::InventoryResult;
use crate::inventory::state::SeatState;
use crate::models::{HoldName, SeatId, SeatWithIndirect};
use crate::services::inventory::InventoryService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    #[serde(rename = "For Sale")]
    ForSale,
    #[serde(rename = "Not For Sale")]
    NotForSale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSeat {
    pub seat_id: SeatId,
    pub seat: i32,
    pub state: SeatState,
    /// `"<hold> (<source listing>)"` per indirect hold.
    pub indirect_holds: Vec<String>,
    pub indirect_kills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatBlock {
    pub event_id: String,
    pub ticket_type: String,
    pub section: String,
    pub row: String,
    pub first_seat: i32,
    pub last_seat: i32,
    pub direct_hold: Option<HoldName>,
    pub direct_kill: Option<HoldName>,
    pub availability: Availability,
    pub state_category: String,
    pub seats: Vec<BlockSeat>,
}

impl SeatBlock {
    fn accepts(&self, view: &SeatWithIndirect) -> bool {
        let seat = &view.seat;
        self.event_id == seat.event_id
            && self.ticket_type == seat.ticket_type
            && self.section == seat.section
            && self.row == seat.row
            && self.direct_hold == seat.direct_hold_name
            && self.direct_kill == seat.kill_name
            && self.availability == availability(view)
            && self.state_category == view.state_category
            && self.last_seat + 1 == seat.seat
    }

    fn push(&mut self, view: SeatWithIndirect) {
        self.last_seat = view.seat.seat;
        self.seats.push(block_seat(view));
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub generated_at: DateTime<Utc>,
    pub total_seats: usize,
    pub blocks: Vec<SeatBlock>,
}

fn availability(view: &SeatWithIndirect) -> Availability {
    if view.seat.not_for_sale {
        Availability::NotForSale
    } else {
        Availability::ForSale
    }
}

fn block_seat(view: SeatWithIndirect) -> BlockSeat {
    BlockSeat {
        seat_id: view.seat.id,
        seat: view.seat.seat,
        state: view.effective_state,
        indirect_holds: view
            .indirect_holds
            .iter()
            .map(|h| format!("{} ({})", h.hold_name, h.source_event))
            .collect(),
        indirect_kills: view
            .indirect_kills
            .iter()
            .map(|k| format!("{} ({})", k.kill_name, k.source_event))
            .collect(),
    }
}

/// Sort by (listing, ticket type, section, row, seat) and merge runs of
/// consecutive seats with identical block attributes.
pub fn group_blocks(mut views: Vec<SeatWithIndirect>) -> Vec<SeatBlock> {
    views.sort_by(|a, b| {
        let key = |v: &SeatWithIndirect| {
            (
                v.seat.event_id.clone(),
                v.seat.ticket_type.clone(),
                v.seat.section.clone(),
                v.seat.row.clone(),
                v.seat.seat,
            )
        };
        key(a).cmp(&key(b))
    });

    let mut blocks: Vec<SeatBlock> = Vec::new();
    for view in views {
        if let Some(block) = blocks.last_mut().filter(|block| block.accepts(&view)) {
            block.push(view);
            continue;
        }
        blocks.push(SeatBlock {
            event_id: view.seat.event_id.clone(),
            ticket_type: view.seat.ticket_type.clone(),
            section: view.seat.section.clone(),
            row: view.seat.row.clone(),
            first_seat: view.seat.seat,
            last_seat: view.seat.seat,
            direct_hold: view.seat.direct_hold_name,
            direct_kill: view.seat.kill_name,
            availability: availability(&view),
            state_category: view.state_category.clone(),
            seats: vec![block_seat(view)],
        });
    }
    blocks
}

/// Report over every listing that takes part in the relationship graph.
pub async fn availability_report(service: &InventoryService) -> InventoryResult<AvailabilityReport> {
    let mut views = Vec::new();
    for listing in service.listings() {
        if service.graph().contains(listing) {
            views.extend(service.seats_with_indirect(listing).await?);
        }
    }
    let total_seats = views.len();
    Ok(AvailabilityReport {
        generated_at: Utc::now(),
        total_seats,
        blocks: group_blocks(views),
    })
}
