#![allow(dead_code)]

use std::sync::Arc;

use seat_inventory::config::HierarchyConfig;
use seat_inventory::models::{IndirectRecords, NewIndirect, Seat, SeatId, StructuralKey};
use seat_inventory::services::seed::seed_inventory;
use seat_inventory::services::InventoryService;
use seat_inventory::store::{InventoryStore, MemoryStore};

pub struct Venue {
    pub store: Arc<MemoryStore>,
    pub service: InventoryService,
}

/// Default venue (season, packageA/B, event1-3) seeded into a fresh store.
pub async fn venue() -> Venue {
    venue_with_siblings(false).await
}

pub async fn venue_with_siblings(include_sibling_events: bool) -> Venue {
    let hierarchy = HierarchyConfig::default();
    let store = Arc::new(MemoryStore::new());
    seed_inventory(store.as_ref(), &hierarchy.listings)
        .await
        .expect("seed");
    let service = InventoryService::new(
        store.clone(),
        hierarchy.graph(include_sibling_events),
        hierarchy.listings.clone(),
    );
    Venue { store, service }
}

pub fn key(section: &str, row: &str, seat: i32) -> StructuralKey {
    let ticket_type = if section == "101" || section == "102" { "Top" } else { "Bottom" };
    StructuralKey {
        ticket_type: ticket_type.into(),
        section: section.into(),
        row: row.into(),
        seat,
    }
}

impl Venue {
    pub async fn seat_at(&self, event_id: &str, key: &StructuralKey) -> Seat {
        self.store
            .seats_with_key(&[event_id.to_string()], key)
            .await
            .expect("lookup")
            .pop()
            .expect("seat exists")
    }

    pub async fn id_at(&self, event_id: &str, key: &StructuralKey) -> SeatId {
        self.seat_at(event_id, key).await.id
    }

    pub async fn indirect(&self) -> IndirectRecords {
        self.store.all_indirect().await.expect("indirect")
    }

    pub async fn effects(&self) -> Vec<NewIndirect> {
        self.indirect().await.effects()
    }

    pub async fn seats(&self) -> Vec<Seat> {
        self.store.all_seats().await.expect("seats")
    }
}
