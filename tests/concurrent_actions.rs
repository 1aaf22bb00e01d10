mod common;

use async_trait::async_trait;
use std::sync::Arc;

use common::key;
use seat_inventory::config::HierarchyConfig;
use seat_inventory::error::InventoryError;
use seat_inventory::inventory::state::SeatState;
use seat_inventory::models::{
    HoldName, IndirectRecords, NewSeat, PropagatedState, Seat, SeatId, SeatStatus, StateCategory,
    StructuralKey,
};
use seat_inventory::services::seed::seed_inventory;
use seat_inventory::services::InventoryService;
use seat_inventory::store::{ChangeSet, InventoryStore, MemoryStore, ResetCounts, StoreResult};

/// Memory store that yields to the scheduler before every read, so two
/// actions joined on one task interleave between validation and commit.
struct InterleavingStore {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl InventoryStore for InterleavingStore {
    async fn seats_by_event(&self, event_id: &str) -> StoreResult<Vec<Seat>> {
        tokio::task::yield_now().await;
        self.inner.seats_by_event(event_id).await
    }

    async fn seat_by_id(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        tokio::task::yield_now().await;
        self.inner.seat_by_id(id).await
    }

    async fn all_seats(&self) -> StoreResult<Vec<Seat>> {
        self.inner.all_seats().await
    }

    async fn seats_with_key(
        &self,
        event_ids: &[String],
        key: &StructuralKey,
    ) -> StoreResult<Vec<Seat>> {
        tokio::task::yield_now().await;
        self.inner.seats_with_key(event_ids, key).await
    }

    async fn seat_count(&self) -> StoreResult<u64> {
        self.inner.seat_count().await
    }

    async fn insert_seats(&self, seats: &[NewSeat]) -> StoreResult<u64> {
        self.inner.insert_seats(seats).await
    }

    async fn indirect_for(&self, seat_ids: &[SeatId]) -> StoreResult<IndirectRecords> {
        tokio::task::yield_now().await;
        self.inner.indirect_for(seat_ids).await
    }

    async fn all_indirect(&self) -> StoreResult<IndirectRecords> {
        self.inner.all_indirect().await
    }

    async fn commit(&self, change: ChangeSet) -> StoreResult<Option<Seat>> {
        tokio::task::yield_now().await;
        self.inner.commit(change).await
    }

    async fn reset_all(&self) -> StoreResult<ResetCounts> {
        self.inner.reset_all().await
    }

    async fn categories(&self) -> StoreResult<Vec<StateCategory>> {
        self.inner.categories().await
    }

    async fn create_category(
        &self,
        name: &str,
        display_order: Option<i32>,
    ) -> StoreResult<StateCategory> {
        self.inner.create_category(name, display_order).await
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<StateCategory>> {
        self.inner.rename_category(id, name).await
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        self.inner.delete_category(id).await
    }

    async fn set_memberships(&self, id: i64, states: &[SeatState]) -> StoreResult<bool> {
        self.inner.set_memberships(id, states).await
    }
}

async fn interleaving_venue() -> (Arc<MemoryStore>, InventoryService) {
    let hierarchy = HierarchyConfig::default();
    let inner = Arc::new(MemoryStore::new());
    seed_inventory(inner.as_ref(), &hierarchy.listings)
        .await
        .expect("seed");
    let store = Arc::new(InterleavingStore { inner: inner.clone() });
    let service = InventoryService::new(store, hierarchy.graph(false), hierarchy.listings.clone());
    (inner, service)
}

async fn seat_id(store: &MemoryStore, event_id: &str) -> SeatId {
    store
        .seats_with_key(&[event_id.to_string()], &key("101", "A", 1))
        .await
        .expect("lookup")[0]
        .id
}

fn rejected(result: &Result<impl std::fmt::Debug, InventoryError>) -> bool {
    matches!(result, Err(InventoryError::IllegalTransition(_)))
}

async fn assert_consistent(store: &MemoryStore, service: &InventoryService) {
    let incremental = store.all_indirect().await.expect("indirect").effects();
    service.rederive_indirect().await.expect("rederive");
    let rederived = store.all_indirect().await.expect("indirect").effects();
    assert_eq!(incremental, rederived);
}

#[tokio::test]
async fn cart_and_sale_on_one_seat_admit_exactly_one() {
    let (store, service) = interleaving_venue().await;
    let id = seat_id(&store, "event1").await;
    let twin = seat_id(&store, "packageA").await;

    let (cart, sale) = tokio::join!(service.add_to_cart(id), service.sell(id));

    assert!(
        cart.is_ok() != sale.is_ok(),
        "cart ok={} sale ok={}",
        cart.is_ok(),
        sale.is_ok()
    );
    assert!(rejected(&cart) || rejected(&sale));

    let seat = store.seat_by_id(id).await.unwrap().unwrap();
    let twin_states = store.indirect_for(&[twin]).await.unwrap().states_for(twin);
    if cart.is_ok() {
        assert_eq!(seat.status, SeatStatus::ReservedByToken);
        assert_eq!(twin_states, vec![PropagatedState::ReservedByToken]);
    } else {
        assert_eq!(seat.status, SeatStatus::Booked);
        assert_eq!(twin_states, vec![PropagatedState::Booked]);
    }
    assert_consistent(&store, &service).await;
}

#[tokio::test]
async fn sales_on_structural_twins_admit_exactly_one() {
    let (store, service) = interleaving_venue().await;
    let event_seat = seat_id(&store, "event1").await;
    let package_seat = seat_id(&store, "packageA").await;

    let (cart, sale) = tokio::join!(service.add_to_cart(event_seat), service.sell(package_seat));

    assert!(cart.is_ok() != sale.is_ok());
    assert!(rejected(&cart) || rejected(&sale));

    let seats = [
        store.seat_by_id(event_seat).await.unwrap().unwrap(),
        store.seat_by_id(package_seat).await.unwrap().unwrap(),
    ];
    let committed = seats.iter().filter(|s| s.status != SeatStatus::Free).count();
    assert_eq!(committed, 1);
    assert_consistent(&store, &service).await;
}

#[tokio::test]
async fn concurrent_holds_leave_the_last_one_everywhere() {
    let (store, service) = interleaving_venue().await;
    let id = seat_id(&store, "packageA").await;

    let (blue, red) = tokio::join!(
        service.apply_hold(id, HoldName::Blue),
        service.apply_hold(id, HoldName::Red),
    );
    assert!(blue.is_ok() && red.is_ok());

    let seat = store.seat_by_id(id).await.unwrap().unwrap();
    let holds = store.all_indirect().await.unwrap().holds;
    assert_eq!(holds.len(), 4);
    assert!(holds.iter().all(|h| Some(h.hold_name) == seat.direct_hold_name));
    assert_consistent(&store, &service).await;
}
