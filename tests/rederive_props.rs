mod common;

use proptest::prelude::*;

use common::{key, venue};
use seat_inventory::inventory::state::SeatAction;
use seat_inventory::models::HoldName;

const LISTINGS: [&str; 6] = ["season", "packageA", "packageB", "event1", "event2", "event3"];

fn hold_name() -> impl Strategy<Value = HoldName> {
    prop::sample::select(HoldName::ALL.to_vec())
}

fn seat_action() -> impl Strategy<Value = SeatAction> {
    prop_oneof![
        hold_name().prop_map(SeatAction::ApplyHold),
        Just(SeatAction::RemoveHold),
        hold_name().prop_map(SeatAction::ApplyKill),
        Just(SeatAction::RemoveKill),
        Just(SeatAction::AddToCart),
        Just(SeatAction::Sell),
        Just(SeatAction::Reserve),
        Just(SeatAction::List),
        Just(SeatAction::Resell),
        Just(SeatAction::Release),
        any::<bool>().prop_map(SeatAction::SetNotForSale),
    ]
}

/// (listing, seat number, action) on a handful of seats so that twins collide.
fn step() -> impl Strategy<Value = (usize, i32, SeatAction)> {
    (0..LISTINGS.len(), 1..=2i32, seat_action())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn incremental_indirect_rows_match_rederivation(steps in prop::collection::vec(step(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (incremental, rederived) = runtime.block_on(async {
            let venue = venue().await;
            for (listing, number, action) in steps {
                let id = venue.id_at(LISTINGS[listing], &key("101", "A", number)).await;
                // Rejected transitions are part of the sequence; they must write nothing.
                let _ = venue.service.perform(id, action).await;
            }
            let incremental = venue.effects().await;
            venue.service.rederive_indirect().await.unwrap();
            (incremental, venue.effects().await)
        });

        prop_assert_eq!(incremental, rederived);
    }
}
