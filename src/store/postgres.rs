use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::{ChangeSet, InventoryStore, ResetCounts, SeatSnapshot, StoreError, StoreResult};
use crate::inventory::state::SeatState;
use crate::models::{
    Effect, EffectKind, IndirectDelete, IndirectHold, IndirectKill, IndirectRecords,
    IndirectState, NewIndirect, NewSeat, Seat, SeatId, SeatPatch, StateCategory, StructuralKey,
};

const SEAT_COLUMNS: &str = "id, event_id, ticket_type, section, row_label, seat_number, \
     seating_type, direct_hold_name, kill_name, not_for_sale, status, is_resale, is_reservation";

const INSERT_BATCH: usize = 500;

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: i64,
    event_id: String,
    ticket_type: String,
    section: String,
    row_label: String,
    seat_number: i32,
    seating_type: String,
    direct_hold_name: Option<String>,
    kill_name: Option<String>,
    not_for_sale: bool,
    status: String,
    is_resale: bool,
    is_reservation: bool,
}

fn parse<T: FromStr<Err = String>>(table: &'static str, id: i64, value: &str) -> StoreResult<T> {
    value
        .parse()
        .map_err(|reason| StoreError::Corrupt { table, id, reason })
}

impl TryFrom<SeatRow> for Seat {
    type Error = StoreError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let id = row.id;
        Ok(Seat {
            id,
            event_id: row.event_id,
            ticket_type: row.ticket_type,
            section: row.section,
            row: row.row_label,
            seat: row.seat_number,
            seating_type: parse("seats", id, &row.seating_type)?,
            direct_hold_name: row
                .direct_hold_name
                .as_deref()
                .map(|name| parse("seats", id, name))
                .transpose()?,
            kill_name: row
                .kill_name
                .as_deref()
                .map(|name| parse("seats", id, name))
                .transpose()?,
            not_for_sale: row.not_for_sale,
            status: parse("seats", id, &row.status)?,
            is_resale: row.is_resale,
            is_reservation: row.is_reservation,
        })
    }
}

fn into_seats(rows: Vec<SeatRow>) -> StoreResult<Vec<Seat>> {
    rows.into_iter().map(Seat::try_from).collect()
}

#[derive(sqlx::FromRow)]
struct IndirectRow {
    id: i64,
    seat_id: i64,
    value: String,
    source_event: String,
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    display_order: i32,
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: i64,
    category_id: i64,
    state_name: String,
}

/// Postgres-backed store. Every [`ChangeSet`] runs in one transaction.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_indirect(&self, seat_ids: Option<&[SeatId]>) -> StoreResult<IndirectRecords> {
        let filter = if seat_ids.is_some() { " WHERE seat_id = ANY($1)" } else { "" };
        let ids: Vec<SeatId> = seat_ids.map(<[SeatId]>::to_vec).unwrap_or_default();

        let fetch = |table: &'static str, column: &'static str| {
            let sql = format!(
                "SELECT id, seat_id, {column} AS value, source_event FROM {table}{filter} ORDER BY id"
            );
            let ids = ids.clone();
            let pool = self.pool.clone();
            async move {
                let mut query = sqlx::query_as::<_, IndirectRow>(&sql);
                if !filter.is_empty() {
                    query = query.bind(ids);
                }
                query.fetch_all(&pool).await
            }
        };

        let (holds, kills, states) = futures::try_join!(
            fetch("indirect_holds", "hold_name"),
            fetch("indirect_kills", "kill_name"),
            fetch("indirect_states", "state"),
        )?;

        let mut records = IndirectRecords::default();
        for row in holds {
            records.holds.push(IndirectHold {
                id: row.id,
                seat_id: row.seat_id,
                hold_name: parse("indirect_holds", row.id, &row.value)?,
                source_event: row.source_event,
            });
        }
        for row in kills {
            records.kills.push(IndirectKill {
                id: row.id,
                seat_id: row.seat_id,
                kill_name: parse("indirect_kills", row.id, &row.value)?,
                source_event: row.source_event,
            });
        }
        for row in states {
            records.states.push(IndirectState {
                id: row.id,
                seat_id: row.seat_id,
                state: parse("indirect_states", row.id, &row.value)?,
                source_event: row.source_event,
            });
        }
        Ok(records)
    }

    async fn category_states(&self, category_id: Option<i64>) -> StoreResult<BTreeMap<i64, Vec<SeatState>>> {
        let rows = match category_id {
            Some(id) => {
                sqlx::query_as::<_, MembershipRow>(
                    "SELECT id, category_id, state_name FROM state_category_memberships \
                     WHERE category_id = $1 ORDER BY id",
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MembershipRow>(
                    "SELECT id, category_id, state_name FROM state_category_memberships ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut states: BTreeMap<i64, Vec<SeatState>> = BTreeMap::new();
        for row in rows {
            let state = parse("state_category_memberships", row.id, &row.state_name)?;
            states.entry(row.category_id).or_default().push(state);
        }
        Ok(states)
    }
}

/// Row-lock every seat the change writes to, in id order. Indirect rows of a
/// seat are only written while holding that seat's lock, so a snapshot read
/// after this point cannot change before commit.
async fn lock_seats(tx: &mut Transaction<'_, Postgres>, change: &ChangeSet) -> StoreResult<()> {
    if change.clears_everything() {
        sqlx::query("SELECT id FROM seats ORDER BY id FOR UPDATE")
            .execute(&mut **tx)
            .await?;
        return Ok(());
    }
    let mut ids: Vec<SeatId> = change.touched_seats().into_iter().collect();
    if let Some(expected) = &change.expected {
        ids.push(expected.seat.id);
        ids.sort_unstable();
        ids.dedup();
    }
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("SELECT id FROM seats WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// The stored counterpart of `expected`, or `None` when the seat is gone.
async fn stored_snapshot(
    tx: &mut Transaction<'_, Postgres>,
    expected: &SeatSnapshot,
) -> StoreResult<Option<SeatSnapshot>> {
    let id = expected.seat.id;
    let row = sqlx::query_as::<_, SeatRow>(&format!(
        "SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let values: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, state FROM indirect_states WHERE seat_id = $1")
            .bind(id)
            .fetch_all(&mut **tx)
            .await?;
    let states = values
        .iter()
        .map(|(row_id, value)| parse("indirect_states", *row_id, value))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Some(SeatSnapshot::new(Seat::try_from(row)?, states)))
}

async fn update_seat(
    tx: &mut Transaction<'_, Postgres>,
    id: SeatId,
    patch: &SeatPatch,
) -> StoreResult<Option<Seat>> {
    if patch.is_empty() {
        let row = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        return row.map(Seat::try_from).transpose();
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE seats SET ");
    let mut sets = qb.separated(", ");
    if let Some(hold) = patch.direct_hold_name {
        sets.push("direct_hold_name = ").push_bind_unseparated(hold.map(|h| h.as_str()));
    }
    if let Some(kill) = patch.kill_name {
        sets.push("kill_name = ").push_bind_unseparated(kill.map(|k| k.as_str()));
    }
    if let Some(nfs) = patch.not_for_sale {
        sets.push("not_for_sale = ").push_bind_unseparated(nfs);
    }
    if let Some(status) = patch.status {
        sets.push("status = ").push_bind_unseparated(status.as_str());
    }
    if let Some(resale) = patch.is_resale {
        sets.push("is_resale = ").push_bind_unseparated(resale);
    }
    if let Some(reservation) = patch.is_reservation {
        sets.push("is_reservation = ").push_bind_unseparated(reservation);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(" RETURNING ").push(SEAT_COLUMNS);

    let row = qb
        .build_query_as::<SeatRow>()
        .fetch_optional(&mut **tx)
        .await?;
    row.map(Seat::try_from).transpose()
}

async fn delete_indirect(
    tx: &mut Transaction<'_, Postgres>,
    delete: &IndirectDelete,
) -> StoreResult<()> {
    match delete {
        IndirectDelete::All => {
            for table in ["indirect_holds", "indirect_kills", "indirect_states"] {
                sqlx::query(&format!("DELETE FROM {table}"))
                    .execute(&mut **tx)
                    .await?;
            }
        }
        IndirectDelete::Matching { kind, seat_ids, source_event } => {
            let query = match kind {
                EffectKind::Hold => sqlx::query(
                    "DELETE FROM indirect_holds WHERE seat_id = ANY($1) AND source_event = $2",
                ),
                EffectKind::Kill => sqlx::query(
                    "DELETE FROM indirect_kills WHERE seat_id = ANY($1) AND source_event = $2",
                ),
                EffectKind::State(_) => sqlx::query(
                    "DELETE FROM indirect_states \
                     WHERE seat_id = ANY($1) AND source_event = $2 AND state = $3",
                ),
            };
            let mut query = query.bind(seat_ids.clone()).bind(source_event.clone());
            if let EffectKind::State(state) = kind {
                query = query.bind(state.as_str());
            }
            query.execute(&mut **tx).await?;
        }
    }
    Ok(())
}

async fn insert_indirect(
    tx: &mut Transaction<'_, Postgres>,
    inserts: &[NewIndirect],
) -> StoreResult<()> {
    let mut holds = Vec::new();
    let mut kills = Vec::new();
    let mut states = Vec::new();
    for insert in inserts {
        match insert.effect {
            Effect::Hold(name) => holds.push((insert.seat_id, name.as_str(), &insert.source_event)),
            Effect::Kill(name) => kills.push((insert.seat_id, name.as_str(), &insert.source_event)),
            Effect::State(state) => {
                states.push((insert.seat_id, state.as_str(), &insert.source_event))
            }
        }
    }

    let batches = [
        (
            "INSERT INTO indirect_holds (seat_id, hold_name, source_event) ",
            " ON CONFLICT (seat_id, source_event) DO UPDATE SET hold_name = EXCLUDED.hold_name",
            holds,
        ),
        (
            "INSERT INTO indirect_kills (seat_id, kill_name, source_event) ",
            " ON CONFLICT (seat_id, source_event) DO UPDATE SET kill_name = EXCLUDED.kill_name",
            kills,
        ),
        (
            "INSERT INTO indirect_states (seat_id, state, source_event) ",
            " ON CONFLICT (seat_id, source_event, state) DO NOTHING",
            states,
        ),
    ];

    for (insert_sql, conflict_sql, rows) in batches {
        for chunk in rows.chunks(INSERT_BATCH) {
            let mut qb = QueryBuilder::<Postgres>::new(insert_sql);
            qb.push_values(chunk, |mut b, (seat_id, value, source)| {
                b.push_bind(*seat_id)
                    .push_bind(*value)
                    .push_bind((*source).clone());
            });
            qb.push(conflict_sql);
            qb.build().execute(&mut **tx).await?;
        }
    }
    Ok(())
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn seats_by_event(&self, event_id: &str) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE event_id = $1 \
             ORDER BY ticket_type, section, row_label, seat_number"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        into_seats(rows)
    }

    async fn seat_by_id(&self, id: SeatId) -> StoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Seat::try_from).transpose()
    }

    async fn all_seats(&self) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_seats(rows)
    }

    async fn seats_with_key(
        &self,
        event_ids: &[String],
        key: &StructuralKey,
    ) -> StoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(&format!(
            "SELECT {SEAT_COLUMNS} FROM seats \
             WHERE event_id = ANY($1) AND ticket_type = $2 AND section = $3 \
               AND row_label = $4 AND seat_number = $5 \
             ORDER BY event_id"
        ))
        .bind(event_ids.to_vec())
        .bind(&key.ticket_type)
        .bind(&key.section)
        .bind(&key.row)
        .bind(key.seat)
        .fetch_all(&self.pool)
        .await?;
        into_seats(rows)
    }

    async fn seat_count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_seats(&self, seats: &[NewSeat]) -> StoreResult<u64> {
        let mut inserted = 0;
        for chunk in seats.chunks(INSERT_BATCH) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO seats (event_id, ticket_type, section, row_label, seat_number, seating_type) ",
            );
            qb.push_values(chunk, |mut b, seat| {
                b.push_bind(seat.event_id.clone())
                    .push_bind(seat.key.ticket_type.clone())
                    .push_bind(seat.key.section.clone())
                    .push_bind(seat.key.row.clone())
                    .push_bind(seat.key.seat)
                    .push_bind(seat.seating_type.as_str());
            });
            qb.push(
                " ON CONFLICT (event_id, ticket_type, section, row_label, seat_number) DO NOTHING",
            );
            inserted += qb.build().execute(&self.pool).await?.rows_affected();
        }
        Ok(inserted)
    }

    async fn indirect_for(&self, seat_ids: &[SeatId]) -> StoreResult<IndirectRecords> {
        if seat_ids.is_empty() {
            return Ok(IndirectRecords::default());
        }
        self.load_indirect(Some(seat_ids)).await
    }

    async fn all_indirect(&self) -> StoreResult<IndirectRecords> {
        self.load_indirect(None).await
    }

    async fn commit(&self, change: ChangeSet) -> StoreResult<Option<Seat>> {
        let mut tx = self.pool.begin().await?;
        lock_seats(&mut tx, &change).await?;

        if let Some(expected) = &change.expected {
            match stored_snapshot(&mut tx, expected).await? {
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
                Some(stored) if &stored != expected => {
                    tx.rollback().await?;
                    return Err(StoreError::Conflict { seat_id: expected.seat.id });
                }
                Some(_) => {}
            }
        }

        let updated = match &change.seat {
            Some((id, patch)) => match update_seat(&mut tx, *id, patch).await? {
                Some(seat) => Some(seat),
                None => {
                    tx.rollback().await?;
                    return Ok(None);
                }
            },
            None => None,
        };

        for delete in &change.deletes {
            delete_indirect(&mut tx, delete).await?;
        }
        insert_indirect(&mut tx, &change.inserts).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn reset_all(&self) -> StoreResult<ResetCounts> {
        let mut tx = self.pool.begin().await?;

        let seats = sqlx::query(
            "UPDATE seats SET direct_hold_name = NULL, kill_name = NULL, not_for_sale = FALSE, \
             status = 'free', is_resale = FALSE, is_reservation = FALSE",
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();
        let indirect_holds = sqlx::query("DELETE FROM indirect_holds")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let indirect_kills = sqlx::query("DELETE FROM indirect_kills")
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let indirect_states = sqlx::query("DELETE FROM indirect_states")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(ResetCounts { seats, indirect_holds, indirect_kills, indirect_states })
    }

    async fn categories(&self) -> StoreResult<Vec<StateCategory>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, display_order FROM state_categories ORDER BY display_order, id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut states = self.category_states(None).await?;
        Ok(rows
            .into_iter()
            .map(|row| StateCategory {
                states: states.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                display_order: row.display_order,
            })
            .collect())
    }

    async fn create_category(
        &self,
        name: &str,
        display_order: Option<i32>,
    ) -> StoreResult<StateCategory> {
        let display_order = match display_order {
            Some(order) => order,
            None => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT COALESCE(MAX(display_order) + 1, 0) FROM state_categories",
                )
                .fetch_one(&self.pool)
                .await?
            }
        };
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO state_categories (name, display_order) VALUES ($1, $2) \
             RETURNING id, name, display_order",
        )
        .bind(name)
        .bind(display_order)
        .fetch_one(&self.pool)
        .await?;
        Ok(StateCategory {
            id: row.id,
            name: row.name,
            display_order: row.display_order,
            states: Vec::new(),
        })
    }

    async fn rename_category(&self, id: i64, name: &str) -> StoreResult<Option<StateCategory>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "UPDATE state_categories SET name = $2 WHERE id = $1 \
             RETURNING id, name, display_order",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut states = self.category_states(Some(id)).await?;
        Ok(Some(StateCategory {
            states: states.remove(&row.id).unwrap_or_default(),
            id: row.id,
            name: row.name,
            display_order: row.display_order,
        }))
    }

    async fn delete_category(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM state_categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_memberships(&self, id: i64, states: &[SeatState]) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM state_categories WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM state_category_memberships WHERE category_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if !states.is_empty() {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO state_category_memberships (category_id, state_name) ",
            );
            qb.push_values(states, |mut b, state| {
                b.push_bind(id).push_bind(state.as_str());
            });
            qb.push(" ON CONFLICT (category_id, state_name) DO NOTHING");
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
