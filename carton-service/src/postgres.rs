use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::{Connection, PgConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use futures::future::BoxFuture;
use shared::{
    Account, AccountId, Carton, CartonId, CartonSize, CartonState, CartonStatus, Reservation,
    ReservationId, ReservationStatus, Role,
};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::InventoryError;
use crate::models::*;
use crate::schema::*;
use crate::store::{
    AccountDirectory, Database, InventoryStore, ReservationLedger, StoreError, StoreResult,
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Applies pending migrations over a blocking connection.
pub fn run_migrations(database_url: &str) -> Result<()> {
    let mut conn = PgConnection::establish(database_url)?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    info!("Applied {} pending migrations", applied.len());
    Ok(())
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: DbPool,
}

impl PgDatabase {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let pool = bb8::Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build(manager)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Conn = AsyncPgConnection;

    async fn transaction<R, F>(&self, f: F) -> Result<R, InventoryError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut Self::Conn) -> BoxFuture<'c, Result<R, InventoryError>> + Send,
    {
        let mut pooled = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        let conn: &mut AsyncPgConnection = &mut pooled;

        conn.transaction::<R, InventoryError, _>(|conn| Box::pin(f(conn))).await
    }
}

fn decode_one<R, T>(row: Option<R>) -> StoreResult<Option<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    row.map(T::try_from).transpose()
}

fn uuids<I: Copy + Into<Uuid>>(ids: &[I]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait]
impl AccountDirectory for AsyncPgConnection {
    async fn insert_account(&mut self, role: Role) -> StoreResult<Account> {
        let new_account = NewAccount {
            id: Uuid::new_v4(),
            role: role.as_str().to_string(),
        };

        let row = diesel::insert_into(accounts::table)
            .values(&new_account)
            .get_result::<AccountRow>(self)
            .await?;
        row.try_into()
    }

    async fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        let row = accounts::table
            .find(id.as_uuid())
            .first::<AccountRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn delete_account(&mut self, id: AccountId) -> StoreResult<bool> {
        let deleted = diesel::delete(accounts::table.find(id.as_uuid()))
            .execute(self)
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl InventoryStore for AsyncPgConnection {
    async fn insert_cartons(
        &mut self,
        merchant_id: AccountId,
        sizes: &[CartonSize],
    ) -> StoreResult<Vec<Carton>> {
        let new_cartons: Vec<NewCarton> = sizes
            .iter()
            .map(|size| NewCarton {
                id: Uuid::new_v4(),
                size: size.as_str().to_string(),
                status: CartonStatus::Available.as_str().to_string(),
                merchant_id: merchant_id.as_uuid(),
            })
            .collect();

        let rows = diesel::insert_into(cartons::table)
            .values(&new_cartons)
            .get_results::<CartonRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn find_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>> {
        let row = cartons::table
            .find(id.as_uuid())
            .first::<CartonRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn lock_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>> {
        let row = cartons::table
            .find(id.as_uuid())
            .for_update()
            .first::<CartonRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn lock_available_cartons(
        &mut self,
        size: CartonSize,
        limit: i64,
    ) -> StoreResult<Vec<Carton>> {
        let rows = cartons::table
            .filter(cartons::size.eq(size.as_str()))
            .filter(cartons::status.eq(CartonStatus::Available.as_str()))
            .order(cartons::id.asc())
            .limit(limit)
            .for_update()
            .load::<CartonRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn linked_cartons(&mut self, reservation_id: ReservationId) -> StoreResult<Vec<Carton>> {
        let rows = cartons::table
            .filter(cartons::reservation_id.eq(reservation_id.as_uuid()))
            .order(cartons::id.asc())
            .load::<CartonRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>> {
        let rows = cartons::table
            .filter(cartons::merchant_id.eq(merchant_id.as_uuid()))
            .order(cartons::id.asc())
            .load::<CartonRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn lock_merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>> {
        let rows = cartons::table
            .filter(cartons::merchant_id.eq(merchant_id.as_uuid()))
            .order(cartons::id.asc())
            .for_update()
            .load::<CartonRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn set_carton_state(&mut self, ids: &[CartonId], state: CartonState) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let updated = diesel::update(cartons::table.filter(cartons::id.eq_any(uuids(ids))))
            .set((
                cartons::status.eq(state.status().as_str()),
                cartons::reservation_id.eq(state.reservation_id().map(|id| id.as_uuid())),
                cartons::updated_at.eq(Utc::now()),
            ))
            .execute(self)
            .await?;
        Ok(updated)
    }

    async fn delete_cartons(&mut self, ids: &[CartonId]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = diesel::delete(cartons::table.filter(cartons::id.eq_any(uuids(ids))))
            .execute(self)
            .await?;
        Ok(deleted)
    }

    async fn carton_counts(&mut self) -> StoreResult<Vec<(CartonSize, CartonStatus, i64)>> {
        let rows = cartons::table
            .group_by((cartons::size, cartons::status))
            .select((cartons::size, cartons::status, diesel::dsl::count_star()))
            .load::<(String, String, i64)>(self)
            .await?;

        rows.into_iter()
            .map(|(size, status, count)| decode_count(&size, &status, count))
            .collect()
    }
}

#[async_trait]
impl ReservationLedger for AsyncPgConnection {
    async fn insert_reservation(
        &mut self,
        customer_id: AccountId,
        status: ReservationStatus,
    ) -> StoreResult<Reservation> {
        let new_reservation = NewReservation {
            id: Uuid::new_v4(),
            customer_id: customer_id.as_uuid(),
            status: status.as_str().to_string(),
        };

        let row = diesel::insert_into(reservations::table)
            .values(&new_reservation)
            .get_result::<ReservationRow>(self)
            .await?;
        row.try_into()
    }

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let row = reservations::table
            .find(id.as_uuid())
            .first::<ReservationRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn lock_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        let row = reservations::table
            .find(id.as_uuid())
            .for_update()
            .first::<ReservationRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn customer_reservations(&mut self, customer_id: AccountId) -> StoreResult<Vec<Reservation>> {
        let rows = reservations::table
            .filter(reservations::customer_id.eq(customer_id.as_uuid()))
            .order((reservations::created_at.desc(), reservations::id.asc()))
            .load::<ReservationRow>(self)
            .await?;
        decode_all(rows)
    }

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> StoreResult<Option<Reservation>> {
        let row = diesel::update(reservations::table.find(id.as_uuid()))
            .set((
                reservations::status.eq(status.as_str()),
                reservations::updated_at.eq(Utc::now()),
            ))
            .get_result::<ReservationRow>(self)
            .await
            .optional()?;
        decode_one(row)
    }

    async fn delete_reservations(&mut self, ids: &[ReservationId]) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = diesel::delete(reservations::table.filter(reservations::id.eq_any(uuids(ids))))
            .execute(self)
            .await?;
        Ok(deleted)
    }
}
