//! Storage seam shared by the Postgres and in-memory backends.
//!
//! Every method runs inside the transaction opened by [`Database::transaction`];
//! nothing here commits on its own.

use async_trait::async_trait;
use futures::future::BoxFuture;
use shared::{
    Account, AccountId, Carton, CartonId, CartonSize, CartonState, CartonStatus, Reservation,
    ReservationId, ReservationStatus, Role,
};
use thiserror::Error;

use crate::error::InventoryError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    /// `key` is the row id, or the grouping key for aggregate rows.
    #[error("corrupt {table} row {key}: {reason}")]
    CorruptRow {
        table: &'static str,
        key: String,
        reason: String,
    },

    #[error("constraint violation: {0}")]
    Constraint(String),
}

#[async_trait]
pub trait AccountDirectory: Send {
    async fn insert_account(&mut self, role: Role) -> StoreResult<Account>;

    async fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn delete_account(&mut self, id: AccountId) -> StoreResult<bool>;
}

#[async_trait]
pub trait InventoryStore: Send {
    /// Inserts one AVAILABLE carton per entry of `sizes`, in order.
    async fn insert_cartons(
        &mut self,
        merchant_id: AccountId,
        sizes: &[CartonSize],
    ) -> StoreResult<Vec<Carton>>;

    async fn find_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>>;

    /// Like `find_carton`, but holds an exclusive lock on the row.
    async fn lock_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>>;

    /// Selects up to `limit` AVAILABLE cartons of `size` in ascending id order
    /// and holds an exclusive lock on them until the transaction ends.
    async fn lock_available_cartons(
        &mut self,
        size: CartonSize,
        limit: i64,
    ) -> StoreResult<Vec<Carton>>;

    async fn linked_cartons(&mut self, reservation_id: ReservationId) -> StoreResult<Vec<Carton>>;

    async fn merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>>;

    /// Like `merchant_cartons`, but holds an exclusive lock on every row.
    async fn lock_merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>>;

    /// Writes `state` to every carton in `ids` and returns how many rows changed.
    async fn set_carton_state(&mut self, ids: &[CartonId], state: CartonState) -> StoreResult<usize>;

    async fn delete_cartons(&mut self, ids: &[CartonId]) -> StoreResult<usize>;

    async fn carton_counts(&mut self) -> StoreResult<Vec<(CartonSize, CartonStatus, i64)>>;
}

#[async_trait]
pub trait ReservationLedger: Send {
    async fn insert_reservation(
        &mut self,
        customer_id: AccountId,
        status: ReservationStatus,
    ) -> StoreResult<Reservation>;

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// Like `find_reservation`, but holds an exclusive lock on the row.
    async fn lock_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>>;

    /// Newest first.
    async fn customer_reservations(&mut self, customer_id: AccountId) -> StoreResult<Vec<Reservation>>;

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> StoreResult<Option<Reservation>>;

    async fn delete_reservations(&mut self, ids: &[ReservationId]) -> StoreResult<usize>;
}

/// One open transaction against the store.
pub trait UnitOfWork: AccountDirectory + InventoryStore + ReservationLedger {}

impl<T> UnitOfWork for T where T: AccountDirectory + InventoryStore + ReservationLedger {}

#[async_trait]
pub trait Database: Send + Sync {
    type Conn: UnitOfWork;

    /// Runs `f` in a single transaction. It commits when `f` returns `Ok`;
    /// an `Err` or a dropped future rolls everything back.
    async fn transaction<R, F>(&self, f: F) -> Result<R, InventoryError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut Self::Conn) -> BoxFuture<'c, Result<R, InventoryError>> + Send;
}
