//! Single-process store.
//!
//! Transactions run one at a time behind an async mutex. Each works on its own
//! copy of the tables, which replaces the committed copy only when the
//! transaction returns `Ok`. That is stricter than row locking: a second
//! allocation waits for the first to finish and then sees its outcome.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use shared::{
    Account, AccountId, Carton, CartonId, CartonSize, CartonState, CartonStatus, Reservation,
    ReservationId, ReservationStatus, Role,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::InventoryError;
use crate::store::{
    AccountDirectory, Database, InventoryStore, ReservationLedger, StoreError, StoreResult,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    cartons: BTreeMap<CartonId, Carton>,
    reservations: BTreeMap<ReservationId, Reservation>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Open transaction on a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryConnection {
    tables: Tables,
}

#[async_trait]
impl Database for MemoryDatabase {
    type Conn = MemoryConnection;

    async fn transaction<R, F>(&self, f: F) -> Result<R, InventoryError>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut Self::Conn) -> BoxFuture<'c, Result<R, InventoryError>> + Send,
    {
        let mut committed = self.tables.lock().await;
        let mut conn = MemoryConnection {
            tables: committed.clone(),
        };

        let outcome = f(&mut conn).await;
        if outcome.is_ok() {
            *committed = conn.tables;
        }
        outcome
    }
}

impl MemoryConnection {
    /// Foreign-key check only. The account's role is checked by the callers.
    fn require_account(&self, id: AccountId) -> StoreResult<()> {
        if self.tables.accounts.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("account {} does not exist", id)))
        }
    }

    fn check_unlinked(&self, reservation_ids: &HashSet<ReservationId>) -> StoreResult<()> {
        let linked = self
            .tables
            .cartons
            .values()
            .find(|carton| matches!(carton.reservation_id(), Some(id) if reservation_ids.contains(&id)));

        match linked {
            Some(carton) => Err(StoreError::Constraint(format!(
                "carton {} still references a reservation being deleted",
                carton.id
            ))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountDirectory for MemoryConnection {
    async fn insert_account(&mut self, role: Role) -> StoreResult<Account> {
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            role,
            created_at: now,
            updated_at: now,
        };
        self.tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_account(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.tables.accounts.get(&id).cloned())
    }

    // Mirrors the ON DELETE CASCADE rules of the Postgres schema, including
    // the restriction on deleting reservations that still have cartons.
    async fn delete_account(&mut self, id: AccountId) -> StoreResult<bool> {
        if !self.tables.accounts.contains_key(&id) {
            return Ok(false);
        }

        let reservations: HashSet<ReservationId> = self
            .tables
            .reservations
            .values()
            .filter(|reservation| reservation.customer_id == id)
            .map(|reservation| reservation.id)
            .collect();

        self.tables.cartons.retain(|_, carton| carton.merchant_id != id);
        self.check_unlinked(&reservations)?;
        self.tables
            .reservations
            .retain(|reservation_id, _| !reservations.contains(reservation_id));
        self.tables.accounts.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl InventoryStore for MemoryConnection {
    async fn insert_cartons(
        &mut self,
        merchant_id: AccountId,
        sizes: &[CartonSize],
    ) -> StoreResult<Vec<Carton>> {
        self.require_account(merchant_id)?;

        let now = Utc::now();
        let cartons: Vec<Carton> = sizes
            .iter()
            .map(|size| Carton {
                id: CartonId::new(),
                size: *size,
                merchant_id,
                state: CartonState::Available,
                created_at: now,
                updated_at: now,
            })
            .collect();

        for carton in &cartons {
            self.tables.cartons.insert(carton.id, carton.clone());
        }
        Ok(cartons)
    }

    async fn find_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>> {
        Ok(self.tables.cartons.get(&id).cloned())
    }

    async fn lock_carton(&mut self, id: CartonId) -> StoreResult<Option<Carton>> {
        self.find_carton(id).await
    }

    async fn lock_available_cartons(
        &mut self,
        size: CartonSize,
        limit: i64,
    ) -> StoreResult<Vec<Carton>> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .tables
            .cartons
            .values()
            .filter(|carton| carton.size == size && carton.state == CartonState::Available)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn linked_cartons(&mut self, reservation_id: ReservationId) -> StoreResult<Vec<Carton>> {
        Ok(self
            .tables
            .cartons
            .values()
            .filter(|carton| carton.reservation_id() == Some(reservation_id))
            .cloned()
            .collect())
    }

    async fn merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>> {
        Ok(self
            .tables
            .cartons
            .values()
            .filter(|carton| carton.merchant_id == merchant_id)
            .cloned()
            .collect())
    }

    async fn lock_merchant_cartons(&mut self, merchant_id: AccountId) -> StoreResult<Vec<Carton>> {
        self.merchant_cartons(merchant_id).await
    }

    async fn set_carton_state(&mut self, ids: &[CartonId], state: CartonState) -> StoreResult<usize> {
        if let Some(reservation_id) = state.reservation_id() {
            if !self.tables.reservations.contains_key(&reservation_id) {
                return Err(StoreError::Constraint(format!(
                    "reservation {} does not exist",
                    reservation_id
                )));
            }
        }

        let now = Utc::now();
        let mut updated = 0;
        for id in ids.iter().collect::<HashSet<_>>() {
            if let Some(carton) = self.tables.cartons.get_mut(id) {
                carton.state = state;
                carton.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete_cartons(&mut self, ids: &[CartonId]) -> StoreResult<usize> {
        Ok(ids
            .iter()
            .filter(|id| self.tables.cartons.remove(*id).is_some())
            .count())
    }

    async fn carton_counts(&mut self) -> StoreResult<Vec<(CartonSize, CartonStatus, i64)>> {
        let mut counts: BTreeMap<(CartonSize, CartonStatus), i64> = BTreeMap::new();
        for carton in self.tables.cartons.values() {
            *counts.entry((carton.size, carton.status())).or_insert(0) += 1;
        }
        Ok(counts
            .into_iter()
            .map(|((size, status), count)| (size, status, count))
            .collect())
    }
}

#[async_trait]
impl ReservationLedger for MemoryConnection {
    async fn insert_reservation(
        &mut self,
        customer_id: AccountId,
        status: ReservationStatus,
    ) -> StoreResult<Reservation> {
        self.require_account(customer_id)?;

        let now = Utc::now();
        let reservation = Reservation {
            id: ReservationId::new(),
            customer_id,
            status,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        Ok(self.tables.reservations.get(&id).cloned())
    }

    async fn lock_reservation(&mut self, id: ReservationId) -> StoreResult<Option<Reservation>> {
        self.find_reservation(id).await
    }

    async fn customer_reservations(&mut self, customer_id: AccountId) -> StoreResult<Vec<Reservation>> {
        let mut reservations: Vec<Reservation> = self
            .tables
            .reservations
            .values()
            .filter(|reservation| reservation.customer_id == customer_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(reservations)
    }

    async fn set_reservation_status(
        &mut self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> StoreResult<Option<Reservation>> {
        Ok(self.tables.reservations.get_mut(&id).map(|reservation| {
            reservation.status = status;
            reservation.updated_at = Utc::now();
            reservation.clone()
        }))
    }

    async fn delete_reservations(&mut self, ids: &[ReservationId]) -> StoreResult<usize> {
        let ids: HashSet<ReservationId> = ids.iter().copied().collect();
        self.check_unlinked(&ids)?;
        Ok(ids
            .iter()
            .filter(|id| self.tables.reservations.remove(*id).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InventoryError;

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let db = MemoryDatabase::new();

        let result: Result<(), InventoryError> = db
            .transaction(|conn| {
                Box::pin(async move {
                    conn.insert_account(Role::Customer).await?;
                    Err(InventoryError::InvalidRequest("abort".into()))
                })
            })
            .await;
        assert!(result.is_err());

        let accounts = db.tables.lock().await.accounts.len();
        assert_eq!(accounts, 0);
    }

    #[tokio::test]
    async fn committed_transaction_is_visible_to_the_next() {
        let db = MemoryDatabase::new();

        let account = db
            .transaction(|conn| Box::pin(async move { Ok(conn.insert_account(Role::Merchant).await?) }))
            .await
            .unwrap();

        let found = db
            .transaction(move |conn| Box::pin(async move { Ok(conn.find_account(account.id).await?) }))
            .await
            .unwrap();
        assert_eq!(found, Some(account));
    }

    #[tokio::test]
    async fn locked_selection_is_in_ascending_id_order() {
        let db = MemoryDatabase::new();

        let (all, locked) = db
            .transaction(|conn| {
                Box::pin(async move {
                    let merchant = conn.insert_account(Role::Merchant).await?;
                    let mut all = conn.insert_cartons(merchant.id, &[CartonSize::S; 5]).await?;
                    all.sort_by_key(|carton| carton.id);
                    let locked = conn.lock_available_cartons(CartonSize::S, 3).await?;
                    Ok((all, locked))
                })
            })
            .await
            .unwrap();

        let expected: Vec<CartonId> = all.iter().take(3).map(|carton| carton.id).collect();
        let actual: Vec<CartonId> = locked.iter().map(|carton| carton.id).collect();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn linking_to_a_missing_reservation_is_rejected() {
        let db = MemoryDatabase::new();

        let result = db
            .transaction(|conn| {
                Box::pin(async move {
                    let merchant = conn.insert_account(Role::Merchant).await?;
                    let cartons = conn.insert_cartons(merchant.id, &[CartonSize::M]).await?;
                    let ids: Vec<CartonId> = cartons.iter().map(|carton| carton.id).collect();
                    Ok(conn
                        .set_carton_state(&ids, CartonState::Reserved(ReservationId::new()))
                        .await?)
                })
            })
            .await;

        assert!(matches!(result, Err(InventoryError::Internal(StoreError::Constraint(_)))));
    }

    #[tokio::test]
    async fn reservations_with_linked_cartons_cannot_be_deleted() {
        let db = MemoryDatabase::new();

        let result = db
            .transaction(|conn| {
                Box::pin(async move {
                    let merchant = conn.insert_account(Role::Merchant).await?;
                    let customer = conn.insert_account(Role::Customer).await?;
                    let cartons = conn.insert_cartons(merchant.id, &[CartonSize::L]).await?;
                    let reservation = conn
                        .insert_reservation(customer.id, ReservationStatus::Reserved)
                        .await?;
                    conn.set_carton_state(&[cartons[0].id], CartonState::Reserved(reservation.id))
                        .await?;
                    Ok(conn.delete_reservations(&[reservation.id]).await?)
                })
            })
            .await;

        assert!(matches!(result, Err(InventoryError::Internal(StoreError::Constraint(_)))));
    }

    #[tokio::test]
    async fn rows_for_unknown_accounts_are_rejected() {
        let db = MemoryDatabase::new();
        let ghost = AccountId::new();

        let cartons = db
            .transaction(move |conn| {
                Box::pin(async move { Ok(conn.insert_cartons(ghost, &[CartonSize::S]).await?) })
            })
            .await;
        assert!(matches!(cartons, Err(InventoryError::Internal(StoreError::Constraint(_)))));

        let reservation = db
            .transaction(move |conn| {
                Box::pin(async move {
                    Ok(conn.insert_reservation(ghost, ReservationStatus::Reserved).await?)
                })
            })
            .await;
        assert!(matches!(reservation, Err(InventoryError::Internal(StoreError::Constraint(_)))));
    }

    #[tokio::test]
    async fn foreign_key_checks_existence_not_role() {
        let db = MemoryDatabase::new();

        // Mirrors the Postgres foreign key: role is enforced above the store.
        let cartons = db
            .transaction(|conn| {
                Box::pin(async move {
                    let customer = conn.insert_account(Role::Customer).await?;
                    Ok(conn.insert_cartons(customer.id, &[CartonSize::M]).await?)
                })
            })
            .await
            .unwrap();
        assert_eq!(cartons.len(), 1);
    }
}
