//! Account lifecycle as far as inventory is concerned.
//!
//! Closing an account performs the ownership cascades explicitly so that no
//! carton is ever left RESERVED without a reservation behind it.

use shared::{Account, AccountId, CartonId, Principal, ReservationId, Role};
use std::collections::BTreeSet;
use tracing::info;

use crate::cancellation::release_linked;
use crate::error::{Entity, InventoryError, Result};
use crate::intake::mark_short;
use crate::store::UnitOfWork;

pub async fn open_account_in<U>(uow: &mut U, role: Role) -> Result<Account>
where
    U: UnitOfWork + ?Sized,
{
    let account = uow.insert_account(role).await?;
    info!("Opened {} account {}", role, account.id);
    Ok(account)
}

pub async fn principal_in<U>(uow: &mut U, id: AccountId) -> Result<Principal>
where
    U: UnitOfWork + ?Sized,
{
    uow.find_account(id)
        .await?
        .map(|account| account.principal())
        .ok_or_else(|| InventoryError::not_found(Entity::Account, id))
}

/// Loads `id` and checks it has `role`.
pub(crate) async fn account_with_role<U>(uow: &mut U, id: AccountId, role: Role) -> Result<Account>
where
    U: UnitOfWork + ?Sized,
{
    let account = uow
        .find_account(id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Account, id))?;
    if account.role != role {
        return Err(InventoryError::Forbidden(format!(
            "account {} is not a {}",
            id,
            role.as_str().to_lowercase()
        )));
    }
    Ok(account)
}

/// Deletes the principal's account and everything it owns.
///
/// A customer's reservations are canceled first, returning their cartons to
/// the pool. A merchant's cartons are removed, and any reservation that held
/// one of them becomes MODIFIED.
pub async fn close_account_in<U>(uow: &mut U, principal: &Principal) -> Result<Account>
where
    U: UnitOfWork + ?Sized,
{
    let account = uow
        .find_account(principal.id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Account, principal.id))?;

    match account.role {
        Role::Customer => {
            let mut reservations: Vec<ReservationId> = uow
                .customer_reservations(account.id)
                .await?
                .iter()
                .map(|reservation| reservation.id)
                .collect();
            reservations.sort();

            let mut released = 0;
            for reservation_id in &reservations {
                uow.lock_reservation(*reservation_id).await?;
                released += release_linked(uow, *reservation_id).await?.len();
            }
            uow.delete_reservations(&reservations).await?;
            info!(
                "Customer {} closed: {} reservations removed, {} cartons released",
                account.id,
                reservations.len(),
                released
            );
        }
        Role::Merchant => {
            // Reservations before cartons, in ascending id order.
            let affected: BTreeSet<ReservationId> = uow
                .merchant_cartons(account.id)
                .await?
                .iter()
                .filter_map(|carton| carton.reservation_id())
                .collect();
            for reservation_id in &affected {
                uow.lock_reservation(*reservation_id).await?;
            }

            let cartons = uow.lock_merchant_cartons(account.id).await?;
            let linked: BTreeSet<ReservationId> =
                cartons.iter().filter_map(|carton| carton.reservation_id()).collect();
            if !linked.is_subset(&affected) {
                return Err(InventoryError::Conflict(format!(
                    "cartons of merchant {} were reserved during account closure",
                    account.id
                )));
            }

            for reservation_id in &linked {
                mark_short(uow, *reservation_id).await?;
            }
            let ids: Vec<CartonId> = cartons.iter().map(|carton| carton.id).collect();
            uow.delete_cartons(&ids).await?;
            info!(
                "Merchant {} closed: {} cartons removed, {} reservations affected",
                account.id,
                ids.len(),
                linked.len()
            );
        }
    }

    uow.delete_account(account.id).await?;
    Ok(account)
}
