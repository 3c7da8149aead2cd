use shared::{AccountId, Carton, CartonId, Reservation, ReservationId, ReservationSnapshot, Role, StockLevels};

use crate::accounts::account_with_role;
use crate::error::{Entity, InventoryError, Result};
use crate::store::UnitOfWork;

pub async fn reservation_in<U>(uow: &mut U, id: ReservationId) -> Result<ReservationSnapshot>
where
    U: UnitOfWork + ?Sized,
{
    let reservation = uow
        .find_reservation(id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Reservation, id))?;
    let cartons = uow.linked_cartons(id).await?;
    Ok(ReservationSnapshot { reservation, cartons })
}

pub async fn customer_reservations_in<U>(uow: &mut U, customer_id: AccountId) -> Result<Vec<Reservation>>
where
    U: UnitOfWork + ?Sized,
{
    account_with_role(uow, customer_id, Role::Customer).await?;
    Ok(uow.customer_reservations(customer_id).await?)
}

pub async fn carton_in<U>(uow: &mut U, id: CartonId) -> Result<Carton>
where
    U: UnitOfWork + ?Sized,
{
    uow.find_carton(id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Carton, id))
}

pub async fn merchant_cartons_in<U>(uow: &mut U, merchant_id: AccountId) -> Result<Vec<Carton>>
where
    U: UnitOfWork + ?Sized,
{
    account_with_role(uow, merchant_id, Role::Merchant).await?;
    Ok(uow.merchant_cartons(merchant_id).await?)
}

pub async fn stock_levels_in<U>(uow: &mut U) -> Result<StockLevels>
where
    U: UnitOfWork + ?Sized,
{
    let mut levels = StockLevels::default();
    for (size, status, count) in uow.carton_counts().await? {
        levels.add(size, status, count);
    }
    Ok(levels)
}
