use shared::{Carton, CartonId, CartonRequest, CartonSize, Principal, ReservationId, ReservationStatus, Role};
use tracing::{info, warn};

use crate::allocation::validate_lines;
use crate::error::{Entity, InventoryError, Result};
use crate::store::UnitOfWork;

/// Creates `quantity` AVAILABLE cartons per line, owned by `principal`.
pub async fn add_units_in<U>(
    uow: &mut U,
    principal: &Principal,
    requests: &[CartonRequest],
) -> Result<Vec<Carton>>
where
    U: UnitOfWork + ?Sized,
{
    if principal.role != Role::Merchant {
        return Err(InventoryError::Forbidden("only merchants can add cartons".into()));
    }
    validate_lines(requests)?;

    let sizes: Vec<CartonSize> = requests
        .iter()
        .flat_map(|line| std::iter::repeat(line.size).take(line.quantity as usize))
        .collect();
    let cartons = uow.insert_cartons(principal.id, &sizes).await?;
    info!("Merchant {} added {} cartons", principal.id, cartons.len());
    Ok(cartons)
}

/// Deletes one carton owned by `principal`. A reserved carton leaves its
/// reservation short, so that reservation is marked MODIFIED.
///
/// Locks are taken reservation first, then carton, the same order cancellation
/// uses. If the carton is linked to a different reservation once locked, the
/// request fails with `Conflict` and may be retried.
pub async fn delete_unit_in<U>(uow: &mut U, principal: &Principal, carton_id: CartonId) -> Result<Carton>
where
    U: UnitOfWork + ?Sized,
{
    let seen = uow
        .find_carton(carton_id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Carton, carton_id))?;
    check_owner(&seen, principal)?;

    if let Some(reservation_id) = seen.reservation_id() {
        uow.lock_reservation(reservation_id).await?;
    }
    let carton = uow
        .lock_carton(carton_id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Carton, carton_id))?;

    match (seen.reservation_id(), carton.reservation_id()) {
        (_, None) => {}
        (Some(locked), Some(current)) if locked == current => {
            mark_short(uow, current).await?;
        }
        (_, Some(current)) => {
            warn!(
                "Carton {} was linked to reservation {} while being deleted",
                carton_id, current
            );
            return Err(InventoryError::Conflict(format!(
                "carton {} changed reservation during deletion",
                carton_id
            )));
        }
    }

    uow.delete_cartons(&[carton_id]).await?;
    info!("Merchant {} deleted carton {}", principal.id, carton_id);
    Ok(carton)
}

fn check_owner(carton: &Carton, principal: &Principal) -> Result<()> {
    if carton.merchant_id != principal.id {
        return Err(InventoryError::Forbidden(format!(
            "carton {} belongs to another merchant",
            carton.id
        )));
    }
    Ok(())
}

/// Moves a RESERVED reservation to MODIFIED once it no longer holds every
/// carton it was created with.
pub(crate) async fn mark_short<U>(uow: &mut U, reservation_id: ReservationId) -> Result<()>
where
    U: UnitOfWork + ?Sized,
{
    let Some(reservation) = uow.lock_reservation(reservation_id).await? else {
        return Ok(());
    };

    match reservation.status {
        ReservationStatus::Reserved => {
            uow.set_reservation_status(reservation_id, ReservationStatus::Modified)
                .await?;
            warn!("Reservation {} lost cartons and is now MODIFIED", reservation_id);
        }
        ReservationStatus::Modified | ReservationStatus::Completed | ReservationStatus::Canceled => {}
    }
    Ok(())
}
