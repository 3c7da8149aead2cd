use shared::{
    CartonId, CartonState, Principal, ReservationId, ReservationSnapshot, ReservationStatus,
};
use tracing::{info, warn};

use crate::error::{Entity, InventoryError, Result};
use crate::store::UnitOfWork;

/// Releases every carton linked to `reservation_id` and marks the reservation
/// CANCELED. Only the owning customer may cancel.
///
/// Cancelling an already canceled reservation is a no-op that returns the
/// current snapshot. COMPLETED reservations cannot be canceled.
pub async fn cancel_in<U>(
    uow: &mut U,
    reservation_id: ReservationId,
    requester: &Principal,
) -> Result<ReservationSnapshot>
where
    U: UnitOfWork + ?Sized,
{
    let reservation = uow
        .lock_reservation(reservation_id)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Reservation, reservation_id))?;

    if reservation.customer_id != requester.id {
        warn!(
            "Account {} tried to cancel reservation {} owned by {}",
            requester.id, reservation_id, reservation.customer_id
        );
        return Err(InventoryError::Forbidden(format!(
            "reservation {} belongs to another customer",
            reservation_id
        )));
    }

    match reservation.status {
        ReservationStatus::Reserved | ReservationStatus::Modified => {}
        ReservationStatus::Canceled => {
            info!("Reservation {} already canceled", reservation_id);
            let cartons = uow.linked_cartons(reservation_id).await?;
            return Ok(ReservationSnapshot { reservation, cartons });
        }
        ReservationStatus::Completed => {
            return Err(InventoryError::Conflict(format!(
                "reservation {} is completed and cannot be canceled",
                reservation_id
            )));
        }
    }

    let reservation = uow
        .set_reservation_status(reservation_id, ReservationStatus::Canceled)
        .await?
        .ok_or_else(|| InventoryError::not_found(Entity::Reservation, reservation_id))?;

    let released = release_linked(uow, reservation_id).await?;
    info!("Reservation {} canceled, {} cartons released", reservation_id, released.len());

    Ok(ReservationSnapshot {
        reservation,
        cartons: Vec::new(),
    })
}

/// Returns every carton linked to `reservation_id` to AVAILABLE and clears
/// its link.
pub(crate) async fn release_linked<U>(uow: &mut U, reservation_id: ReservationId) -> Result<Vec<CartonId>>
where
    U: UnitOfWork + ?Sized,
{
    let ids: Vec<CartonId> = uow
        .linked_cartons(reservation_id)
        .await?
        .iter()
        .map(|carton| carton.id)
        .collect();
    uow.set_carton_state(&ids, CartonState::Available).await?;
    Ok(ids)
}
