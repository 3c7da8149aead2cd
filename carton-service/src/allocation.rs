//! Allocation engine: turns a multi-size request into one reservation.
//!
//! The whole request runs inside the caller's unit of work. The reservation
//! row is written first so cartons can link to it; any shortage returns an
//! error, and the caller's transaction discards both the reservation and any
//! links already written for earlier sizes.

use shared::{
    CartonId, CartonRequest, CartonState, Principal, ReservationSnapshot, ReservationStatus, Role,
};
use tracing::{debug, info, warn};

use crate::error::{InventoryError, Result};
use crate::store::{StoreError, UnitOfWork};

pub(crate) fn validate_lines(requests: &[CartonRequest]) -> Result<()> {
    if requests.is_empty() {
        return Err(InventoryError::InvalidRequest("at least one carton line is required".into()));
    }
    if let Some(line) = requests.iter().find(|line| line.quantity <= 0) {
        return Err(InventoryError::InvalidRequest(format!(
            "quantity for size {} must be positive, got {}",
            line.size, line.quantity
        )));
    }
    Ok(())
}

/// Reserves every requested line for `principal` or nothing at all.
///
/// Lines are served in the order given. Each selects AVAILABLE cartons of the
/// requested size in ascending id order under an exclusive lock, so a
/// concurrent allocation for the same size waits for this one to finish.
pub async fn allocate_in<U>(
    uow: &mut U,
    principal: &Principal,
    requests: &[CartonRequest],
) -> Result<ReservationSnapshot>
where
    U: UnitOfWork + ?Sized,
{
    match principal.role {
        Role::Customer => {}
        Role::Merchant => {
            return Err(InventoryError::Forbidden(
                "only customers can reserve cartons".into(),
            ))
        }
    }
    validate_lines(requests)?;

    let reservation = uow
        .insert_reservation(principal.id, ReservationStatus::Reserved)
        .await?;
    debug!("Opened reservation {} for customer {}", reservation.id, principal.id);

    for line in requests {
        let locked = uow
            .lock_available_cartons(line.size, i64::from(line.quantity))
            .await?;

        // The query is capped at `quantity`, so the count always fits.
        let available = i32::try_from(locked.len()).unwrap_or(i32::MAX);
        if available < line.quantity {
            warn!(
                "Not enough {} cartons for customer {}: requested {}, available {}",
                line.size, principal.id, line.quantity, available
            );
            return Err(InventoryError::CartonNotAvailable {
                size: line.size,
                requested: line.quantity,
                available,
            });
        }

        let ids: Vec<CartonId> = locked.iter().map(|carton| carton.id).collect();
        let linked = uow
            .set_carton_state(&ids, CartonState::Reserved(reservation.id))
            .await?;
        if linked != ids.len() {
            return Err(StoreError::Constraint(format!(
                "linked {} of {} locked {} cartons",
                linked,
                ids.len(),
                line.size
            ))
            .into());
        }
    }

    let cartons = uow.linked_cartons(reservation.id).await?;
    info!(
        "Reservation {} holds {} cartons for customer {}",
        reservation.id,
        cartons.len(),
        principal.id
    );

    Ok(ReservationSnapshot { reservation, cartons })
}
