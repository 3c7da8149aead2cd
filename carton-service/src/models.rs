use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::{Account, Carton, CartonSize, CartonState, CartonStatus, Reservation};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::accounts)]
pub struct AccountRow {
    pub id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::accounts)]
pub struct NewAccount {
    pub id: Uuid,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::cartons)]
pub struct CartonRow {
    pub id: Uuid,
    pub size: String,
    pub status: String,
    pub merchant_id: Uuid,
    pub reservation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::cartons)]
pub struct NewCarton {
    pub id: Uuid,
    pub size: String,
    pub status: String,
    pub merchant_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct ReservationRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
}

fn corrupt(table: &'static str, key: impl ToString, reason: impl ToString) -> StoreError {
    StoreError::CorruptRow {
        table,
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            role: row.role.parse().map_err(|e| corrupt("accounts", row.id, e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<CartonRow> for Carton {
    type Error = StoreError;

    fn try_from(row: CartonRow) -> Result<Self, Self::Error> {
        let size = row.size.parse().map_err(|e| corrupt("cartons", row.id, e))?;
        let status = row.status.parse().map_err(|e| corrupt("cartons", row.id, e))?;
        let state = CartonState::from_parts(status, row.reservation_id.map(Into::into))
            .ok_or_else(|| {
                corrupt(
                    "cartons",
                    row.id,
                    format!("status {} disagrees with reservation link {:?}", status, row.reservation_id),
                )
            })?;

        Ok(Self {
            id: row.id.into(),
            size,
            merchant_id: row.merchant_id.into(),
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            customer_id: row.customer_id.into(),
            status: row.status.parse().map_err(|e| corrupt("reservations", row.id, e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Decodes one `(size, status, count(*))` group of the cartons table.
pub fn decode_count(
    size: &str,
    status: &str,
    count: i64,
) -> Result<(CartonSize, CartonStatus, i64), StoreError> {
    let key = format!("{}/{}", size, status);
    let size = size.parse().map_err(|e| corrupt("cartons", &key, e))?;
    let status = status.parse().map_err(|e| corrupt("cartons", &key, e))?;
    Ok((size, status, count))
}

/// Converts a batch of rows, failing on the first one that does not decode.
pub fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{CartonSize, CartonStatus, ReservationStatus};

    fn carton_row(status: &str, reservation_id: Option<Uuid>) -> CartonRow {
        let now = Utc::now();
        CartonRow {
            id: Uuid::new_v4(),
            size: "XL".to_string(),
            status: status.to_string(),
            merchant_id: Uuid::new_v4(),
            reservation_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn reserved_row_decodes_with_link() {
        let reservation_id = Uuid::new_v4();
        let carton = Carton::try_from(carton_row("RESERVED", Some(reservation_id))).unwrap();
        assert_eq!(carton.size, CartonSize::Xl);
        assert_eq!(carton.status(), CartonStatus::Reserved);
        assert_eq!(carton.reservation_id().map(|id| id.as_uuid()), Some(reservation_id));
    }

    #[test]
    fn orphaned_reserved_row_is_corrupt() {
        let err = Carton::try_from(carton_row("RESERVED", None)).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { table: "cartons", .. }));
    }

    #[test]
    fn legacy_status_names_are_rejected() {
        assert!(Carton::try_from(carton_row("INSTOCK", None)).is_err());

        let now = Utc::now();
        let row = ReservationRow {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            status: "CANCELLED".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(Reservation::try_from(row).is_err());
    }

    #[test]
    fn unknown_count_group_is_corrupt() {
        assert_eq!(
            decode_count("XL", "RESERVED", 4).unwrap(),
            (CartonSize::Xl, CartonStatus::Reserved, 4)
        );

        let err = decode_count("XXXL", "AVAILABLE", 1).unwrap_err();
        match err {
            StoreError::CorruptRow { table, key, .. } => {
                assert_eq!(table, "cartons");
                assert_eq!(key, "XXXL/AVAILABLE");
            }
            other => panic!("expected CorruptRow, got {other:?}"),
        }
        assert!(matches!(
            decode_count("M", "INSTOCK", 1),
            Err(StoreError::CorruptRow { .. })
        ));
    }

    #[test]
    fn decode_all_keeps_order() {
        let now = Utc::now();
        let rows: Vec<ReservationRow> = ["RESERVED", "CANCELED"]
            .iter()
            .map(|status| ReservationRow {
                id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                status: status.to_string(),
                created_at: now,
                updated_at: now,
            })
            .collect();
        let decoded: Vec<Reservation> = decode_all(rows).unwrap();
        assert_eq!(decoded[0].status, ReservationStatus::Reserved);
        assert_eq!(decoded[1].status, ReservationStatus::Canceled);
    }
}
