use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown {kind} `{value}`")]
    UnknownVariant { kind: &'static str, value: String },
    #[error("malformed carton request `{0}`, expected SIZE=QUANTITY")]
    MalformedRequest(String),
    #[error("invalid id `{0}`")]
    InvalidId(String),
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| ParseError::InvalidId(s.to_string()))
            }
        }
    };
}

id_type!(
    /// A merchant or customer account.
    AccountId
);
id_type!(CartonId);
id_type!(ReservationId);

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ParseError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CartonSize {
    #[serde(rename = "XS")]
    Xs,
    #[serde(rename = "S")]
    S,
    #[serde(rename = "M")]
    M,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "XL")]
    Xl,
    #[serde(rename = "XXL")]
    Xxl,
}

string_enum!(CartonSize, "carton size", {
    Xs => "XS",
    S => "S",
    M => "M",
    L => "L",
    Xl => "XL",
    Xxl => "XXL",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CartonStatus {
    Available,
    Reserved,
    Delivered,
    Unavailable,
}

string_enum!(CartonStatus, "carton status", {
    Available => "AVAILABLE",
    Reserved => "RESERVED",
    Delivered => "DELIVERED",
    Unavailable => "UNAVAILABLE",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Reserved,
    Modified,
    Completed,
    Canceled,
}

string_enum!(ReservationStatus, "reservation status", {
    Reserved => "RESERVED",
    Modified => "MODIFIED",
    Completed => "COMPLETED",
    Canceled => "CANCELED",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Merchant,
    Customer,
}

string_enum!(Role, "role", {
    Merchant => "MERCHANT",
    Customer => "CUSTOMER",
});

/// An authenticated caller. Credentials are checked upstream; only the id and
/// role are trusted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: AccountId,
    pub role: Role,
}

impl Principal {
    pub fn merchant(id: AccountId) -> Self {
        Self { id, role: Role::Merchant }
    }

    pub fn customer(id: AccountId) -> Self {
        Self { id, role: Role::Customer }
    }
}

/// Status of a carton together with its reservation link. A link exists
/// exactly when the carton is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reservation_id", rename_all = "UPPERCASE")]
pub enum CartonState {
    Available,
    Reserved(ReservationId),
    Delivered,
    Unavailable,
}

impl CartonState {
    /// Rebuilds the state from its stored columns. Returns `None` when the
    /// link does not agree with the status.
    pub fn from_parts(status: CartonStatus, reservation_id: Option<ReservationId>) -> Option<Self> {
        match (status, reservation_id) {
            (CartonStatus::Reserved, Some(id)) => Some(CartonState::Reserved(id)),
            (CartonStatus::Available, None) => Some(CartonState::Available),
            (CartonStatus::Delivered, None) => Some(CartonState::Delivered),
            (CartonStatus::Unavailable, None) => Some(CartonState::Unavailable),
            _ => None,
        }
    }

    pub fn status(&self) -> CartonStatus {
        match self {
            CartonState::Available => CartonStatus::Available,
            CartonState::Reserved(_) => CartonStatus::Reserved,
            CartonState::Delivered => CartonStatus::Delivered,
            CartonState::Unavailable => CartonStatus::Unavailable,
        }
    }

    pub fn reservation_id(&self) -> Option<ReservationId> {
        match self {
            CartonState::Reserved(id) => Some(*id),
            CartonState::Available | CartonState::Delivered | CartonState::Unavailable => None,
        }
    }
}

/// One line of an intake or reservation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartonRequest {
    pub size: CartonSize,
    pub quantity: i32,
}

impl CartonRequest {
    pub fn new(size: CartonSize, quantity: i32) -> Self {
        Self { size, quantity }
    }

    /// Checks `1 <= quantity <= max`.
    pub fn check_bounds(&self, max: i32) -> Result<(), String> {
        if self.quantity < 1 || self.quantity > max {
            return Err(format!(
                "quantity for size {} must be between 1 and {}, got {}",
                self.size, max, self.quantity
            ));
        }
        Ok(())
    }
}

impl FromStr for CartonRequest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size, quantity) = s
            .split_once('=')
            .ok_or_else(|| ParseError::MalformedRequest(s.to_string()))?;
        let size = size.trim().to_ascii_uppercase().parse()?;
        let quantity = quantity
            .trim()
            .parse()
            .map_err(|_| ParseError::MalformedRequest(s.to_string()))?;
        Ok(Self { size, quantity })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn principal(&self) -> Principal {
        Principal { id: self.id, role: self.role }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carton {
    pub id: CartonId,
    pub size: CartonSize,
    pub merchant_id: AccountId,
    pub state: CartonState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Carton {
    pub fn status(&self) -> CartonStatus {
        self.state.status()
    }

    pub fn reservation_id(&self) -> Option<ReservationId> {
        self.state.reservation_id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub customer_id: AccountId,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reservation together with the cartons currently linked to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSnapshot {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub cartons: Vec<Carton>,
}

impl ReservationSnapshot {
    pub fn carton_ids(&self) -> Vec<CartonId> {
        self.cartons.iter().map(|carton| carton.id).collect()
    }

    pub fn count_of(&self, size: CartonSize) -> usize {
        self.cartons.iter().filter(|carton| carton.size == size).count()
    }
}

/// Carton counts keyed by size, then status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels(pub BTreeMap<CartonSize, BTreeMap<CartonStatus, i64>>);

impl StockLevels {
    pub fn add(&mut self, size: CartonSize, status: CartonStatus, count: i64) {
        *self.0.entry(size).or_default().entry(status).or_insert(0) += count;
    }

    pub fn count(&self, size: CartonSize, status: CartonStatus) -> i64 {
        self.0
            .get(&size)
            .and_then(|by_status| by_status.get(&status))
            .copied()
            .unwrap_or(0)
    }
}
