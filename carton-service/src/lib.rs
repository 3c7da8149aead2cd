//! Carton inventory allocation and reservation.
//!
//! Merchants publish sized cartons; customers reserve quantities per size from
//! whatever is AVAILABLE. Every operation runs in one transaction against a
//! [`store::Database`], either Postgres ([`postgres::PgDatabase`]) or the
//! single-process [`memory::MemoryDatabase`].

pub mod accounts;
pub mod allocation;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod intake;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;
pub mod schema;
pub mod service;
pub mod store;

pub use config::{DatabaseConfig, RequestLimits};
pub use error::{Entity, InventoryError};
pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;
pub use service::InventoryService;
pub use store::{Database, StoreError, UnitOfWork};
