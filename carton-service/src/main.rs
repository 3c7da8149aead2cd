use anyhow::Result;
use carton_service::postgres::run_migrations;
use carton_service::{DatabaseConfig, InventoryService, PgDatabase, RequestLimits};
use clap::{Parser, Subcommand};
use serde::Serialize;
use shared::{CartonRequest, Role};
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "carton-service")]
struct Args {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(flatten)]
    limits: RequestLimits,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a merchant or customer account.
    OpenAccount {
        #[arg(long)]
        role: Role,
    },
    /// Delete an account together with everything it owns.
    CloseAccount {
        #[arg(long)]
        account: Uuid,
    },
    /// Publish cartons, e.g. `--carton L=20 --carton M=5`.
    AddCartons {
        #[arg(long)]
        merchant: Uuid,
        #[arg(long = "carton", required = true)]
        cartons: Vec<CartonRequest>,
    },
    DeleteCarton {
        #[arg(long)]
        merchant: Uuid,
        #[arg(long)]
        carton: Uuid,
    },
    ListCartons {
        #[arg(long)]
        merchant: Uuid,
    },
    /// Reserve cartons, e.g. `--carton L=10 --carton M=2`.
    Reserve {
        #[arg(long)]
        customer: Uuid,
        #[arg(long = "carton", required = true)]
        cartons: Vec<CartonRequest>,
    },
    Cancel {
        #[arg(long)]
        customer: Uuid,
        #[arg(long)]
        reservation: Uuid,
    },
    ShowReservation {
        #[arg(long)]
        reservation: Uuid,
    },
    ListReservations {
        #[arg(long)]
        customer: Uuid,
    },
    /// Carton counts per size and status.
    Stock,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("Running database migrations...");
    run_migrations(&args.database.database_url)?;
    info!("Migrations completed successfully");

    let db = PgDatabase::connect(&args.database).await?;
    let service = InventoryService::new(db);

    match args.command {
        Command::OpenAccount { role } => print_json(&service.open_account(role).await?)?,
        Command::CloseAccount { account } => {
            let principal = service.principal(account.into()).await?;
            print_json(&service.close_account(&principal).await?)?
        }
        Command::AddCartons { merchant, cartons } => {
            args.limits.check_intake(&cartons)?;
            let principal = service.principal(merchant.into()).await?;
            print_json(&service.add_units(&principal, &cartons).await?)?
        }
        Command::DeleteCarton { merchant, carton } => {
            let principal = service.principal(merchant.into()).await?;
            print_json(&service.delete_unit(&principal, carton.into()).await?)?
        }
        Command::ListCartons { merchant } => print_json(&service.merchant_cartons(merchant.into()).await?)?,
        Command::Reserve { customer, cartons } => {
            args.limits.check_reservation(&cartons)?;
            let principal = service.principal(customer.into()).await?;
            print_json(&service.allocate(&principal, &cartons).await?)?
        }
        Command::Cancel { customer, reservation } => {
            let principal = service.principal(customer.into()).await?;
            print_json(&service.cancel(reservation.into(), &principal).await?)?
        }
        Command::ShowReservation { reservation } => {
            print_json(&service.reservation(reservation.into()).await?)?
        }
        Command::ListReservations { customer } => {
            print_json(&service.customer_reservations(customer.into()).await?)?
        }
        Command::Stock => print_json(&service.stock_levels().await?)?,
    }

    Ok(())
}
