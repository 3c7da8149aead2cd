use shared::{
    Account, AccountId, Carton, CartonId, CartonRequest, Principal, Reservation, ReservationId,
    ReservationSnapshot, Role, StockLevels,
};
use tracing::instrument;

use crate::error::Result;
use crate::store::Database;
use crate::{accounts, allocation, cancellation, intake, queries};

/// Entry point for the transport layer. Each call runs in its own
/// transaction on `D`.
#[derive(Clone)]
pub struct InventoryService<D> {
    db: D,
}

impl<D: Database> InventoryService<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    #[instrument(skip_all, fields(customer = %principal.id, lines = requests.len()))]
    pub async fn allocate(
        &self,
        principal: &Principal,
        requests: &[CartonRequest],
    ) -> Result<ReservationSnapshot> {
        let principal = *principal;
        let requests = requests.to_vec();
        self.db
            .transaction(move |uow| {
                Box::pin(async move { allocation::allocate_in(uow, &principal, &requests).await })
            })
            .await
    }

    #[instrument(skip_all, fields(reservation = %reservation_id, requester = %requester.id))]
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
        requester: &Principal,
    ) -> Result<ReservationSnapshot> {
        let requester = *requester;
        self.db
            .transaction(move |uow| {
                Box::pin(async move { cancellation::cancel_in(uow, reservation_id, &requester).await })
            })
            .await
    }

    #[instrument(skip_all, fields(merchant = %principal.id))]
    pub async fn add_units(&self, principal: &Principal, requests: &[CartonRequest]) -> Result<Vec<Carton>> {
        let principal = *principal;
        let requests = requests.to_vec();
        self.db
            .transaction(move |uow| {
                Box::pin(async move { intake::add_units_in(uow, &principal, &requests).await })
            })
            .await
    }

    #[instrument(skip_all, fields(merchant = %principal.id, carton = %carton_id))]
    pub async fn delete_unit(&self, principal: &Principal, carton_id: CartonId) -> Result<Carton> {
        let principal = *principal;
        self.db
            .transaction(move |uow| {
                Box::pin(async move { intake::delete_unit_in(uow, &principal, carton_id).await })
            })
            .await
    }

    pub async fn open_account(&self, role: Role) -> Result<Account> {
        self.db
            .transaction(move |uow| Box::pin(async move { accounts::open_account_in(uow, role).await }))
            .await
    }

    #[instrument(skip_all, fields(account = %principal.id))]
    pub async fn close_account(&self, principal: &Principal) -> Result<Account> {
        let principal = *principal;
        self.db
            .transaction(move |uow| {
                Box::pin(async move { accounts::close_account_in(uow, &principal).await })
            })
            .await
    }

    /// Resolves an account id into the principal the other operations expect.
    pub async fn principal(&self, id: AccountId) -> Result<Principal> {
        self.db
            .transaction(move |uow| Box::pin(async move { accounts::principal_in(uow, id).await }))
            .await
    }

    pub async fn reservation(&self, id: ReservationId) -> Result<ReservationSnapshot> {
        self.db
            .transaction(move |uow| Box::pin(async move { queries::reservation_in(uow, id).await }))
            .await
    }

    pub async fn customer_reservations(&self, customer_id: AccountId) -> Result<Vec<Reservation>> {
        self.db
            .transaction(move |uow| {
                Box::pin(async move { queries::customer_reservations_in(uow, customer_id).await })
            })
            .await
    }

    pub async fn carton(&self, id: CartonId) -> Result<Carton> {
        self.db
            .transaction(move |uow| Box::pin(async move { queries::carton_in(uow, id).await }))
            .await
    }

    pub async fn merchant_cartons(&self, merchant_id: AccountId) -> Result<Vec<Carton>> {
        self.db
            .transaction(move |uow| {
                Box::pin(async move { queries::merchant_cartons_in(uow, merchant_id).await })
            })
            .await
    }

    pub async fn stock_levels(&self) -> Result<StockLevels> {
        self.db
            .transaction(|uow| Box::pin(async move { queries::stock_levels_in(uow).await }))
            .await
    }
}
