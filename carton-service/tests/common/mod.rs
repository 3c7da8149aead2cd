#![allow(dead_code)]

use carton_service::{InventoryService, MemoryDatabase};
use shared::{CartonRequest, CartonSize, CartonStatus, Principal, Role, StockLevels};

pub type Service = InventoryService<MemoryDatabase>;

pub fn service() -> Service {
    InventoryService::new(MemoryDatabase::new())
}

pub async fn merchant(service: &Service) -> Principal {
    service
        .open_account(Role::Merchant)
        .await
        .expect("open merchant account")
        .principal()
}

pub async fn customer(service: &Service) -> Principal {
    service
        .open_account(Role::Customer)
        .await
        .expect("open customer account")
        .principal()
}

pub fn lines(spec: &[(CartonSize, i32)]) -> Vec<CartonRequest> {
    spec.iter()
        .map(|(size, quantity)| CartonRequest::new(*size, *quantity))
        .collect()
}

/// Opens a merchant and publishes `stock` from it.
pub async fn stocked(service: &Service, stock: &[(CartonSize, i32)]) -> Principal {
    let merchant = merchant(service).await;
    if !stock.is_empty() {
        service
            .add_units(&merchant, &lines(stock))
            .await
            .expect("add stock");
    }
    merchant
}

pub async fn levels(service: &Service) -> StockLevels {
    service.stock_levels().await.expect("stock levels")
}

pub fn available(levels: &StockLevels, size: CartonSize) -> i64 {
    levels.count(size, CartonStatus::Available)
}

pub fn reserved(levels: &StockLevels, size: CartonSize) -> i64 {
    levels.count(size, CartonStatus::Reserved)
}
