pub mod allocation;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::allocation::{AllocationCoordinator, AllocationStore, OfferPolicy};
use crate::utils::time::Clock;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: AllocationCoordinator,
    pub sweep_batch: i64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AllocationStore>,
        clock: Arc<dyn Clock>,
        policy: OfferPolicy,
        sweep_batch: i64,
    ) -> Self {
        Self {
            coordinator: AllocationCoordinator::new(store, clock, policy),
            sweep_batch,
        }
    }
}
