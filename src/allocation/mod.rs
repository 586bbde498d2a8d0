//! Offer and capacity allocation engine.
//!
//! Seat counters ([`ledger`]), the application lifecycle ([`state_machine`]) and the
//! offer expiry rule ([`expiry`]) are pure functions. A [`store::AllocationStore`] runs
//! them inside its atomic section, and [`coordinator::AllocationCoordinator`] is the
//! only way callers reach a store.

pub mod coordinator;
pub mod error;
pub mod expiry;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod state_machine;
pub mod store;

pub use coordinator::{AllocationCoordinator, OfferPolicy, SweepReport};
pub use error::{AllocationError, AllocationResult};
pub use memory::MemoryAllocationStore;
pub use postgres::PgAllocationStore;
pub use state_machine::{Actor, ActorRole, PlacementOutcome, Transition};
pub use store::{AllocationStore, TransitionOutcome, VacancyChange};
