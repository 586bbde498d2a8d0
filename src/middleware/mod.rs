pub mod actor;
pub mod rate_limit;
