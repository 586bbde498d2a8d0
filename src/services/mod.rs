pub mod expiry_scheduler;
