pub mod memory;
pub mod metrics;
pub mod postgres;
