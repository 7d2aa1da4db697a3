pub mod audit_repo;
pub mod payment_repo;
