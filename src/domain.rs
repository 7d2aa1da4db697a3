pub mod audit;
pub mod charge;
pub mod error;
pub mod event;
pub mod guard;
pub mod id;
pub mod money;
pub mod payment;
pub mod ports;
pub mod provider;
pub mod search;
pub mod webhook;
