//! Services and the persistence contracts they depend on.

pub mod builds;
pub mod cart;
pub mod catalog;
pub mod categories;
pub mod components;
pub mod deletion;
pub mod dto;
pub mod error;
pub mod identity;
pub mod pagination;
pub mod receipts;
pub mod repos;
pub mod retry;
pub mod stock;
