//! Data Transfer Objects for REST request/response serialization.

pub mod admin_dto;
pub mod checkout_dto;
pub mod common_dto;
pub mod gift_dto;

pub use admin_dto::*;
pub use checkout_dto::*;
pub use common_dto::*;
pub use gift_dto::*;
