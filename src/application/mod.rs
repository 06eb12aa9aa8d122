//! Application services layer.

pub mod demo;
pub mod error;
pub mod identity;
pub mod json;
pub mod pagination;
pub mod repos;
pub mod session;
