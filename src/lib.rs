//! Layered Demo CRUD service: domain records, a stamping unit of work,
//! a TTL lookup cache, and an axum surface over Postgres or an in-process
//! store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
