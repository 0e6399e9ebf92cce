//! coursehub - An online learning platform
//!
//! The backend (identity, documents, file store, route guard) is an axum
//! application; `client` is the typed client that drives it and derives
//! view state through `views`.

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod validation;
pub mod views;
