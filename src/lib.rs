//! Palm Job
//!
//! Takes a left/right palm photo pair, checks and reads it with a vision
//! model, suggests a whimsical job (optionally with a generated character
//! card), and exposes the result through a polling API backed by a TTL
//! key-value store.

pub mod app_state;
pub mod config;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
