//! Shared building blocks for sto-grab: errors, configuration, UI events,
//! the sequential download queue, and SQLite persistence.
pub mod config;
pub mod db;
pub mod download_queue;
pub mod errors;
pub mod events;
pub mod models;
