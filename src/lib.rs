//! Offline-first course catalog.
//!
//! Remote catalog snapshots are merged into a local SQLite store without
//! losing on-device enrollment, sync progress is exposed as an explicit state
//! machine, and reads are served as live streams that follow every write.

pub mod api;
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod state;
