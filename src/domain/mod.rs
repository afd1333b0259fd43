//! Core domain types and logic.

pub mod asset;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod record;
pub mod rounding;
pub mod schedule;
