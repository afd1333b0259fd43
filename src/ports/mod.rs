//! Port traits implemented by adapters.

pub mod bar_port;
pub mod config_port;
pub mod record_port;
