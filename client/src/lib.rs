//! Client side of the message board: the state store a front-end drives and
//! the chain capabilities it runs on.

pub mod config;
pub mod http;
pub mod local;
pub mod store;

pub use config::{ConfigError, StoreConfig};
pub use store::{BoardSnapshot, BoardStore, Outcome};
