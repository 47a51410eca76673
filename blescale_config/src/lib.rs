#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Configuration for the weighing node.
//!
//! - `Configuration` is the persisted parameter set (calibration and timing).
//!   It is stored as a JSON object and merged key-by-key over the defaults.
//! - `ConfigStore` owns the live parameters and rewrites the file on every change.
//! - `BoardConfig` is the static TOML board profile (pins, storage path, logging).
pub mod board;
pub mod error;
pub mod params;
pub mod store;

pub use board::{BoardConfig, load_toml};
pub use error::ConfigError;
pub use params::{Configuration, Merged, ParamKey, ParamKind, ParamValue};
pub use store::{ConfigStore, FileStorage, MemoryStorage, Persistence};
