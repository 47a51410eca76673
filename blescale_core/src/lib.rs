#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Weighing node logic (hardware-agnostic).
//!
//! All hardware goes through the `blescale_traits` collaborators, so every
//! piece here runs on a host.
//!
//! ## Architecture
//!
//! - **Estimator**: outlier-rejecting sampling, raw counts to kilograms (`estimator`)
//! - **Encoder**: the 18-byte Weight Scale advertisement (`advert`)
//! - **Commands**: text protocol parser and dispatcher (`command`, `dispatcher`)
//! - **Duty cycle**: awake window planning from the wake cause (`duty_cycle`)
//! - **Node**: single owner tying the above together (`node`), driven by
//!   `runtime::run_awake_window`
//!
//! Persisted parameters live in `blescale_config`.

pub mod advert;
pub mod command;
pub mod dispatcher;
pub mod duty_cycle;
pub mod error;
pub mod estimator;
pub mod hw_error;
pub mod mocks;
pub mod node;
pub mod runtime;
pub mod temperature;

pub use advert::{Advertisement, encode, encode_with_temperature};
pub use command::{Command, Reply};
pub use dispatcher::Dispatcher;
pub use duty_cycle::{AwakePlan, Phase, SleepRequest};
pub use error::{BuildError, NodeError, Result};
pub use estimator::{
    Calibration, EstimationCycle, EstimatorCfg, PlausibilityPolicy, Step, WeightEstimator,
};
pub use node::{CycleOutcome, Node, NodeBuilder, NodeStats, NodeStatus};
pub use runtime::run_awake_window;
pub use temperature::ChipTemperature;
