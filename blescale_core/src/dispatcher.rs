//! Applies text commands to the parameter store.
//!
//! Stateless per line. `offset` and `scale` changes are also pushed into the
//! estimator's calibration and the load cell driver. Every accepted set is
//! persisted before the call returns.

use blescale_config::{ConfigError, ConfigStore, ParamKey, ParamValue, Persistence};
use blescale_traits::LoadCell;

use crate::command::{Command, Reply};
use crate::error::NodeError;
use crate::estimator::WeightEstimator;
use crate::temperature::ChipTemperature;

/// Borrowed view of everything a command may touch.
pub struct Dispatcher<'a, P: Persistence, L: LoadCell + ?Sized> {
    pub store: &'a mut ConfigStore<P>,
    pub estimator: &'a mut WeightEstimator,
    pub cell: &'a mut L,
    pub temperature: Option<ChipTemperature>,
}

impl<P: Persistence, L: LoadCell + ?Sized> Dispatcher<'_, P, L> {
    /// Parse and execute one line. `None` means nothing is sent back.
    pub fn dispatch(&mut self, line: &str) -> Option<Reply> {
        let command = Command::parse(line);
        tracing::debug!(?command, "command received");
        match self.execute(command) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "command rejected");
                None
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Option<Reply>, NodeError> {
        match command {
            Command::DumpConfig => Ok(Some(Reply::Config(self.store.configuration().to_json()))),
            Command::Query(key) => Ok(Some(Reply::Value {
                name: key.command_name(),
                value: self.store.get(key).to_string(),
            })),
            Command::QueryTemperature => Ok(Some(Reply::Value {
                name: "temperature",
                value: self
                    .temperature
                    .map_or_else(|| String::from("unavailable"), |t| t.to_string()),
            })),
            Command::Set { key, value } => self.set(key, &value).map(|()| Some(Reply::Ok)),
            Command::Unrecognized(line) => {
                tracing::debug!(%line, "unrecognized command ignored");
                Ok(None)
            }
        }
    }

    fn set(&mut self, key: ParamKey, text: &str) -> Result<(), NodeError> {
        match self.store.set_text(key, text) {
            Ok(_) => {}
            Err(e @ ConfigError::InvalidValue { .. }) => return Err(e.into()),
            // The value is live even though the write failed; keep going
            Err(e) => tracing::error!(key = key.as_str(), error = %e, "set applied but not persisted"),
        }
        self.recalibrate(key);
        Ok(())
    }

    fn recalibrate(&mut self, key: ParamKey) {
        match (key, self.store.get(key)) {
            (ParamKey::Offset, ParamValue::Real(offset)) => {
                self.estimator.set_offset(offset);
                self.cell.set_offset(offset);
            }
            (ParamKey::Scale, ParamValue::Real(scale)) => {
                self.estimator.set_scale(scale);
                self.cell.set_scale(scale);
            }
            _ => {}
        }
    }
}
