//! The persisted parameter set and its key vocabulary.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::ConfigError;

/// One of the seven persisted parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Offset,
    Scale,
    DeepsleepMs,
    InitialAwakeMs,
    AwakeMs,
    IntervalMs,
    AdvertismentUs,
}

/// Value type a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Real,
    Integer,
}

impl ParamKey {
    /// Every key, in the order the config dump lists them.
    pub const ALL: [ParamKey; 7] = [
        ParamKey::Offset,
        ParamKey::Scale,
        ParamKey::DeepsleepMs,
        ParamKey::InitialAwakeMs,
        ParamKey::AwakeMs,
        ParamKey::IntervalMs,
        ParamKey::AdvertismentUs,
    ];

    /// Name used in the persisted file.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKey::Offset => "offset",
            ParamKey::Scale => "scale",
            ParamKey::DeepsleepMs => "deepsleep_ms",
            ParamKey::InitialAwakeMs => "initial_awake_ms",
            ParamKey::AwakeMs => "awake_ms",
            ParamKey::IntervalMs => "interval_ms",
            ParamKey::AdvertismentUs => "advertisment_us",
        }
    }

    /// Name used by the text command protocol (`<name>?`, `<name>=<value>`).
    pub fn command_name(self) -> &'static str {
        match self {
            ParamKey::Offset => "offset",
            ParamKey::Scale => "scale",
            ParamKey::DeepsleepMs => "deepsleep",
            ParamKey::InitialAwakeMs => "initial_awake",
            ParamKey::AwakeMs => "awake",
            ParamKey::IntervalMs => "interval",
            ParamKey::AdvertismentUs => "advertisment",
        }
    }

    pub fn kind(self) -> ParamKind {
        match self {
            ParamKey::Offset | ParamKey::Scale => ParamKind::Real,
            _ => ParamKind::Integer,
        }
    }

    pub fn from_persisted(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.command_name() == name)
    }

    /// Parse command text into a value of this key's type.
    pub fn parse_value(self, text: &str) -> Result<ParamValue, ConfigError> {
        let text = text.trim();
        match self.kind() {
            ParamKind::Real => text
                .parse::<f64>()
                .map(ParamValue::Real)
                .map_err(|_| self.invalid(text, "expected a real number")),
            ParamKind::Integer => text
                .parse::<u64>()
                .map(ParamValue::Integer)
                .map_err(|_| self.invalid(text, "expected a non-negative integer")),
        }
    }

    fn invalid(self, value: impl fmt::Display, reason: &'static str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.as_str(),
            value: value.to_string(),
            reason,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Real(f64),
    Integer(u64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Debug keeps the fractional part: 2.0 prints as "2.0", not "2"
            ParamValue::Real(v) => write!(f, "{v:?}"),
            ParamValue::Integer(v) => write!(f, "{v}"),
        }
    }
}

/// Persisted node parameters. All seven keys are always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Raw-sensor zero point (counts).
    pub offset: f64,
    /// Raw-sensor counts per kilogram.
    pub scale: f64,
    pub deepsleep_ms: u64,
    pub initial_awake_ms: u64,
    pub awake_ms: u64,
    pub interval_ms: u64,
    pub advertisment_us: u64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
            deepsleep_ms: 1000,
            initial_awake_ms: 120_000,
            awake_ms: 1000,
            interval_ms: 1000,
            advertisment_us: 500_000,
        }
    }
}

/// Result of merging a persisted file over the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub config: Configuration,
    /// Persisted keys that were present but ignored (wrong type or invalid).
    pub rejected: Vec<&'static str>,
}

impl Configuration {
    pub fn get(&self, key: ParamKey) -> ParamValue {
        match key {
            ParamKey::Offset => ParamValue::Real(self.offset),
            ParamKey::Scale => ParamValue::Real(self.scale),
            ParamKey::DeepsleepMs => ParamValue::Integer(self.deepsleep_ms),
            ParamKey::InitialAwakeMs => ParamValue::Integer(self.initial_awake_ms),
            ParamKey::AwakeMs => ParamValue::Integer(self.awake_ms),
            ParamKey::IntervalMs => ParamValue::Integer(self.interval_ms),
            ParamKey::AdvertismentUs => ParamValue::Integer(self.advertisment_us),
        }
    }

    /// Type-check and validate `value`, then apply it. On error `self` is untouched.
    #[allow(clippy::cast_precision_loss)]
    pub fn set(&mut self, key: ParamKey, value: ParamValue) -> Result<(), ConfigError> {
        match (key.kind(), value) {
            (ParamKind::Real, ParamValue::Real(v)) => self.set_real(key, v),
            // Integral reals are accepted (JSON writers may drop the ".0")
            (ParamKind::Real, ParamValue::Integer(v)) => self.set_real(key, v as f64),
            (ParamKind::Integer, ParamValue::Integer(v)) => self.set_integer(key, v),
            (ParamKind::Integer, ParamValue::Real(v)) => {
                Err(key.invalid(v, "expected a non-negative integer"))
            }
        }
    }

    fn set_real(&mut self, key: ParamKey, v: f64) -> Result<(), ConfigError> {
        if !v.is_finite() {
            return Err(key.invalid(v, "must be finite"));
        }
        match key {
            ParamKey::Offset => self.offset = v,
            ParamKey::Scale => {
                if v == 0.0 {
                    return Err(key.invalid(v, "must be non-zero"));
                }
                self.scale = v;
            }
            _ => return Err(key.invalid(v, "expected a non-negative integer")),
        }
        Ok(())
    }

    fn set_integer(&mut self, key: ParamKey, v: u64) -> Result<(), ConfigError> {
        match key {
            ParamKey::DeepsleepMs => self.deepsleep_ms = v,
            ParamKey::InitialAwakeMs => self.initial_awake_ms = v,
            ParamKey::AwakeMs => self.awake_ms = v,
            ParamKey::IntervalMs => {
                if v == 0 {
                    return Err(key.invalid(v, "must be >= 1"));
                }
                self.interval_ms = v;
            }
            ParamKey::AdvertismentUs => self.advertisment_us = v,
            ParamKey::Offset | ParamKey::Scale => return Err(key.invalid(v, "expected a real")),
        }
        Ok(())
    }

    /// Merge a persisted JSON document over the defaults, key by key.
    ///
    /// Malformed documents, non-object roots, unknown keys and ill-typed values
    /// never fail the load: whatever is valid wins, the rest stays at default.
    pub fn merge_json(text: &str) -> Merged {
        let mut config = Configuration::default();
        let mut rejected = Vec::new();

        // Values stay unparsed here so one bad number cannot sink the others
        let root = match serde_json::from_str::<BTreeMap<String, Box<RawValue>>>(text) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(error = %e, "persisted config is not a JSON object; using defaults");
                return Merged { config, rejected };
            }
        };

        for key in ParamKey::ALL {
            let Some(raw) = root.get(key.as_str()) else {
                continue;
            };
            let applied = serde_json::from_str::<serde_json::Value>(raw.get())
                .ok()
                .and_then(|v| json_value(key, &v))
                .and_then(|v| config.set(key, v).ok());
            if applied.is_none() {
                tracing::warn!(key = key.as_str(), value = raw.get(), "ignoring persisted value");
                rejected.push(key.as_str());
            }
        }

        for name in root.keys() {
            if ParamKey::from_persisted(name).is_none() {
                tracing::debug!(key = %name, "ignoring unknown persisted key");
            }
        }

        Merged { config, rejected }
    }

    pub fn to_json(&self) -> String {
        // A struct of plain numbers always serializes
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn deep_sleep(&self) -> Duration {
        Duration::from_millis(self.deepsleep_ms)
    }

    pub fn initial_awake(&self) -> Duration {
        Duration::from_millis(self.initial_awake_ms)
    }

    pub fn awake(&self) -> Duration {
        Duration::from_millis(self.awake_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn advertisement_interval(&self) -> Duration {
        Duration::from_micros(self.advertisment_us)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn json_value(key: ParamKey, raw: &serde_json::Value) -> Option<ParamValue> {
    match key.kind() {
        ParamKind::Real => raw.as_f64().map(ParamValue::Real),
        ParamKind::Integer => raw.as_u64().map(ParamValue::Integer).or_else(|| {
            // 1000.0 is an integer for our purposes
            let f = raw.as_f64()?;
            (f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64).then(|| ParamValue::Integer(f as u64))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_factory_values() {
        let c = Configuration::default();
        assert_eq!(c.offset, 0.0);
        assert_eq!(c.scale, 1.0);
        assert_eq!(c.deepsleep_ms, 1000);
        assert_eq!(c.initial_awake_ms, 120_000);
        assert_eq!(c.awake_ms, 1000);
        assert_eq!(c.advertisment_us, 500_000);
        assert_eq!(c.interval_ms, 1000);
    }

    #[test]
    fn real_values_keep_fraction_when_printed() {
        assert_eq!(ParamValue::Real(2.0).to_string(), "2.0");
        assert_eq!(ParamValue::Real(-3.25).to_string(), "-3.25");
        assert_eq!(ParamValue::Integer(1000).to_string(), "1000");
    }

    #[test]
    fn command_names_round_trip() {
        for key in ParamKey::ALL {
            assert_eq!(ParamKey::from_command_name(key.command_name()), Some(key));
            assert_eq!(ParamKey::from_persisted(key.as_str()), Some(key));
        }
        assert_eq!(ParamKey::from_command_name("temperature"), None);
    }

    #[test]
    fn rejected_set_leaves_config_untouched() {
        let mut c = Configuration::default();
        let before = c.clone();
        assert!(c.set(ParamKey::Scale, ParamValue::Real(0.0)).is_err());
        assert!(c.set(ParamKey::Offset, ParamValue::Real(f64::NAN)).is_err());
        assert!(c.set(ParamKey::IntervalMs, ParamValue::Integer(0)).is_err());
        assert!(c.set(ParamKey::AwakeMs, ParamValue::Real(1.5)).is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn integer_is_accepted_for_real_key() {
        let mut c = Configuration::default();
        c.set(ParamKey::Offset, ParamValue::Integer(12)).unwrap();
        assert_eq!(c.offset, 12.0);
    }

    #[test]
    fn parse_value_checks_type() {
        assert_eq!(
            ParamKey::Scale.parse_value(" 2.5 ").unwrap(),
            ParamValue::Real(2.5)
        );
        assert_eq!(
            ParamKey::AwakeMs.parse_value("1500").unwrap(),
            ParamValue::Integer(1500)
        );
        assert!(ParamKey::AwakeMs.parse_value("1.5").is_err());
        assert!(ParamKey::AwakeMs.parse_value("-3").is_err());
        assert!(ParamKey::Offset.parse_value("abc").is_err());
    }

    #[test]
    fn durations_use_the_right_units() {
        let c = Configuration::default();
        assert_eq!(c.advertisement_interval(), Duration::from_millis(500));
        assert_eq!(c.initial_awake(), Duration::from_secs(120));
    }
}
