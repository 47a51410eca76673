//! Text command protocol spoken over the UART-style characteristic pair.
//!
//! A line is classified by exact, case-sensitive prefix:
//!
//! - `?` dumps the whole configuration
//! - `<name>?` queries one parameter, `temperature?` the boot temperature
//! - `<name>=<value>` sets one parameter
//!
//! where `<name>` is `offset`, `scale`, `deepsleep`, `initial_awake`, `awake`,
//! `interval` or `advertisment`. Anything else is `Unrecognized`.

use std::fmt;

use blescale_config::ParamKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DumpConfig,
    Query(ParamKey),
    QueryTemperature,
    Set { key: ParamKey, value: String },
    Unrecognized(String),
}

impl Command {
    /// Classify one line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.starts_with('?') {
            return Command::DumpConfig;
        }
        for key in ParamKey::ALL {
            let Some(rest) = line.strip_prefix(key.command_name()) else {
                continue;
            };
            if rest.starts_with('?') {
                return Command::Query(key);
            }
            if let Some(arg) = rest.strip_prefix('=') {
                // `offset=1=2` sets "1", the text up to the next '='
                let value = arg.split('=').next().unwrap_or_default();
                return Command::Set {
                    key,
                    value: value.to_owned(),
                };
            }
        }
        if line.starts_with("temperature?") {
            return Command::QueryTemperature;
        }
        Command::Unrecognized(line.to_owned())
    }
}

/// Text sent back on the TX characteristic.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `<name>: <value>`
    Value { name: &'static str, value: String },
    /// `config: <json>`
    Config(String),
    /// `OK`
    Ok,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Value { name, value } => writeln!(f, "{name}: {value}"),
            Reply::Config(json) => writeln!(f, "config: {json}"),
            Reply::Ok => writeln!(f, "OK"),
        }
    }
}
