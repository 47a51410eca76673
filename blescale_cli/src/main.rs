mod cli;
mod error_fmt;
mod node_run;

use std::path::Path;

use clap::Parser;
use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use blescale_config::{BoardConfig, ConfigStore, Configuration, FileStorage, load_toml};
use blescale_core::{ChipTemperature, encode, encode_with_temperature};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::node_run::{RunOpts, check_storage, run_node, send_lines};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error hooks: {e}");
    }

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let (board, board_found) = load_board(&cli.board)?;
    init_tracing(&cli, &board);
    if board_found {
        tracing::debug!(path = %cli.board.display(), "board profile loaded");
    } else {
        tracing::info!(path = %cli.board.display(), "no board profile; using defaults");
    }
    board.validate().wrap_err("invalid board profile")?;

    match cli.cmd {
        Commands::Run {
            wake_cause,
            cycles,
            raw,
            noise,
            chip_temperature,
            embed_temperature,
        } => run_node(
            &board,
            RunOpts {
                wake_cause: wake_cause.into(),
                cycles,
                raw,
                noise,
                chip_temperature,
                embed_temperature,
            },
        ),
        Commands::Send { lines } => {
            for reply in send_lines(&board, &lines) {
                print!("{reply}");
            }
            Ok(())
        }
        Commands::Encode { kg, temperature } => {
            let adv = match temperature {
                Some(c) => encode_with_temperature(kg, ChipTemperature::from_celsius(c)),
                None => encode(kg),
            };
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "hex": adv.to_hex(),
                        "payload": adv.payload(),
                        "weight_units": adv.weight_field(),
                    })
                );
            } else {
                println!("{}", adv.to_hex());
            }
            Ok(())
        }
        Commands::Show => {
            let store = ConfigStore::load(FileStorage::new(&board.storage.config_path));
            print_config(store.configuration())
        }
        Commands::SelfCheck => self_check(&board),
    }
}

/// Missing file means defaults; an unreadable or malformed one is an error.
fn load_board(path: &Path) -> Result<(BoardConfig, bool)> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let board = load_toml(&text)
                .wrap_err_with(|| format!("parse board profile {}", path.display()))?;
            Ok((board, true))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((BoardConfig::default(), false)),
        Err(e) => Err(e).wrap_err_with(|| format!("read board profile {}", path.display())),
    }
}

fn print_config(config: &Configuration) -> Result<()> {
    let text = serde_json::to_string_pretty(config).wrap_err("serialize configuration")?;
    println!("{text}");
    Ok(())
}

fn self_check(board: &BoardConfig) -> Result<()> {
    check_storage(&board.storage.config_path)?;

    if let Ok(text) = std::fs::read_to_string(&board.storage.config_path) {
        let merged = Configuration::merge_json(&text);
        if !merged.rejected.is_empty() {
            tracing::warn!(keys = ?merged.rejected, "persisted keys ignored; defaults in effect");
        }
    }

    #[cfg(feature = "hardware")]
    {
        use blescale_traits::LoadCell;
        let timeout = std::time::Duration::from_millis(board.hardware.sensor_read_timeout_ms);
        let mut cell = blescale_hardware::hx711::Hx711::open(
            board.pins.hx711_dout,
            board.pins.hx711_sck,
            timeout,
        )
        .wrap_err("open hx711")?;
        let store = ConfigStore::load(FileStorage::new(&board.storage.config_path));
        cell.set_offset(store.configuration().offset);
        cell.set_scale(store.configuration().scale);
        let kg = cell
            .units()
            .map_err(|e| blescale_core::hw_error::map_hw_error(&e))
            .wrap_err("hx711 read")?;
        tracing::info!(weight_kg = kg, "hx711 responded");
    }

    println!("ok");
    Ok(())
}

fn init_tracing(cli: &Cli, board: &BoardConfig) {
    let level = cli
        .log_level
        .clone()
        .or_else(|| board.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    // Console logs go to stderr; stdout carries packets and replies
    let console = if cli.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = board.logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "blescale.log".into(), |n| n.to_os_string());
        let appender = match board.logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
    {
        eprintln!("failed to initialise logging: {e}");
    }
}
