//! `run` and `send`: drive the node against the configured collaborators.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::Sender;
use eyre::{Result, WrapErr};

use blescale_config::{BoardConfig, ConfigStore, FileStorage};
use blescale_core::estimator::{Calibration, EstimatorCfg, WeightEstimator};
use blescale_core::{Dispatcher, Node, run_awake_window};
use blescale_hardware::{SimulatedLoadCell, SimulatedPower, SimulatedRadio};
use blescale_traits::{MonotonicClock, PowerControl, RadioEvent, WakeCause};

/// Settings of a `run` invocation.
#[derive(Debug, Clone, Copy)]
pub struct RunOpts {
    pub wake_cause: WakeCause,
    pub cycles: u32,
    pub raw: f64,
    pub noise: f64,
    pub chip_temperature: f64,
    pub embed_temperature: bool,
}

type SharedSender = Arc<Mutex<Option<Sender<RadioEvent>>>>;

/// Boot, run the awake window, sleep; `opts.cycles` times.
///
/// Stdin lines become RX writes. Ctrl-C drops the only sender, which ends
/// the current window and stops further cycles.
pub fn run_node(board: &BoardConfig, opts: RunOpts) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let sender: SharedSender = Arc::new(Mutex::new(Some(tx)));

    {
        let sender = Arc::clone(&sender);
        ctrlc::set_handler(move || {
            tracing::warn!("interrupted; closing awake window");
            sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        })
        .wrap_err("install Ctrl-C handler")?;
    }
    spawn_stdin_reader(Arc::clone(&sender));

    let clock = MonotonicClock::new();
    let mut power = SimulatedPower::new(opts.wake_cause);

    for cycle in 1..=opts.cycles {
        tracing::info!(name = %board.node.name, cycle, wake_cause = ?power.wake_cause(), "booting");
        let mut node = build_node(board, &opts, power.wake_cause())?;
        let request = run_awake_window(&mut node, &rx, &clock)
            .wrap_err_with(|| format!("awake window {cycle} failed"))?;

        let stats = node.stats();
        tracing::info!(
            cycle,
            broadcasts = stats.broadcasts,
            skipped = stats.skipped,
            commands = stats.commands,
            "awake window closed"
        );
        println!("sleep {}", request.duration.as_millis());

        let interrupted = sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none();
        if interrupted || cycle == opts.cycles {
            break;
        }
        // Node state is dropped here: deep sleep resets the chip
        drop(node);
        power.deep_sleep(request.duration);
    }
    Ok(())
}

fn spawn_stdin_reader(sender: SharedSender) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let guard = sender.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(tx) = guard.as_ref() else { break };
            if tx.send(RadioEvent::Write(line.into_bytes())).is_err() {
                break;
            }
        }
        tracing::debug!("stdin closed");
    });
}

fn build_node(board: &BoardConfig, opts: &RunOpts, cause: WakeCause) -> Result<Node> {
    let builder = Node::builder()
        .with_radio(SimulatedRadio::stdout())
        .with_storage(FileStorage::new(&board.storage.config_path))
        .wake_cause(cause)
        .embed_temperature(opts.embed_temperature);

    #[cfg(feature = "hardware")]
    let builder = {
        let timeout = std::time::Duration::from_millis(board.hardware.sensor_read_timeout_ms);
        let cell = blescale_hardware::hx711::Hx711::open(
            board.pins.hx711_dout,
            board.pins.hx711_sck,
            timeout,
        )
        .wrap_err("open hx711")?;
        builder
            .with_load_cell(cell)
            .with_thermal(blescale_hardware::SysfsThermal::default())
    };
    #[cfg(not(feature = "hardware"))]
    let builder = builder
        .with_load_cell(SimulatedLoadCell::new(opts.raw, opts.noise))
        .with_thermal(blescale_hardware::SimulatedThermal::celsius(
            opts.chip_temperature,
        ));

    builder.build().wrap_err("build node")
}

/// Apply `lines` to the persisted configuration; returns the replies in order.
pub fn send_lines(board: &BoardConfig, lines: &[String]) -> Vec<String> {
    let mut store = ConfigStore::load(FileStorage::new(&board.storage.config_path));
    let calibration = Calibration::from(store.configuration());
    let mut estimator = WeightEstimator::new(EstimatorCfg::default(), calibration);
    let mut cell = SimulatedLoadCell::new(0.0, 0.0);

    let mut dispatcher = Dispatcher {
        store: &mut store,
        estimator: &mut estimator,
        cell: &mut cell,
        temperature: None,
    };
    lines
        .iter()
        .filter_map(|line| {
            let reply = dispatcher.dispatch(line);
            if reply.is_none() {
                tracing::warn!(%line, "no reply");
            }
            reply.map(|r| r.to_string())
        })
        .collect()
}

/// Storage location must be a file in an existing directory.
pub fn check_storage(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        eyre::bail!("storage directory {} does not exist", parent.display());
    }
    if path.is_dir() {
        eyre::bail!("storage path {} is a directory", path.display());
    }
    Ok(())
}
