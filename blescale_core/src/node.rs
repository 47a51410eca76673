//! The weighing node: single owner of the configuration, the estimator and
//! the collaborators.
//!
//! All three event sources of an awake window (periodic tick, sleep
//! deadline, radio events) go through `&mut Node`, so configuration reads and
//! writes are serialized without locks.

use std::time::Instant;

use blescale_config::{ConfigStore, Configuration, Persistence};
use blescale_traits::gatt::{UART_RX_UUID, UART_SERVICE_UUID, WEIGHT_SCALE_UUID};
use blescale_traits::{LoadCell, Radio, RadioEvent, ThermalSensor, WakeCause};
use eyre::WrapErr;

use crate::advert::{self, Advertisement};
use crate::command::Reply;
use crate::dispatcher::Dispatcher;
use crate::duty_cycle::{AwakePlan, Schedule, SleepRequest};
use crate::error::{BuildError, NodeError, Result};
use crate::estimator::{Calibration, EstimationCycle, EstimatorCfg, Step, WeightEstimator};
use crate::hw_error::map_radio_error;
use crate::temperature::ChipTemperature;

/// Result of one broadcast cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A fresh packet went out.
    Broadcast(Advertisement),
    /// An estimation is waiting for its retry deadline.
    Deferred(Instant),
    /// Nothing was broadcast this cycle.
    Skipped(NodeError),
}

/// What the event loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Awake { next_deadline: Instant },
    SleepDue(SleepRequest),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub broadcasts: u64,
    pub skipped: u64,
    pub commands: u64,
}

#[derive(Debug, Clone)]
struct PendingEstimate {
    cycle: EstimationCycle,
    resume_at: Instant,
}

pub struct Node {
    store: ConfigStore<Box<dyn Persistence>>,
    estimator: WeightEstimator,
    cell: Box<dyn LoadCell>,
    radio: Box<dyn Radio>,
    temperature: Option<ChipTemperature>,
    embed_temperature: bool,
    plan: AwakePlan,
    schedule: Option<Schedule>,
    pending: Option<PendingEstimate>,
    last: Option<Advertisement>,
    connection: Option<u16>,
    stats: NodeStats,
}

impl core::fmt::Debug for Node {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Node")
            .field("plan", &self.plan)
            .field("calibration", &self.estimator.calibration())
            .field("temperature", &self.temperature)
            .field("connection", &self.connection)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn builder() -> NodeBuilder {
        NodeBuilder::default()
    }

    /// Arm the awake window at `now` and run the boot broadcast.
    ///
    /// A radio that cannot advertise at all is treated as fatal here; later
    /// cycles only log radio failures.
    pub fn start(&mut self, now: Instant) -> Result<CycleOutcome> {
        self.schedule = Some(Schedule::start(now, &self.plan));
        tracing::info!(
            phase = ?self.plan.phase,
            awake_ms = self.plan.awake.as_millis(),
            interval_ms = self.plan.interval.as_millis(),
            weight_service = WEIGHT_SCALE_UUID,
            uart_service = UART_SERVICE_UUID,
            "awake window started"
        );
        match self.broadcast_cycle(now) {
            CycleOutcome::Skipped(e @ NodeError::Radio(_)) => {
                Err(eyre::Report::new(e)).wrap_err("initial broadcast failed")
            }
            outcome => Ok(outcome),
        }
    }

    pub fn is_started(&self) -> bool {
        self.schedule.is_some()
    }

    /// Run the estimator and, on success, publish the packet.
    ///
    /// While an earlier estimation waits for its retry deadline, a new cycle
    /// is not started; the pending one is resumed once the deadline passes.
    pub fn broadcast_cycle(&mut self, now: Instant) -> CycleOutcome {
        let mut cycle = match self.pending.take() {
            Some(p) if now < p.resume_at => {
                let at = p.resume_at;
                self.pending = Some(p);
                return CycleOutcome::Deferred(at);
            }
            Some(p) => p.cycle,
            None => EstimationCycle::new(),
        };

        match self.estimator.advance(&mut cycle, &mut *self.cell) {
            Step::Ready(weight_kg) => self.publish(weight_kg),
            Step::RetryAfter(delay) => {
                let resume_at = now + delay;
                tracing::debug!(attempts = cycle.attempts(), ?delay, "estimation deferred");
                self.pending = Some(PendingEstimate { cycle, resume_at });
                CycleOutcome::Deferred(resume_at)
            }
            Step::Failed(e) => {
                tracing::warn!(error = %e, "broadcast cycle skipped");
                self.stats.skipped += 1;
                CycleOutcome::Skipped(e)
            }
        }
    }

    fn publish(&mut self, weight_kg: f64) -> CycleOutcome {
        let adv = match self.temperature {
            Some(t) if self.embed_temperature => advert::encode_with_temperature(weight_kg, t),
            _ => advert::encode(weight_kg),
        };
        let interval = self.store.configuration().advertisement_interval();

        let sent = self
            .radio
            .write_weight(adv.payload(), true)
            .and_then(|()| self.radio.advertise(interval, adv.as_bytes()));
        if let Err(e) = sent {
            let e = map_radio_error(e.as_ref());
            tracing::error!(error = %e, "failed to publish weight");
            self.stats.skipped += 1;
            return CycleOutcome::Skipped(e);
        }

        self.stats.broadcasts += 1;
        self.last = Some(adv);
        tracing::info!(
            weight_kg,
            weight_units = adv.weight_field(),
            adv_interval_us = interval.as_micros(),
            "weight broadcast"
        );
        CycleOutcome::Broadcast(adv)
    }

    /// Fire whatever timers are due at `now`.
    pub fn poll(&mut self, now: Instant) -> NodeStatus {
        let Some(mut schedule) = self.schedule else {
            // Nothing armed until `start`.
            return NodeStatus::Awake { next_deadline: now };
        };

        if now >= schedule.sleep_at {
            return NodeStatus::SleepDue(self.sleep_request());
        }

        let resumed = self.pending.as_ref().is_some_and(|p| now >= p.resume_at);
        if resumed {
            self.broadcast_cycle(now);
        }
        // A tick coinciding with a resumed estimation is consumed without a
        // second cycle.
        if schedule.take_tick(now) && !resumed {
            self.broadcast_cycle(now);
        }
        self.schedule = Some(schedule);

        let mut next_deadline = schedule.sleep_at.min(schedule.next_tick);
        if let Some(p) = &self.pending {
            next_deadline = next_deadline.min(p.resume_at);
        }
        NodeStatus::Awake { next_deadline }
    }

    /// Sleep for the currently configured `deepsleep_ms`.
    pub fn sleep_request(&self) -> SleepRequest {
        SleepRequest {
            duration: self.store.configuration().deep_sleep(),
        }
    }

    pub fn handle_radio_event(&mut self, event: RadioEvent, now: Instant) -> Option<Reply> {
        match event {
            RadioEvent::Connected { conn } => {
                tracing::info!(conn, "central connected");
                self.connection = Some(conn);
                None
            }
            RadioEvent::Disconnected { conn } => {
                tracing::info!(conn, "central disconnected; re-advertising");
                self.connection = None;
                self.broadcast_cycle(now);
                None
            }
            RadioEvent::Write(bytes) => {
                let Ok(text) = std::str::from_utf8(&bytes) else {
                    tracing::warn!(
                        characteristic = UART_RX_UUID,
                        len = bytes.len(),
                        "ignoring non-UTF-8 write"
                    );
                    return None;
                };
                let reply = self.dispatch_line(text)?;
                if let Err(e) = self.radio.notify_reply(&reply.to_string()) {
                    tracing::warn!(error = %map_radio_error(e.as_ref()), "failed to notify reply");
                }
                Some(reply)
            }
        }
    }

    /// Apply one command line without touching the radio.
    pub fn dispatch_line(&mut self, line: &str) -> Option<Reply> {
        self.stats.commands += 1;
        Dispatcher {
            store: &mut self.store,
            estimator: &mut self.estimator,
            cell: &mut *self.cell,
            temperature: self.temperature,
        }
        .dispatch(line)
    }

    pub fn configuration(&self) -> &Configuration {
        self.store.configuration()
    }

    pub fn calibration(&self) -> Calibration {
        self.estimator.calibration()
    }

    pub fn plan(&self) -> &AwakePlan {
        &self.plan
    }

    pub fn temperature(&self) -> Option<ChipTemperature> {
        self.temperature
    }

    pub fn last_advertisement(&self) -> Option<&Advertisement> {
        self.last.as_ref()
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }
}

/// Builder for `Node`. Load cell, radio and storage are required.
#[derive(Default)]
pub struct NodeBuilder {
    cell: Option<Box<dyn LoadCell>>,
    radio: Option<Box<dyn Radio>>,
    storage: Option<Box<dyn Persistence>>,
    thermal: Option<Box<dyn ThermalSensor>>,
    wake_cause: Option<WakeCause>,
    estimator: Option<EstimatorCfg>,
    embed_temperature: bool,
}

impl NodeBuilder {
    pub fn with_load_cell(mut self, cell: impl LoadCell + 'static) -> Self {
        self.cell = Some(Box::new(cell));
        self
    }

    pub fn with_radio(mut self, radio: impl Radio + 'static) -> Self {
        self.radio = Some(Box::new(radio));
        self
    }

    pub fn with_storage(mut self, storage: impl Persistence + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    pub fn with_thermal(mut self, thermal: impl ThermalSensor + 'static) -> Self {
        self.thermal = Some(Box::new(thermal));
        self
    }

    /// Defaults to `WakeCause::ColdBoot`.
    pub fn wake_cause(mut self, cause: WakeCause) -> Self {
        self.wake_cause = Some(cause);
        self
    }

    pub fn with_estimator(mut self, cfg: EstimatorCfg) -> Self {
        self.estimator = Some(cfg);
        self
    }

    /// Carry the boot temperature in the last reserved advertisement byte.
    pub fn embed_temperature(mut self, yes: bool) -> Self {
        self.embed_temperature = yes;
        self
    }

    /// Validate and assemble the node.
    ///
    /// The thermal sensor is sampled before anything else touches the
    /// hardware. The persisted calibration is pushed into the load cell.
    pub fn build(self) -> Result<Node> {
        let mut cell = self
            .cell
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLoadCell))?;
        let radio = self
            .radio
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRadio))?;
        let storage = self
            .storage
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStorage))?;
        let cfg = self.estimator.unwrap_or_default();
        cfg.validate()
            .map_err(|msg| eyre::Report::new(BuildError::InvalidConfig(msg)))?;

        let temperature = self
            .thermal
            .and_then(|mut sensor| ChipTemperature::sample(&mut sensor));

        let store = ConfigStore::load(storage);
        let config = store.configuration();
        let calibration = Calibration::from(config);
        cell.set_offset(calibration.offset);
        cell.set_scale(calibration.scale);

        let wake_cause = self.wake_cause.unwrap_or(WakeCause::ColdBoot);
        let plan = AwakePlan::for_wake(wake_cause, config);
        tracing::debug!(?wake_cause, ?calibration, "node built");

        Ok(Node {
            estimator: WeightEstimator::new(cfg, calibration),
            store,
            cell,
            radio,
            temperature,
            embed_temperature: self.embed_temperature,
            plan,
            schedule: None,
            pending: None,
            last: None,
            connection: None,
            stats: NodeStats::default(),
        })
    }
}
