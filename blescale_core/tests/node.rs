use std::time::{Duration, Instant};

use blescale_config::MemoryStorage;
use blescale_core::error::BuildError;
use blescale_core::estimator::{EstimatorCfg, PlausibilityPolicy};
use blescale_core::mocks::{FixedThermal, NoThermal, RecordingRadio, SeqLoadCell};
use blescale_core::{CycleOutcome, Node, NodeError, NodeStatus, Phase, run_awake_window};
use blescale_traits::{MonotonicClock, RadioEvent, WakeCause};
use rstest::rstest;

const CALIBRATED: &str = r#"{"offset":1000.0,"scale":500.0,"interval_ms":100,"awake_ms":350,"deepsleep_ms":7000}"#;

struct Parts {
    cell: SeqLoadCell,
    radio: RecordingRadio,
    storage: MemoryStorage,
}

fn parts(doc: Option<&str>) -> Parts {
    Parts {
        cell: SeqLoadCell::new([2000.0; 5]),
        radio: RecordingRadio::new(),
        storage: doc.map_or_else(MemoryStorage::new, MemoryStorage::with_contents),
    }
}

fn node(p: &Parts, cause: WakeCause) -> Node {
    Node::builder()
        .with_load_cell(p.cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_thermal(FixedThermal(104.0))
        .wake_cause(cause)
        .build()
        .expect("complete builder")
}

#[rstest]
#[case::cell(BuildError::MissingLoadCell)]
#[case::radio(BuildError::MissingRadio)]
#[case::storage(BuildError::MissingStorage)]
fn builder_reports_missing_collaborator(#[case] missing: BuildError) {
    let p = parts(None);
    let mut b = Node::builder();
    if !matches!(missing, BuildError::MissingLoadCell) {
        b = b.with_load_cell(p.cell.clone());
    }
    if !matches!(missing, BuildError::MissingRadio) {
        b = b.with_radio(p.radio.clone());
    }
    if !matches!(missing, BuildError::MissingStorage) {
        b = b.with_storage(p.storage.clone());
    }
    let err = b.build().expect_err("incomplete builder");
    assert_eq!(
        err.downcast_ref::<BuildError>().map(ToString::to_string),
        Some(missing.to_string())
    );
}

#[test]
fn builder_rejects_bad_estimator_cfg() {
    let p = parts(None);
    let err = Node::builder()
        .with_load_cell(p.cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_estimator(EstimatorCfg {
            samples: 0,
            ..EstimatorCfg::default()
        })
        .build()
        .expect_err("zero samples");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[test]
fn build_pushes_persisted_calibration_into_cell() {
    let p = parts(Some(CALIBRATED));
    let node = node(&p, WakeCause::ColdBoot);
    assert_eq!(p.cell.offset(), Some(1000.0));
    assert_eq!(p.cell.scale(), Some(500.0));
    assert_eq!(node.calibration().scale, 500.0);
    assert_eq!(node.temperature().map(|t| t.celsius()), Some(40.0));
}

#[test]
fn thermal_failure_is_not_fatal() {
    let p = parts(None);
    let node = Node::builder()
        .with_load_cell(p.cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_thermal(NoThermal)
        .build()
        .unwrap();
    assert_eq!(node.temperature(), None);
}

#[rstest]
#[case(WakeCause::ColdBoot, Phase::ColdAwake, 120_000)]
#[case(WakeCause::DeepSleep, Phase::WarmAwake, 350)]
fn wake_cause_selects_awake_duration(
    #[case] cause: WakeCause,
    #[case] phase: Phase,
    #[case] awake_ms: u64,
) {
    let p = parts(Some(
        r#"{"initial_awake_ms":120000,"awake_ms":350}"#,
    ));
    let node = node(&p, cause);
    assert_eq!(node.plan().phase, phase);
    assert_eq!(node.plan().awake, Duration::from_millis(awake_ms));
}

#[test]
fn boot_broadcast_publishes_packet_and_characteristic() {
    let p = parts(Some(CALIBRATED));
    let mut node = node(&p, WakeCause::ColdBoot);

    let outcome = node.start(Instant::now()).unwrap();
    let CycleOutcome::Broadcast(adv) = outcome else {
        panic!("expected a broadcast, got {outcome:?}");
    };
    assert_eq!(adv.weight_field(), 400);

    let log = p.radio.log();
    assert_eq!(log.adverts.len(), 1);
    assert_eq!(log.adverts[0].0, Duration::from_micros(500_000));
    assert_eq!(log.adverts[0].1, adv.as_bytes());
    assert_eq!(log.weights, vec![adv.payload().to_vec()]);
    assert_eq!(node.last_advertisement(), Some(&adv));
}

#[test]
fn failed_estimation_skips_broadcast() {
    let p = parts(None);
    let noisy = [0.0, 9.0, 0.0, 9.0, 0.0];
    let cell = SeqLoadCell::new(noisy.iter().chain(&noisy).chain(&noisy).copied());
    let mut node = Node::builder()
        .with_load_cell(cell)
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .build()
        .unwrap();

    let outcome = node.broadcast_cycle(Instant::now());
    assert_eq!(
        outcome,
        CycleOutcome::Skipped(NodeError::NoStableReading { attempts: 3 })
    );
    assert!(p.radio.log().adverts.is_empty());
    assert_eq!(node.last_advertisement(), None);
    assert_eq!(node.stats().skipped, 1);
}

#[test]
fn radio_failure_at_boot_is_an_error() {
    let p = parts(None);
    p.radio.set_failing(true);
    let mut node = node(&p, WakeCause::ColdBoot);
    let err = node.start(Instant::now()).expect_err("radio down");
    assert!(format!("{err:#}").contains("initial broadcast failed"));
}

#[test]
fn implausible_reading_is_resumed_by_poll() {
    let p = parts(Some(r#"{"interval_ms":60000,"initial_awake_ms":600000}"#));
    let cell = SeqLoadCell::new([50.0; 5]);
    let mut node = Node::builder()
        .with_load_cell(cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_estimator(EstimatorCfg {
            policy: PlausibilityPolicy::Range,
            ..EstimatorCfg::default()
        })
        .build()
        .unwrap();

    let t0 = Instant::now();
    let retry_at = t0 + Duration::from_secs(1);
    assert_eq!(node.start(t0).unwrap(), CycleOutcome::Deferred(retry_at));
    assert_eq!(
        node.poll(t0 + Duration::from_millis(10)),
        NodeStatus::Awake {
            next_deadline: retry_at
        }
    );

    // Commands are served while the estimate is pending
    assert_eq!(
        node.dispatch_line("interval?").map(|r| r.to_string()),
        Some("interval: 60000\n".to_owned())
    );

    cell.push([12.0; 5]);
    node.poll(retry_at);
    assert_eq!(node.last_advertisement().map(|a| a.weight_field()), Some(2400));
    assert_eq!(cell.reads(), 10);
}

#[test]
fn tick_at_retry_deadline_does_not_start_a_second_cycle() {
    let p = parts(Some(r#"{"interval_ms":1000,"initial_awake_ms":600000}"#));
    let cell = SeqLoadCell::new([50.0; 5]);
    let mut node = Node::builder()
        .with_load_cell(cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_estimator(EstimatorCfg {
            policy: PlausibilityPolicy::Range,
            ..EstimatorCfg::default()
        })
        .build()
        .unwrap();

    let t0 = Instant::now();
    let both_due = t0 + Duration::from_secs(1);
    assert_eq!(node.start(t0).unwrap(), CycleOutcome::Deferred(both_due));

    cell.push([12.0; 5]);
    assert_eq!(
        node.poll(both_due),
        NodeStatus::Awake {
            next_deadline: t0 + Duration::from_secs(2)
        }
    );
    assert_eq!(p.radio.log().adverts.len(), 1);
    assert_eq!(node.stats().broadcasts, 1);
    assert_eq!(cell.reads(), 10);
}

#[test]
fn poll_ticks_then_requests_sleep() {
    let p = parts(Some(CALIBRATED));
    let mut node = node(&p, WakeCause::DeepSleep);
    let t0 = Instant::now();
    node.start(t0).unwrap();

    assert_eq!(
        node.poll(t0 + Duration::from_millis(50)),
        NodeStatus::Awake {
            next_deadline: t0 + Duration::from_millis(100)
        }
    );
    node.poll(t0 + Duration::from_millis(100));
    node.poll(t0 + Duration::from_millis(200));
    assert_eq!(node.stats().broadcasts, 3);

    let status = node.poll(t0 + Duration::from_millis(350));
    let NodeStatus::SleepDue(req) = status else {
        panic!("expected sleep, got {status:?}");
    };
    assert_eq!(req.duration, Duration::from_millis(7000));
}

#[test]
fn deep_sleep_setting_applies_to_the_current_window() {
    let p = parts(Some(CALIBRATED));
    let mut node = node(&p, WakeCause::DeepSleep);
    node.dispatch_line("deepsleep=60000");
    assert_eq!(node.sleep_request().duration, Duration::from_secs(60));
    // Awake window length is fixed at boot
    assert_eq!(node.plan().awake, Duration::from_millis(350));
}

#[test]
fn write_event_notifies_reply() {
    let p = parts(None);
    let mut node = node(&p, WakeCause::ColdBoot);
    let now = Instant::now();

    node.handle_radio_event(RadioEvent::Connected { conn: 1 }, now);
    let reply = node.handle_radio_event(RadioEvent::Write(b"scale=2.0\r\n".to_vec()), now);
    assert_eq!(reply.map(|r| r.to_string()), Some("OK\n".to_owned()));
    node.handle_radio_event(RadioEvent::Write(b"scale?".to_vec()), now);
    node.handle_radio_event(RadioEvent::Write(b"bogus".to_vec()), now);
    node.handle_radio_event(RadioEvent::Write(vec![0xff, 0xfe]), now);

    assert_eq!(p.radio.log().replies, vec!["OK\n", "scale: 2.0\n"]);
    assert_eq!(p.cell.scale(), Some(2.0));
}

#[test]
fn disconnect_triggers_a_broadcast() {
    let p = parts(None);
    let mut node = node(&p, WakeCause::ColdBoot);
    let now = Instant::now();
    node.handle_radio_event(RadioEvent::Connected { conn: 3 }, now);
    assert!(p.radio.log().adverts.is_empty());
    node.handle_radio_event(RadioEvent::Disconnected { conn: 3 }, now);
    assert_eq!(p.radio.log().adverts.len(), 1);
}

#[test]
fn embedded_temperature_fills_last_byte() {
    let p = parts(None);
    let mut node = Node::builder()
        .with_load_cell(p.cell.clone())
        .with_radio(p.radio.clone())
        .with_storage(p.storage.clone())
        .with_thermal(FixedThermal(104.0))
        .embed_temperature(true)
        .build()
        .unwrap();
    node.broadcast_cycle(Instant::now());
    let log = p.radio.log();
    assert_eq!(log.adverts[0].1[17], 40);
}

#[test]
fn awake_window_runs_until_sleep_deadline() {
    let p = parts(Some(CALIBRATED));
    let mut node = node(&p, WakeCause::DeepSleep);
    let (tx, rx) = crossbeam_channel::unbounded();
    tx.send(RadioEvent::Write(b"awake?".to_vec())).unwrap();

    let started = Instant::now();
    let req = run_awake_window(&mut node, &rx, &MonotonicClock::new()).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(350));
    assert_eq!(req.duration, Duration::from_millis(7000));

    let log = p.radio.log();
    assert_eq!(log.replies, vec!["awake: 350\n"]);
    // Boot broadcast plus ticks at 100, 200 and 300 ms
    assert!(log.adverts.len() >= 3, "{} adverts", log.adverts.len());
    drop(tx);
}

#[test]
fn closing_the_event_source_ends_the_window() {
    let p = parts(None);
    let mut node = node(&p, WakeCause::ColdBoot);
    let (tx, rx) = crossbeam_channel::unbounded::<RadioEvent>();
    drop(tx);

    let started = Instant::now();
    let req = run_awake_window(&mut node, &rx, &MonotonicClock::new()).unwrap();
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(req.duration, Duration::from_millis(1000));
}
