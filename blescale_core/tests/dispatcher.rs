use blescale_config::{ConfigStore, Configuration, MemoryStorage};
use blescale_core::estimator::{Calibration, EstimatorCfg, WeightEstimator};
use blescale_core::mocks::SeqLoadCell;
use blescale_core::{ChipTemperature, Dispatcher};
use rstest::{fixture, rstest};

struct Rig {
    store: ConfigStore<MemoryStorage>,
    storage: MemoryStorage,
    estimator: WeightEstimator,
    cell: SeqLoadCell,
    temperature: Option<ChipTemperature>,
}

impl Rig {
    fn send(&mut self, line: &str) -> Option<String> {
        Dispatcher {
            store: &mut self.store,
            estimator: &mut self.estimator,
            cell: &mut self.cell,
            temperature: self.temperature,
        }
        .dispatch(line)
        .map(|r| r.to_string())
    }
}

#[fixture]
fn rig() -> Rig {
    let storage = MemoryStorage::new();
    Rig {
        store: ConfigStore::load(storage.clone()),
        storage,
        estimator: WeightEstimator::new(EstimatorCfg::default(), Calibration::default()),
        cell: SeqLoadCell::default(),
        temperature: Some(ChipTemperature::from_celsius(40.0)),
    }
}

#[rstest]
fn set_then_query_scale(mut rig: Rig) {
    assert_eq!(rig.send("scale=2.0").as_deref(), Some("OK\n"));
    assert_eq!(rig.send("scale?").as_deref(), Some("scale: 2.0\n"));

    let persisted = Configuration::merge_json(&rig.storage.contents().unwrap()).config;
    assert_eq!(persisted.scale, 2.0);
    assert_eq!(rig.estimator.calibration().scale, 2.0);
    assert_eq!(rig.cell.scale(), Some(2.0));
}

#[rstest]
fn offset_reaches_estimator_and_sensor(mut rig: Rig) {
    assert_eq!(rig.send("offset=-120.5").as_deref(), Some("OK\n"));
    assert_eq!(rig.estimator.calibration().offset, -120.5);
    assert_eq!(rig.cell.offset(), Some(-120.5));
    assert_eq!(rig.send("offset?").as_deref(), Some("offset: -120.5\n"));
}

#[rstest]
fn timing_sets_do_not_recalibrate(mut rig: Rig) {
    assert_eq!(rig.send("interval=250").as_deref(), Some("OK\n"));
    assert_eq!(rig.send("interval?").as_deref(), Some("interval: 250\n"));
    assert_eq!(rig.cell.offset(), None);
    assert_eq!(rig.cell.scale(), None);
}

#[rstest]
#[case("deepsleep?", "deepsleep: 1000\n")]
#[case("initial_awake?", "initial_awake: 120000\n")]
#[case("awake?", "awake: 1000\n")]
#[case("interval?", "interval: 1000\n")]
#[case("advertisment?", "advertisment: 500000\n")]
#[case("offset?", "offset: 0.0\n")]
#[case("scale?", "scale: 1.0\n")]
#[case("temperature?", "temperature: 40.0 C\n")]
fn queries_report_defaults(mut rig: Rig, #[case] line: &str, #[case] expected: &str) {
    assert_eq!(rig.send(line).as_deref(), Some(expected));
}

#[rstest]
fn dump_lists_every_key(mut rig: Rig) {
    let reply = rig.send("?").unwrap();
    let json = reply
        .strip_prefix("config: ")
        .and_then(|s| s.strip_suffix('\n'))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(value.as_object().unwrap().len(), 7);
    assert_eq!(value["advertisment_us"], 500_000);
}

#[rstest]
#[case("scale=abc")]
#[case("scale=0")]
#[case("deepsleep=-5")]
#[case("interval=0")]
#[case("awake=1.5")]
#[case("offset=")]
fn invalid_values_are_rejected_silently(mut rig: Rig, #[case] line: &str) {
    let before = rig.store.configuration().clone();
    assert_eq!(rig.send(line), None);
    assert_eq!(rig.store.configuration(), &before);
    assert_eq!(rig.storage.contents(), None, "nothing written");
}

#[rstest]
#[case("hello")]
#[case("temperature=3")]
#[case("SCALE?")]
fn unrecognized_lines_get_no_reply(mut rig: Rig, #[case] line: &str) {
    assert_eq!(rig.send(line), None);
}

#[rstest]
fn persist_failure_keeps_value(mut rig: Rig) {
    rig.storage.set_fail_writes(true);
    assert_eq!(rig.send("awake=5000").as_deref(), Some("OK\n"));
    assert_eq!(rig.send("awake?").as_deref(), Some("awake: 5000\n"));
    assert_eq!(rig.storage.contents(), None);
}

#[rstest]
fn repeated_set_is_idempotent(mut rig: Rig) {
    rig.send("offset=3.5");
    let once = rig.store.configuration().clone();
    let written = rig.storage.contents();
    rig.send("offset=3.5");
    assert_eq!(rig.store.configuration(), &once);
    assert_eq!(rig.storage.contents(), written);
    assert_eq!(once.offset, 3.5);
}

#[rstest]
fn missing_temperature_is_reported(mut rig: Rig) {
    rig.temperature = None;
    assert_eq!(
        rig.send("temperature?").as_deref(),
        Some("temperature: unavailable\n")
    );
}

