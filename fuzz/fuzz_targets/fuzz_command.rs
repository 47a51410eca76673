#![no_main]
use blescale_config::{ConfigStore, MemoryStorage};
use blescale_core::estimator::{Calibration, EstimatorCfg, WeightEstimator};
use blescale_core::mocks::SeqLoadCell;
use blescale_core::{Command, Dispatcher, Reply};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let mut store = ConfigStore::load(MemoryStorage::new());
    let mut estimator = WeightEstimator::new(EstimatorCfg::default(), Calibration::default());
    let mut cell = SeqLoadCell::default();
    let before = store.configuration().clone();

    let command = Command::parse(data);
    let reply = Dispatcher {
        store: &mut store,
        estimator: &mut estimator,
        cell: &mut cell,
        temperature: None,
    }
    .execute(command.clone());

    match (command, reply) {
        // Only an accepted set may change the configuration
        (Command::Set { .. }, Ok(Some(Reply::Ok))) => {}
        (_, _) => assert_eq!(store.configuration(), &before),
    }
    assert!(store.configuration().scale != 0.0);
});
