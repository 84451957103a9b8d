//! Calibrate, persist, reload, and run with the stored model.

use chrono::{DateTime, Utc};

use simlab_core::calibration::{calibrate, CalibrationOptions, LiveTradeRecord};
use simlab_core::domain::{Candle, Timestamp};
use simlab_core::execution::{ExecutionModel, Side};
use simlab_runner::{ModelStore, PresetRegistry, RunConfig, Runner, Scenario, StoreError};

fn record(k: usize, failed: bool) -> LiveTradeRecord {
    let submitted = 10_000 * k as i64;
    let landed = submitted + 120 + (k % 7) as i64 * 15;
    LiveTradeRecord {
        venue: "raydium".into(),
        side: if k % 2 == 0 { Side::Buy } else { Side::Sell },
        size: (k % 5 + 1) as f64,
        expected_price: 1.0,
        actual_price: (!failed).then(|| {
            let bps = 6.0 * ((k % 5 + 1) as f64).sqrt() / 10_000.0;
            if k % 2 == 0 { 1.0 + bps } else { 1.0 - bps }
        }),
        submitted_at: Timestamp::from_millis(submitted),
        landed_at: Timestamp::from_millis(landed),
        confirmed_at: (!failed).then(|| Timestamp::from_millis(landed + 500 + (k % 11) as i64 * 20)),
        failed,
        fill_fraction: if k % 9 == 0 { 0.7 } else { 1.0 },
        congested: k % 4 == 0,
        fee_shortfall: false,
    }
}

fn calibrated(at: DateTime<Utc>, n: usize) -> ExecutionModel {
    let records: Vec<_> = (0..n).map(|k| record(k, k % 13 == 0)).collect();
    let options = CalibrationOptions::new("fixture").at(at).with_fee_bps(30.0);
    calibrate(&records, "raydium", &options).unwrap().model
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[test]
fn save_then_load_round_trips() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(temp_dir.path());
    let model = calibrated(at(1_709_294_400), 60);

    let path = store.save(&model).unwrap();
    assert!(path.starts_with(temp_dir.path().join("raydium")));
    assert!(path.ends_with("20240301T120000Z_60.json"));

    let loaded = ModelStore::load(&path).unwrap();
    assert_eq!(loaded, model);
    assert!(loaded.is_calibrated());
}

#[test]
fn existing_versions_are_never_overwritten() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(temp_dir.path());
    let model = calibrated(at(1_709_294_400), 60);
    let path = store.save(&model).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut changed = model.clone();
    changed.fee_bps = 99.0;
    assert!(matches!(store.save(&changed), Err(StoreError::AlreadyExists(p)) if p == path));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn latest_picks_newest_calibration() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(temp_dir.path());
    store.save(&calibrated(at(1_709_294_400), 60)).unwrap();
    store.save(&calibrated(at(1_709_380_800), 40)).unwrap();
    store.save(&calibrated(at(1_709_294_400), 80)).unwrap();
    std::fs::write(temp_dir.path().join("raydium").join("README.txt"), "notes").unwrap();

    let versions = store.versions("raydium").unwrap();
    let sizes: Vec<_> = versions.iter().map(|v| v.sample_size).collect();
    assert_eq!(sizes, vec![60, 80, 40]);

    let latest = store.latest("raydium").unwrap();
    assert_eq!(latest.calibration.unwrap().sample_size, 40);

    assert!(store.versions("orca").unwrap().is_empty());
    assert!(matches!(store.latest("orca"), Err(StoreError::NoVersions(_))));
}

#[test]
fn corrupt_model_file_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("bad.json");
    std::fs::write(&path, r#"{"venue": "x"}"#).unwrap();
    assert!(matches!(ModelStore::load(&path), Err(StoreError::Invalid { .. })));
    assert!(matches!(
        ModelStore::load(&temp_dir.path().join("absent.json")),
        Err(StoreError::Io { .. })
    ));
}

#[test]
fn stored_model_drives_a_run_from_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(temp_dir.path());
    let path = store.save(&calibrated(at(1_709_294_400), 60)).unwrap();

    let toml = format!(
        "master_seed = 9\n[friction]\nenabled = true\nmodel_path = {:?}\nsize = 2.0\n",
        path.display().to_string()
    );
    let config = RunConfig::from_toml_str(&toml).unwrap();
    let model_path = config.friction.model_path.as_deref().unwrap();
    let runner = Runner::from_config(&config, Some(ModelStore::load(model_path).unwrap())).unwrap();

    let candles: Vec<Candle> = (0..120)
        .map(|i| {
            let p = 1.0 + 0.002 * i as f64;
            Candle::new(Timestamp::from_secs(60 * i), p, p * 1.01, p * 0.99, p * 1.005, 500.0)
        })
        .collect();
    let registry = PresetRegistry::builtin();
    let scenario = Scenario::new("TOKEN", registry.get("immediate_ladder").unwrap(), 0);

    let a = runner.run(&scenario, &candles);
    let b = runner.run(&scenario, &candles);
    assert!(a.executed().is_some());
    assert_eq!(a.outcome, b.outcome);
}
