//! Durability tests: atomic state saves, reset semantics, and the
//! append-only history contract.

use tempfile::TempDir;

use greentwin::{
    store, HistoryLogger, MemoryOverrideLayer, Snapshot, TickStage, TwinConfig, TwinEngine,
    ZoneId,
};

fn engine_in(dir: &TempDir, seed: u64) -> TwinEngine<MemoryOverrideLayer> {
    let state = dir.path().join("state.json");
    let history = dir.path().join("history.jsonl");
    store::save(&Snapshot::template(), &state, TickStage::Idle).unwrap();
    TwinEngine::open(
        TwinConfig::default(),
        &state,
        &history,
        MemoryOverrideLayer::default(),
        seed,
    )
    .unwrap()
}

#[test]
fn save_is_atomic_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut snapshot = Snapshot::template();
    for i in 0..20 {
        snapshot.environment.set_temperature_c(20.0 + f64::from(i));
        store::save(&snapshot, &path, TickStage::Idle).unwrap();

        // After every save the file on disk is complete and parseable;
        // there is never a window where a partial write is visible at
        // the final path.
        let loaded = store::load(&path).unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!path.with_extension("json.tmp").exists());
    }
}

#[test]
fn truncated_state_file_fails_load_with_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    store::save(&Snapshot::template(), &path, TickStage::Idle).unwrap();

    // Simulate the torn write a non-atomic writer would leave behind.
    let full = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, &full[..full.len() / 2]).unwrap();

    let err = store::load(&path).unwrap_err();
    assert!(err.is_schema());
}

#[test]
fn save_failure_leaves_previous_state_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    store::save(&Snapshot::template(), &path, TickStage::Idle).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    // Saving onto a path whose name is taken by a directory cannot
    // complete the rename; the original file must be untouched.
    let blocked = dir.path().join("blocked.json");
    std::fs::create_dir(&blocked).unwrap();
    let mut snapshot = Snapshot::template();
    snapshot.environment.set_temperature_c(33.0);
    assert!(store::save(&snapshot, &blocked, TickStage::Logging).is_err());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn reset_restores_template_exactly_and_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let history = dir.path().join("history.jsonl");
    store::save(&Snapshot::template(), &state, TickStage::Idle).unwrap();

    let mut engine = TwinEngine::open(
        TwinConfig::default(),
        &state,
        &history,
        MemoryOverrideLayer::default(),
        7,
    )
    .unwrap();

    for _ in 0..3 {
        engine.tick().unwrap();
    }
    let history_before = std::fs::read_to_string(&history).unwrap();
    assert_ne!(engine.snapshot(), &Snapshot::template());

    engine.reset(None).unwrap();

    // Byte-for-byte field equality with the template.
    assert_eq!(engine.snapshot(), &Snapshot::template());
    assert_eq!(store::load(&state).unwrap(), Snapshot::template());

    // Prior history records are retained, unmodified.
    assert_eq!(std::fs::read_to_string(&history).unwrap(), history_before);
    assert_eq!(HistoryLogger::read_all(&history).unwrap().len(), 3);

    // Ticks after a reset keep appending to the same log.
    engine.tick().unwrap();
    let after = std::fs::read_to_string(&history).unwrap();
    assert!(after.starts_with(&history_before));
    assert_eq!(HistoryLogger::read_all(&history).unwrap().len(), 4);
}

#[test]
fn operator_override_scenario_is_fully_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = engine_in(&dir, 42);
    let id = ZoneId::parse("B03-C").unwrap();

    // Start state: soil 0.5, status ok. Operator pulls the moisture down.
    engine.override_zone_soil_moisture(id, 0.22).unwrap();

    // The override is persisted immediately, before any tick runs.
    let persisted = store::load(&dir.path().join("state.json")).unwrap();
    assert!((persisted.zone(id).unwrap().soil_moisture() - 0.22).abs() < 1e-12);

    let report = engine.tick().unwrap();

    // Classifier: dry. Controller: valve open. Applier: unhealthy class.
    assert!(report.alerts.contains(&id));
    assert_eq!(engine.snapshot().actuators.valve(), 1.0);

    let records = HistoryLogger::read_all(&dir.path().join("history.jsonl")).unwrap();
    let record = &records[0];
    assert_eq!(record.snapshot.zone(id).unwrap().status.to_string(), "dry");
    assert!(record
        .actuation
        .unhealthy_zones
        .iter()
        .any(|m| m.zone == id && m.status.to_string() == "dry"));
    assert!(record
        .actuation
        .actuator_writes
        .iter()
        .any(|w| w.actuator == "valve" && (w.value - 1.0).abs() < 1e-12));
}

#[test]
fn history_lines_survive_engine_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state.json");
    let history = dir.path().join("history.jsonl");
    store::save(&Snapshot::template(), &state, TickStage::Idle).unwrap();

    for round in 0..3_u64 {
        let mut engine = TwinEngine::open(
            TwinConfig::default(),
            &state,
            &history,
            MemoryOverrideLayer::default(),
            round,
        )
        .unwrap();
        engine.tick().unwrap();
    }

    let records = HistoryLogger::read_all(&history).unwrap();
    assert_eq!(records.len(), 3);
    for pair in records.windows(2) {
        assert!(pair[0].snapshot.timestamp < pair[1].snapshot.timestamp);
    }
}
