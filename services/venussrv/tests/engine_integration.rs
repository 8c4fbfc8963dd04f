//! End-to-end tests: polling engine against an in-process Modbus TCP
//! device simulator.

mod common;

use std::sync::Arc;

use common::{config_for, Simulator};
use venus_model::Value;
use venussrv::engine::registry::build_engine;
use venussrv::VenusError;

#[tokio::test]
async fn scaled_read_end_to_end() {
    let sim = Simulator::start().await;
    // ac_voltage at 32200, scale 0.1
    sim.set_register(32200, 215);
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    let value = engine.read_value("ac_voltage").await.unwrap();
    assert_eq!(value, Some(Value::Float(21.5)));
    assert_eq!(engine.snapshot()["ac_voltage"], Value::Float(21.5));
}

#[tokio::test]
async fn multi_register_and_labelled_reads() {
    let sim = Simulator::start().await;
    // battery_power is a big-endian int32 at 32102
    sim.set_register(32102, 0xFFFF);
    sim.set_register(32103, 0xFC18); // -1000
    sim.set_register(35100, 2);
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    assert_eq!(
        engine.read_value("battery_power").await.unwrap(),
        Some(Value::Int(-1000))
    );
    assert_eq!(
        engine.read_value("inverter_state").await.unwrap(),
        Some(Value::Text("Charge".into()))
    );
}

#[tokio::test]
async fn writes_invert_scale_and_confirm() {
    let sim = Simulator::start().await;
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    // Scale 0.1: 30.0 % is stored as 300
    let ok = engine
        .write_value("discharging_cutoff_capacity", &Value::Float(30.0))
        .await
        .unwrap();
    assert!(ok);
    assert_eq!(sim.register(44001), Some(300));

    assert!(engine
        .write_value("user_work_mode", &Value::Text("Trade Mode".into()))
        .await
        .unwrap());
    assert_eq!(sim.register(43000), Some(2));

    assert!(engine
        .write_value("backup_function", &Value::Bool(false))
        .await
        .unwrap());
    assert_eq!(sim.register(41200), Some(1));

    assert!(engine.trigger("reset_device").await.unwrap());
    assert_eq!(sim.register(41000), Some(0x55AA));
}

#[tokio::test]
async fn validation_failures_touch_no_network() {
    let sim = Simulator::start().await;
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    assert!(matches!(
        engine.read_value("not_a_signal").await,
        Err(VenusError::Validation(_))
    ));
    assert!(matches!(
        engine
            .write_value("discharging_cutoff_capacity", &Value::Float(99.0))
            .await,
        Err(VenusError::Validation(_))
    ));
    assert!(matches!(
        engine
            .write_value("user_work_mode", &Value::Text("Warp Speed".into()))
            .await,
        Err(VenusError::Validation(_))
    ));
    assert!(matches!(
        engine.write_value("battery_soc", &Value::Int(50)).await,
        Err(VenusError::Validation(_))
    ));

    assert_eq!(sim.request_count(), 0);
}

#[tokio::test]
async fn concurrent_reads_are_serialized() {
    let sim = Simulator::start().await;
    sim.set_register(32104, 50);
    sim.set_response_delay(std::time::Duration::from_millis(30));
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.read_value("battery_soc").await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Some(Value::Int(50)));
    }
    assert_eq!(sim.max_in_flight(), 1);
}

#[tokio::test]
async fn exception_responses_retry_then_soften() {
    let sim = Simulator::start().await;
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    // Illegal data address: every attempt gets the exception, so the
    // full retry budget (3) is spent before the failure softens.
    sim.force_exception(0x02);
    assert_eq!(engine.read_value("battery_soc").await.unwrap(), None);
    assert_eq!(sim.request_count(), 3);

    assert!(!engine
        .write_value("backup_function", &Value::Bool(true))
        .await
        .unwrap());
    assert_eq!(sim.request_count(), 6);

    // A healthy device answers again without reconnecting
    sim.clear_exception();
    sim.set_register(32104, 55);
    assert_eq!(
        engine.read_value("battery_soc").await.unwrap(),
        Some(Value::Int(55))
    );
}

#[tokio::test]
async fn truncated_read_responses_retry_then_soften() {
    let sim = Simulator::start().await;
    sim.set_register(32102, 0);
    sim.set_register(32103, 1000);
    sim.truncate_reads(true);
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    // battery_power asks for two registers but only one comes back
    assert_eq!(engine.read_value("battery_power").await.unwrap(), None);
    assert_eq!(sim.request_count(), 3);

    sim.truncate_reads(false);
    assert_eq!(
        engine.read_value("battery_power").await.unwrap(),
        Some(Value::Int(1000))
    );
}

#[tokio::test]
async fn dead_link_is_a_soft_failure() {
    // Grab a port that nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = build_engine(&config_for(addr)).unwrap();
    assert_eq!(engine.read_value("battery_soc").await.unwrap(), None);
    assert!(!engine
        .write_value("user_work_mode", &Value::Text("Manual".into()))
        .await
        .unwrap());

    let diagnostics = engine.diagnostics().await;
    assert!(!diagnostics.suspended);
    assert_eq!(diagnostics.last_success_time, None);
}

#[tokio::test]
async fn poll_cycle_fills_the_snapshot() {
    let sim = Simulator::start().await;
    sim.set_register(32104, 73);
    sim.set_register(32105, 5120); // battery_total_energy, scale 0.001
    sim.set_register(35100, 3);
    let engine = build_engine(&config_for(sim.addr())).unwrap();

    let report = engine.run_cycle().await;
    assert!(report.attempted > 0);
    assert_eq!(report.succeeded, report.attempted);
    assert_eq!(report.timed_out, 0);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot["battery_soc"], Value::Int(73));
    assert_eq!(snapshot["battery_total_energy"], Value::Float(5.12));
    assert_eq!(snapshot["inverter_state"], Value::Text("Discharge".into()));

    // Derived values follow without any extra polling
    assert_eq!(
        engine.derived_value("stored_energy").unwrap(),
        Some(Value::Float(3.74))
    );
}
