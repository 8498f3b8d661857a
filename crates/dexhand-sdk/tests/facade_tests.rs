//! 通过 SDK 门面使用整套协议栈

use dexhand_sdk::driver::{ActuatorBankSim, SensorBoxSim};
use dexhand_sdk::prelude::*;
use dexhand_sdk::serial::{MockConnector, MockSerialAdapter};
use std::time::{Duration, Instant};

fn open_sim_hand(sensor: &SensorBoxSim) -> HardwareContext {
    let mut config = HandConfig::default();
    config.actuator.poll_interval_ms = 5;
    config.actuator.reply_settle_ms = 0;
    config.sensor.poll_interval_ms = 2;
    config.sensor.settle_override_ms = Some(0);

    let bank = ActuatorBankSim::new();
    let actuator_connector = MockConnector::single(
        &config.actuator.port,
        MockSerialAdapter::with_responder(move |req| bank.respond(req)),
    );
    let responder = sensor.clone();
    let sensor_connector = MockConnector::single(
        &config.sensor.port,
        MockSerialAdapter::with_responder(move |req| responder.respond(req)),
    );

    HardwareContext::with_connectors(
        config,
        Box::new(actuator_connector),
        Box::new(sensor_connector),
    )
        .expect("simulated hand should open")
}

#[test]
fn test_prelude_drives_a_grasp_tick() {
    let sensor = SensorBoxSim::new();
    sensor.set_force(4, [0, 0, 50]);
    let ctx = open_sim_hand(&sensor);

    let deadline = Instant::now() + Duration::from_secs(2);
    while ctx.sensor().force(4).is_none_or(|f| f.magnitude() < 50.0) {
        assert!(Instant::now() < deadline, "sensor 4 never settled");
        std::thread::sleep(Duration::from_millis(2));
    }

    // 指腹 4 接触即满足默认判定
    assert_eq!(ctx.grasp().tick(), TickOutcome::Stable);
    assert_eq!(ctx.grasp_state(), GraspState::Grasped);
    assert_eq!(ctx.status().grasp_state.as_str(), "grasped");
}

#[test]
fn test_errors_convert_into_hand_error() {
    let transport = dexhand_sdk::TransportError::disconnected("unplugged");
    let err: HandError = DriverError::from(transport).into();
    assert!(matches!(err, HandError::Driver(_)));

    let err: HandError = AxisId::new(0).unwrap_err().into();
    assert!(matches!(err, HandError::Usage(_)));
}
