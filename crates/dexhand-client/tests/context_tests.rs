//! 硬件上下文：状态快照与单轴命令

mod common;

use common::*;
use dexhand_client::{GraspState, HandError, HardwareContext};
use dexhand_protocol::{AxisId, Register};
use dexhand_driver::ActuatorBankSim;
use dexhand_serial::{MockConnector, MockSerialAdapter};

#[test]
fn test_status_snapshot() {
    let hand = sim_hand(fast_config());
    hand.sensor.set_force(5, [3, 0, 4]);
    hand.wait_until_polled();
    hand.wait_for_magnitude(5, 5.0);

    let status = hand.ctx.status();
    assert_eq!(status.axes.len(), 6);
    assert_eq!(status.axes[5].axis, 6);
    assert_eq!(status.fingers.len(), 7);
    assert!(status.fingers.iter().all(|f| f.error_code == 0));
    assert_eq!(status.fingers[4].force, Some([3.0, 0.0, 4.0]));
    assert_eq!(status.fingers[4].magnitude, Some(5.0));
    assert_eq!(status.grasp_state, GraspState::Idle);
    assert!(status.actuator_connected && status.sensor_connected);
}

#[test]
fn test_device_error_code_in_snapshot() {
    let hand = sim_hand(fast_config());
    hand.sensor.set_port_error(6, 0x09);
    wait_for_condition(|| hand.ctx.status().fingers[5].error_code == 9, 2000).unwrap();
    assert_eq!(hand.ctx.status().fingers[5].force, None);
}

#[test]
fn test_set_dof_switches_to_positioning() {
    let hand = sim_hand(fast_config());
    hand.ctx.set_dof(5, 800).unwrap();

    let writes = hand.actuator.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].register, u16::from(Register::Mode));
    assert_eq!(writes[0].values, vec![0]);
    assert_eq!(writes[1].values, vec![300, 800]);
    let axis = AxisId::new(5).unwrap();
    wait_for_condition(|| hand.ctx.actuator().position(axis) == Some(800), 2000).unwrap();
}

#[test]
fn test_invalid_dof_fails_fast() {
    let hand = sim_hand(fast_config());
    assert!(matches!(hand.ctx.set_dof(7, 100), Err(HandError::Usage(_))));
    assert!(matches!(hand.ctx.clear_fault(Some(0)), Err(HandError::Usage(_))));
    assert!(hand.actuator.writes().is_empty());
}

#[test]
fn test_missing_sensor_box_fails_to_open() {
    let config = fast_config();
    let bank = ActuatorBankSim::new();
    let actuator_connector = MockConnector::single(
        &config.actuator.port,
        MockSerialAdapter::with_responder(move |req| bank.respond(req)),
    );
    let sensor_connector = MockConnector::new(&[], |_| None);
    let result = HardwareContext::with_connectors(
        config,
        Box::new(actuator_connector),
        Box::new(sensor_connector),
    );
    assert!(matches!(result, Err(HandError::Driver(_))));
}

#[test]
fn test_shutdown_closes_links() {
    let hand = sim_hand(fast_config());
    hand.ctx.shutdown();
    let status = hand.ctx.status();
    assert!(!status.actuator_connected);
    assert!(!status.sensor_connected);
    assert!(status.fingers.iter().all(|f| f.error_code == -1));
}
