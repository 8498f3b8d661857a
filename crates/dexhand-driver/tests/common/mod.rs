//! 驱动层集成测试的公共设施：模拟设备接到 Mock 串口上

#![allow(dead_code)]

use dexhand_driver::{
    ActuatorBankSim, ActuatorDriver, ActuatorDriverConfig, ReconnectPolicy, SensorBoxSim,
    SensorDriverConfig, TouchSensorDriver,
};
use dexhand_serial::{MockConnector, MockSerialAdapter};
use std::sync::Arc;
use std::time::Duration;

pub const SENSOR_PORT: &str = "/dev/ttySIM0";
pub const ACTUATOR_PORT: &str = "/dev/ttySIM1";

/// 等待条件成立
pub fn wait_for_condition<F>(mut condition: F, timeout_ms: u64) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if condition() {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(2));
    }

    Err(format!("Timeout after {}ms", timeout_ms))
}

/// 连接到模拟器的传感器驱动，以及用来检查/操纵它的句柄
pub struct SensorRig {
    pub sim: SensorBoxSim,
    pub device: MockSerialAdapter,
    pub connector: Arc<MockConnector>,
    pub driver: TouchSensorDriver,
}

/// 测试用的快速配置：不等待 settle，重连退避很短
pub fn fast_sensor_config() -> SensorDriverConfig {
    SensorDriverConfig {
        port_name: SENSOR_PORT.to_string(),
        poll_interval: Duration::from_millis(2),
        settle_override: Some(Duration::ZERO),
        reconnect: ReconnectPolicy {
            attempts_per_port: 1,
            retry_delay: Duration::from_millis(1),
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        },
        ..Default::default()
    }
}

pub fn sensor_device(sim: &SensorBoxSim) -> MockSerialAdapter {
    let responder = sim.clone();
    MockSerialAdapter::with_responder(move |req| responder.respond(req)).named(SENSOR_PORT)
}

pub fn sensor_rig_with(config: SensorDriverConfig) -> SensorRig {
    let sim = SensorBoxSim::new();
    let device = sensor_device(&sim);
    let connector = Arc::new(MockConnector::single(SENSOR_PORT, device.clone()));
    let driver = TouchSensorDriver::connect(Box::new(connector.clone()), config)
        .expect("sensor simulator should accept the handshake");
    sim.clear_history();
    SensorRig {
        sim,
        device,
        connector,
        driver,
    }
}

pub fn sensor_rig() -> SensorRig {
    sensor_rig_with(fast_sensor_config())
}

pub struct ActuatorRig {
    pub sim: ActuatorBankSim,
    pub device: MockSerialAdapter,
    pub connector: Arc<MockConnector>,
    pub driver: ActuatorDriver,
}

pub fn fast_actuator_config() -> ActuatorDriverConfig {
    ActuatorDriverConfig {
        poll_interval: Duration::from_millis(5),
        retry_delay: Duration::from_millis(1),
        reply_settle: Duration::ZERO,
        reopen_interval: Duration::ZERO,
        ..Default::default()
    }
}

pub fn actuator_rig() -> ActuatorRig {
    let sim = ActuatorBankSim::new();
    let responder = sim.clone();
    let device = MockSerialAdapter::with_responder(move |req| responder.respond(req));
    let connector = Arc::new(MockConnector::single(ACTUATOR_PORT, device.clone()));
    let driver = ActuatorDriver::open(
        Box::new(connector.clone()),
        ACTUATOR_PORT,
        115_200,
        fast_actuator_config(),
    )
    .unwrap();
    ActuatorRig {
        sim,
        device,
        connector,
        driver,
    }
}
