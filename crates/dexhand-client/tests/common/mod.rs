//! 客户端集成测试的公共设施：两个模拟设备 + 硬件上下文

#![allow(dead_code)]

use dexhand_client::{HandConfig, HardwareContext};
use dexhand_driver::{ActuatorBankSim, SensorBoxSim};
use dexhand_serial::{MockConnector, MockSerialAdapter};
use std::time::Duration;

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

/// 不等待 settle、轮询很快的配置
pub fn fast_config() -> HandConfig {
    let mut config = HandConfig::default();
    config.actuator.poll_interval_ms = 5;
    config.actuator.retry_delay_ms = 1;
    config.actuator.reply_settle_ms = 0;
    config.sensor.poll_interval_ms = 2;
    config.sensor.settle_override_ms = Some(0);
    config.sensor.reconnect.retry_delay_ms = 1;
    config.sensor.reconnect.initial_backoff_ms = 5;
    config.sensor.reconnect.max_backoff_ms = 20;
    config.grasp.loop_slice_ms = 1;
    config.grasp.loop_slices = 2;
    config
}

pub struct SimHand {
    pub actuator: ActuatorBankSim,
    pub sensor: SensorBoxSim,
    pub ctx: HardwareContext,
}

pub fn sim_hand(config: HandConfig) -> SimHand {
    let actuator = ActuatorBankSim::new();
    let sensor = SensorBoxSim::new();

    let responder = actuator.clone();
    let actuator_device = MockSerialAdapter::with_responder(move |req| responder.respond(req));
    let responder = sensor.clone();
    let sensor_device = MockSerialAdapter::with_responder(move |req| responder.respond(req));

    let actuator_connector = MockConnector::single(&config.actuator.port, actuator_device);
    let sensor_connector = MockConnector::single(&config.sensor.port, sensor_device);

    let ctx = HardwareContext::with_connectors(
        config,
        Box::new(actuator_connector),
        Box::new(sensor_connector),
    )
    .expect("simulated hardware should come up");

    SimHand {
        actuator,
        sensor,
        ctx,
    }
}

impl SimHand {
    /// 等待两个轮询线程都至少完成一轮
    pub fn wait_until_polled(&self) {
        wait_for_condition(
            || {
                let status = self.ctx.status();
                status.axes.iter().all(|a| a.status.is_some())
                    && status.fingers.iter().all(|f| f.force.is_some())
            },
            2000,
        )
        .expect("pollers should fill both tables");
    }

    pub fn wait_for_magnitude(&self, sensor: u8, at_least: f64) {
        wait_for_condition(
            || {
                self.ctx
                    .sensor()
                    .force(sensor)
                    .is_some_and(|f| f.magnitude() >= at_least)
            },
            2000,
        )
        .expect("sensor reading should settle");
    }
}
