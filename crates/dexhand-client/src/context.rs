//! 硬件上下文
//!
//! 启动时构建一次：打开电缸总线和传感器控制盒，启动两个轮询线程，创建抓取控制器。
//! 上层（命令行、Web、手势桥接）只通过引用使用它；drop 时依次停止抓取循环、
//! 轮询线程并关闭串口。

use crate::config::HandConfig;
use crate::error::HandError;
use crate::grasp::{GraspController, GraspState};
use dexhand_driver::{
    ActuatorDriver, FingerForce, MetricsSnapshot, SmoothedForce, TouchSensorDriver,
};
use dexhand_protocol::{ACTUATOR_COUNT, ActuatorStatus, AxisId, ControlMode};
use dexhand_serial::{PortFilter, SerialConnector, SystemConnector};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// 单个电缸的显示快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisView {
    pub axis: u8,
    /// `None` 表示本周期没有可用状态
    pub status: Option<ActuatorStatus>,
}

/// 单个手指传感器的显示快照
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FingerView {
    pub finger: u8,
    pub port: u8,
    /// 平滑后的 (fx, fy, fz)
    pub force: Option<[f64; 3]>,
    pub magnitude: Option<f64>,
    /// `-1` 链路断开，`0` 正常，其他为设备错误码
    pub error_code: i16,
}

impl From<&FingerForce> for FingerView {
    fn from(f: &FingerForce) -> Self {
        Self {
            finger: f.finger,
            port: f.port.get(),
            force: f.force.as_ref().map(SmoothedForce::as_array),
            magnitude: f.force.as_ref().map(SmoothedForce::magnitude),
            error_code: f.error.as_code(),
        }
    }
}

/// 整手状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandStatus {
    pub axes: Vec<AxisView>,
    pub fingers: Vec<FingerView>,
    pub grasp_state: GraspState,
    pub actuator_connected: bool,
    pub sensor_connected: bool,
}

/// 两个驱动的链路指标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandMetrics {
    pub actuator: MetricsSnapshot,
    pub sensor: MetricsSnapshot,
}

/// 硬件上下文
pub struct HardwareContext {
    config: HandConfig,
    actuator: Arc<ActuatorDriver>,
    sensor: Arc<TouchSensorDriver>,
    grasp: GraspController,
    /// 串行化复合命令（复位、开始抓取），避免与另一个调用方交错
    command_lock: Mutex<()>,
}

impl HardwareContext {
    /// 使用系统串口打开硬件
    pub fn open(config: HandConfig) -> Result<Self, HandError> {
        let filter = PortFilter::new(config.sensor.scan_patterns.clone());
        let filter = match config.sensor.usb_vid {
            Some(vid) => filter.with_usb_vid(vid),
            None => filter,
        };
        Self::with_connectors(
            config,
            Box::new(SystemConnector::new(PortFilter::default())),
            Box::new(SystemConnector::new(filter)),
        )
    }

    /// 使用指定的连接器打开硬件（测试时传入模拟设备）
    pub fn with_connectors(
        config: HandConfig,
        actuator_connector: Box<dyn SerialConnector>,
        sensor_connector: Box<dyn SerialConnector>,
    ) -> Result<Self, HandError> {
        config.validate()?;

        let actuator = Arc::new(ActuatorDriver::open(
            actuator_connector,
            &config.actuator.port,
            config.actuator.baud_rate,
            config.actuator_driver_config(),
        )?);
        let sensor = Arc::new(TouchSensorDriver::connect(
            sensor_connector,
            config.sensor_driver_config()?,
        )?);

        actuator.start_polling()?;
        sensor.start_polling()?;

        let grasp = GraspController::new(sensor.clone(), actuator.clone(), config.grasp.clone())?;
        info!(
            "Hardware context ready (actuator {}, sensor {})",
            config.actuator.port, config.sensor.port
        );

        Ok(Self {
            config,
            actuator,
            sensor,
            grasp,
            command_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &HandConfig {
        &self.config
    }

    pub fn actuator(&self) -> &ActuatorDriver {
        &self.actuator
    }

    pub fn sensor(&self) -> &TouchSensorDriver {
        &self.sensor
    }

    pub fn grasp(&self) -> &GraspController {
        &self.grasp
    }

    /// 全部 6 个电缸、全部手指力和抓取状态
    pub fn status(&self) -> HandStatus {
        let statuses = self.actuator.statuses();
        let axes = (0..ACTUATOR_COUNT)
            .map(|i| AxisView {
                axis: i as u8 + 1,
                status: statuses.get(i).copied().flatten(),
            })
            .collect();

        HandStatus {
            axes,
            fingers: self.sensor.forces().iter().map(FingerView::from).collect(),
            grasp_state: self.grasp.state(),
            actuator_connected: self.actuator.is_connected(),
            sensor_connected: self.sensor.is_connected(),
        }
    }

    pub fn metrics(&self) -> HandMetrics {
        HandMetrics {
            actuator: self.actuator.metrics(),
            sensor: self.sensor.metrics(),
        }
    }

    pub fn grasp_state(&self) -> GraspState {
        self.grasp.state()
    }

    // ------------------------------------------------------------------
    // 命令
    // ------------------------------------------------------------------

    pub fn set_mode(&self, mode: ControlMode, dof: u8) -> Result<(), HandError> {
        Ok(self.actuator.set_mode(mode, AxisId::new(dof)?)?)
    }

    pub fn set_position_with_velocity(
        &self,
        dof: u8,
        position: i16,
        velocity: i16,
    ) -> Result<(), HandError> {
        Ok(self
            .actuator
            .set_position_with_velocity(position, velocity, AxisId::new(dof)?)?)
    }

    /// 单轴移动：切到定位模式，再以配置的速度移动
    pub fn set_dof(&self, dof: u8, position: i16) -> Result<(), HandError> {
        let axis = AxisId::new(dof)?;
        self.actuator.set_mode(ControlMode::Positioning, axis)?;
        self.actuator
            .set_position_with_velocity(position, self.config.actuator.set_dof_velocity, axis)?;
        Ok(())
    }

    /// 清除故障；`None` 时清除全部轴
    pub fn clear_fault(&self, dof: Option<u8>) -> Result<(), HandError> {
        let axis = dof.map(AxisId::new).transpose()?;
        Ok(self.actuator.clear_fault(axis)?)
    }

    /// 停止抓取，清除故障，全部手指回到复位位置，状态回到 `Idle`
    pub fn reset_grasp(&self) -> Result<(), HandError> {
        let _guard = self.command_lock.lock();
        self.grasp.reset();
        self.actuator.clear_fault(None)?;
        self.actuator.reset_grasp()?;
        info!("Grasp reset");
        Ok(())
    }

    /// 清除故障后启动抓取循环（重复调用无副作用）
    pub fn start_grasp_loop(&self) -> Result<(), HandError> {
        let _guard = self.command_lock.lock();
        if self.grasp.is_running() {
            return Ok(());
        }
        self.actuator.clear_fault(None)?;
        self.grasp.start_loop()
    }

    /// 停止抓取循环（重复调用无副作用）
    pub fn stop_grasp_loop(&self) {
        self.grasp.stop_loop();
    }

    pub fn release(&self) -> Result<(), HandError> {
        self.grasp.release()
    }

    /// 停止所有后台任务并关闭串口
    pub fn shutdown(&self) {
        self.grasp.stop_loop();
        self.sensor.close();
        self.actuator.close();
        info!("Hardware context closed");
    }
}

impl Drop for HardwareContext {
    fn drop(&mut self) {
        if self.grasp.is_running() {
            warn!("Hardware context dropped while grasping");
        }
        self.shutdown();
    }
}
