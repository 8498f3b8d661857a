//! 抓取控制器依赖的两种能力
//!
//! 控制器只通过这两个 trait 读取力、读取位置和下发命令，
//! 测试里可以用纯内存实现替换真实驱动。

use dexhand_driver::{ActuatorDriver, DriverError, SmoothedForce, TouchSensorDriver};
use dexhand_protocol::AxisId;

/// 每个传感器的最近平滑力
pub trait ForceSource: Send + Sync {
    /// `None` 表示没有数据
    fn finger_force(&self, sensor: u8) -> Option<SmoothedForce>;
}

/// 手指电缸
pub trait FingerActuator: Send + Sync {
    /// 最近一次轮询到的位置
    fn finger_position(&self, axis: AxisId) -> Option<i16>;

    /// 带速度的位置命令（闭合）
    fn move_finger(&self, axis: AxisId, position: i16, velocity: i16) -> Result<(), DriverError>;

    /// 纯位置命令（释放）
    fn open_finger(&self, axis: AxisId, position: i16) -> Result<(), DriverError>;
}

impl ForceSource for TouchSensorDriver {
    fn finger_force(&self, sensor: u8) -> Option<SmoothedForce> {
        self.force(sensor)
    }
}

impl FingerActuator for ActuatorDriver {
    fn finger_position(&self, axis: AxisId) -> Option<i16> {
        self.position(axis)
    }

    fn move_finger(&self, axis: AxisId, position: i16, velocity: i16) -> Result<(), DriverError> {
        self.set_position_with_velocity(position, velocity, axis)
    }

    fn open_finger(&self, axis: AxisId, position: i16) -> Result<(), DriverError> {
        self.set_position(position, axis)
    }
}
