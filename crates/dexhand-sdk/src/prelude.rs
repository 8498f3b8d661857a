//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use dexhand_sdk::prelude::*;
//! ```

// 客户端层
pub use crate::client::{
    FingerActuator, ForceSource, GraspController, GraspRule, GraspState, HandConfig, HandError,
    HandStatus, HardwareContext, MagnitudeMode, StabilityPredicate, TickOutcome,
};

// 驱动层（高级用户使用）
pub use crate::driver::{ActuatorDriver, DriverError, SmoothedForce, TouchSensorDriver};

// 协议层常用类型
pub use crate::protocol::{AxisId, ControlMode, PortId};

// 传输层
pub use crate::serial::{SerialAdapter, SerialConnector};
