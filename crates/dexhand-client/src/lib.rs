//! 客户端接口模块
//!
//! 本模块提供灵巧手的高层接口，包括：
//! - 闭环抓取控制器（[`GraspController`]）与可插拔的抓稳判定
//! - 手部配置（TOML，带默认值和校验）
//! - 硬件上下文（[`HardwareContext`]）：一次构建，统一关闭
//!
//! # 使用场景
//!
//! 这是大多数用户应该使用的模块。需要直接收发寄存器命令或读取原始力数据时，
//! 可以通过 [`HardwareContext::actuator`] / [`HardwareContext::sensor`] 访问驱动层。

pub mod capability;
pub mod config;
pub mod context;
mod error;
pub mod grasp;
pub mod rule;

pub use capability::{FingerActuator, ForceSource};
pub use config::{
    ActuatorConfig, GraspConfig, GraspFinger, HandConfig, ReconnectConfig, SensorBinding,
    SensorConfig,
};
pub use context::{AxisView, FingerView, HandMetrics, HandStatus, HardwareContext};
pub use error::HandError;
pub use grasp::{GraspController, GraspState, TickOutcome};
pub use rule::{GraspRule, MagnitudeMode, RulePredicate, SensorGroups, StabilityPredicate};
