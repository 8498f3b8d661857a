//! 驱动层模块
//!
//! 本模块提供灵巧手两条串口链路的设备驱动：
//! - [`ActuatorDriver`]: 6 路电缸（写寄存器、读状态、后台状态轮询）
//! - [`TouchSensorDriver`]: 触觉传感器控制盒（端口复用、力数据平滑、断线重连）
//!
//! 共享状态通过 [`SnapshotTable`]（每个条目一个 ArcSwap）发布，读者不会阻塞轮询线程。
//! 大多数用户应该使用 `dexhand-client` 提供的更高级接口。

pub mod actuator;
mod error;
pub mod metrics;
pub mod sensor;
pub mod sim;
pub mod smoothing;
pub mod state;
pub mod worker;

pub use actuator::{ActuatorDriver, ActuatorDriverConfig, FINGER_AXES, VOLTAGE_LIMIT};
pub use error::DriverError;
pub use metrics::{DriverMetrics, MetricsSnapshot};
pub use sensor::{
    FingerBinding, FingerForce, PortErrorState, ReconnectPolicy, SensorDriverConfig,
    TouchSensorDriver,
};
pub use sim::{ActuatorBankSim, RegisterWrite, SensorBoxSim};
pub use smoothing::{ForceSmoother, MAX_SMOOTHING_WINDOW, SmoothedForce};
pub use state::SnapshotTable;
pub use worker::{CancelToken, PollingWorker};
