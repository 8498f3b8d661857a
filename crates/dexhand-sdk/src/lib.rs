//! Dexhand SDK - 灵巧手 Rust SDK
//!
//! 六轴电缸灵巧手 + 七路三维触觉传感器的串口通信与闭环抓取控制。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 两类设备的帧编解码与校验
//! - **传输层** (`serial`): 串口抽象、端口扫描、请求/应答串行化
//! - **驱动层** (`driver`): 轮询线程、快照表、断线重连
//! - **客户端层** (`client`): 抓取控制器、配置、硬件上下文
//!
//! # 快速开始
//!
//! 大多数用户应该使用硬件上下文：
//!
//! ```rust,no_run
//! use dexhand_sdk::prelude::*;
//!
//! # fn main() -> Result<(), HandError> {
//! dexhand_sdk::init_logger();
//! let ctx = HardwareContext::open(HandConfig::default())?;
//! ctx.start_grasp_loop()?;
//! # Ok(())
//! # }
//! ```
//!
//! 需要直接收发寄存器命令或读取原始力数据的用户可以使用驱动层：
//!
//! ```rust
//! use dexhand_sdk::driver::{ActuatorDriver, TouchSensorDriver};
//! ```

pub use dexhand_client as client;
pub use dexhand_driver as driver;
pub use dexhand_protocol as protocol;
pub use dexhand_serial as serial;

pub mod prelude;

// --- 用户以此为界 ---

// 各层错误
pub use dexhand_driver::DriverError;
pub use dexhand_protocol::{FrameError, ProtocolUsageError};
pub use dexhand_serial::TransportError;

// 客户端层（推荐入口）
pub use dexhand_client::{
    GraspController, GraspRule, GraspState, HandConfig, HandError, HandStatus, HardwareContext,
};

use tracing_subscriber::EnvFilter;

/// 默认日志过滤指令
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// 初始化全局日志（`RUST_LOG` 优先，否则 `info`）
///
/// 同时把 `log` crate 的记录桥接到 `tracing`。重复调用时保留第一次的设置，返回 `false`。
pub fn init_logger() -> bool {
    init_logger_with(DEFAULT_LOG_DIRECTIVE)
}

/// 以指定的默认指令初始化全局日志
pub fn init_logger_with(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    // log 的全局 logger 可能已被其他库占用，此时只保留 tracing 输出
    let _ = tracing_log::LogTracer::init();
    true
}
