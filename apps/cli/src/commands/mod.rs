//! CLI 命令

pub mod config;
pub mod dof;
pub mod grasp;
pub mod monitor;
pub mod status;

pub use config::ConfigCommand;
pub use dof::{ClearFaultCommand, SetDofCommand};
pub use grasp::GraspCommand;
pub use monitor::MonitorCommand;
pub use status::StatusCommand;

use anyhow::{Context, Result};
use dexhand_sdk::{HandConfig, HardwareContext};
use std::path::Path;

/// 读取配置；未指定路径时使用默认值
pub fn load_config(path: Option<&Path>) -> Result<HandConfig> {
    match path {
        Some(path) => HandConfig::load(path)
            .with_context(|| format!("加载配置文件 {} 失败", path.display())),
        None => Ok(HandConfig::default()),
    }
}

/// 按配置打开硬件
pub fn open_context(path: Option<&Path>) -> Result<HardwareContext> {
    let config = load_config(path)?;
    println!(
        "🔌 连接灵巧手（电缸 {}，传感器 {}）...",
        config.actuator.port, config.sensor.port
    );
    let ctx = HardwareContext::open(config).context("打开硬件失败")?;
    println!("✅ 已连接");
    Ok(ctx)
}
