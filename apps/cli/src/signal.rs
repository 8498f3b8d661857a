//! Ctrl+C 退出信号

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded};

/// 安装 Ctrl+C 处理器，返回收到信号时可读的通道
pub fn shutdown_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        eprintln!("\n收到退出信号，正在关闭...");
        // 连按两次时通道已满，忽略即可
        let _ = tx.try_send(());
    })
    .context("安装 Ctrl+C 处理器失败")?;
    Ok(rx)
}
