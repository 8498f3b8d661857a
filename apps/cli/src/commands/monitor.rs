//! 监控命令

use crate::commands::status::format_status;
use crate::signal::shutdown_channel;
use anyhow::Result;
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use dexhand_sdk::HardwareContext;
use std::time::Duration;

/// 监控命令参数
#[derive(Args, Debug)]
pub struct MonitorCommand {
    /// 刷新间隔（毫秒）
    #[arg(short, long, default_value_t = 200)]
    pub interval_ms: u64,
}

impl MonitorCommand {
    pub fn execute(&self, ctx: &HardwareContext) -> Result<()> {
        let shutdown = shutdown_channel()?;
        let interval = Duration::from_millis(self.interval_ms.max(10));
        println!("📊 监控中（{} ms）...", interval.as_millis());
        println!("按 Ctrl+C 停止\n");

        loop {
            // 清屏并回到左上角
            print!("\x1B[2J\x1B[H");
            print!("{}", format_status(&ctx.status()));

            let metrics = ctx.metrics();
            println!(
                "\n电缸帧 {}/{}  传感器帧 {}/{}  重连 {}",
                metrics.actuator.replies_decoded,
                metrics.actuator.frames_sent,
                metrics.sensor.replies_decoded,
                metrics.sensor.frames_sent,
                metrics.sensor.reconnects,
            );

            match shutdown.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(())
    }
}
