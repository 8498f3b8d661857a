//! 抓取命令：抓取、松开、复位

use crate::signal::shutdown_channel;
use anyhow::{Context, Result, bail};
use clap::Args;
use crossbeam_channel::RecvTimeoutError;
use dexhand_sdk::{GraspState, HardwareContext};
use std::time::{Duration, Instant};
use tracing::info;

/// 抓取命令参数
#[derive(Args, Debug)]
pub struct GraspCommand {
    /// 超时（秒）；不指定时一直等到抓稳或 Ctrl+C
    #[arg(short, long)]
    pub timeout: Option<u64>,
}

impl GraspCommand {
    pub fn execute(&self, ctx: &HardwareContext) -> Result<()> {
        let shutdown = shutdown_channel()?;
        let deadline = self.timeout.map(|s| Instant::now() + Duration::from_secs(s));

        ctx.start_grasp_loop().context("启动抓取循环失败")?;
        println!("🤏 抓取中，按 Ctrl+C 中止...");

        let outcome = loop {
            if ctx.grasp_state() == GraspState::Grasped {
                break Ok(());
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break Err(anyhow::anyhow!("抓取超时"));
            }
            match shutdown.recv_timeout(Duration::from_millis(50)) {
                Err(RecvTimeoutError::Timeout) => {},
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    break Err(anyhow::anyhow!("抓取被中止"));
                },
            }
        };

        ctx.stop_grasp_loop();
        info!("Grasp command finished in state {}", ctx.grasp_state());
        match outcome {
            Ok(()) => {
                println!("✅ {}", GraspState::Grasped.label());
                Ok(())
            },
            Err(e) => bail!("{}（当前状态: {}）", e, ctx.grasp_state().label()),
        }
    }
}

/// 松开抓取手指
pub fn release(ctx: &HardwareContext) -> Result<()> {
    ctx.release().context("松开失败")?;
    println!("✅ 已松开");
    Ok(())
}

/// 清除故障并回到复位位置
pub fn reset(ctx: &HardwareContext) -> Result<()> {
    ctx.reset_grasp().context("复位失败")?;
    println!("✅ 已复位");
    Ok(())
}
