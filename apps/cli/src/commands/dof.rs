//! 单轴命令：移动与清除故障

use anyhow::{Context, Result};
use clap::Args;
use dexhand_sdk::HardwareContext;
use dexhand_sdk::protocol::ControlMode;

/// 单轴移动命令参数
#[derive(Args, Debug)]
pub struct SetDofCommand {
    /// 电缸编号（1-6）
    #[arg(long)]
    pub dof: u8,

    /// 目标位置
    #[arg(long, allow_negative_numbers = true)]
    pub value: i16,

    /// 速度（不指定时使用配置中的默认值）
    #[arg(long)]
    pub velocity: Option<i16>,
}

impl SetDofCommand {
    pub fn execute(&self, ctx: &HardwareContext) -> Result<()> {
        let moved = match self.velocity {
            Some(velocity) => {
                ctx.set_mode(ControlMode::Positioning, self.dof)
                    .with_context(|| format!("切换 DOF {} 到定位模式失败", self.dof))?;
                ctx.set_position_with_velocity(self.dof, self.value, velocity)
            },
            None => ctx.set_dof(self.dof, self.value),
        };
        moved.with_context(|| format!("移动 DOF {} 失败", self.dof))?;

        println!("✅ DOF {} -> {}", self.dof, self.value);
        Ok(())
    }
}

/// 清除故障命令参数
#[derive(Args, Debug)]
pub struct ClearFaultCommand {
    /// 电缸编号（1-6）；不指定时清除全部
    #[arg(long)]
    pub dof: Option<u8>,
}

impl ClearFaultCommand {
    pub fn execute(&self, ctx: &HardwareContext) -> Result<()> {
        ctx.clear_fault(self.dof).context("清除故障失败")?;
        match self.dof {
            Some(dof) => println!("✅ 已清除 DOF {} 故障", dof),
            None => println!("✅ 已清除全部故障"),
        }
        Ok(())
    }
}
