//! # Dexhand CLI
//!
//! 灵巧手命令行工具。每条命令都会：读取配置 -> 打开两条串口 -> 执行 -> 关闭。
//!
//! ```bash
//! # 生成默认配置
//! dexhand-cli config init hand.toml
//!
//! # 查看状态
//! dexhand-cli --config hand.toml status
//! dexhand-cli status --json
//!
//! # 单轴移动 / 清除故障
//! dexhand-cli set-dof --dof 5 --value 800
//! dexhand-cli clear-fault
//!
//! # 抓取直到稳定（Ctrl+C 中止）
//! dexhand-cli grasp
//! dexhand-cli release
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod signal;

use commands::{
    ClearFaultCommand, ConfigCommand, GraspCommand, MonitorCommand, SetDofCommand, StatusCommand,
};

/// Dexhand CLI - 灵巧手命令行工具
#[derive(Parser, Debug)]
#[command(name = "dexhand-cli")]
#[command(about = "Command-line interface for the dexterous hand", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件（TOML）；不指定时使用默认配置
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 打印一次整手状态
    Status {
        #[command(flatten)]
        args: StatusCommand,
    },

    /// 周期刷新状态表
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },

    /// 单轴移动
    SetDof {
        #[command(flatten)]
        args: SetDofCommand,
    },

    /// 清除电缸故障
    ClearFault {
        #[command(flatten)]
        args: ClearFaultCommand,
    },

    /// 复位：清除故障，全部手指回到复位位置
    Reset,

    /// 运行抓取循环直到稳定
    Grasp {
        #[command(flatten)]
        args: GraspCommand,
    },

    /// 松开抓取手指
    Release,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dexhand_cli=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(config_path),

        Commands::Status { args } => {
            let ctx = commands::open_context(config_path)?;
            args.execute(&ctx)
        },

        Commands::Monitor { args } => {
            let ctx = commands::open_context(config_path)?;
            args.execute(&ctx)
        },

        Commands::SetDof { args } => {
            let ctx = commands::open_context(config_path)?;
            args.execute(&ctx)
        },

        Commands::ClearFault { args } => {
            let ctx = commands::open_context(config_path)?;
            args.execute(&ctx)
        },

        Commands::Reset => {
            let ctx = commands::open_context(config_path)?;
            commands::grasp::reset(&ctx)
        },

        Commands::Grasp { args } => {
            let ctx = commands::open_context(config_path)?;
            args.execute(&ctx)
        },

        Commands::Release => {
            let ctx = commands::open_context(config_path)?;
            commands::grasp::release(&ctx)
        },
    }
}
