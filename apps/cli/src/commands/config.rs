//! 配置管理命令

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use dexhand_sdk::HandConfig;
use std::path::{Path, PathBuf};

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置（TOML）
    Show,

    /// 写出默认配置文件
    Init {
        /// 输出路径
        #[arg(default_value = "dexhand.toml")]
        path: PathBuf,

        /// 覆盖已存在的文件
        #[arg(short, long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, config_path: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => {
                let config = super::load_config(config_path)?;
                print!("{}", config.to_toml_string()?);
                Ok(())
            },

            ConfigCommand::Init { path, force } => {
                init_config(&path, force)?;
                println!("✅ 已写入默认配置: {}", path.display());
                Ok(())
            },
        }
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} 已存在（使用 --force 覆盖）", path.display());
    }
    HandConfig::default()
        .save(path)
        .with_context(|| format!("写入 {} 失败", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hand.toml");

        init_config(&path, false).unwrap();
        let loaded = super::super::load_config(Some(&path)).unwrap();
        assert_eq!(loaded, HandConfig::default());

        // 不带 --force 不覆盖
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(super::super::load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
