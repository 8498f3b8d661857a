//! 客户端层错误类型定义

use dexhand_driver::DriverError;
use dexhand_protocol::ProtocolUsageError;
use std::path::PathBuf;
use thiserror::Error;

/// 客户端层错误类型
#[derive(Error, Debug)]
pub enum HandError {
    /// 驱动层错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 调用参数错误（DOF 编号、端口号等）
    #[error("Usage error: {0}")]
    Usage(#[from] ProtocolUsageError),

    /// 配置校验失败
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// 配置文件读写失败
    #[error("Failed to access config file {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置序列化失败
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl HandError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        HandError::Config(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_serial::TransportError;

    #[test]
    fn test_hand_error_display() {
        let err = HandError::from(DriverError::from(TransportError::disconnected("unplugged")));
        assert!(err.to_string().starts_with("Driver error:"));

        let err = HandError::config("step must be positive");
        assert_eq!(err.to_string(), "Invalid configuration: step must be positive");

        let err = HandError::from(ProtocolUsageError::InvalidAxis(7));
        assert!(err.to_string().contains("7"));
    }
}
