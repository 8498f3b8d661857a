//! 驱动层错误类型定义

use dexhand_protocol::{FrameError, ProtocolUsageError};
use dexhand_serial::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// 串口传输错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 应答帧损坏或不完整
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// 调用参数错误（不会重试）
    #[error("Usage error: {0}")]
    Usage(#[from] ProtocolUsageError),

    /// 设备在格式正确的应答中报告了非零错误码
    #[error("Device reported error code 0x{code:02X} for `{command}`")]
    Device { command: &'static str, code: u8 },

    /// 等待 settle 时间后没有收到应答
    #[error("No reply to `{command}`")]
    NoReply { command: &'static str },

    /// 握手失败（版本号或模式设置）
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// 手指没有绑定传感器端口
    #[error("Finger {0} has no sensor port binding")]
    UnknownFinger(u8),

    /// 没有找到可用的设备
    #[error("No device found on candidate ports: {0:?}")]
    DeviceNotFound(Vec<String>),

    /// 后台线程启动失败
    #[error("Worker thread error: {0}")]
    Thread(String),
}

impl DriverError {
    /// 是否为连接断开
    pub fn is_disconnected(&self) -> bool {
        matches!(self, DriverError::Transport(e) if e.is_disconnected())
    }

    /// 是否为"本周期无可用应答"类错误（可以重试）
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::Frame(_) | DriverError::NoReply { .. })
    }
}
