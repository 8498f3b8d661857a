//! # Dexhand Protocol
//!
//! 灵巧手两类串口设备的帧协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `checksum`: LRC 与 8 位累加和校验
//! - `sensor`: 触觉传感器控制盒的命令表与应答帧解析
//! - `actuator`: 电缸（伺服执行器）寄存器读写命令与状态帧解析
//! - `force`: 三维力数据的字节解码
//!
//! ## 帧格式
//!
//! ```text
//! 传感器：55 AA 7B 7B | fixedId index mainCmd subCmd.. [errorCode] len(LE) payload | LRC | 55 AA 7D 7D
//! 电缸：  55 AA (命令) / AA 55 (应答) | L id cmd payload | SUM
//! ```
//!
//! ## 字节序
//!
//! 两种协议的多字节字段均为小端（Intel）字节序。

pub mod actuator;
pub mod checksum;
pub mod force;
pub mod sensor;

// 重新导出常用类型
pub use actuator::*;
pub use checksum::{lrc, sum8};
pub use force::*;
pub use sensor::*;

use thiserror::Error;

/// 帧解析错误类型
///
/// 这两类错误都表示"本周期没有可用应答"，而不是致命错误：
/// 半双工读取可能与设备发送发生竞争，调用方可以把校验失败视为数据不完整。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Malformed frame ({len} bytes): {reason}")]
    MalformedFrame { reason: &'static str, len: usize },

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    pub(crate) fn malformed(reason: &'static str, len: usize) -> Self {
        FrameError::MalformedFrame { reason, len }
    }
}

/// 协议使用错误（编程错误）
///
/// 在调用点立即失败，不重试，也不会被静默修正。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolUsageError {
    #[error("Invalid axis id: {0} (expected 1..=6)")]
    InvalidAxis(u8),

    #[error("Invalid sensor port: {0} (expected 1..=10)")]
    InvalidPort(u8),

    #[error("Command `{command}` requires a length parameter")]
    MissingLength { command: &'static str },

    #[error("Command `{command}` does not take a length parameter")]
    UnexpectedLength { command: &'static str },

    #[error("Unsupported control mode: {0}")]
    InvalidMode(u8),

    #[error("Register write takes 1..={max} values, got {actual}")]
    RegisterCount { max: usize, actual: usize },

    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i32 },
}

/// 小端字节序转 i16
pub fn bytes_to_i16_le(bytes: [u8; 2]) -> i16 {
    i16::from_le_bytes(bytes)
}

/// 小端字节序转 u16
pub fn bytes_to_u16_le(bytes: [u8; 2]) -> u16 {
    u16::from_le_bytes(bytes)
}

/// i16 转小端字节序（按补码写入 16 位寄存器）
pub fn i16_to_bytes_le(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_i16_le() {
        assert_eq!(bytes_to_i16_le([0x34, 0x12]), 0x1234);
        assert_eq!(bytes_to_i16_le([0xFF, 0xFF]), -1);
        assert_eq!(bytes_to_i16_le([0x00, 0x80]), i16::MIN);
    }

    #[test]
    fn test_bytes_to_u16_le() {
        assert_eq!(bytes_to_u16_le([0xFF, 0xFF]), 65535);
        assert_eq!(bytes_to_u16_le([0xE8, 0x03]), 1000);
    }

    #[test]
    fn test_i16_to_bytes_le_negative() {
        assert_eq!(i16_to_bytes_le(-1), [0xFF, 0xFF]);
        assert_eq!(i16_to_bytes_le(1200), [0xB0, 0x04]);
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::ChecksumMismatch {
            expected: 0xB4,
            actual: 0x00,
        };
        assert_eq!(
            err.to_string(),
            "Checksum mismatch: expected 0xB4, got 0x00"
        );

        let err = FrameError::malformed("bad head", 3);
        assert!(err.to_string().contains("bad head"));
    }
}
