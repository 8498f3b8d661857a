//! # Dexhand Serial Transport Layer
//!
//! 串口传输层：电缸总线和传感器控制盒各占一条物理串口，
//! 多个逻辑命令复用同一条半双工连接。
//!
//! - [`SerialAdapter`]: 字节级双工端口（写入 / 读出当前缓冲的全部字节）
//! - [`SerialConnector`]: 扫描并打开端口，用于首次连接和断线重连
//! - [`TransportChannel`]: 以互斥锁串行化每一对请求/应答

use thiserror::Error;

pub mod channel;
pub mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use channel::{TransportChannel, TransportSession};
pub use port::{PortFilter, SerialPortAdapter, SystemConnector};

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockSerialAdapter};

/// 传输层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 打开或写入失败，连接已不可用
    #[error("Serial link disconnected: {reason}")]
    Disconnected { reason: String },

    /// 端口枚举失败
    #[error("Port scan failed: {0}")]
    Scan(String),
}

impl TransportError {
    pub fn disconnected(reason: impl Into<String>) -> Self {
        TransportError::Disconnected {
            reason: reason.into(),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, TransportError::Disconnected { .. })
    }
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        TransportError::disconnected(e.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::disconnected(e.to_string())
    }
}

/// 字节级串口抽象
///
/// 实现不需要线程安全，[`TransportChannel`] 负责加锁。
pub trait SerialAdapter: Send {
    /// 写入全部字节，返回写入的字节数
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// 读出当前已缓冲的全部字节，没有数据时立即返回空
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;

    /// 丢弃接收缓冲区中的残留数据
    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.read_available().map(|_| ())
    }

    /// 端口名称（日志使用）
    fn port_name(&self) -> &str {
        "<unnamed>"
    }
}

/// 端口发现与打开
pub trait SerialConnector: Send + Sync {
    /// 列出符合设备过滤条件的候选端口
    fn scan(&self) -> Result<Vec<String>, TransportError>;

    /// 打开指定端口
    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialAdapter>, TransportError>;
}

impl<T: SerialConnector + ?Sized> SerialConnector for std::sync::Arc<T> {
    fn scan(&self) -> Result<Vec<String>, TransportError> {
        (**self).scan()
    }

    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialAdapter>, TransportError> {
        (**self).open(port, baud_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::disconnected("write failed");
        assert_eq!(err.to_string(), "Serial link disconnected: write failed");
        assert!(err.is_disconnected());
        assert!(!TransportError::Scan("x".into()).is_disconnected());
    }

    #[test]
    fn test_io_error_maps_to_disconnected() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: TransportError = io.into();
        assert!(err.is_disconnected());
    }
}
