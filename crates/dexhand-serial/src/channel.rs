//! 串行化的传输通道
//!
//! 一条物理连接上的每个逻辑命令（写请求、等待、读应答）都在同一次加锁内完成，
//! 不同线程的命令不会在帧中间交错。

use crate::{SerialAdapter, TransportError};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, trace, warn};

/// 一次 drain 最多连续读取的次数（防止设备持续发送时无限循环）
const MAX_DRAIN_READS: usize = 64;

/// 传输通道
///
/// 句柄为 `None` 表示连接已断开；写入或读取失败时句柄被丢弃（关闭端口），
/// 之后的所有命令立即返回 [`TransportError::Disconnected`]，直到 [`TransportChannel::replace`]。
pub struct TransportChannel {
    label: &'static str,
    handle: Mutex<Option<Box<dyn SerialAdapter>>>,
}

impl TransportChannel {
    pub fn new(label: &'static str, adapter: Box<dyn SerialAdapter>) -> Self {
        Self {
            label,
            handle: Mutex::new(Some(adapter)),
        }
    }

    /// 创建一个尚未连接的通道
    pub fn disconnected(label: &'static str) -> Self {
        Self {
            label,
            handle: Mutex::new(None),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_connected(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// 获取独占会话，会话期间其他线程的命令全部等待
    pub fn session(&self) -> TransportSession<'_> {
        TransportSession {
            label: self.label,
            guard: self.handle.lock(),
        }
    }

    pub fn send(&self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.session().send(bytes)
    }

    pub fn drain_all(&self, settle: Duration) -> Result<Vec<u8>, TransportError> {
        self.session().drain_all(settle)
    }

    /// 发送请求并读取应答（一次加锁）
    pub fn transact(&self, request: &[u8], settle: Duration) -> Result<Vec<u8>, TransportError> {
        self.session().transact(request, settle)
    }

    /// 安装新连接（重连成功后调用），旧句柄被关闭
    pub fn replace(&self, adapter: Box<dyn SerialAdapter>) {
        let mut guard = self.handle.lock();
        info!("{}: connected to {}", self.label, adapter.port_name());
        *guard = Some(adapter);
    }

    /// 关闭连接
    pub fn close(&self) {
        if let Some(adapter) = self.handle.lock().take() {
            info!("{}: closed {}", self.label, adapter.port_name());
        }
    }
}

impl std::fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportChannel")
            .field("label", &self.label)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// 持有通道锁的会话
///
/// 用于需要多次往返但不能被其他命令插入的操作（例如先选端口再读力）。
pub struct TransportSession<'a> {
    label: &'static str,
    guard: MutexGuard<'a, Option<Box<dyn SerialAdapter>>>,
}

impl TransportSession<'_> {
    pub fn is_connected(&self) -> bool {
        self.guard.is_some()
    }

    fn adapter(&mut self) -> Result<&mut Box<dyn SerialAdapter>, TransportError> {
        self.guard
            .as_mut()
            .ok_or_else(|| TransportError::disconnected("no open handle"))
    }

    /// 出错时关闭句柄，保证之后的命令立即失败
    fn drop_handle(&mut self, err: &TransportError) {
        if let Some(adapter) = self.guard.take() {
            warn!("{}: {} lost: {}", self.label, adapter.port_name(), err);
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let label = self.label;
        let result = self.adapter()?.write(bytes);
        match result {
            Ok(n) => {
                trace!("{} TX [{}]", label, hex::encode_upper(bytes));
                Ok(n)
            },
            Err(e) => {
                self.drop_handle(&e);
                Err(e)
            },
        }
    }

    /// 等待 settle 时间后读出全部缓冲字节；返回空表示没有应答
    pub fn drain_all(&mut self, settle: Duration) -> Result<Vec<u8>, TransportError> {
        if !settle.is_zero() {
            spin_sleep::sleep(settle);
        }

        let label = self.label;
        let mut received = Vec::new();
        for _ in 0..MAX_DRAIN_READS {
            let chunk = match self.adapter()?.read_available() {
                Ok(chunk) => chunk,
                Err(e) => {
                    self.drop_handle(&e);
                    return Err(e);
                },
            };
            if chunk.is_empty() {
                break;
            }
            received.extend_from_slice(&chunk);
        }

        if !received.is_empty() {
            trace!("{} RX [{}]", label, hex::encode_upper(&received));
        }
        Ok(received)
    }

    /// 清空残留输入、写请求、等待、读应答
    pub fn transact(&mut self, request: &[u8], settle: Duration) -> Result<Vec<u8>, TransportError> {
        let cleared = self.adapter()?.clear_input();
        if let Err(e) = cleared {
            self.drop_handle(&e);
            return Err(e);
        }
        self.send(request)?;
        self.drain_all(settle)
    }
}
