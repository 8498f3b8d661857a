//! Mock 串口（测试用）
//!
//! [`MockSerialAdapter`] 是共享状态的句柄，克隆后可以在测试中继续检查写入记录、
//! 注入应答或模拟拔线；[`MockConnector`] 用于测试重连流程。

use crate::{SerialAdapter, SerialConnector, TransportError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

struct MockState {
    responder: Option<Responder>,
    read_buffer: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    disconnected: bool,
}

/// 脚本化的 Mock 串口
#[derive(Clone)]
pub struct MockSerialAdapter {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockSerialAdapter {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            state: Arc::new(Mutex::new(MockState {
                responder: None,
                read_buffer: VecDeque::new(),
                written: Vec::new(),
                disconnected: false,
            })),
        }
    }

    /// 每次写入后调用 `responder`，返回的字节进入接收缓冲区
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let mock = Self::new();
        mock.set_responder(responder);
        mock
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// 直接注入待读取的字节
    pub fn inject_read(&self, data: &[u8]) {
        self.state.lock().read_buffer.extend(data);
    }

    /// 全部写入记录（每次 write 一项）
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().written.len()
    }

    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// 模拟拔线：之后的读写都返回 `Disconnected`
    pub fn disconnect(&self) {
        self.state.lock().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state.lock().disconnected = false;
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }
}

impl Default for MockSerialAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialAdapter for MockSerialAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(TransportError::disconnected("mock unplugged"));
        }
        state.written.push(bytes.to_vec());
        let reply = state.responder.as_mut().and_then(|r| r(bytes));
        if let Some(reply) = reply {
            state.read_buffer.extend(reply);
        }
        Ok(bytes.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(TransportError::disconnected("mock unplugged"));
        }
        Ok(state.read_buffer.drain(..).collect())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

type Factory = Box<dyn Fn(&str) -> Option<MockSerialAdapter> + Send + Sync>;

/// Mock 连接器
///
/// `factory` 根据端口名返回设备；返回 `None` 表示该端口打不开。
pub struct MockConnector {
    ports: Mutex<Vec<String>>,
    factory: Factory,
    failures_remaining: AtomicUsize,
    scans: AtomicUsize,
    opens: AtomicUsize,
}

impl MockConnector {
    pub fn new<F>(ports: &[&str], factory: F) -> Self
    where
        F: Fn(&str) -> Option<MockSerialAdapter> + Send + Sync + 'static,
    {
        Self {
            ports: Mutex::new(ports.iter().map(|p| p.to_string()).collect()),
            factory: Box::new(factory),
            failures_remaining: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
        }
    }

    /// 总是返回同一个设备
    pub fn single(port: &str, device: MockSerialAdapter) -> Self {
        Self::new(&[port], move |_| Some(device.clone()))
    }

    pub fn set_ports(&self, ports: &[&str]) {
        *self.ports.lock() = ports.iter().map(|p| p.to_string()).collect();
    }

    /// 接下来 `n` 次打开全部失败
    pub fn fail_next_opens(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SerialConnector for MockConnector {
    fn scan(&self) -> Result<Vec<String>, TransportError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.ports.lock().clone())
    }

    fn open(&self, port: &str, _baud_rate: u32) -> Result<Box<dyn SerialAdapter>, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::disconnected(format!("mock open {port} refused")));
        }

        match (self.factory)(port) {
            Some(device) => {
                device.reconnect();
                Ok(Box::new(device))
            },
            None => Err(TransportError::disconnected(format!("mock port {port} absent"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes_and_replies() {
        let mut mock = MockSerialAdapter::with_responder(|req| (req[0] == 0x01).then(|| vec![0xAB]));
        mock.write(&[0x01]).unwrap();
        mock.write(&[0x02]).unwrap();
        assert_eq!(mock.read_available().unwrap(), vec![0xAB]);
        assert!(mock.read_available().unwrap().is_empty());
        assert_eq!(mock.written(), vec![vec![0x01], vec![0x02]]);
    }

    #[test]
    fn test_mock_disconnect() {
        let mut mock = MockSerialAdapter::new();
        mock.disconnect();
        assert!(mock.write(&[0x00]).unwrap_err().is_disconnected());
        assert!(mock.read_available().unwrap_err().is_disconnected());
    }

    #[test]
    fn test_connector_failures_then_success() {
        let device = MockSerialAdapter::new();
        let connector = MockConnector::single("/dev/ttyACM0", device.clone());
        connector.fail_next_opens(2);

        assert!(connector.open("/dev/ttyACM0", 460_800).is_err());
        assert!(connector.open("/dev/ttyACM0", 460_800).is_err());
        device.disconnect();
        let mut adapter = connector.open("/dev/ttyACM0", 460_800).unwrap();
        // 成功打开时设备恢复为已连接
        assert!(adapter.write(&[0x01]).is_ok());
        assert_eq!(connector.open_count(), 3);
    }

    #[test]
    fn test_connector_scan() {
        let connector = MockConnector::new(&["/dev/ttyACM0", "/dev/ttyACM1"], |_| None);
        assert_eq!(connector.scan().unwrap().len(), 2);
        connector.set_ports(&[]);
        assert!(connector.scan().unwrap().is_empty());
        assert_eq!(connector.scan_count(), 2);
        assert!(connector.open("/dev/ttyACM0", 1).is_err());
    }
}
