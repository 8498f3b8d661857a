//! 基于 `serialport` 的真实串口实现

use crate::{SerialAdapter, SerialConnector, TransportError};
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

/// 单次读操作的超时（只读取已缓冲的字节，几乎不阻塞）
const READ_TIMEOUT: Duration = Duration::from_millis(5);

/// 串口适配器（8N1，无流控）
pub struct SerialPortAdapter {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialPortAdapter {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| TransportError::disconnected(format!("open {path}: {e}")))?;

        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self {
            name: path.to_string(),
            port,
        })
    }
}

impl SerialAdapter for SerialPortAdapter {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(bytes.len())
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            },
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(serialport::ClearBuffer::Input)?;
        Ok(())
    }

    fn port_name(&self) -> &str {
        &self.name
    }
}

/// 候选端口过滤条件
///
/// 名称包含任一子串，或 USB VID 匹配，即视为候选；两者都为空时接受所有端口。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortFilter {
    pub name_patterns: Vec<String>,
    pub usb_vid: Option<u16>,
}

impl PortFilter {
    pub fn new(name_patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name_patterns: name_patterns.into_iter().map(Into::into).collect(),
            usb_vid: None,
        }
    }

    pub fn with_usb_vid(mut self, vid: u16) -> Self {
        self.usb_vid = Some(vid);
        self
    }

    pub fn matches(&self, port_name: &str, vid: Option<u16>) -> bool {
        if self.name_patterns.is_empty() && self.usb_vid.is_none() {
            return true;
        }
        let name_hit = self.name_patterns.iter().any(|p| port_name.contains(p.as_str()));
        let vid_hit = matches!((self.usb_vid, vid), (Some(want), Some(got)) if want == got);
        name_hit || vid_hit
    }
}

/// 系统串口连接器
#[derive(Debug, Clone, Default)]
pub struct SystemConnector {
    filter: PortFilter,
}

impl SystemConnector {
    pub fn new(filter: PortFilter) -> Self {
        Self { filter }
    }
}

impl SerialConnector for SystemConnector {
    fn scan(&self) -> Result<Vec<String>, TransportError> {
        let ports =
            serialport::available_ports().map_err(|e| TransportError::Scan(e.to_string()))?;

        let candidates: Vec<String> = ports
            .into_iter()
            .filter(|p| {
                let vid = match &p.port_type {
                    SerialPortType::UsbPort(info) => Some(info.vid),
                    _ => None,
                };
                self.filter.matches(&p.port_name, vid)
            })
            .map(|p| p.port_name)
            .collect();

        debug!("Port scan found {} candidate(s): {:?}", candidates.len(), candidates);
        Ok(candidates)
    }

    fn open(&self, port: &str, baud_rate: u32) -> Result<Box<dyn SerialAdapter>, TransportError> {
        Ok(Box::new(SerialPortAdapter::open(port, baud_rate)?))
    }
}
