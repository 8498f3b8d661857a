//! 触觉传感器控制盒协议
//!
//! 控制盒通过一条串口总线复用最多 10 个逻辑端口，每个端口接一个三维力传感模组。
//! 命令表是封闭的枚举 [`SensorCommand`]：帧体模板、等待时间和应答解析方式都是常量。

use crate::checksum::lrc;
use crate::{FrameError, ProtocolUsageError};
use std::time::Duration;

/// 帧头
pub const SENSOR_HEAD: [u8; 4] = [0x55, 0xAA, 0x7B, 0x7B];

/// 帧尾
pub const SENSOR_TAIL: [u8; 4] = [0x55, 0xAA, 0x7D, 0x7D];

/// 应答帧最小长度
pub const SENSOR_MIN_FRAME_LEN: usize = 16;

/// 应答帧内 errorCode 的偏移（从帧起始计）
const RESPONSE_ERROR_OFFSET: usize = 9;

/// 应答帧内 length 字段的偏移
const RESPONSE_LENGTH_OFFSET: usize = 10;

/// 应答帧数据域起始偏移
const RESPONSE_DATA_OFFSET: usize = 12;

/// 帧体最小长度：fixedId index mainCmd sub1 sub2 error len(2)
const RESPONSE_MIN_BODY_LEN: usize = 8;

/// 逻辑端口数量上限
pub const MAX_SENSOR_PORTS: u8 = 10;

/// 各端口的默认选择字节（端口 1..=10）
///
/// CN1 = 0x00、CN2 = 0x03 来自控制盒手册，其余端口按同样的间隔排布，
/// 固件版本不同时可以在配置中覆盖。
pub const DEFAULT_PORT_SELECTORS: [u8; MAX_SENSOR_PORTS as usize] =
    [0x00, 0x03, 0x06, 0x09, 0x0C, 0x0F, 0x12, 0x15, 0x18, 0x1B];

/// 逻辑端口号（1..=10）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct PortId(u8);

impl PortId {
    pub fn new(port: u8) -> Result<Self, ProtocolUsageError> {
        if (1..=MAX_SENSOR_PORTS).contains(&port) {
            Ok(Self(port))
        } else {
            Err(ProtocolUsageError::InvalidPort(port))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 默认选择字节
    pub fn default_selector(self) -> u8 {
        DEFAULT_PORT_SELECTORS[(self.0 - 1) as usize]
    }
}

impl TryFrom<u8> for PortId {
    type Error = ProtocolUsageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PortId::new(value)
    }
}

impl From<PortId> for u8 {
    fn from(port: PortId) -> Self {
        port.0
    }
}

impl std::fmt::Display for PortId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CN{}", self.0)
    }
}

/// 应答数据域的解析方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParse {
    /// ASCII 文本（版本号）
    Ascii,
    /// 十六进制文本（模式、校准结果）
    TextHex,
    /// 原始数据字节（力数据）
    DataHex,
    /// 只关心执行是否成功
    None,
}

/// 控制盒命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCommand {
    /// 获取固件版本号
    GetVersion,
    /// 设置工作模式
    SetMode,
    /// 获取工作模式
    GetMode,
    /// 选择逻辑端口
    ChoosePort { port: PortId, selector: u8 },
    /// 读取分布力（每个测点 3 字节）
    GetData,
    /// 读取合力 Fx/Fy/Fz
    GetForce,
    /// 重新校准
    Recalibration,
}

impl SensorCommand {
    /// 使用默认选择字节构造端口选择命令
    pub fn choose_port(port: PortId) -> Self {
        SensorCommand::ChoosePort {
            port,
            selector: port.default_selector(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorCommand::GetVersion => "get_version",
            SensorCommand::SetMode => "set_mode",
            SensorCommand::GetMode => "get_mode",
            SensorCommand::ChoosePort { .. } => "choose_port",
            SensorCommand::GetData => "get_data",
            SensorCommand::GetForce => "get_force",
            SensorCommand::Recalibration => "recalibration",
        }
    }

    /// 帧体模板（不含长度参数）
    fn template(&self) -> &'static [u8] {
        match self {
            SensorCommand::GetVersion => &[0x0E, 0x00, 0x60, 0xA0, 0x01, 0x00, 0x00],
            SensorCommand::SetMode => &[0x0E, 0x00, 0x70, 0xC0, 0x0C, 0x01, 0x00, 0x05],
            SensorCommand::GetMode => &[0x0E, 0x00, 0x70, 0xC0, 0x0D, 0x00, 0x00, 0xB5],
            SensorCommand::ChoosePort { .. } => &[0x0E, 0x00, 0x70, 0xB1, 0x0A, 0x01, 0x00],
            SensorCommand::GetData => &[0x0E, 0x00, 0x70, 0xC0, 0x06, 0x05, 0x00, 0x7B, 0x0E, 0x04],
            SensorCommand::GetForce => &[0x0E, 0x00, 0x70, 0xC0, 0x06, 0x05, 0x00, 0x7B, 0xF0, 0x03],
            SensorCommand::Recalibration => {
                &[0x0E, 0x00, 0x70, 0xB0, 0x02, 0x02, 0x00, 0x03, 0x01]
            },
        }
    }

    /// 发送后等待应答的时间
    pub fn settle_time(&self) -> Duration {
        match self {
            SensorCommand::GetVersion | SensorCommand::GetMode | SensorCommand::Recalibration => {
                Duration::from_millis(1000)
            },
            SensorCommand::SetMode => Duration::from_millis(2000),
            SensorCommand::ChoosePort { .. } => Duration::from_millis(20),
            SensorCommand::GetData | SensorCommand::GetForce => Duration::from_millis(50),
        }
    }

    pub fn parse_kind(&self) -> ResponseParse {
        match self {
            SensorCommand::GetVersion => ResponseParse::Ascii,
            SensorCommand::GetMode | SensorCommand::Recalibration => ResponseParse::TextHex,
            SensorCommand::GetData | SensorCommand::GetForce => ResponseParse::DataHex,
            SensorCommand::SetMode | SensorCommand::ChoosePort { .. } => ResponseParse::None,
        }
    }

    /// 数据读取命令需要在帧体末尾追加 2 字节小端长度参数
    pub fn requires_length(&self) -> bool {
        matches!(self, SensorCommand::GetData | SensorCommand::GetForce)
    }

    /// 实例化帧体
    pub fn body(&self, length: Option<u16>) -> Result<Vec<u8>, ProtocolUsageError> {
        let mut body = Vec::with_capacity(12);
        body.extend_from_slice(self.template());

        if let SensorCommand::ChoosePort { selector, .. } = self {
            body.push(*selector);
        }

        match (self.requires_length(), length) {
            (true, Some(len)) => body.extend_from_slice(&len.to_le_bytes()),
            (true, None) => {
                return Err(ProtocolUsageError::MissingLength {
                    command: self.name(),
                });
            },
            (false, Some(_)) => {
                return Err(ProtocolUsageError::UnexpectedLength {
                    command: self.name(),
                });
            },
            (false, None) => {},
        }

        Ok(body)
    }

    /// 编码完整的命令帧：head ‖ body ‖ LRC ‖ tail
    pub fn encode(&self, length: Option<u16>) -> Result<Vec<u8>, ProtocolUsageError> {
        let body = self.body(length)?;
        let mut frame = Vec::with_capacity(body.len() + 9);
        frame.extend_from_slice(&SENSOR_HEAD);
        frame.extend_from_slice(&body);
        frame.push(lrc(&body));
        frame.extend_from_slice(&SENSOR_TAIL);
        Ok(frame)
    }
}

/// 校验一帧的帧头、帧尾与 LRC，返回帧体
///
/// 要求 `raw` 恰好是一帧（帧尾位于缓冲区末尾）。
pub fn verify_sensor_frame(raw: &[u8]) -> Result<&[u8], FrameError> {
    let len = raw.len();
    if len < SENSOR_MIN_FRAME_LEN {
        return Err(FrameError::malformed("shorter than minimum frame", len));
    }
    if raw[..4] != SENSOR_HEAD {
        return Err(FrameError::malformed("head magic mismatch", len));
    }
    if raw[len - 4..] != SENSOR_TAIL {
        return Err(FrameError::malformed("tail magic mismatch", len));
    }

    let body = &raw[4..len - 5];
    let actual = raw[len - 5];
    let expected = lrc(body);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(body)
}

/// 控制盒应答帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFrame {
    pub fixed_id: u8,
    pub index: u8,
    pub main_cmd: u8,
    pub sub_cmd: [u8; 2],
    /// 设备错误码（0 表示成功）
    pub error_code: u8,
    /// 帧内声明的数据长度
    pub declared_len: u16,
    /// 数据域（声明长度超出缓冲区时截断）
    pub payload: Vec<u8>,
}

impl SensorFrame {
    pub fn is_ok(&self) -> bool {
        self.error_code == 0
    }

    /// 数据域是否因声明长度越界而被截断
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.declared_len as usize
    }
}

/// 解析控制盒应答帧
pub fn decode_sensor_response(raw: &[u8]) -> Result<SensorFrame, FrameError> {
    let body = verify_sensor_frame(raw)?;
    if body.len() < RESPONSE_MIN_BODY_LEN {
        return Err(FrameError::malformed("response header truncated", raw.len()));
    }

    let declared_len =
        u16::from_le_bytes([raw[RESPONSE_LENGTH_OFFSET], raw[RESPONSE_LENGTH_OFFSET + 1]]);

    // 数据域只能落在帧体内，不能越过 LRC 和帧尾
    let body_end = raw.len() - 5;
    let data_end = (RESPONSE_DATA_OFFSET + declared_len as usize).min(body_end);
    let payload = raw[RESPONSE_DATA_OFFSET..data_end].to_vec();

    Ok(SensorFrame {
        fixed_id: raw[4],
        index: raw[5],
        main_cmd: raw[6],
        sub_cmd: [raw[7], raw[8]],
        error_code: raw[RESPONSE_ERROR_OFFSET],
        declared_len,
        payload,
    })
}

/// 按控制盒应答格式构造一帧（设备模拟器和测试使用）
pub fn encode_sensor_response(
    request_body: &[u8],
    error_code: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 8);
    // 回显 fixedId / index / mainCmd / subCmd
    let header_len = request_body.len().min(5);
    body.extend_from_slice(&request_body[..header_len]);
    body.resize(5, 0);
    body.push(error_code);
    body.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    body.extend_from_slice(payload);

    let mut frame = Vec::with_capacity(body.len() + 9);
    frame.extend_from_slice(&SENSOR_HEAD);
    frame.extend_from_slice(&body);
    frame.push(lrc(&body));
    frame.extend_from_slice(&SENSOR_TAIL);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(n: u8) -> PortId {
        PortId::new(n).unwrap()
    }

    #[test]
    fn test_port_id_range() {
        assert!(PortId::new(0).is_err());
        assert!(PortId::new(11).is_err());
        assert_eq!(PortId::new(10).unwrap().get(), 10);
        assert_eq!(
            PortId::new(12).unwrap_err(),
            ProtocolUsageError::InvalidPort(12)
        );
    }

    #[test]
    fn test_default_selectors() {
        assert_eq!(port(1).default_selector(), 0x00);
        assert_eq!(port(2).default_selector(), 0x03);
    }

    #[test]
    fn test_encode_choose_port_matches_manual_frame() {
        let frame = SensorCommand::ChoosePort {
            port: port(1),
            selector: 0x01,
        }
        .encode(None)
        .unwrap();
        let expected = [
            0x55, 0xAA, 0x7B, 0x7B, 0x0E, 0x00, 0x70, 0xB1, 0x0A, 0x01, 0x00, 0x01, 0xC5, 0x55,
            0xAA, 0x7D, 0x7D,
        ];
        assert_eq!(frame, expected);
    }

    #[test]
    fn test_encode_get_force_appends_length_le() {
        let frame = SensorCommand::GetForce.encode(Some(3)).unwrap();
        // head(4) + template(10) + len(2) + lrc(1) + tail(4)
        assert_eq!(frame.len(), 21);
        assert_eq!(&frame[14..16], &[0x03, 0x00]);
        assert_eq!(&frame[frame.len() - 4..], &SENSOR_TAIL);
        assert!(verify_sensor_frame(&frame).is_ok());
    }

    #[test]
    fn test_encode_length_usage_errors() {
        assert_eq!(
            SensorCommand::GetData.encode(None).unwrap_err(),
            ProtocolUsageError::MissingLength {
                command: "get_data"
            }
        );
        assert_eq!(
            SensorCommand::GetVersion.encode(Some(4)).unwrap_err(),
            ProtocolUsageError::UnexpectedLength {
                command: "get_version"
            }
        );
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!(SensorCommand::GetVersion.parse_kind(), ResponseParse::Ascii);
        assert_eq!(SensorCommand::GetMode.parse_kind(), ResponseParse::TextHex);
        assert_eq!(SensorCommand::GetForce.parse_kind(), ResponseParse::DataHex);
        assert_eq!(SensorCommand::SetMode.parse_kind(), ResponseParse::None);
    }

    #[test]
    fn test_decode_response() {
        let request = SensorCommand::GetForce.body(Some(3)).unwrap();
        let raw = encode_sensor_response(&request, 0x00, &[1, 2, 3, 4, 5, 6, 0x10, 0xF0, 0x20]);
        let frame = decode_sensor_response(&raw).unwrap();
        assert_eq!(frame.fixed_id, 0x0E);
        assert_eq!(frame.main_cmd, 0x70);
        assert_eq!(frame.sub_cmd, [0xC0, 0x06]);
        assert!(frame.is_ok());
        assert_eq!(frame.declared_len, 9);
        assert_eq!(frame.payload, vec![1, 2, 3, 4, 5, 6, 0x10, 0xF0, 0x20]);
        assert!(!frame.is_truncated());
    }

    #[test]
    fn test_decode_device_error_code() {
        let request = SensorCommand::GetForce.body(Some(3)).unwrap();
        let raw = encode_sensor_response(&request, 0x05, &[]);
        let frame = decode_sensor_response(&raw).unwrap();
        assert_eq!(frame.error_code, 0x05);
        assert!(!frame.is_ok());
    }

    #[test]
    fn test_decode_too_short() {
        let err = decode_sensor_response(&[0x55, 0xAA, 0x7B]).unwrap_err();
        assert!(matches!(err, FrameError::MalformedFrame { len: 3, .. }));
    }

    #[test]
    fn test_decode_bad_magic() {
        let request = SensorCommand::GetMode.body(None).unwrap();
        let mut raw = encode_sensor_response(&request, 0, &[0x15]);
        raw[0] = 0x00;
        assert!(matches!(
            decode_sensor_response(&raw),
            Err(FrameError::MalformedFrame { .. })
        ));

        let mut raw = encode_sensor_response(&request, 0, &[0x15]);
        let last = raw.len() - 1;
        raw[last] = 0x7B;
        assert!(matches!(
            decode_sensor_response(&raw),
            Err(FrameError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let request = SensorCommand::GetMode.body(None).unwrap();
        let mut raw = encode_sensor_response(&request, 0, &[0x15]);
        raw[12] ^= 0x01;
        assert!(matches!(
            decode_sensor_response(&raw),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_truncates_overrunning_length() {
        // 手工构造：声明 10 字节数据，实际只有 2 字节
        let mut body = vec![0x0E, 0x00, 0x70, 0xC0, 0x06, 0x00, 0x0A, 0x00, 0xAB, 0xCD];
        let checksum = lrc(&body);
        let mut raw = SENSOR_HEAD.to_vec();
        raw.append(&mut body);
        raw.push(checksum);
        raw.extend_from_slice(&SENSOR_TAIL);

        let frame = decode_sensor_response(&raw).unwrap();
        assert_eq!(frame.declared_len, 10);
        assert_eq!(frame.payload, vec![0xAB, 0xCD]);
        assert!(frame.is_truncated());
    }
}
