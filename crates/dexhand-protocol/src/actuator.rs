//! 电缸（直线伺服执行器）协议
//!
//! 一条串口总线挂最多 6 个电缸（DOF），按 id 寻址：
//!
//! ```text
//! 命令: 55 AA | L id cmd [addrL addrH] payload | SUM
//! 应答: AA 55 | L id cmd payload              | SUM
//! ```
//!
//! `L` 为 id 之后、校验之前的字节数，整帧长度恒为 `L + 5`；
//! `SUM` 为帧体（从 L 开始）的 8 位累加和。协议没有帧尾。

use crate::checksum::sum8;
use crate::{FrameError, ProtocolUsageError, bytes_to_i16_le, bytes_to_u16_le};
use num_enum::IntoPrimitive;
use smallvec::SmallVec;

/// 命令帧头（主机 → 电缸）
pub const ACTUATOR_COMMAND_HEAD: [u8; 2] = [0x55, 0xAA];

/// 应答帧头（电缸 → 主机）
pub const ACTUATOR_REPLY_HEAD: [u8; 2] = [0xAA, 0x55];

/// 电缸数量
pub const ACTUATOR_COUNT: usize = 6;

/// 状态应答帧长度
pub const STATUS_REPLY_LEN: usize = 20;

/// 单条写寄存器命令最多携带的 16 位值个数
pub const MAX_REGISTER_VALUES: usize = 16;

/// 读状态
pub const CMD_READ_STATUS: u8 = 0x30;
/// 写寄存器
pub const CMD_WRITE_REGISTER: u8 = 0x32;

/// 电缸寄存器地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
#[repr(u16)]
pub enum Register {
    /// 故障清除（写 1）
    ClearFault = 0x18,
    /// 暂停运动（写 1）
    Pause = 0x1A,
    /// 控制模式
    Mode = 0x25,
    /// 目标电压（电压模式，-1000..=1000）
    Voltage = 0x26,
    /// 运动速度
    Speed = 0x28,
    /// 目标位置
    Position = 0x29,
}

/// 电缸控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[repr(u8)]
pub enum ControlMode {
    /// 定位模式
    #[default]
    Positioning = 0,
    /// 伺服模式
    Servo = 1,
    /// 速度模式
    Speed = 2,
    /// 电压模式
    Voltage = 4,
}

impl TryFrom<u8> for ControlMode {
    type Error = ProtocolUsageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ControlMode::Positioning),
            1 => Ok(ControlMode::Servo),
            2 => Ok(ControlMode::Speed),
            4 => Ok(ControlMode::Voltage),
            _ => Err(ProtocolUsageError::InvalidMode(value)),
        }
    }
}

/// 电缸编号（1..=6）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct AxisId(u8);

impl AxisId {
    pub fn new(id: u8) -> Result<Self, ProtocolUsageError> {
        if (1..=ACTUATOR_COUNT as u8).contains(&id) {
            Ok(Self(id))
        } else {
            Err(ProtocolUsageError::InvalidAxis(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// 状态表下标（0..6）
    pub fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// 按顺序遍历全部 6 个轴
    pub fn all() -> impl Iterator<Item = AxisId> {
        (1..=ACTUATOR_COUNT as u8).map(AxisId)
    }
}

impl TryFrom<u8> for AxisId {
    type Error = ProtocolUsageError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        AxisId::new(value)
    }
}

impl From<AxisId> for u8 {
    fn from(id: AxisId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DOF{}", self.0)
    }
}

/// 电缸命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCommand {
    /// 读取状态（应答为 [`ActuatorStatus`]）
    ReadStatus { id: AxisId },
    /// 从 `register` 开始连续写入若干 16 位值
    WriteRegisters {
        id: AxisId,
        register: Register,
        values: SmallVec<[u16; 4]>,
    },
}

impl ActuatorCommand {
    pub fn read_status(id: AxisId) -> Self {
        ActuatorCommand::ReadStatus { id }
    }

    pub fn write(id: AxisId, register: Register, values: &[u16]) -> Self {
        ActuatorCommand::WriteRegisters {
            id,
            register,
            values: SmallVec::from_slice(values),
        }
    }

    pub fn id(&self) -> AxisId {
        match self {
            ActuatorCommand::ReadStatus { id } | ActuatorCommand::WriteRegisters { id, .. } => *id,
        }
    }

    /// 帧体：`L id cmd [addrL addrH values..]`
    pub fn body(&self) -> Result<SmallVec<[u8; 16]>, ProtocolUsageError> {
        let mut body = SmallVec::new();
        match self {
            ActuatorCommand::ReadStatus { id } => {
                body.extend_from_slice(&[0x01, id.get(), CMD_READ_STATUS]);
            },
            ActuatorCommand::WriteRegisters {
                id,
                register,
                values,
            } => {
                if values.is_empty() || values.len() > MAX_REGISTER_VALUES {
                    return Err(ProtocolUsageError::RegisterCount {
                        max: MAX_REGISTER_VALUES,
                        actual: values.len(),
                    });
                }
                let addr: u16 = (*register).into();
                let len = 3 + 2 * values.len() as u8;
                body.extend_from_slice(&[len, id.get(), CMD_WRITE_REGISTER]);
                body.extend_from_slice(&addr.to_le_bytes());
                for value in values {
                    body.extend_from_slice(&value.to_le_bytes());
                }
            },
        }
        Ok(body)
    }

    /// 编码完整的命令帧：`55 AA ‖ body ‖ SUM`
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolUsageError> {
        let body = self.body()?;
        let mut frame = Vec::with_capacity(body.len() + 3);
        frame.extend_from_slice(&ACTUATOR_COMMAND_HEAD);
        frame.extend_from_slice(&body);
        frame.push(sum8(&body));
        Ok(frame)
    }
}

/// 有符号 16 位值按补码写入寄存器
#[inline]
pub fn register_value(value: i16) -> u16 {
    value as u16
}

/// 电缸应答帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorReply {
    pub id: u8,
    pub cmd: u8,
    /// cmd 之后、校验之前的字节
    pub payload: Vec<u8>,
}

/// 从接收缓冲区中解析第一帧有效应答
///
/// 半双工总线上缓冲区前部可能残留回显或噪声，因此先定位 `AA 55` 帧头。
pub fn decode_actuator_reply(raw: &[u8]) -> Result<ActuatorReply, FrameError> {
    let start = raw
        .windows(2)
        .position(|w| w == ACTUATOR_REPLY_HEAD)
        .ok_or(FrameError::malformed("reply head not found", raw.len()))?;
    let frame = &raw[start..];

    // 帧头 + L + id + cmd + SUM
    if frame.len() < 6 {
        return Err(FrameError::malformed("reply shorter than header", raw.len()));
    }
    let len = frame[2] as usize;
    if len == 0 {
        return Err(FrameError::malformed("reply length field is zero", raw.len()));
    }
    let total = len + 5;
    if frame.len() < total {
        return Err(FrameError::malformed("reply truncated", raw.len()));
    }

    let body = &frame[2..total - 1];
    let actual = frame[total - 1];
    let expected = sum8(body);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(ActuatorReply {
        id: body[1],
        cmd: body[2],
        payload: body[3..].to_vec(),
    })
}

/// 电缸状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActuatorStatus {
    pub id: u8,
    pub target_position: i16,
    pub current_position: i16,
    /// 电流（mA）
    pub current_ma: u16,
    /// 力（g）
    pub force_grams: i16,
    /// 力传感器原始 ADC 值
    pub force_adc_raw: u16,
    /// 温度（℃）
    pub temperature_c: i8,
    /// 故障码（0 = 无故障）
    pub error_code: u8,
}

/// 状态应答中 cmd 之后的数据长度：保留(2) + 5×u16 + 温度 + 故障码
const STATUS_PAYLOAD_LEN: usize = 14;

impl ActuatorStatus {
    pub fn has_fault(&self) -> bool {
        self.error_code != 0
    }

    /// 从读状态应答中解析
    pub fn from_reply(reply: &ActuatorReply) -> Result<Self, FrameError> {
        if reply.cmd != CMD_READ_STATUS {
            return Err(FrameError::malformed(
                "not a status reply",
                reply.payload.len(),
            ));
        }
        let p = &reply.payload;
        if p.len() < STATUS_PAYLOAD_LEN {
            return Err(FrameError::malformed("status payload too short", p.len()));
        }

        Ok(Self {
            id: reply.id,
            target_position: bytes_to_i16_le([p[2], p[3]]),
            current_position: bytes_to_i16_le([p[4], p[5]]),
            current_ma: bytes_to_u16_le([p[6], p[7]]),
            force_grams: bytes_to_i16_le([p[8], p[9]]),
            force_adc_raw: bytes_to_u16_le([p[10], p[11]]),
            temperature_c: p[12] as i8,
            error_code: p[13],
        })
    }

    /// 编码为电缸的读状态应答帧（设备模拟器使用）
    pub fn encode_reply(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(STATUS_REPLY_LEN - 3);
        body.push((STATUS_PAYLOAD_LEN + 1) as u8);
        body.push(self.id);
        body.push(CMD_READ_STATUS);
        body.extend_from_slice(&[0x00, 0x00]);
        body.extend_from_slice(&self.target_position.to_le_bytes());
        body.extend_from_slice(&self.current_position.to_le_bytes());
        body.extend_from_slice(&self.current_ma.to_le_bytes());
        body.extend_from_slice(&self.force_grams.to_le_bytes());
        body.extend_from_slice(&self.force_adc_raw.to_le_bytes());
        body.push(self.temperature_c as u8);
        body.push(self.error_code);

        let mut frame = Vec::with_capacity(STATUS_REPLY_LEN);
        frame.extend_from_slice(&ACTUATOR_REPLY_HEAD);
        frame.extend_from_slice(&body);
        frame.push(sum8(&body));
        frame
    }
}
