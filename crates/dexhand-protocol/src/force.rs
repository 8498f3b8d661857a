//! 三维力数据解码
//!
//! 控制盒返回的数据域前 6 字节是数据头（起始地址和长度回显），之后每个测点 3 字节：
//! x、y 为有符号字节（补码），z 为无符号字节。轴的含义由字节位置决定。

use crate::FrameError;

/// 数据域前的数据头长度
pub const FORCE_DATA_HEADER_LEN: usize = 6;

/// 单个三维力样本的字节数
pub const FORCE_SAMPLE_LEN: usize = 3;

/// 分布力测点数量
pub const TAXEL_POINTS: usize = 120;

/// 三维力样本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForceSample {
    pub fx: i16,
    pub fy: i16,
    pub fz: i16,
}

impl ForceSample {
    pub const fn new(fx: i16, fy: i16, fz: i16) -> Self {
        Self { fx, fy, fz }
    }

    /// 从 3 字节解码，x/y 有符号，z 无符号
    ///
    /// 传感器在空载时会报告 -1，任何轴上恰好为 -1 的值按 0 处理。
    pub fn from_bytes(bytes: [u8; FORCE_SAMPLE_LEN]) -> Self {
        Self {
            fx: clamp_idle(signed_axis(bytes[0])),
            fy: clamp_idle(signed_axis(bytes[1])),
            fz: clamp_idle(unsigned_axis(bytes[2])),
        }
    }

    pub fn as_array(&self) -> [i16; 3] {
        [self.fx, self.fy, self.fz]
    }
}

/// 有符号轴：0..=255 按 8 位补码解释
#[inline]
pub fn signed_axis(byte: u8) -> i16 {
    byte as i8 as i16
}

/// 无符号轴
#[inline]
pub fn unsigned_axis(byte: u8) -> i16 {
    byte as i16
}

#[inline]
fn clamp_idle(value: i16) -> i16 {
    if value == -1 { 0 } else { value }
}

/// 去掉数据头，返回测点数据
pub fn strip_data_header(payload: &[u8]) -> Result<&[u8], FrameError> {
    payload
        .get(FORCE_DATA_HEADER_LEN..)
        .ok_or(FrameError::malformed("force payload shorter than data header", payload.len()))
}

/// 解码合力应答（`get_force`）的数据域
pub fn decode_force_payload(payload: &[u8]) -> Result<ForceSample, FrameError> {
    let data = strip_data_header(payload)?;
    if data.len() < FORCE_SAMPLE_LEN {
        return Err(FrameError::malformed("force sample truncated", payload.len()));
    }
    Ok(ForceSample::from_bytes([data[0], data[1], data[2]]))
}

/// 解码分布力应答（`get_data`）的数据域，不足 3 字节的尾部被丢弃
pub fn decode_taxel_payload(payload: &[u8]) -> Result<Vec<ForceSample>, FrameError> {
    let data = strip_data_header(payload)?;
    Ok(data
        .chunks_exact(FORCE_SAMPLE_LEN)
        .map(|c| ForceSample::from_bytes([c[0], c[1], c[2]]))
        .collect())
}

/// 合力的模长
pub fn euclidean_magnitude(force: &ForceSample) -> f64 {
    let [x, y, z] = force.as_array().map(f64::from);
    (x * x + y * y + z * z).sqrt()
}
