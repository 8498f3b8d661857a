//! 校验算法
//!
//! - 传感器控制盒：LRC（8 位累加和取补码）
//! - 电缸：8 位累加和（模 256）
//!
//! 两者都只覆盖帧体，不包含帧头和帧尾。

/// 8 位累加和（模 256）
#[inline]
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// LRC 纵向冗余校验：累加和的二进制补码
///
/// 性质：`sum8(body) + lrc(body) == 0 (mod 256)`
#[inline]
pub fn lrc(bytes: &[u8]) -> u8 {
    sum8(bytes).wrapping_neg()
}
