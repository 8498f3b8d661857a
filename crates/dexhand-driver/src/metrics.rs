//! 驱动指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 单个驱动（电缸总线或传感器控制盒）的链路指标
#[derive(Debug, Default)]
pub struct DriverMetrics {
    /// 发送的命令帧数
    pub frames_sent: AtomicU64,

    /// 成功解析的应答帧数
    pub replies_decoded: AtomicU64,

    /// settle 之后没有收到任何字节的次数
    pub empty_replies: AtomicU64,

    /// 校验失败的应答数
    pub checksum_mismatches: AtomicU64,

    /// 格式错误（长度不足、帧头帧尾不匹配）的应答数
    pub malformed_replies: AtomicU64,

    /// 设备报告非零错误码的次数
    pub device_errors: AtomicU64,

    /// 传输层错误次数
    pub transport_errors: AtomicU64,

    /// 重连成功次数
    pub reconnects: AtomicU64,
}

impl DriverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取指标快照（各计数器之间可能有微小的时间差）
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            replies_decoded: self.replies_decoded.load(Ordering::Relaxed),
            empty_replies: self.empty_replies.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            malformed_replies: self.malformed_replies.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frames_sent.store(0, Ordering::Relaxed);
        self.replies_decoded.store(0, Ordering::Relaxed);
        self.empty_replies.store(0, Ordering::Relaxed);
        self.checksum_mismatches.store(0, Ordering::Relaxed);
        self.malformed_replies.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
        self.transport_errors.store(0, Ordering::Relaxed);
        self.reconnects.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub frames_sent: u64,
    pub replies_decoded: u64,
    pub empty_replies: u64,
    pub checksum_mismatches: u64,
    pub malformed_replies: u64,
    pub device_errors: u64,
    pub transport_errors: u64,
    pub reconnects: u64,
}

impl MetricsSnapshot {
    /// 应答成功率（0.0 ~ 1.0），尚未发送命令时返回 1.0
    pub fn reply_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            1.0
        } else {
            self.replies_decoded as f64 / self.frames_sent as f64
        }
    }
}
