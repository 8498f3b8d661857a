//! 力数据平滑

use dexhand_protocol::ForceSample;
use std::collections::VecDeque;

/// 平滑窗口的最大容量
pub const MAX_SMOOTHING_WINDOW: usize = 3;

/// 平滑后的三维力（窗口内逐元素均值，保留两位小数）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SmoothedForce {
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
}

impl SmoothedForce {
    pub fn new(fx: f64, fy: f64, fz: f64) -> Self {
        Self { fx, fy, fz }
    }

    /// 欧氏模长
    pub fn magnitude(&self) -> f64 {
        (self.fx * self.fx + self.fy * self.fy + self.fz * self.fz).sqrt()
    }

    /// 三个分量直接相加
    pub fn component_sum(&self) -> f64 {
        self.fx + self.fy + self.fz
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.fx, self.fy, self.fz]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 定长历史窗口
#[derive(Debug, Clone)]
pub struct ForceSmoother {
    window: VecDeque<ForceSample>,
    capacity: usize,
}

impl ForceSmoother {
    /// 容量被限制在 1..=3
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_SMOOTHING_WINDOW);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn push(&mut self, sample: ForceSample) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    /// 窗口均值；窗口为空时返回 `None`（与零力读数区分）
    pub fn mean(&self) -> Option<SmoothedForce> {
        if self.window.is_empty() {
            return None;
        }
        let n = self.window.len() as f64;
        let (sx, sy, sz) = self.window.iter().fold((0.0, 0.0, 0.0), |(x, y, z), s| {
            (x + f64::from(s.fx), y + f64::from(s.fy), z + f64::from(s.fz))
        });
        Some(SmoothedForce::new(round2(sx / n), round2(sy / n), round2(sz / n)))
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }
}
