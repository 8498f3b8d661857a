//! 抓稳判定规则
//!
//! 判定只看"传感器编号 → 力大小"映射；缺失的读数在进入判定前已经按 0 处理。

use dexhand_driver::SmoothedForce;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 力大小的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeMode {
    /// 欧氏模长
    #[default]
    Euclidean,
    /// 三个分量直接相加
    Sum,
}

impl MagnitudeMode {
    pub fn magnitude(&self, force: &SmoothedForce) -> f64 {
        match self {
            MagnitudeMode::Euclidean => force.magnitude(),
            MagnitudeMode::Sum => force.component_sum(),
        }
    }
}

/// 可插拔的抓稳判定
pub trait StabilityPredicate: Send + Sync {
    /// `magnitudes`：传感器编号 → 力大小
    fn is_stable(&self, magnitudes: &BTreeMap<u8, f64>, min_force: f64) -> bool;

    fn name(&self) -> &'static str;
}

/// 内置判定规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraspRule {
    /// 拇指 + 任意指尖的合力超过阈值，或任意指腹超过阈值
    #[default]
    ThumbTipOrPad,
    /// 至少两个被控手指达到阈值
    TwoFinger,
    /// 存在一对被控手指，其力之和超过阈值
    PairwiseSum,
    /// 全部被控手指达到阈值
    AllFingers,
}

impl GraspRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraspRule::ThumbTipOrPad => "thumb_tip_or_pad",
            GraspRule::TwoFinger => "two_finger",
            GraspRule::PairwiseSum => "pairwise_sum",
            GraspRule::AllFingers => "all_fingers",
        }
    }
}

impl std::fmt::Display for GraspRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 传感器分组：规则按组取值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorGroups {
    /// 被控手指对应的传感器
    pub tracked: Vec<u8>,
    pub thumb: u8,
    pub tips: Vec<u8>,
    pub pads: Vec<u8>,
}

/// 按 [`GraspRule`] 判定
#[derive(Debug, Clone)]
pub struct RulePredicate {
    rule: GraspRule,
    groups: SensorGroups,
}

impl RulePredicate {
    pub fn new(rule: GraspRule, groups: SensorGroups) -> Self {
        Self { rule, groups }
    }

    pub fn rule(&self) -> GraspRule {
        self.rule
    }
}

fn value(magnitudes: &BTreeMap<u8, f64>, sensor: u8) -> f64 {
    magnitudes.get(&sensor).copied().unwrap_or(0.0)
}

impl StabilityPredicate for RulePredicate {
    fn is_stable(&self, magnitudes: &BTreeMap<u8, f64>, min_force: f64) -> bool {
        let g = &self.groups;
        match self.rule {
            GraspRule::ThumbTipOrPad => {
                let thumb = value(magnitudes, g.thumb);
                let pinch = g
                    .tips
                    .iter()
                    .any(|tip| (thumb + value(magnitudes, *tip)).abs() > min_force);
                pinch || g.pads.iter().any(|pad| value(magnitudes, *pad).abs() > min_force)
            },
            GraspRule::TwoFinger => {
                g.tracked
                    .iter()
                    .filter(|s| value(magnitudes, **s) >= min_force)
                    .count()
                    >= 2
            },
            GraspRule::PairwiseSum => g.tracked.iter().enumerate().any(|(i, a)| {
                g.tracked[i + 1..]
                    .iter()
                    .any(|b| value(magnitudes, *a) + value(magnitudes, *b) > min_force)
            }),
            GraspRule::AllFingers => {
                !g.tracked.is_empty()
                    && g.tracked.iter().all(|s| value(magnitudes, *s) >= min_force)
            },
        }
    }

    fn name(&self) -> &'static str {
        self.rule.as_str()
    }
}
