//! 闭环抓取控制器
//!
//! 每一轮：
//! 1. 读取各传感器的平滑力（缺失按 0），计算力大小
//! 2. 抓稳判定成立 → `Grasped`，退出循环，不再下发任何命令
//! 3. 否则力低于阈值的手指前进一步（不超过最大行程）→ `Closing`
//! 4. 分片睡眠，期间检查取消标志
//!
//! 判定先于闭合：判定成立的那一轮不会再多推一步。

use crate::capability::{FingerActuator, ForceSource};
use crate::config::{GraspConfig, GraspFinger};
use crate::error::HandError;
use crate::rule::{RulePredicate, StabilityPredicate};
use dexhand_driver::{CancelToken, PollingWorker};
use dexhand_protocol::AxisId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// 抓取状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GraspState {
    Idle = 0,
    Closing = 1,
    Grasped = 2,
}

impl GraspState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GraspState::Idle => "idle",
            GraspState::Closing => "closing",
            GraspState::Grasped => "grasped",
        }
    }

    /// 界面显示用的中文标签
    pub fn label(&self) -> &'static str {
        match self {
            GraspState::Idle => "未抓取",
            GraspState::Closing => "抓取中",
            GraspState::Grasped => "已抓取",
        }
    }
}

impl TryFrom<u8> for GraspState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GraspState::Idle),
            1 => Ok(GraspState::Closing),
            2 => Ok(GraspState::Grasped),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for GraspState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单轮的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 判定成立，进入 `Grasped`
    Stable,
    /// 本轮下发了 `commanded` 条闭合命令
    Advanced { commanded: usize },
}

struct GraspShared {
    forces: Arc<dyn ForceSource>,
    actuator: Arc<dyn FingerActuator>,
    config: GraspConfig,
    fingers: Vec<(AxisId, GraspFinger)>,
    predicate: Box<dyn StabilityPredicate>,
    state: AtomicU8,
    /// 上一轮需要闭合的手指位置全部未知
    positions_blind: AtomicBool,
}

/// 抓取控制器
///
/// 只持有阈值和两个能力句柄；循环线程由内部的 [`PollingWorker`] 管理，
/// `start_loop` / `stop_loop` 可以重复调用。
pub struct GraspController {
    shared: Arc<GraspShared>,
    worker: PollingWorker,
}

impl GraspController {
    /// 使用配置中选定的内置规则
    pub fn new(
        forces: Arc<dyn ForceSource>,
        actuator: Arc<dyn FingerActuator>,
        config: GraspConfig,
    ) -> Result<Self, HandError> {
        let predicate = RulePredicate::new(config.rule, config.sensor_groups());
        Self::with_predicate(forces, actuator, config, Box::new(predicate))
    }

    /// 使用自定义判定
    pub fn with_predicate(
        forces: Arc<dyn ForceSource>,
        actuator: Arc<dyn FingerActuator>,
        config: GraspConfig,
        predicate: Box<dyn StabilityPredicate>,
    ) -> Result<Self, HandError> {
        config.validate()?;
        let fingers = config
            .fingers
            .iter()
            .map(|f| Ok((AxisId::new(f.axis)?, *f)))
            .collect::<Result<Vec<_>, HandError>>()?;

        Ok(Self {
            shared: Arc::new(GraspShared {
                forces,
                actuator,
                config,
                fingers,
                predicate,
                state: AtomicU8::new(GraspState::Idle as u8),
                positions_blind: AtomicBool::new(false),
            }),
            worker: PollingWorker::new("grasp-loop"),
        })
    }

    pub fn config(&self) -> &GraspConfig {
        &self.shared.config
    }

    pub fn state(&self) -> GraspState {
        self.shared.state()
    }

    pub fn predicate_name(&self) -> &'static str {
        self.shared.predicate.name()
    }

    /// 执行一轮
    ///
    /// 先判定再闭合：判定成立的那一轮不下发任何命令，上一轮下发的闭合步长
    /// 要到下一轮读数刷新后才会反映在判定里。
    pub fn tick(&self) -> TickOutcome {
        self.shared.tick()
    }

    /// 当前各传感器的力大小（缺失按 0）
    pub fn magnitudes(&self) -> BTreeMap<u8, f64> {
        self.shared.magnitudes()
    }

    /// 启动抓取循环（幂等）
    pub fn start_loop(&self) -> Result<(), HandError> {
        let shared = self.shared.clone();
        if self.worker.start(move |token| shared.run(token))? {
            info!("Grasp loop started (rule: {})", self.predicate_name());
        }
        Ok(())
    }

    /// 停止抓取循环并等待退出（幂等），不改变状态
    pub fn stop_loop(&self) {
        if self.worker.stop() {
            info!("Grasp loop stopped in state {}", self.state());
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// 停止循环，张开全部被控手指，回到 `Idle`
    ///
    /// 每个手指都会尝试，返回遇到的第一个错误。
    pub fn release(&self) -> Result<(), HandError> {
        self.stop_loop();
        let open = self.shared.config.open_position;
        let mut first_error = None;
        for (axis, _) in &self.shared.fingers {
            if let Err(e) = self.shared.actuator.open_finger(*axis, open) {
                warn!("{}: release command failed: {}", axis, e);
                first_error.get_or_insert(e);
            }
        }
        self.shared.set_state(GraspState::Idle);
        info!("Hand released to position {}", open);
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// 停止循环并回到 `Idle`（不下发命令）
    pub fn reset(&self) {
        self.stop_loop();
        self.shared.set_state(GraspState::Idle);
    }
}

impl GraspShared {
    fn state(&self) -> GraspState {
        GraspState::try_from(self.state.load(Ordering::Acquire)).unwrap_or(GraspState::Idle)
    }

    fn set_state(&self, state: GraspState) -> GraspState {
        let previous = self.state.swap(state as u8, Ordering::AcqRel);
        GraspState::try_from(previous).unwrap_or(GraspState::Idle)
    }

    fn magnitudes(&self) -> BTreeMap<u8, f64> {
        self.config
            .referenced_sensors()
            .into_iter()
            .map(|sensor| {
                let magnitude = self
                    .forces
                    .finger_force(sensor)
                    .map(|f| self.config.magnitude.magnitude(&f))
                    .unwrap_or(0.0);
                (sensor, magnitude)
            })
            .collect()
    }

    fn tick(&self) -> TickOutcome {
        let magnitudes = self.magnitudes();
        let min_force = self.config.min_force;

        if self.predicate.is_stable(&magnitudes, min_force) {
            if self.set_state(GraspState::Grasped) != GraspState::Grasped {
                info!("Stable grasp detected: {:?}", magnitudes);
            }
            return TickOutcome::Stable;
        }

        let mut commanded = 0;
        let mut wanting = 0;
        let mut unknown = 0;
        for (axis, finger) in &self.fingers {
            let force = magnitudes.get(&finger.sensor).copied().unwrap_or(0.0);
            if force >= min_force {
                continue;
            }
            wanting += 1;
            let Some(position) = self.actuator.finger_position(*axis) else {
                debug!("{}: position unknown, not advancing", axis);
                unknown += 1;
                continue;
            };
            if position >= finger.max_travel {
                trace!("{}: at max travel {}", axis, finger.max_travel);
                continue;
            }

            let target = position.saturating_add(self.config.step).min(finger.max_travel);
            match self
                .actuator
                .move_finger(*axis, target, self.config.close_velocity)
            {
                Ok(()) => {
                    debug!("{}: force {:.2} < {}, closing to {}", axis, force, min_force, target);
                    commanded += 1;
                },
                Err(e) => warn!("{}: closing command skipped: {}", axis, e),
            }
        }

        let blind = wanting > 0 && unknown == wanting;
        if blind != self.positions_blind.swap(blind, Ordering::AcqRel) {
            if blind {
                warn!("No finger position known, grasp cannot close");
            } else {
                info!("Finger positions available again");
            }
        }

        if commanded > 0 {
            self.set_state(GraspState::Closing);
        }
        TickOutcome::Advanced { commanded }
    }

    fn run(&self, token: CancelToken) {
        let slice = Duration::from_millis(self.config.loop_slice_ms);
        while !token.is_cancelled() {
            if self.tick() == TickOutcome::Stable {
                return;
            }
            for _ in 0..self.config.loop_slices {
                if !token.sleep(slice) {
                    return;
                }
            }
        }
    }
}

impl Drop for GraspController {
    fn drop(&mut self) {
        self.worker.stop();
    }
}
