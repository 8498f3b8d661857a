//! 手部配置
//!
//! 所有字段都有默认值，TOML 文件里只需要写需要修改的部分：
//!
//! ```toml
//! [actuator]
//! port = "/dev/ttyUSB1"
//!
//! [grasp]
//! min_force = 5.0
//! rule = "two_finger"
//! ```

use crate::error::HandError;
use crate::rule::{GraspRule, MagnitudeMode, SensorGroups};
use dexhand_driver::{
    ActuatorDriverConfig, FINGER_AXES, FingerBinding, MAX_SMOOTHING_WINDOW, ReconnectPolicy,
    SensorDriverConfig,
};
use dexhand_protocol::{DEFAULT_PORT_SELECTORS, MAX_SENSOR_PORTS, PortId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

/// 完整配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandConfig {
    pub actuator: ActuatorConfig,
    pub sensor: SensorConfig,
    pub grasp: GraspConfig,
}

/// 电缸总线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub port: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    /// 空应答后的重试次数
    pub status_retries: u32,
    pub retry_delay_ms: u64,
    pub reply_settle_ms: u64,
    /// 总线句柄丢失后重新打开的最短间隔
    pub reopen_interval_ms: u64,
    /// 第 5、6 轴的复位位置
    pub rest_positions: [i16; 2],
    pub reset_velocity: i16,
    /// `set_dof` 使用的速度
    pub set_dof_velocity: i16,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 921_600,
            poll_interval_ms: 100,
            status_retries: 3,
            retry_delay_ms: 10,
            reply_settle_ms: 10,
            reopen_interval_ms: 1000,
            rest_positions: [1000, 1000],
            reset_velocity: 300,
            set_dof_velocity: 300,
        }
    }
}

/// 传感器手指绑定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBinding {
    pub finger: u8,
    pub port: u8,
}

/// 重连策略
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub attempts_per_port: u32,
    pub retry_delay_ms: u64,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            attempts_per_port: 3,
            retry_delay_ms: 1000,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

/// 传感器控制盒配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub port: String,
    pub baud_rate: u32,
    /// 扫描候选端口时匹配的名称片段（为空表示全部）
    pub scan_patterns: Vec<String>,
    /// 扫描时要求的 USB VID
    pub usb_vid: Option<u16>,
    /// 覆盖各端口的选择字节（必须是 10 个）
    pub port_selectors: Option<Vec<u8>>,
    pub smoothing_window: usize,
    pub poll_interval_ms: u64,
    pub taxel_points: usize,
    /// 覆盖所有命令的等待时间（模拟设备调试用）
    pub settle_override_ms: Option<u64>,
    pub fingers: Vec<SensorBinding>,
    pub reconnect: ReconnectConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 460_800,
            scan_patterns: vec!["ttyACM".to_string(), "ttyUSB".to_string(), "COM".to_string()],
            usb_vid: None,
            fingers: (1..=7).map(|n| SensorBinding { finger: n, port: n }).collect(),
            port_selectors: None,
            smoothing_window: 3,
            poll_interval_ms: 10,
            taxel_points: dexhand_protocol::TAXEL_POINTS,
            settle_override_ms: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// 被控手指：电缸轴、用于闭合判断的传感器、最大行程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraspFinger {
    pub axis: u8,
    pub sensor: u8,
    pub max_travel: i16,
}

/// 抓取控制配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraspConfig {
    /// 低于该值的手指继续闭合
    pub min_force: f64,
    /// 每轮闭合步长
    pub step: i16,
    pub close_velocity: i16,
    /// 释放时的目标位置
    pub open_position: i16,
    pub rule: GraspRule,
    pub magnitude: MagnitudeMode,
    pub thumb_sensor: u8,
    pub tip_sensors: Vec<u8>,
    pub pad_sensors: Vec<u8>,
    /// 两轮之间分片睡眠：每片时长和片数
    pub loop_slice_ms: u64,
    pub loop_slices: u32,
    pub fingers: Vec<GraspFinger>,
}

impl Default for GraspConfig {
    fn default() -> Self {
        let fingers = [(1, 1200), (2, 1200), (3, 1200), (4, 1000)]
            .into_iter()
            .map(|(n, max_travel)| GraspFinger {
                axis: n,
                sensor: n,
                max_travel,
            })
            .collect();
        Self {
            min_force: 3.0,
            step: 100,
            close_velocity: 100,
            open_position: 10,
            rule: GraspRule::ThumbTipOrPad,
            magnitude: MagnitudeMode::Euclidean,
            fingers,
            thumb_sensor: 7,
            tip_sensors: vec![2, 6, 1],
            pad_sensors: vec![3, 4, 5],
            loop_slice_ms: 100,
            loop_slices: 5,
        }
    }
}

impl GraspConfig {
    pub fn sensor_groups(&self) -> SensorGroups {
        SensorGroups {
            tracked: self.fingers.iter().map(|f| f.sensor).collect(),
            thumb: self.thumb_sensor,
            tips: self.tip_sensors.clone(),
            pads: self.pad_sensors.clone(),
        }
    }

    /// 判定和闭合用到的全部传感器
    pub fn referenced_sensors(&self) -> BTreeSet<u8> {
        let mut sensors: BTreeSet<u8> = self.fingers.iter().map(|f| f.sensor).collect();
        sensors.insert(self.thumb_sensor);
        sensors.extend(&self.tip_sensors);
        sensors.extend(&self.pad_sensors);
        sensors
    }

    pub fn validate(&self) -> Result<(), HandError> {
        if !self.min_force.is_finite() || self.min_force < 0.0 {
            return Err(HandError::config(format!(
                "grasp.min_force must be a non-negative number, got {}",
                self.min_force
            )));
        }
        if self.step <= 0 {
            return Err(HandError::config("grasp.step must be positive"));
        }
        if self.fingers.is_empty() {
            return Err(HandError::config("grasp.fingers must not be empty"));
        }
        if self.loop_slices == 0 {
            return Err(HandError::config("grasp.loop_slices must be at least 1"));
        }

        let mut axes = BTreeSet::new();
        for finger in &self.fingers {
            if !(1..=FINGER_AXES as u8).contains(&finger.axis) {
                return Err(HandError::config(format!(
                    "grasp finger axis {} is not a finger DOF (1..={})",
                    finger.axis, FINGER_AXES
                )));
            }
            if !axes.insert(finger.axis) {
                return Err(HandError::config(format!(
                    "grasp finger axis {} listed twice",
                    finger.axis
                )));
            }
            if finger.max_travel <= 0 {
                return Err(HandError::config(format!(
                    "grasp finger {} max_travel must be positive",
                    finger.axis
                )));
            }
        }
        Ok(())
    }
}

impl HandConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, HandError> {
        let config: HandConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, HandError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| HandError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, HandError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HandError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|source| HandError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 交叉校验：抓取用到的传感器必须都有端口绑定
    pub fn validate(&self) -> Result<(), HandError> {
        self.grasp.validate()?;

        let sensor = &self.sensor;
        if sensor.port.is_empty() || self.actuator.port.is_empty() {
            return Err(HandError::config("serial port names must not be empty"));
        }
        if !(1..=MAX_SMOOTHING_WINDOW).contains(&sensor.smoothing_window) {
            return Err(HandError::config(format!(
                "sensor.smoothing_window must be 1..={}, got {}",
                MAX_SMOOTHING_WINDOW, sensor.smoothing_window
            )));
        }
        if let Some(selectors) = &sensor.port_selectors
            && selectors.len() != MAX_SENSOR_PORTS as usize
        {
            return Err(HandError::config(format!(
                "sensor.port_selectors needs {} entries, got {}",
                MAX_SENSOR_PORTS,
                selectors.len()
            )));
        }

        let mut bound = BTreeSet::new();
        for binding in &sensor.fingers {
            PortId::new(binding.port)?;
            if !bound.insert(binding.finger) {
                return Err(HandError::config(format!(
                    "sensor finger {} bound twice",
                    binding.finger
                )));
            }
        }
        if let Some(missing) = self.grasp.referenced_sensors().difference(&bound).next() {
            return Err(HandError::config(format!(
                "grasp uses sensor {} which has no port binding",
                missing
            )));
        }
        Ok(())
    }

    pub fn actuator_driver_config(&self) -> ActuatorDriverConfig {
        let a = &self.actuator;
        ActuatorDriverConfig {
            poll_interval: Duration::from_millis(a.poll_interval_ms),
            status_retries: a.status_retries,
            retry_delay: Duration::from_millis(a.retry_delay_ms),
            reply_settle: Duration::from_millis(a.reply_settle_ms),
            rest_positions: a.rest_positions,
            reset_velocity: a.reset_velocity,
            reopen_interval: Duration::from_millis(a.reopen_interval_ms),
        }
    }

    pub fn sensor_driver_config(&self) -> Result<SensorDriverConfig, HandError> {
        let s = &self.sensor;
        let fingers = s
            .fingers
            .iter()
            .map(|b| {
                Ok(FingerBinding {
                    finger: b.finger,
                    port: PortId::new(b.port)?,
                })
            })
            .collect::<Result<Vec<_>, HandError>>()?;

        let mut port_selectors = DEFAULT_PORT_SELECTORS;
        if let Some(custom) = &s.port_selectors {
            if custom.len() != port_selectors.len() {
                return Err(HandError::config("sensor.port_selectors needs 10 entries"));
            }
            port_selectors.copy_from_slice(custom);
        }

        Ok(SensorDriverConfig {
            port_name: s.port.clone(),
            baud_rate: s.baud_rate,
            fingers,
            port_selectors,
            smoothing_window: s.smoothing_window,
            poll_interval: Duration::from_millis(s.poll_interval_ms),
            taxel_points: s.taxel_points,
            reconnect: ReconnectPolicy {
                attempts_per_port: s.reconnect.attempts_per_port,
                retry_delay: Duration::from_millis(s.reconnect.retry_delay_ms),
                initial_backoff: Duration::from_millis(s.reconnect.initial_backoff_ms),
                max_backoff: Duration::from_millis(s.reconnect.max_backoff_ms),
            },
            settle_override: s.settle_override_ms.map(Duration::from_millis),
        })
    }
}
