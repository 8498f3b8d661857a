//! 电缸驱动
//!
//! 写寄存器命令是"发出即忘"：应答无法解析不算失败，效果需要通过状态轮询确认。
//! 后台轮询线程每 100 ms 按 1..=6 的顺序读取各轴状态，整条目替换到状态表中。

use crate::error::DriverError;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::state::SnapshotTable;
use crate::worker::{CancelToken, PollingWorker};
use dexhand_protocol::{
    ACTUATOR_COUNT, ActuatorCommand, ActuatorStatus, AxisId, ControlMode, FrameError,
    ProtocolUsageError, Register, decode_actuator_reply, register_value,
};
use dexhand_serial::{SerialConnector, TransportChannel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 手指轴数量（1..=4），其余两轴为拇指旋转/侧摆
pub const FINGER_AXES: usize = 4;

/// 电压模式的取值范围
pub const VOLTAGE_LIMIT: i16 = 1000;

/// 电缸驱动配置
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorDriverConfig {
    /// 状态轮询周期
    pub poll_interval: Duration,
    /// 读状态在空应答后的重试次数（不含第一次）
    pub status_retries: u32,
    /// 重试间隔
    pub retry_delay: Duration,
    /// 发送命令后等待应答的时间
    pub reply_settle: Duration,
    /// 复位时第 5、6 轴的目标位置
    pub rest_positions: [i16; ACTUATOR_COUNT - FINGER_AXES],
    /// 复位速度
    pub reset_velocity: i16,
    /// 总线句柄丢失后两次重新打开之间的最短间隔
    pub reopen_interval: Duration,
}

impl Default for ActuatorDriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            status_retries: 3,
            retry_delay: Duration::from_millis(10),
            reply_settle: Duration::from_millis(10),
            rest_positions: [1000, 1000],
            reset_velocity: 300,
            reopen_interval: Duration::from_secs(1),
        }
    }
}

/// 重新打开总线所需的信息
struct BusReopen {
    connector: Box<dyn SerialConnector>,
    port: String,
    baud_rate: u32,
    /// 上一次尝试的时间；持锁期间完成打开，避免并发重复打开
    last_attempt: Mutex<Option<Instant>>,
}

struct ActuatorShared {
    channel: TransportChannel,
    reopen: Option<BusReopen>,
    closed: AtomicBool,
    table: SnapshotTable<ActuatorStatus>,
    metrics: DriverMetrics,
    config: ActuatorDriverConfig,
}

/// 电缸驱动
pub struct ActuatorDriver {
    shared: Arc<ActuatorShared>,
    poller: PollingWorker,
}

impl ActuatorDriver {
    /// 使用已建立的传输通道创建驱动；句柄丢失后不会自动重新打开
    pub fn new(channel: TransportChannel, config: ActuatorDriverConfig) -> Self {
        Self::with_reopen(channel, None, config)
    }

    fn with_reopen(
        channel: TransportChannel,
        reopen: Option<BusReopen>,
        config: ActuatorDriverConfig,
    ) -> Self {
        Self {
            shared: Arc::new(ActuatorShared {
                channel,
                reopen,
                closed: AtomicBool::new(false),
                table: SnapshotTable::new(ACTUATOR_COUNT),
                metrics: DriverMetrics::new(),
                config,
            }),
            poller: PollingWorker::new("actuator-poller"),
        }
    }

    /// 打开电缸总线串口
    ///
    /// 驱动保留 `connector`：IO 错误丢弃句柄后，下一条命令或下一轮轮询会重新打开同一端口
    /// （两次尝试至少间隔 [`ActuatorDriverConfig::reopen_interval`]）。
    pub fn open(
        connector: Box<dyn SerialConnector>,
        port: &str,
        baud_rate: u32,
        config: ActuatorDriverConfig,
    ) -> Result<Self, DriverError> {
        let adapter = connector.open(port, baud_rate)?;
        info!("Actuator bus opened on {} @ {}", port, baud_rate);
        let reopen = BusReopen {
            connector,
            port: port.to_string(),
            baud_rate,
            last_attempt: Mutex::new(None),
        };
        Ok(Self::with_reopen(
            TransportChannel::new("actuator", adapter),
            Some(reopen),
            config,
        ))
    }

    pub fn config(&self) -> &ActuatorDriverConfig {
        &self.shared.config
    }

    pub fn is_connected(&self) -> bool {
        self.shared.channel.is_connected()
    }

    // ------------------------------------------------------------------
    // 写命令
    // ------------------------------------------------------------------

    /// 设置控制模式
    pub fn set_mode(&self, mode: ControlMode, id: AxisId) -> Result<(), DriverError> {
        self.shared.write(id, Register::Mode, &[u8::from(mode) as u16])
    }

    /// 设置目标位置
    pub fn set_position(&self, position: i16, id: AxisId) -> Result<(), DriverError> {
        self.shared.write(id, Register::Position, &[register_value(position)])
    }

    /// 一条命令同时写速度和位置（0x28、0x29 两个连续寄存器）
    pub fn set_position_with_velocity(
        &self,
        position: i16,
        velocity: i16,
        id: AxisId,
    ) -> Result<(), DriverError> {
        self.shared.write(
            id,
            Register::Speed,
            &[register_value(velocity), register_value(position)],
        )
    }

    /// 先写速度，再写目标位置
    pub fn set_speed(&self, speed: i16, position: i16, id: AxisId) -> Result<(), DriverError> {
        self.shared.write(id, Register::Speed, &[register_value(speed)])?;
        self.shared.write(id, Register::Position, &[register_value(position)])
    }

    /// 设置输出电压（电压模式，-1000..=1000）
    pub fn set_voltage(&self, voltage: i16, id: AxisId) -> Result<(), DriverError> {
        if !(-VOLTAGE_LIMIT..=VOLTAGE_LIMIT).contains(&voltage) {
            return Err(ProtocolUsageError::OutOfRange {
                field: "voltage",
                value: voltage as i32,
            }
            .into());
        }
        self.shared.write(id, Register::Voltage, &[register_value(voltage)])
    }

    /// 清除故障；`None` 时依次清除全部 6 个轴
    pub fn clear_fault(&self, id: Option<AxisId>) -> Result<(), DriverError> {
        match id {
            Some(id) => self.shared.write(id, Register::ClearFault, &[1]),
            None => {
                for id in AxisId::all() {
                    self.shared.write(id, Register::ClearFault, &[1])?;
                }
                Ok(())
            },
        }
    }

    /// 暂停运动
    pub fn pause_motion(&self, id: AxisId) -> Result<(), DriverError> {
        self.shared.write(id, Register::Pause, &[1])
    }

    /// 四指回到 0，第 5、6 轴回到静止位置
    pub fn reset_grasp(&self) -> Result<(), DriverError> {
        let velocity = self.shared.config.reset_velocity;
        let rest = self.shared.config.rest_positions;
        for id in AxisId::all() {
            let target = match id.index().checked_sub(FINGER_AXES) {
                None => 0,
                Some(i) => rest[i],
            };
            self.set_position_with_velocity(target, velocity, id)?;
        }
        info!("Hand reset: fingers to 0, thumb axes to {:?}", rest);
        Ok(())
    }

    // ------------------------------------------------------------------
    // 状态
    // ------------------------------------------------------------------

    /// 读取一次状态（不重试）；空应答或损坏应答返回 `Ok(None)`
    pub fn read_status(&self, id: AxisId) -> Result<Option<ActuatorStatus>, DriverError> {
        match self.shared.read_status_once(id) {
            Ok(status) => Ok(Some(status)),
            Err(e) if e.is_transient() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 状态表中某个轴的最近一次状态
    pub fn status(&self, id: AxisId) -> Option<ActuatorStatus> {
        self.shared.table.get(id.index())
    }

    /// 全部 6 个轴的状态快照（下标 0 对应 DOF1）
    pub fn statuses(&self) -> Vec<Option<ActuatorStatus>> {
        self.shared.table.snapshot()
    }

    /// 某个轴的当前位置
    pub fn position(&self, id: AxisId) -> Option<i16> {
        self.status(id).map(|s| s.current_position)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // 轮询
    // ------------------------------------------------------------------

    /// 启动状态轮询（幂等）
    pub fn start_polling(&self) -> Result<(), DriverError> {
        let shared = self.shared.clone();
        if self.poller.start(move |token| shared.poll_loop(token))? {
            info!("Actuator polling started");
        }
        Ok(())
    }

    /// 停止状态轮询并等待线程退出（幂等）
    pub fn stop_polling(&self) {
        if self.poller.stop() {
            info!("Actuator polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// 关闭串口；之后不再自动重新打开
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.stop_polling();
        self.shared.channel.close();
        self.shared.table.clear();
    }
}

impl Drop for ActuatorDriver {
    fn drop(&mut self) {
        self.poller.stop();
    }
}

impl ActuatorShared {
    /// 句柄已被丢弃时尝试重新打开总线
    fn ensure_open(&self) {
        if self.channel.is_connected() || self.closed.load(Ordering::Acquire) {
            return;
        }
        let Some(reopen) = &self.reopen else {
            return;
        };

        let mut last_attempt = reopen.last_attempt.lock();
        if self.channel.is_connected() {
            return;
        }
        if let Some(at) = *last_attempt
            && at.elapsed() < self.config.reopen_interval
        {
            return;
        }
        *last_attempt = Some(Instant::now());

        match reopen.connector.open(&reopen.port, reopen.baud_rate) {
            Ok(adapter) => {
                self.channel.replace(adapter);
                DriverMetrics::bump(&self.metrics.reconnects);
                info!("Actuator bus reopened on {}", reopen.port);
            },
            Err(e) => debug!("Actuator bus reopen on {} failed: {}", reopen.port, e),
        }
    }

    fn write(&self, id: AxisId, register: Register, values: &[u16]) -> Result<(), DriverError> {
        let frame = ActuatorCommand::write(id, register, values).encode()?;
        self.ensure_open();
        let reply = match self.channel.transact(&frame, self.config.reply_settle) {
            Ok(reply) => reply,
            Err(e) => {
                DriverMetrics::bump(&self.metrics.transport_errors);
                warn!("{}: write {:?} skipped: {}", id, register, e);
                return Err(e.into());
            },
        };
        DriverMetrics::bump(&self.metrics.frames_sent);

        // 应答只用于诊断
        match decode_actuator_reply(&reply) {
            Ok(ack) => {
                DriverMetrics::bump(&self.metrics.replies_decoded);
                trace!("{}: write {:?} acked (cmd 0x{:02X})", id, register, ack.cmd);
            },
            Err(e) => {
                self.count_frame_error(&reply, &e);
                debug!("{}: write {:?} sent, ack not decodable: {}", id, register, e);
            },
        }
        Ok(())
    }

    fn count_frame_error(&self, reply: &[u8], err: &FrameError) {
        let counter = if reply.is_empty() {
            &self.metrics.empty_replies
        } else {
            match err {
                FrameError::ChecksumMismatch { .. } => &self.metrics.checksum_mismatches,
                FrameError::MalformedFrame { .. } => &self.metrics.malformed_replies,
            }
        };
        DriverMetrics::bump(counter);
    }

    fn read_status_once(&self, id: AxisId) -> Result<ActuatorStatus, DriverError> {
        let frame = ActuatorCommand::read_status(id).encode()?;
        self.ensure_open();
        let reply = self
            .channel
            .transact(&frame, self.config.reply_settle)
            .inspect_err(|_| DriverMetrics::bump(&self.metrics.transport_errors))?;
        DriverMetrics::bump(&self.metrics.frames_sent);

        if reply.is_empty() {
            DriverMetrics::bump(&self.metrics.empty_replies);
            return Err(DriverError::NoReply {
                command: "read_status",
            });
        }

        let status = decode_actuator_reply(&reply)
            .and_then(|reply| ActuatorStatus::from_reply(&reply))
            .inspect_err(|e| self.count_frame_error(&reply, e))?;
        if status.id != id.get() {
            DriverMetrics::bump(&self.metrics.malformed_replies);
            return Err(FrameError::MalformedFrame {
                reason: "status reply from another axis",
                len: reply.len(),
            }
            .into());
        }

        DriverMetrics::bump(&self.metrics.replies_decoded);
        if status.has_fault() {
            DriverMetrics::bump(&self.metrics.device_errors);
            debug!("{}: fault code 0x{:02X}", id, status.error_code);
        }
        Ok(status)
    }

    /// 读状态，空应答或损坏应答时重试
    fn read_status_with_retry(
        &self,
        id: AxisId,
        token: &CancelToken,
    ) -> Result<Option<ActuatorStatus>, DriverError> {
        for attempt in 0..=self.config.status_retries {
            if attempt > 0 && !token.sleep(self.config.retry_delay) {
                return Ok(None);
            }
            match self.read_status_once(id) {
                Ok(status) => return Ok(Some(status)),
                Err(e) if e.is_transient() => {
                    trace!("{}: status attempt {} failed: {}", id, attempt + 1, e);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn poll_loop(&self, token: CancelToken) {
        let mut link_ok = true;
        while !token.is_cancelled() {
            let deadline = Instant::now() + self.config.poll_interval;

            for id in AxisId::all() {
                if token.is_cancelled() {
                    return;
                }
                let status = match self.read_status_with_retry(id, &token) {
                    Ok(status) => {
                        if !link_ok {
                            info!("Actuator bus responding again");
                            link_ok = true;
                        }
                        status
                    },
                    Err(e) => {
                        if link_ok {
                            warn!("Actuator status polling degraded: {}", e);
                            link_ok = false;
                        }
                        None
                    },
                };
                if status.is_none() {
                    trace!("{}: status unknown this cycle", id);
                }
                self.table.store(id.index(), status);
            }

            if !token.sleep_until(deadline) {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_serial::MockSerialAdapter;

    fn axis(n: u8) -> AxisId {
        AxisId::new(n).unwrap()
    }

    fn fast_config() -> ActuatorDriverConfig {
        ActuatorDriverConfig {
            poll_interval: Duration::from_millis(5),
            retry_delay: Duration::from_millis(1),
            reply_settle: Duration::ZERO,
            ..Default::default()
        }
    }

    fn driver_with(mock: &MockSerialAdapter) -> ActuatorDriver {
        ActuatorDriver::new(
            TransportChannel::new("actuator", Box::new(mock.clone())),
            fast_config(),
        )
    }

    #[test]
    fn test_set_position_with_velocity_frame() {
        let mock = MockSerialAdapter::new();
        let driver = driver_with(&mock);
        driver.set_position_with_velocity(1200, 100, axis(2)).unwrap();

        let expected = ActuatorCommand::write(axis(2), Register::Speed, &[100, 1200])
            .encode()
            .unwrap();
        assert_eq!(mock.written(), vec![expected]);
    }

    #[test]
    fn test_set_speed_issues_two_writes() {
        let mock = MockSerialAdapter::new();
        let driver = driver_with(&mock);
        driver.set_speed(300, 500, axis(1)).unwrap();

        let written = mock.written();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0][5], 0x28);
        assert_eq!(written[1][5], 0x29);
    }

    #[test]
    fn test_write_without_ack_is_not_an_error() {
        let mock = MockSerialAdapter::with_responder(|_| Some(vec![0xDE, 0xAD]));
        let driver = driver_with(&mock);
        assert!(driver.set_mode(ControlMode::Positioning, axis(3)).is_ok());
        assert_eq!(driver.metrics().malformed_replies, 1);
    }

    #[test]
    fn test_clear_fault_all_axes() {
        let mock = MockSerialAdapter::new();
        let driver = driver_with(&mock);
        driver.clear_fault(None).unwrap();

        let written = mock.written();
        assert_eq!(written.len(), ACTUATOR_COUNT);
        for (i, frame) in written.iter().enumerate() {
            assert_eq!(frame[3], i as u8 + 1);
            assert_eq!(frame[5], 0x18);
            assert_eq!(&frame[7..9], &[0x01, 0x00]);
        }
    }

    #[test]
    fn test_set_voltage_range() {
        let mock = MockSerialAdapter::new();
        let driver = driver_with(&mock);
        assert!(driver.set_voltage(-1000, axis(1)).is_ok());
        let err = driver.set_voltage(1001, axis(1)).unwrap_err();
        assert!(matches!(err, DriverError::Usage(_)));
        assert_eq!(mock.write_count(), 1);
    }

    #[test]
    fn test_reset_grasp_targets() {
        let mock = MockSerialAdapter::new();
        let driver = driver_with(&mock);
        driver.reset_grasp().unwrap();

        let written = mock.written();
        assert_eq!(written.len(), 6);
        for (i, frame) in written.iter().enumerate() {
            let velocity = i16::from_le_bytes([frame[7], frame[8]]);
            let position = i16::from_le_bytes([frame[9], frame[10]]);
            assert_eq!(velocity, 300);
            assert_eq!(position, if i < 4 { 0 } else { 1000 });
        }
    }

    #[test]
    fn test_read_status_decodes_reply() {
        let mock = MockSerialAdapter::with_responder(|req| {
            Some(
                ActuatorStatus {
                    id: req[3],
                    current_position: 640,
                    temperature_c: 31,
                    ..Default::default()
                }
                .encode_reply(),
            )
        });
        let driver = driver_with(&mock);
        let status = driver.read_status(axis(5)).unwrap().unwrap();
        assert_eq!(status.id, 5);
        assert_eq!(status.current_position, 640);
    }

    #[test]
    fn test_read_status_from_wrong_axis_is_unknown() {
        let mock = MockSerialAdapter::with_responder(|_| {
            Some(
                ActuatorStatus {
                    id: 1,
                    ..Default::default()
                }
                .encode_reply(),
            )
        });
        let driver = driver_with(&mock);
        assert_eq!(driver.read_status(axis(2)).unwrap(), None);
    }

    #[test]
    fn test_disconnected_command_fails_immediately() {
        let mock = MockSerialAdapter::new();
        mock.disconnect();
        let driver = driver_with(&mock);
        let err = driver.set_position(10, axis(1)).unwrap_err();
        assert!(err.is_disconnected());
        assert!(!driver.is_connected());
        assert!(driver.read_status(axis(1)).unwrap_err().is_disconnected());
    }
}
