//! 触觉传感器驱动
//!
//! 控制盒在一条串口上复用最多 10 个逻辑端口。读取某个手指的力需要先选端口再发数据请求，
//! 两步在总线会话锁内完成，保证"当前端口"状态与设备一致。
//!
//! 断线处理：任何路径上观察到 `Disconnected` 都会把全部端口标记为链路断开，
//! 并启动后台重连任务（停止轮询 → 关闭句柄 → 扫描候选端口 → 打开 + 握手 → 恢复轮询）。
//! 重连不会放弃，轮次之间按指数退避，退避时间有上限。

use crate::error::DriverError;
use crate::metrics::{DriverMetrics, MetricsSnapshot};
use crate::smoothing::{ForceSmoother, SmoothedForce};
use crate::state::SnapshotTable;
use crate::worker::{CancelToken, PollingWorker};
use dexhand_protocol::{
    DEFAULT_PORT_SELECTORS, FORCE_SAMPLE_LEN, ForceSample, FrameError, MAX_SENSOR_PORTS, PortId,
    SensorCommand, SensorFrame, TAXEL_POINTS, decode_force_payload, decode_sensor_response,
    decode_taxel_payload,
};
use dexhand_serial::{SerialConnector, TransportChannel};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 端口错误状态
///
/// 对外的数值编码：`0` 无错误，`-1` 链路断开（或尚未连接），其他为设备错误码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortErrorState {
    NoError,
    LinkDown,
    Fault(u8),
}

impl PortErrorState {
    pub fn as_code(&self) -> i16 {
        match self {
            PortErrorState::NoError => 0,
            PortErrorState::LinkDown => -1,
            PortErrorState::Fault(code) => *code as i16,
        }
    }

    pub fn from_code(code: i16) -> Self {
        match code {
            0 => PortErrorState::NoError,
            1..=255 => PortErrorState::Fault(code as u8),
            _ => PortErrorState::LinkDown,
        }
    }
}

/// 手指与物理端口的绑定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerBinding {
    pub finger: u8,
    pub port: PortId,
}

/// 断线重连策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 每个候选端口的尝试次数
    pub attempts_per_port: u32,
    /// 同一端口两次尝试之间的间隔
    pub retry_delay: Duration,
    /// 一轮全部失败后的首次退避
    pub initial_backoff: Duration,
    /// 退避上限
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts_per_port: 3,
            retry_delay: Duration::from_secs(1),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// 传感器驱动配置
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDriverConfig {
    /// 首选串口
    pub port_name: String,
    pub baud_rate: u32,
    /// 手指 → 端口绑定（顺序即轮询顺序）
    pub fingers: Vec<FingerBinding>,
    /// 各端口的选择字节
    pub port_selectors: [u8; MAX_SENSOR_PORTS as usize],
    /// 平滑窗口（1..=3）
    pub smoothing_window: usize,
    /// 轮询周期
    pub poll_interval: Duration,
    /// 分布力测点数
    pub taxel_points: usize,
    pub reconnect: ReconnectPolicy,
    /// 覆盖所有命令的 settle 时间（模拟设备测试用）
    pub settle_override: Option<Duration>,
}

impl SensorDriverConfig {
    /// 默认绑定：传感器 1..=7 依次接在端口 1..=7
    pub fn default_fingers() -> Vec<FingerBinding> {
        (1..=7u8)
            .filter_map(|n| PortId::new(n).ok().map(|port| FingerBinding { finger: n, port }))
            .collect()
    }
}

impl Default for SensorDriverConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyACM0".to_string(),
            baud_rate: 460_800,
            fingers: Self::default_fingers(),
            port_selectors: DEFAULT_PORT_SELECTORS,
            smoothing_window: 3,
            poll_interval: Duration::from_millis(10),
            taxel_points: TAXEL_POINTS,
            reconnect: ReconnectPolicy::default(),
            settle_override: None,
        }
    }
}

/// 某个手指的对外快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerForce {
    pub finger: u8,
    pub port: PortId,
    /// `None` 表示没有数据
    pub force: Option<SmoothedForce>,
    pub error: PortErrorState,
}

/// 总线会话状态（受会话锁保护）
struct BusState {
    current_port: Option<PortId>,
    smoothers: Vec<ForceSmoother>,
}

impl BusState {
    fn reset(&mut self) {
        self.current_port = None;
        for smoother in &mut self.smoothers {
            smoother.clear();
        }
    }
}

struct SensorShared {
    config: SensorDriverConfig,
    connector: Box<dyn SerialConnector>,
    channel: TransportChannel,
    bus: Mutex<BusState>,
    forces: SnapshotTable<SmoothedForce>,
    port_states: Vec<AtomicI16>,
    link_up: AtomicBool,
    polling_requested: AtomicBool,
    shutdown: AtomicBool,
    metrics: DriverMetrics,
    poller: PollingWorker,
    reconnector: PollingWorker,
}

/// 触觉传感器驱动
pub struct TouchSensorDriver {
    shared: Arc<SensorShared>,
}

impl TouchSensorDriver {
    /// 连接控制盒：先试首选端口，再试扫描到的候选端口，打开后执行握手
    pub fn connect(
        connector: Box<dyn SerialConnector>,
        config: SensorDriverConfig,
    ) -> Result<Self, DriverError> {
        let fingers = config.fingers.len();
        let smoothers = (0..fingers)
            .map(|_| ForceSmoother::new(config.smoothing_window))
            .collect();

        let shared = Arc::new(SensorShared {
            connector,
            channel: TransportChannel::disconnected("sensor"),
            bus: Mutex::new(BusState {
                current_port: None,
                smoothers,
            }),
            forces: SnapshotTable::new(fingers),
            port_states: (0..MAX_SENSOR_PORTS)
                .map(|_| AtomicI16::new(PortErrorState::LinkDown.as_code()))
                .collect(),
            link_up: AtomicBool::new(false),
            polling_requested: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            metrics: DriverMetrics::new(),
            poller: PollingWorker::new("sensor-poller"),
            reconnector: PollingWorker::new("sensor-reconnect"),
            config,
        });

        let port = shared.connect_once(&CancelToken::new())?;
        info!("Sensor box ready on {}", port);
        Ok(Self { shared })
    }

    pub fn config(&self) -> &SensorDriverConfig {
        &self.shared.config
    }

    pub fn is_connected(&self) -> bool {
        self.shared.channel.is_connected()
    }

    /// 后台重连任务是否在运行
    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnector.is_running()
    }

    // ------------------------------------------------------------------
    // 控制盒命令
    // ------------------------------------------------------------------

    /// 握手：读取版本号（必须成功），再设置工作模式（必须成功）
    pub fn init_box(&self) -> Result<(), DriverError> {
        let result = {
            let _bus = self.shared.bus.lock();
            self.shared.handshake()
        };
        self.shared.observe(None, &result);
        result
    }

    /// 固件版本号
    pub fn firmware_version(&self) -> Result<String, DriverError> {
        let result = self.shared.simple_command(SensorCommand::GetVersion);
        self.shared.observe(None, &result);
        Ok(ascii_payload(&result?))
    }

    /// 当前工作模式（十六进制文本）
    pub fn get_mode(&self) -> Result<String, DriverError> {
        let result = self.shared.simple_command(SensorCommand::GetMode);
        self.shared.observe(None, &result);
        Ok(hex::encode(result?.payload))
    }

    /// 重新校准，返回设备给出的结果（十六进制文本）
    pub fn recalibrate(&self) -> Result<String, DriverError> {
        let result = self.shared.simple_command(SensorCommand::Recalibration);
        self.shared.observe(None, &result);
        let frame = result?;
        info!("Sensor box recalibrated");
        Ok(hex::encode(frame.payload))
    }

    /// 选择逻辑端口
    ///
    /// 已是当前端口时不发送任何命令。发送后无论是否收到确认都把该端口记为当前端口；
    /// 确认帧带非零错误码时只记录警告。
    pub fn select_port(&self, port: PortId) -> Result<(), DriverError> {
        let result = {
            let mut bus = self.shared.bus.lock();
            self.shared.select_port_locked(&mut bus, port)
        };
        self.shared.observe(Some(port), &result);
        result
    }

    /// 当前选中的端口
    pub fn current_port(&self) -> Option<PortId> {
        self.shared.bus.lock().current_port
    }

    // ------------------------------------------------------------------
    // 力数据
    // ------------------------------------------------------------------

    /// 读取某个手指的合力（不经过平滑）
    pub fn read_force(&self, finger: u8) -> Result<ForceSample, DriverError> {
        let binding = self.shared.binding(finger)?;
        let result = {
            let mut bus = self.shared.bus.lock();
            self.shared.read_force_locked(&mut bus, binding.port)
        };
        self.shared.observe(Some(binding.port), &result);
        result
    }

    /// 读取某个手指的合力，失败时返回 `None`
    pub fn get_force(&self, finger: u8) -> Option<ForceSample> {
        match self.read_force(finger) {
            Ok(sample) => Some(sample),
            Err(e) => {
                debug!("Finger {} force unavailable: {}", finger, e);
                None
            },
        }
    }

    /// 读取某个手指的分布力（每个测点一个样本）
    pub fn read_taxels(&self, finger: u8) -> Result<Vec<ForceSample>, DriverError> {
        let binding = self.shared.binding(finger)?;
        let result = {
            let mut bus = self.shared.bus.lock();
            self.shared.read_taxels_locked(&mut bus, binding.port)
        };
        self.shared.observe(Some(binding.port), &result);
        result
    }

    /// 依次读取全部手指，推入平滑窗口并发布均值
    pub fn get_all_forces(&self) -> BTreeMap<u8, Option<SmoothedForce>> {
        self.shared.refresh_all()
    }

    /// 共享力表中某个手指的最近平滑值
    pub fn force(&self, finger: u8) -> Option<SmoothedForce> {
        let index = self
            .shared
            .config
            .fingers
            .iter()
            .position(|b| b.finger == finger)?;
        self.shared.forces.get(index)
    }

    /// 全部手指的力与端口状态
    pub fn forces(&self) -> Vec<FingerForce> {
        self.shared
            .config
            .fingers
            .iter()
            .enumerate()
            .map(|(i, b)| FingerForce {
                finger: b.finger,
                port: b.port,
                force: self.shared.forces.get(i),
                error: self.shared.port_state(b.port),
            })
            .collect()
    }

    pub fn port_state(&self, port: PortId) -> PortErrorState {
        self.shared.port_state(port)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    // ------------------------------------------------------------------
    // 轮询与重连
    // ------------------------------------------------------------------

    /// 启动力数据轮询（幂等）
    pub fn start_polling(&self) -> Result<(), DriverError> {
        self.shared.polling_requested.store(true, Ordering::Release);
        if self.shared.start_poller()? {
            info!("Sensor polling started");
        }
        Ok(())
    }

    /// 停止轮询并等待线程退出（幂等）
    pub fn stop_polling(&self) {
        self.shared.polling_requested.store(false, Ordering::Release);
        if self.shared.poller.stop() {
            info!("Sensor polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.shared.poller.is_running()
    }

    /// 触发后台重连（已在重连时不重复启动）
    pub fn reconnect(&self) -> Result<(), DriverError> {
        self.shared.start_reconnect()
    }

    /// 关闭连接
    pub fn close(&self) {
        self.stop_polling();
        self.shared.reconnector.stop();
        self.shared.channel.close();
        self.shared.mark_link_down();
    }
}

impl Drop for TouchSensorDriver {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        // 先停轮询，之后不会再有新的重连请求；重连任务可能在退出前重启轮询，所以最后再停一次
        self.shared.poller.stop();
        self.shared.reconnector.stop();
        self.shared.poller.stop();
    }
}

fn ascii_payload(frame: &SensorFrame) -> String {
    String::from_utf8_lossy(&frame.payload)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

impl SensorShared {
    fn binding(&self, finger: u8) -> Result<FingerBinding, DriverError> {
        self.config
            .fingers
            .iter()
            .find(|b| b.finger == finger)
            .copied()
            .ok_or(DriverError::UnknownFinger(finger))
    }

    fn settle(&self, cmd: &SensorCommand) -> Duration {
        self.config.settle_override.unwrap_or_else(|| cmd.settle_time())
    }

    fn port_state(&self, port: PortId) -> PortErrorState {
        let code = self.port_states[(port.get() - 1) as usize].load(Ordering::Acquire);
        PortErrorState::from_code(code)
    }

    fn set_port_state(&self, port: PortId, state: PortErrorState) {
        self.port_states[(port.get() - 1) as usize].store(state.as_code(), Ordering::Release);
    }

    fn mark_all(&self, state: PortErrorState) {
        for slot in &self.port_states {
            slot.store(state.as_code(), Ordering::Release);
        }
    }

    /// 发送命令并读取原始应答；不产生任何副作用（除指标外）
    fn exchange(&self, cmd: SensorCommand, length: Option<u16>) -> Result<Vec<u8>, DriverError> {
        let frame = cmd.encode(length)?;
        let reply = self
            .channel
            .transact(&frame, self.settle(&cmd))
            .inspect_err(|_| DriverMetrics::bump(&self.metrics.transport_errors))?;
        DriverMetrics::bump(&self.metrics.frames_sent);
        Ok(reply)
    }

    /// 发送命令并解析应答；非零错误码转换为 `DriverError::Device`
    fn command(&self, cmd: SensorCommand, length: Option<u16>) -> Result<SensorFrame, DriverError> {
        let reply = self.exchange(cmd, length)?;
        if reply.is_empty() {
            DriverMetrics::bump(&self.metrics.empty_replies);
            return Err(DriverError::NoReply {
                command: cmd.name(),
            });
        }

        let frame = decode_sensor_response(&reply).inspect_err(|e| {
            let counter = match e {
                FrameError::ChecksumMismatch { .. } => &self.metrics.checksum_mismatches,
                FrameError::MalformedFrame { .. } => &self.metrics.malformed_replies,
            };
            DriverMetrics::bump(counter);
        })?;
        DriverMetrics::bump(&self.metrics.replies_decoded);

        if !frame.is_ok() {
            DriverMetrics::bump(&self.metrics.device_errors);
            return Err(DriverError::Device {
                command: cmd.name(),
                code: frame.error_code,
            });
        }
        Ok(frame)
    }

    fn simple_command(&self, cmd: SensorCommand) -> Result<SensorFrame, DriverError> {
        let _bus = self.bus.lock();
        self.command(cmd, None)
    }

    fn handshake(&self) -> Result<(), DriverError> {
        let version = self
            .command(SensorCommand::GetVersion, None)
            .map_err(|e| DriverError::Handshake(format!("get_version: {e}")))?;
        info!("Sensor box firmware: {}", ascii_payload(&version));

        self.command(SensorCommand::SetMode, None)
            .map_err(|e| DriverError::Handshake(format!("set_mode: {e}")))?;
        debug!("Sensor box mode set");
        Ok(())
    }

    fn select_port_locked(&self, bus: &mut BusState, port: PortId) -> Result<(), DriverError> {
        if bus.current_port == Some(port) {
            return Ok(());
        }

        let selector = self.config.port_selectors[(port.get() - 1) as usize];
        let cmd = SensorCommand::ChoosePort { port, selector };
        let reply = match self.exchange(cmd, None) {
            Ok(reply) => reply,
            Err(e) => {
                bus.current_port = None;
                return Err(e);
            },
        };

        if reply.is_empty() {
            trace!("{}: no select ack, assuming selected", port);
        } else {
            match decode_sensor_response(&reply) {
                Ok(frame) if frame.is_ok() => trace!("{}: selected", port),
                Ok(frame) => warn!(
                    "{}: select ack carries error code 0x{:02X}, selection is suspect",
                    port, frame.error_code
                ),
                Err(e) => debug!("{}: select ack not decodable: {}", port, e),
            }
        }

        bus.current_port = Some(port);
        Ok(())
    }

    fn fetch_locked(
        &self,
        bus: &mut BusState,
        port: PortId,
        cmd: SensorCommand,
        length: u16,
    ) -> Result<SensorFrame, DriverError> {
        self.select_port_locked(bus, port)?;
        self.command(cmd, Some(length)).inspect_err(|e| {
            if e.is_disconnected() {
                bus.current_port = None;
            }
        })
    }

    fn read_force_locked(&self, bus: &mut BusState, port: PortId) -> Result<ForceSample, DriverError> {
        let frame = self.fetch_locked(bus, port, SensorCommand::GetForce, FORCE_SAMPLE_LEN as u16)?;
        let sample = decode_force_payload(&frame.payload)?;
        trace!("{}: force {:?}", port, sample);
        Ok(sample)
    }

    fn read_taxels_locked(
        &self,
        bus: &mut BusState,
        port: PortId,
    ) -> Result<Vec<ForceSample>, DriverError> {
        let length = (self.config.taxel_points * FORCE_SAMPLE_LEN) as u16;
        let frame = self.fetch_locked(bus, port, SensorCommand::GetData, length)?;
        let taxels = decode_taxel_payload(&frame.payload)?;
        if taxels.len() < self.config.taxel_points {
            debug!(
                "{}: {} of {} taxels received",
                port,
                taxels.len(),
                self.config.taxel_points
            );
        }
        Ok(taxels)
    }

    /// 根据一次操作的结果更新端口状态；遇到断线时启动重连
    fn observe<T>(self: &Arc<Self>, port: Option<PortId>, result: &Result<T, DriverError>) {
        match result {
            Ok(_) => {
                if let Some(port) = port {
                    self.set_port_state(port, PortErrorState::NoError);
                }
            },
            Err(DriverError::Device { code, command }) => {
                if let Some(port) = port {
                    warn!("{}: `{}` failed with device code 0x{:02X}", port, command, code);
                    self.set_port_state(port, PortErrorState::Fault(*code));
                }
            },
            Err(e) if e.is_disconnected() => self.handle_disconnect(),
            Err(_) => {},
        }
    }

    fn mark_link_down(&self) {
        self.mark_all(PortErrorState::LinkDown);
        self.forces.clear();
    }

    fn handle_disconnect(self: &Arc<Self>) {
        if self.link_up.swap(false, Ordering::AcqRel) {
            warn!("Sensor box link lost");
        }
        self.mark_link_down();

        if self.shutdown.load(Ordering::Acquire) || self.reconnector.is_current_thread() {
            return;
        }
        if let Err(e) = self.start_reconnect() {
            error!("Failed to start sensor reconnect: {}", e);
        }
    }

    fn refresh_all(self: &Arc<Self>) -> BTreeMap<u8, Option<SmoothedForce>> {
        let mut published = BTreeMap::new();
        let mut link_lost = false;
        {
            let mut bus = self.bus.lock();
            for (i, binding) in self.config.fingers.iter().enumerate() {
                let result = self.read_force_locked(&mut bus, binding.port);
                match &result {
                    Ok(sample) => bus.smoothers[i].push(*sample),
                    Err(e) if e.is_disconnected() => {
                        link_lost = true;
                        break;
                    },
                    // 设备报错的端口不再发布旧窗口里的值
                    Err(DriverError::Device { .. }) => bus.smoothers[i].clear(),
                    // 单帧损坏或超时：保留窗口，继续发布窗口均值
                    Err(e) => debug!("{}: force read skipped: {}", binding.port, e),
                }
                self.observe_port_only(binding.port, &result);

                let mean = bus.smoothers[i].mean();
                self.forces.store(i, mean);
                published.insert(binding.finger, mean);
            }
            if link_lost {
                bus.reset();
            }
        }

        if link_lost {
            self.handle_disconnect();
            published = self
                .config
                .fingers
                .iter()
                .map(|b| (b.finger, None))
                .collect();
        }
        published
    }

    /// 只更新端口状态，不处理断线（调用方持有会话锁）
    fn observe_port_only<T>(&self, port: PortId, result: &Result<T, DriverError>) {
        match result {
            Ok(_) => self.set_port_state(port, PortErrorState::NoError),
            Err(DriverError::Device { code, .. }) => {
                self.set_port_state(port, PortErrorState::Fault(*code))
            },
            Err(_) => {},
        }
    }

    fn start_poller(self: &Arc<Self>) -> Result<bool, DriverError> {
        let shared = self.clone();
        self.poller.start(move |token| shared.poll_loop(token))
    }

    fn poll_loop(self: &Arc<Self>, token: CancelToken) {
        while !token.is_cancelled() && !self.shutdown.load(Ordering::Acquire) {
            let deadline = Instant::now() + self.config.poll_interval;
            if self.channel.is_connected() {
                self.refresh_all();
            } else if !self.reconnector.is_running() {
                // 链路已断但没有重连任务（例如重连刚结束时又断开）
                debug!("Sensor link down while polling, requesting reconnect");
                self.handle_disconnect();
            }
            if !token.sleep_until(deadline) {
                break;
            }
        }
    }

    fn start_reconnect(self: &Arc<Self>) -> Result<(), DriverError> {
        let shared = self.clone();
        if self.reconnector.start(move |token| shared.reconnect_loop(token))? {
            info!("Sensor reconnect started");
        }
        Ok(())
    }

    fn reconnect_loop(self: &Arc<Self>, token: CancelToken) {
        self.poller.stop();
        self.channel.close();
        self.bus.lock().reset();
        self.mark_link_down();

        let policy = &self.config.reconnect;
        let mut backoff = policy.initial_backoff;
        let mut round: u64 = 0;
        loop {
            if token.is_cancelled() || self.shutdown.load(Ordering::Acquire) {
                return;
            }
            round += 1;
            match self.connect_once(&token) {
                Ok(port) => {
                    DriverMetrics::bump(&self.metrics.reconnects);
                    info!("Sensor box reconnected on {} (round {})", port, round);
                    break;
                },
                Err(e) => {
                    warn!(
                        "Sensor reconnect round {} failed: {}; next round in {:?}",
                        round, e, backoff
                    );
                    if !token.sleep(backoff) {
                        return;
                    }
                    backoff = (backoff * 2).min(policy.max_backoff);
                },
            }
        }

        if self.polling_requested.load(Ordering::Acquire)
            && !self.shutdown.load(Ordering::Acquire)
            && let Err(e) = self.start_poller()
        {
            error!("Failed to restart sensor polling: {}", e);
        }
    }

    /// 一轮连接尝试：首选端口在前，扫描结果在后；每个端口重试若干次
    fn connect_once(&self, token: &CancelToken) -> Result<String, DriverError> {
        let mut candidates = vec![self.config.port_name.clone()];
        match self.connector.scan() {
            Ok(ports) => {
                for port in ports {
                    if !candidates.contains(&port) {
                        candidates.push(port);
                    }
                }
            },
            Err(e) => warn!("Sensor port scan failed: {}", e),
        }

        let policy = &self.config.reconnect;
        for port in &candidates {
            for attempt in 1..=policy.attempts_per_port.max(1) {
                if token.is_cancelled() {
                    return Err(DriverError::DeviceNotFound(candidates.clone()));
                }
                match self.connector.open(port, self.config.baud_rate) {
                    Ok(adapter) => {
                        self.channel.replace(adapter);
                        let handshake = {
                            let mut bus = self.bus.lock();
                            bus.reset();
                            self.handshake()
                        };
                        match handshake {
                            Ok(()) => {
                                self.mark_all(PortErrorState::NoError);
                                self.link_up.store(true, Ordering::Release);
                                return Ok(port.clone());
                            },
                            Err(e) => {
                                debug!("{}: attempt {} handshake failed: {}", port, attempt, e);
                                self.channel.close();
                            },
                        }
                    },
                    Err(e) => debug!("{}: attempt {} open failed: {}", port, attempt, e),
                }
                if attempt < policy.attempts_per_port && !token.sleep(policy.retry_delay) {
                    return Err(DriverError::DeviceNotFound(candidates.clone()));
                }
            }
        }
        Err(DriverError::DeviceNotFound(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_state_codes() {
        assert_eq!(PortErrorState::NoError.as_code(), 0);
        assert_eq!(PortErrorState::LinkDown.as_code(), -1);
        assert_eq!(PortErrorState::Fault(5).as_code(), 5);
        assert_eq!(PortErrorState::from_code(-1), PortErrorState::LinkDown);
        assert_eq!(PortErrorState::from_code(0), PortErrorState::NoError);
        assert_eq!(PortErrorState::from_code(7), PortErrorState::Fault(7));
    }

    #[test]
    fn test_default_config() {
        let config = SensorDriverConfig::default();
        assert_eq!(config.fingers.len(), 7);
        assert_eq!(config.fingers[6].finger, 7);
        assert_eq!(config.fingers[6].port.get(), 7);
        assert_eq!(config.baud_rate, 460_800);
        assert_eq!(config.port_selectors[1], 0x03);
    }

    #[test]
    fn test_poller_restarts_reconnect_after_silent_link_loss() {
        use crate::sim::SensorBoxSim;
        use dexhand_serial::{MockConnector, MockSerialAdapter};

        let sim = SensorBoxSim::new();
        sim.set_force(2, [4, 0, 0]);
        let responder = sim.clone();
        let device = MockSerialAdapter::with_responder(move |req| responder.respond(req));
        let config = SensorDriverConfig {
            port_name: "/dev/ttySIM0".to_string(),
            poll_interval: Duration::from_millis(2),
            settle_override: Some(Duration::ZERO),
            reconnect: ReconnectPolicy {
                attempts_per_port: 1,
                retry_delay: Duration::from_millis(1),
                initial_backoff: Duration::from_millis(5),
                max_backoff: Duration::from_millis(20),
            },
            ..Default::default()
        };
        let driver = TouchSensorDriver::connect(
            Box::new(MockConnector::single("/dev/ttySIM0", device)),
            config,
        )
        .unwrap();
        driver.start_polling().unwrap();

        // 句柄被丢弃，但没有任何一次读写报告断线
        driver.shared.channel.close();

        let deadline = Instant::now() + Duration::from_secs(3);
        while driver.metrics().reconnects == 0 || driver.force(2).is_none() {
            assert!(Instant::now() < deadline, "polling never recovered");
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(driver.is_connected());
        assert!(driver.is_polling());
    }

    #[test]
    fn test_ascii_payload_trims_padding() {
        let frame = SensorFrame {
            fixed_id: 0x0E,
            index: 0,
            main_cmd: 0x60,
            sub_cmd: [0xA0, 0x01],
            error_code: 0,
            declared_len: 8,
            payload: b"V1.2.3\0\0".to_vec(),
        };
        assert_eq!(ascii_payload(&frame), "V1.2.3");
    }
}
