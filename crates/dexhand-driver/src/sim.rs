//! 设备模拟器
//!
//! 按协议应答请求帧，用于测试和无硬件调试。模拟器只负责"请求字节 → 应答字节"，
//! 接到 Mock 串口上即可驱动完整的驱动层：
//!
//! ```ignore
//! let sim = SensorBoxSim::new();
//! let responder = sim.clone();
//! let device = MockSerialAdapter::with_responder(move |req| responder.respond(req));
//! ```

use dexhand_protocol::{
    ACTUATOR_COMMAND_HEAD, ACTUATOR_COUNT, ActuatorStatus, CMD_READ_STATUS, CMD_WRITE_REGISTER,
    DEFAULT_PORT_SELECTORS, FORCE_DATA_HEADER_LEN, FORCE_SAMPLE_LEN, Register,
    SENSOR_TAIL, encode_sensor_response, sum8, verify_sensor_frame,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

// ----------------------------------------------------------------------
// 传感器控制盒
// ----------------------------------------------------------------------

struct SensorSimState {
    firmware: String,
    selected: Option<u8>,
    /// 按选择字节索引；队列只剩一个值时保持不变
    forces: HashMap<u8, VecDeque<[u8; FORCE_SAMPLE_LEN]>>,
    port_errors: HashMap<u8, u8>,
    reject_mode: bool,
    silent_select: bool,
    /// 接下来若干条力数据应答的校验字节被翻转
    corrupt_forces: usize,
    history: Vec<&'static str>,
}

/// 触觉传感器控制盒模拟器
#[derive(Clone)]
pub struct SensorBoxSim {
    state: Arc<Mutex<SensorSimState>>,
}

impl SensorBoxSim {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SensorSimState {
                firmware: "V1.0.0".to_string(),
                selected: None,
                forces: HashMap::new(),
                port_errors: HashMap::new(),
                reject_mode: false,
                silent_select: false,
                corrupt_forces: 0,
                history: Vec::new(),
            })),
        }
    }

    fn selector(port: u8) -> u8 {
        DEFAULT_PORT_SELECTORS[(port.clamp(1, 10) - 1) as usize]
    }

    /// 设置某个端口的合力原始字节（x/y 有符号，z 无符号）
    pub fn set_force(&self, port: u8, raw: [u8; FORCE_SAMPLE_LEN]) {
        self.state
            .lock()
            .forces
            .insert(Self::selector(port), VecDeque::from([raw]));
    }

    /// 设置某个端口依次返回的读数，最后一个值保持
    pub fn push_forces(&self, port: u8, raws: &[[u8; FORCE_SAMPLE_LEN]]) {
        self.state
            .lock()
            .forces
            .insert(Self::selector(port), raws.iter().copied().collect());
    }

    /// 让某个端口的数据命令返回设备错误码（0 表示恢复正常）
    pub fn set_port_error(&self, port: u8, code: u8) {
        let mut state = self.state.lock();
        if code == 0 {
            state.port_errors.remove(&Self::selector(port));
        } else {
            state.port_errors.insert(Self::selector(port), code);
        }
    }

    /// 拒绝 set_mode（握手失败）
    pub fn set_reject_mode(&self, reject: bool) {
        self.state.lock().reject_mode = reject;
    }

    /// 端口选择命令不回确认
    pub fn set_silent_select(&self, silent: bool) {
        self.state.lock().silent_select = silent;
    }

    /// 接下来 `count` 条力数据应答带错误的 LRC
    pub fn corrupt_next_forces(&self, count: usize) {
        self.state.lock().corrupt_forces = count;
    }

    pub fn set_firmware(&self, firmware: &str) {
        self.state.lock().firmware = firmware.to_string();
    }

    /// 当前选中的端口（1..=10）
    pub fn selected_port(&self) -> Option<u8> {
        let selected = self.state.lock().selected?;
        DEFAULT_PORT_SELECTORS
            .iter()
            .position(|s| *s == selected)
            .map(|i| i as u8 + 1)
    }

    /// 收到的命令名称（按顺序）
    pub fn history(&self) -> Vec<&'static str> {
        self.state.lock().history.clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.state
            .lock()
            .history
            .iter()
            .filter(|c| **c == command)
            .count()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// 应答一帧请求；无法识别的请求不应答
    pub fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        let body = verify_sensor_frame(request).ok()?;
        if body.len() < 7 {
            return None;
        }
        let mut state = self.state.lock();

        match (body[2], body[3], body[4]) {
            (0x60, 0xA0, 0x01) => {
                state.history.push("get_version");
                let firmware = state.firmware.clone();
                Some(encode_sensor_response(body, 0, firmware.as_bytes()))
            },
            (0x70, 0xC0, 0x0C) => {
                state.history.push("set_mode");
                let code = if state.reject_mode { 0x01 } else { 0x00 };
                Some(encode_sensor_response(body, code, &[]))
            },
            (0x70, 0xC0, 0x0D) => {
                state.history.push("get_mode");
                Some(encode_sensor_response(body, 0, &[0x05]))
            },
            (0x70, 0xB0, 0x02) => {
                state.history.push("recalibration");
                Some(encode_sensor_response(body, 0, &[0x01]))
            },
            (0x70, 0xB1, 0x0A) => {
                state.history.push("choose_port");
                state.selected = body.get(7).copied();
                if state.silent_select {
                    None
                } else {
                    Some(encode_sensor_response(body, 0, &[]))
                }
            },
            (0x70, 0xC0, 0x06) if body.len() >= 12 => {
                let is_force = body[8..10] == [0xF0, 0x03];
                state.history.push(if is_force { "get_force" } else { "get_data" });
                let requested = u16::from_le_bytes([body[10], body[11]]) as usize;

                let selector = state.selected?;
                if let Some(code) = state.port_errors.get(&selector) {
                    return Some(encode_sensor_response(body, *code, &[]));
                }

                let sample = match state.forces.get_mut(&selector) {
                    Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
                    Some(queue) => queue.front().copied().unwrap_or_default(),
                    None => [0; FORCE_SAMPLE_LEN],
                };

                let mut payload = vec![0u8; FORCE_DATA_HEADER_LEN];
                for _ in 0..(requested / FORCE_SAMPLE_LEN).max(1) {
                    payload.extend_from_slice(&sample);
                }
                let mut frame = encode_sensor_response(body, 0, &payload);
                if state.corrupt_forces > 0 {
                    state.corrupt_forces -= 1;
                    // LRC 位于帧尾之前
                    let lrc_at = frame.len() - SENSOR_TAIL.len() - 1;
                    frame[lrc_at] ^= 0xFF;
                }
                Some(frame)
            },
            _ => None,
        }
    }
}

impl Default for SensorBoxSim {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------
// 电缸总线
// ----------------------------------------------------------------------

/// 模拟器记录的一次寄存器写入
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    pub id: u8,
    pub register: u16,
    pub values: Vec<u16>,
}

struct ActuatorSimState {
    axes: [ActuatorStatus; ACTUATOR_COUNT],
    silent: [bool; ACTUATOR_COUNT],
    writes: Vec<RegisterWrite>,
    status_reads: usize,
}

/// 电缸总线模拟器：位置写入立即生效
#[derive(Clone)]
pub struct ActuatorBankSim {
    state: Arc<Mutex<ActuatorSimState>>,
}

impl ActuatorBankSim {
    pub fn new() -> Self {
        let axes = std::array::from_fn(|i| ActuatorStatus {
            id: i as u8 + 1,
            temperature_c: 30,
            ..Default::default()
        });
        Self {
            state: Arc::new(Mutex::new(ActuatorSimState {
                axes,
                silent: [false; ACTUATOR_COUNT],
                writes: Vec::new(),
                status_reads: 0,
            })),
        }
    }

    fn index(id: u8) -> Option<usize> {
        (1..=ACTUATOR_COUNT as u8)
            .contains(&id)
            .then(|| (id - 1) as usize)
    }

    /// 某个轴的当前状态
    pub fn status(&self, id: u8) -> Option<ActuatorStatus> {
        Self::index(id).map(|i| self.state.lock().axes[i])
    }

    pub fn set_fault(&self, id: u8, code: u8) {
        if let Some(i) = Self::index(id) {
            self.state.lock().axes[i].error_code = code;
        }
    }

    /// 让某个轴不应答读状态
    pub fn set_silent(&self, id: u8, silent: bool) {
        if let Some(i) = Self::index(id) {
            self.state.lock().silent[i] = silent;
        }
    }

    pub fn writes(&self) -> Vec<RegisterWrite> {
        self.state.lock().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    pub fn status_reads(&self) -> usize {
        self.state.lock().status_reads
    }

    /// 应答一帧请求；写寄存器不应答
    pub fn respond(&self, request: &[u8]) -> Option<Vec<u8>> {
        if request.len() < 6 || request[..2] != ACTUATOR_COMMAND_HEAD {
            return None;
        }
        let len = request[2] as usize;
        let total = len + 5;
        if request.len() < total || sum8(&request[2..total - 1]) != request[total - 1] {
            return None;
        }
        let id = request[3];
        let index = Self::index(id)?;
        let mut state = self.state.lock();

        match request[4] {
            CMD_READ_STATUS => {
                state.status_reads += 1;
                if state.silent[index] {
                    return None;
                }
                Some(state.axes[index].encode_reply())
            },
            CMD_WRITE_REGISTER if len >= 5 => {
                let register = u16::from_le_bytes([request[5], request[6]]);
                let values: Vec<u16> = request[7..total - 1]
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                apply_write(&mut state.axes[index], register, &values);
                state.writes.push(RegisterWrite {
                    id,
                    register,
                    values,
                });
                None
            },
            _ => None,
        }
    }
}

impl Default for ActuatorBankSim {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_write(axis: &mut ActuatorStatus, register: u16, values: &[u16]) {
    let position = |v: u16| v as i16;
    match (register, values) {
        (r, [pos, ..]) if r == u16::from(Register::Position) => {
            axis.target_position = position(*pos);
            axis.current_position = position(*pos);
        },
        // 速度 + 位置两个连续寄存器
        (r, [_, pos, ..]) if r == u16::from(Register::Speed) => {
            axis.target_position = position(*pos);
            axis.current_position = position(*pos);
        },
        (r, [1, ..]) if r == u16::from(Register::ClearFault) => axis.error_code = 0,
        _ => {},
    }
}
