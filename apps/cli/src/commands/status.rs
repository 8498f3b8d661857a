//! 状态查询命令

use anyhow::Result;
use clap::Args;
use dexhand_sdk::{HandStatus, HardwareContext};
use std::fmt::Write;
use std::time::Duration;

/// 状态查询命令参数
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub fn execute(&self, ctx: &HardwareContext) -> Result<()> {
        // 等一个轮询周期，让快照表填满
        let poll_ms = ctx.config().actuator.poll_interval_ms;
        std::thread::sleep(Duration::from_millis(poll_ms * 2));
        let status = ctx.status();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
        } else {
            print!("{}", format_status(&status));
        }
        Ok(())
    }
}

/// 把状态快照渲染成终端表格
pub fn format_status(status: &HandStatus) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "电缸 [{}]",
        if status.actuator_connected { "在线" } else { "离线" }
    );
    let _ = writeln!(out, "  轴   位置   目标   电流mA   力g   温度   故障");
    for axis in &status.axes {
        match &axis.status {
            Some(s) => {
                let _ = writeln!(
                    out,
                    "  {:<3} {:>5}  {:>5}  {:>7}  {:>5}  {:>4}   {}",
                    axis.axis,
                    s.current_position,
                    s.target_position,
                    s.current_ma,
                    s.force_grams,
                    s.temperature_c,
                    if s.has_fault() { format!("0x{:02X}", s.error_code) } else { "-".into() }
                );
            },
            None => {
                let _ = writeln!(out, "  {:<3} (无数据)", axis.axis);
            },
        }
    }

    let _ = writeln!(
        out,
        "传感器 [{}]",
        if status.sensor_connected { "在线" } else { "离线" }
    );
    let _ = writeln!(out, "  手指 端口      fx       fy       fz      |F|   状态");
    for finger in &status.fingers {
        let state = match finger.error_code {
            0 => "正常".to_string(),
            -1 => "断开".to_string(),
            code => format!("错误 {code}"),
        };
        match (finger.force, finger.magnitude) {
            (Some([fx, fy, fz]), Some(magnitude)) => {
                let _ = writeln!(
                    out,
                    "  {:<4} {:<4} {:>8.2} {:>8.2} {:>8.2} {:>8.2}   {}",
                    finger.finger, finger.port, fx, fy, fz, magnitude, state
                );
            },
            _ => {
                let _ = writeln!(
                    out,
                    "  {:<4} {:<4} {:>8} {:>8} {:>8} {:>8}   {}",
                    finger.finger, finger.port, "-", "-", "-", "-", state
                );
            },
        }
    }

    let _ = writeln!(
        out,
        "抓取状态: {} ({})",
        status.grasp_state.label(),
        status.grasp_state
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexhand_sdk::GraspState;
    use dexhand_sdk::client::{AxisView, FingerView};
    use dexhand_sdk::protocol::ActuatorStatus;

    fn sample() -> HandStatus {
        HandStatus {
            axes: vec![
                AxisView {
                    axis: 1,
                    status: Some(ActuatorStatus {
                        id: 1,
                        target_position: 600,
                        current_position: 580,
                        error_code: 0x04,
                        ..Default::default()
                    }),
                },
                AxisView {
                    axis: 2,
                    status: None,
                },
            ],
            fingers: vec![
                FingerView {
                    finger: 1,
                    port: 1,
                    force: Some([1.0, -2.0, 12.5]),
                    magnitude: Some(12.7),
                    error_code: 0,
                },
                FingerView {
                    finger: 2,
                    port: 2,
                    force: None,
                    magnitude: None,
                    error_code: -1,
                },
            ],
            grasp_state: GraspState::Closing,
            actuator_connected: true,
            sensor_connected: false,
        }
    }

    #[test]
    fn test_format_status_table() {
        let text = format_status(&sample());
        assert!(text.contains("电缸 [在线]"));
        assert!(text.contains("传感器 [离线]"));
        assert!(text.contains("0x04"));
        assert!(text.contains("(无数据)"));
        assert!(text.contains("12.50"));
        assert!(text.contains("断开"));
        assert!(text.contains("抓取状态: 抓取中 (closing)"));
    }

    #[test]
    fn test_status_json_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["grasp_state"], "closing");
        assert_eq!(value["axes"][0]["status"]["current_position"], 580);
        assert!(value["axes"][1]["status"].is_null());
        assert_eq!(value["fingers"][1]["error_code"], -1);
    }
}
