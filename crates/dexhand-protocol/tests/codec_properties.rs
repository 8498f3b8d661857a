//! 帧编解码的属性测试
//!
//! 使用 proptest 验证校验和往返和单字节损坏检测。

use dexhand_protocol::*;
use proptest::prelude::*;

fn sensor_command() -> impl Strategy<Value = (SensorCommand, Option<u16>)> {
    prop_oneof![
        Just((SensorCommand::GetVersion, None)),
        Just((SensorCommand::SetMode, None)),
        Just((SensorCommand::GetMode, None)),
        Just((SensorCommand::Recalibration, None)),
        (1u8..=10, any::<u8>()).prop_map(|(port, selector)| {
            let port = PortId::new(port).unwrap();
            (SensorCommand::ChoosePort { port, selector }, None)
        }),
        any::<u16>().prop_map(|len| (SensorCommand::GetData, Some(len))),
        any::<u16>().prop_map(|len| (SensorCommand::GetForce, Some(len))),
    ]
}

fn actuator_command() -> impl Strategy<Value = ActuatorCommand> {
    let register = prop_oneof![
        Just(Register::ClearFault),
        Just(Register::Pause),
        Just(Register::Mode),
        Just(Register::Voltage),
        Just(Register::Speed),
        Just(Register::Position),
    ];
    prop_oneof![
        (1u8..=6).prop_map(|id| ActuatorCommand::read_status(AxisId::new(id).unwrap())),
        (
            1u8..=6,
            register,
            prop::collection::vec(any::<u16>(), 1..=MAX_REGISTER_VALUES)
        )
            .prop_map(|(id, register, values)| {
                ActuatorCommand::write(AxisId::new(id).unwrap(), register, &values)
            }),
    ]
}

fn actuator_status() -> impl Strategy<Value = ActuatorStatus> {
    (
        1u8..=6,
        any::<i16>(),
        any::<i16>(),
        any::<u16>(),
        any::<i16>(),
        any::<u16>(),
        any::<i8>(),
        any::<u8>(),
    )
        .prop_map(
            |(id, target, current, ma, force, adc, temp, err)| ActuatorStatus {
                id,
                target_position: target,
                current_position: current,
                current_ma: ma,
                force_grams: force,
                force_adc_raw: adc,
                temperature_c: temp,
                error_code: err,
            },
        )
}

proptest! {
    /// 编码出的传感器命令帧总能通过校验
    #[test]
    fn sensor_command_checksum_roundtrip((cmd, len) in sensor_command()) {
        let frame = cmd.encode(len).unwrap();
        prop_assert_eq!(&frame[..4], &SENSOR_HEAD);
        prop_assert_eq!(&frame[frame.len() - 4..], &SENSOR_TAIL);
        prop_assert!(verify_sensor_frame(&frame).is_ok());
    }

    /// 传感器应答往返：错误码、长度和数据域原样取回
    #[test]
    fn sensor_response_roundtrip(
        error_code in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let request = SensorCommand::GetForce.body(Some(payload.len() as u16)).unwrap();
        let raw = encode_sensor_response(&request, error_code, &payload);
        let frame = decode_sensor_response(&raw).unwrap();
        prop_assert_eq!(frame.error_code, error_code);
        prop_assert_eq!(frame.declared_len as usize, payload.len());
        prop_assert_eq!(frame.payload, payload);
    }

    /// 修改帧体或校验字节中的任意一个字节都会被 LRC 检出
    #[test]
    fn sensor_single_byte_corruption_detected(
        (cmd, len) in sensor_command(),
        pick in any::<prop::sample::Index>(),
        delta in 1u8..=255,
    ) {
        let mut frame = cmd.encode(len).unwrap();
        // 可修改范围：帧头之后到帧尾之前（含校验字节）
        let span = frame.len() - 8;
        let at = 4 + pick.index(span);
        frame[at] ^= delta;
        let is_checksum_mismatch = matches!(
            verify_sensor_frame(&frame),
            Err(FrameError::ChecksumMismatch { .. })
        );
        prop_assert!(is_checksum_mismatch);
    }

    /// 电缸命令帧：长度字段与整帧长度一致，累加和正确
    #[test]
    fn actuator_command_length_and_sum(cmd in actuator_command()) {
        let frame = cmd.encode().unwrap();
        prop_assert_eq!(&frame[..2], &ACTUATOR_COMMAND_HEAD);
        prop_assert_eq!(frame.len(), frame[2] as usize + 5);
        let body = &frame[2..frame.len() - 1];
        prop_assert_eq!(sum8(body), frame[frame.len() - 1]);
        prop_assert_eq!(frame[3], cmd.id().get());
    }

    /// 电缸状态应答往返
    #[test]
    fn actuator_status_roundtrip(status in actuator_status()) {
        let raw = status.encode_reply();
        prop_assert_eq!(raw.len(), STATUS_REPLY_LEN);
        let reply = decode_actuator_reply(&raw).unwrap();
        prop_assert_eq!(ActuatorStatus::from_reply(&reply).unwrap(), status);
    }

    /// 电缸应答中除帧头和长度字段外的任意单字节损坏都会被累加和检出
    #[test]
    fn actuator_single_byte_corruption_detected(
        status in actuator_status(),
        at in 3usize..STATUS_REPLY_LEN,
        delta in 1u8..=255,
    ) {
        let mut raw = status.encode_reply();
        raw[at] ^= delta;
        let is_checksum_mismatch = matches!(
            decode_actuator_reply(&raw),
            Err(FrameError::ChecksumMismatch { .. })
        );
        prop_assert!(is_checksum_mismatch);
    }

    /// 有符号轴与字节的补码解释一致
    #[test]
    fn signed_axis_matches_twos_complement(byte in any::<u8>()) {
        let expected = if byte >= 0x80 { byte as i16 - 256 } else { byte as i16 };
        prop_assert_eq!(signed_axis(byte), expected);
        prop_assert_eq!(unsigned_axis(byte), byte as i16);
    }
}

#[test]
fn corrupting_length_field_is_rejected() {
    let status = ActuatorStatus {
        id: 2,
        ..Default::default()
    };
    let mut raw = status.encode_reply();
    raw[2] = 0x40;
    assert!(decode_actuator_reply(&raw).is_err());
}
