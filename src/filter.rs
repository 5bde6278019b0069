//! Which frames still reach the HDMI control service while system CEC control is off.

use crate::frame::CecFrame;
use crate::sys::{CecOpcode, CecUserControlCode};

/// `true` if `frame` is delivered while CEC control is inactive.
///
/// Queries about this device and basic playback control are always let through.
/// Key presses only if they wake the device or open its root menu. Polls and
/// everything else are suppressed.
pub fn is_deliverable_while_inactive(frame: &CecFrame) -> bool {
    let Some(opcode) = frame.opcode() else {
        return false;
    };
    match CecOpcode::try_from(opcode) {
        Ok(
            CecOpcode::Abort
            | CecOpcode::DeviceVendorId
            | CecOpcode::GiveDeviceVendorId
            | CecOpcode::GetCecVersion
            | CecOpcode::GetMenuLanguage
            | CecOpcode::GiveDevicePowerStatus
            | CecOpcode::ReportPowerStatus
            | CecOpcode::GiveOsdName
            | CecOpcode::SetOsdName
            | CecOpcode::GivePhysicalAddr
            | CecOpcode::ReportPhysicalAddr
            | CecOpcode::DeckControl
            | CecOpcode::Play,
        ) => true,
        Ok(CecOpcode::UserControlPressed) => is_wakeup_key(frame.operands()),
        _ => false,
    }
}

fn is_wakeup_key(operands: &[u8]) -> bool {
    matches!(
        operands.first().map(|&key| CecUserControlCode::try_from(key)),
        Some(Ok(
            CecUserControlCode::Power
                | CecUserControlCode::RootMenu
                | CecUserControlCode::PowerOnFunction
        ))
    )
}

/// `true` if a received frame is handed to the callback given the control state.
pub fn should_deliver(frame: &CecFrame, control_active: bool) -> bool {
    control_active || is_deliverable_while_inactive(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8]) -> CecFrame {
        CecFrame::from_bytes(bytes).unwrap()
    }

    #[test]
    fn power_key_wakes() {
        let power = frame(&[0x04, 0x44, 0x40]);
        assert!(is_deliverable_while_inactive(&power));
        assert!(should_deliver(&power, false));
        assert!(should_deliver(&power, true));
    }

    #[test]
    fn other_keys_suppressed_while_inactive() {
        let volume_up = frame(&[0x04, 0x44, 0x41]);
        assert!(!is_deliverable_while_inactive(&volume_up));
        assert!(!should_deliver(&volume_up, false));
        assert!(should_deliver(&volume_up, true));
    }

    #[test]
    fn root_menu_and_power_on_wake() {
        assert!(is_deliverable_while_inactive(&frame(&[0x04, 0x44, 0x09])));
        assert!(is_deliverable_while_inactive(&frame(&[0x04, 0x44, 0x6d])));
        // power toggle and power off are not in the wake set
        assert!(!is_deliverable_while_inactive(&frame(&[0x04, 0x44, 0x6b])));
        assert!(!is_deliverable_while_inactive(&frame(&[0x04, 0x44, 0x6c])));
    }

    #[test]
    fn key_press_without_key() {
        assert!(!is_deliverable_while_inactive(&frame(&[0x04, 0x44])));
    }

    #[test]
    fn allow_list() {
        for opcode in [
            0xff, 0x87, 0x8c, 0x9f, 0x91, 0x8f, 0x90, 0x46, 0x47, 0x83, 0x84, 0x42, 0x41,
        ] {
            assert!(
                is_deliverable_while_inactive(&frame(&[0x0f, opcode])),
                "{opcode:#04x}"
            );
        }
    }

    #[test]
    fn suppressed_while_inactive() {
        for opcode in [
            CecOpcode::ActiveSource,
            CecOpcode::SetStreamPath,
            CecOpcode::Standby,
            CecOpcode::UserControlReleased,
            CecOpcode::VendorCommand,
            CecOpcode::FeatureAbort,
        ] {
            let f = frame(&[0x0f, opcode.into()]);
            assert!(!is_deliverable_while_inactive(&f), "{opcode:?}");
            assert!(should_deliver(&f, true));
        }
        // unknown opcode and poll
        assert!(!is_deliverable_while_inactive(&frame(&[0x04, 0x3e])));
        assert!(!is_deliverable_while_inactive(&frame(&[0x04])));
    }
}
