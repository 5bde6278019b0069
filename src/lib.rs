/*!
 * HDMI-CEC adapter driver on top of the [CEC linux API](https://www.kernel.org/doc/html/v4.9/media/uapi/cec/cec-api.html).
 *
 * [open_adapter] opens `/dev/cecX`, takes exclusive pass-through control and starts
 * a thread that hands hotplug changes and received messages to a callback.
 * Everything else goes through the [HdmiCec] trait.
 *
 * ```no_run
 * # use hdmi_cec::{AdapterConfig, CecLogicalAddress, CecMessage, CecOpcode, DeviceType, HdmiCec, HdmiEvent};
 * # use std::sync::Arc;
 * # fn main() -> hdmi_cec::Result<()> {
 * let config = AdapterConfig::default().with_device_type(DeviceType::Playback);
 * let cec = hdmi_cec::open_adapter(config)?;
 * cec.register_event_callback(Arc::new(|event: &HdmiEvent| println!("{event:?}")));
 * cec.add_logical_address(CecLogicalAddress::Playback1)?;
 * let outcome = cec.send_message(&CecMessage::new(
 *     CecLogicalAddress::Playback1,
 *     CecLogicalAddress::Tv,
 *     CecOpcode::GiveDevicePowerStatus,
 *     &[],
 * ))?;
 * println!("{outcome:?}");
 * # Ok(())
 * # }
 * ```
 */
mod adapter;
mod claim;
mod config;
mod device;
mod error;
pub mod event_loop;
mod filter;
mod frame;
mod state;
mod sys;

pub use adapter::{CecAdapter, CecOption, HdmiCec, PortDirection, PortInfo, REQUIRED_CAPABILITIES};
pub use claim::{claim, release, AddressClaim};
pub use config::{AdapterConfig, DeviceType, DEFAULT_DEVICE, HDMI_LLC_VENDOR_ID};
pub use device::{
    poll_readiness, AdapterEvent, CecDevice, CecGateway, PhysicalAddress, Readiness,
    ShutdownSignal, TxOutcome,
};
pub use error::{CecError, Result};
pub use filter::{is_deliverable_while_inactive, should_deliver};
pub use frame::{CecFrame, CecMessage, MAX_BODY_LEN, MAX_FRAME_LEN};
pub use state::{EventCallback, HdmiEvent, RuntimeFlags, RuntimeState};
pub use sys::{
    AllDevTypes, Capabilities, CecCaps, CecLogAddrFlags, CecLogAddrMask, CecLogAddrType,
    CecLogAddrs, CecLogicalAddress, CecModeFollower, CecModeInitiator, CecOpcode,
    CecPrimDevType, CecUserControlCode, OSDStr, RxStatus, TxStatus, Version,
};

/// Open the adapter described by `config`.
pub fn open_adapter(config: AdapterConfig) -> Result<CecAdapter<CecDevice>> {
    CecAdapter::open(config)
}
