//! The adapter facade: lifecycle, address management, transmit and options.

use crate::claim;
use crate::config::{AdapterConfig, DeviceType};
use crate::device::{CecDevice, CecGateway, PhysicalAddress, ShutdownSignal, TxOutcome};
use crate::error::{CecError, Result};
use crate::event_loop::{self, PORT_ID};
use crate::frame::CecMessage;
use crate::state::{EventCallback, RuntimeFlags, RuntimeState};
use crate::sys::{
    Capabilities, CecLogAddrMask, CecLogAddrs, CecLogicalAddress, CecModeFollower,
    CecModeInitiator, Version,
};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capabilities an adapter needs to be driven by [CecAdapter].
pub const REQUIRED_CAPABILITIES: Capabilities = Capabilities::LOG_ADDRS
    .union(Capabilities::TRANSMIT)
    .union(Capabilities::PASSTHROUGH);

/// Runtime switches of [HdmiCec::set_option].
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum CecOption {
    /// Wake the system on `<Image View On>` and friends. Accepted and ignored.
    Wakeup = 1,
    /// Turn CEC on or off as a whole.
    EnableCec = 2,
    /// The HDMI control service is in charge. Off means standby filtering.
    SystemCecControl = 3,
}

impl CecOption {
    /// `None` for flags this adapter does not know.
    pub fn from_raw(flag: i32) -> Option<Self> {
        Self::try_from(flag).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl From<DeviceType> for PortDirection {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Tv => PortDirection::Input,
            _ => PortDirection::Output,
        }
    }
}

/// Description of an HDMI port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortInfo {
    pub direction: PortDirection,
    pub port_id: u32,
    pub cec_supported: bool,
    pub arc_supported: bool,
    pub physical_address: PhysicalAddress,
}

/// Control surface of an HDMI CEC adapter.
pub trait HdmiCec {
    /// Claim `address`. Returns the claimed address mask.
    fn add_logical_address(&self, address: CecLogicalAddress) -> Result<CecLogAddrMask>;
    /// Release all claimed addresses. Failures are only logged.
    fn clear_logical_address(&self);
    fn physical_address(&self) -> Result<PhysicalAddress>;
    /// Send one message and wait for its link outcome. Not retried.
    fn send_message(&self, message: &CecMessage) -> Result<TxOutcome>;
    /// Install the callback receiving hotplug and message notifications.
    fn register_event_callback(&self, callback: EventCallback);
    fn cec_version(&self) -> Version;
    fn vendor_id(&self) -> u32;
    fn port_info(&self) -> Vec<PortInfo>;
    fn set_option(&self, option: CecOption, value: bool);
    /// Raw form of [HdmiCec::set_option]. Unknown flags are ignored, `1` means on.
    fn set_option_raw(&self, flag: i32, value: i32) {
        match CecOption::from_raw(flag) {
            Some(option) => self.set_option(option, value == 1),
            None => debug!(flag, "ignoring unknown option"),
        }
    }
    /// Audio return channel is not supported.
    fn set_audio_return_channel(&self, port_id: u32, enable: bool) -> Result<()>;
    fn is_connected(&self, port_id: u32) -> Result<bool>;
}

/// Resources held while the adapter is open.
struct Session<G> {
    gateway: Arc<G>,
    shutdown: Arc<ShutdownSignal>,
    worker: Option<JoinHandle<()>>,
}

/// An open CEC adapter with its event loop.
///
/// ```no_run
/// # use hdmi_cec::{AdapterConfig, CecAdapter, CecLogicalAddress, HdmiCec, HdmiEvent};
/// # use std::sync::Arc;
/// # fn main() -> hdmi_cec::Result<()> {
/// let adapter = CecAdapter::open(AdapterConfig::for_device("cec0"))?;
/// adapter.register_event_callback(Arc::new(|event: &HdmiEvent| println!("{event:?}")));
/// adapter.add_logical_address(CecLogicalAddress::Playback1)?;
/// # Ok(())
/// # }
/// ```
pub struct CecAdapter<G: CecGateway = CecDevice> {
    config: AdapterConfig,
    state: Arc<RuntimeState>,
    session: Mutex<Option<Session<G>>>,
    last_phys_addr: Mutex<PhysicalAddress>,
}

impl CecAdapter<CecDevice> {
    /// Open the device named by `config` and start listening.
    pub fn open(config: AdapterConfig) -> Result<Self> {
        let device = CecDevice::open(config.device_path())?;
        Self::with_gateway(device, config)
    }
}

impl<G: CecGateway> CecAdapter<G> {
    /// Bring up `gateway`: check capabilities, take exclusive pass-through,
    /// drop stale claims and start the event loop.
    pub fn with_gateway(gateway: G, config: AdapterConfig) -> Result<Self> {
        let caps = gateway.capabilities()?;
        if !caps.contains(REQUIRED_CAPABILITIES) {
            error!(?caps, "adapter lacks required capabilities");
            return Err(CecError::UnsupportedAdapter(caps));
        }
        gateway.set_mode(CecModeInitiator::Send, CecModeFollower::ExclusivePassthru)?;
        gateway.set_log_addrs(CecLogAddrs::default())?;

        let shutdown = Arc::new(ShutdownSignal::new()?);
        let gateway = Arc::new(gateway);
        let state = Arc::new(RuntimeState::default());
        // the loop drops everything while CEC is disabled
        state.set_flags(RuntimeFlags::ACTIVE);
        let worker = event_loop::spawn(gateway.clone(), state.clone(), shutdown.clone())
            .inspect_err(|_| state.set_flags(RuntimeFlags::default()))?;

        info!(path = %config.device_path().display(), "CEC adapter open");
        Ok(Self {
            config,
            state,
            session: Mutex::new(Some(Session {
                gateway,
                shutdown,
                worker: Some(worker),
            })),
            last_phys_addr: Mutex::new(PhysicalAddress::INVALID),
        })
    }

    /// Stop the event loop and release the device. Later calls do nothing.
    pub fn close(&self) {
        let Some(mut session) = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };
        self.state.set_flags(RuntimeFlags::default());
        let raised = session.shutdown.raise().or_else(|e| {
            warn!("signalling event loop shutdown: {e}, retrying");
            session.shutdown.raise()
        });
        let worker = session.worker.take();
        match (raised, worker) {
            (Ok(()), Some(worker)) => {
                if worker.thread().id() == std::thread::current().id() {
                    // closed from the callback, the loop exits once it returns
                    debug!("close called on the event loop thread");
                } else if worker.join().is_err() {
                    error!("event loop panicked");
                }
            }
            // joining would block until the adapter wakes the loop
            (Err(e), Some(_)) => error!(
                "signalling event loop shutdown: {e}, \
                 the device stays open until the adapter wakes the event loop"
            ),
            (_, None) => {}
        }
        info!("CEC adapter closed");
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Current flags, as toggled by [HdmiCec::set_option].
    pub fn flags(&self) -> RuntimeFlags {
        self.state.flags()
    }

    /// Addresses the adapter currently holds.
    pub fn claimed_addresses(&self) -> Result<CecLogAddrMask> {
        Ok(self.gateway()?.log_addrs()?.log_addr_mask)
    }

    fn gateway(&self) -> Result<Arc<G>> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.gateway.clone())
            .ok_or(CecError::Closed)
    }

    fn remember_phys_addr(&self, addr: PhysicalAddress) {
        *self
            .last_phys_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = addr;
    }

    fn last_phys_addr(&self) -> PhysicalAddress {
        *self
            .last_phys_addr
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<G: CecGateway> HdmiCec for CecAdapter<G> {
    fn add_logical_address(&self, address: CecLogicalAddress) -> Result<CecLogAddrMask> {
        claim::claim(&*self.gateway()?, address, &self.config)
    }

    fn clear_logical_address(&self) {
        match self.gateway() {
            Ok(gateway) => claim::release(&*gateway),
            Err(e) => debug!("not releasing addresses: {e}"),
        }
    }

    fn physical_address(&self) -> Result<PhysicalAddress> {
        let addr = self.gateway()?.phys_addr()?;
        self.remember_phys_addr(addr);
        Ok(addr)
    }

    fn send_message(&self, message: &CecMessage) -> Result<TxOutcome> {
        let gateway = self.gateway()?;
        if !self.state.cec_enabled() {
            return Err(CecError::Disabled);
        }
        let frame = message.encode()?;
        let status = gateway.transmit(&frame)?;
        let outcome = TxOutcome::from_status(status);
        debug!(?frame, ?status, ?outcome, "transmitted");
        Ok(outcome)
    }

    fn register_event_callback(&self, callback: EventCallback) {
        self.state.set_callback(Some(callback));
    }

    fn cec_version(&self) -> Version {
        self.config.cec_version()
    }

    fn vendor_id(&self) -> u32 {
        self.config.vendor_id()
    }

    fn port_info(&self) -> Vec<PortInfo> {
        let physical_address = match self.physical_address() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("querying physical address: {e}");
                self.last_phys_addr()
            }
        };
        vec![PortInfo {
            direction: self.config.device_type().into(),
            port_id: PORT_ID,
            cec_supported: true,
            arc_supported: false,
            physical_address,
        }]
    }

    fn set_option(&self, option: CecOption, value: bool) {
        debug!(?option, value, "set option");
        match option {
            CecOption::Wakeup => {}
            CecOption::EnableCec => self.state.update_flags(|f| f.cec_enabled = value),
            CecOption::SystemCecControl => self.state.update_flags(|f| f.control_active = value),
        }
    }

    fn set_audio_return_channel(&self, _port_id: u32, _enable: bool) -> Result<()> {
        Err(CecError::NotSupported("audio return channel"))
    }

    fn is_connected(&self, port_id: u32) -> Result<bool> {
        if port_id != PORT_ID {
            return Err(CecError::NotSupported("ports other than 1"));
        }
        Ok(self.physical_address()?.is_valid())
    }
}

impl<G: CecGateway> Drop for CecAdapter<G> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<G: CecGateway> std::fmt::Debug for CecAdapter<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("CecAdapter")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("open", &open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_options() {
        assert_eq!(CecOption::from_raw(1), Some(CecOption::Wakeup));
        assert_eq!(CecOption::from_raw(2), Some(CecOption::EnableCec));
        assert_eq!(CecOption::from_raw(3), Some(CecOption::SystemCecControl));
        assert_eq!(CecOption::from_raw(0), None);
        assert_eq!(CecOption::from_raw(4), None);
        assert_eq!(i32::from(CecOption::SystemCecControl), 3);
    }

    #[test]
    fn port_direction_follows_device_type() {
        assert_eq!(PortDirection::from(DeviceType::Tv), PortDirection::Input);
        for t in [
            DeviceType::Playback,
            DeviceType::Recorder,
            DeviceType::Tuner,
            DeviceType::AudioSystem,
        ] {
            assert_eq!(PortDirection::from(t), PortDirection::Output);
        }
    }

    #[test]
    fn required_capabilities() {
        assert!(REQUIRED_CAPABILITIES.contains(Capabilities::PASSTHROUGH));
        assert!(!REQUIRED_CAPABILITIES.contains(Capabilities::PHYS_ADDR));
    }
}
