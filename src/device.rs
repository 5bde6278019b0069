//! The device gateway: every call the core makes into the CEC adapter.

use crate::error::{CecError, Result};
use crate::frame::CecFrame;
use crate::sys::{
    self, Capabilities, CecLogAddrMask, CecLogAddrs, CecModeFollower, CecModeInitiator, CecMsg,
    RxStatus, TxStatus, CEC_EVENT_LOST_MSGS, CEC_EVENT_STATE_CHANGE,
};
use bitflags::bitflags;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// How long [CecDevice::receive] waits if the queue turned out empty after all.
const RX_TIMEOUT_MS: u32 = 10;

/// 16 bit HDMI topology address `a.b.c.d`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalAddress(pub u16);

impl PhysicalAddress {
    /// No active HDMI link.
    pub const INVALID: Self = Self(0xffff);

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}
impl std::fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let a = self.0;
        write!(
            f,
            "{:x}.{:x}.{:x}.{:x}",
            a >> 12,
            (a >> 8) & 0xf,
            (a >> 4) & 0xf,
            a & 0xf
        )
    }
}
impl std::fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PhysicalAddress({self})")
    }
}

/// Link level result of a transmit. The caller decides about retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Ok,
    /// another initiator won the bus
    ArbitrationLost,
    /// the destination did not acknowledge
    Nacked,
    OtherFailure,
}

impl TxOutcome {
    /// Plain statuses are matched exactly. Anything else carrying the NACK bit
    /// still counts as a NACK.
    pub fn from_status(status: TxStatus) -> Self {
        if status == TxStatus::OK {
            Self::Ok
        } else if status == TxStatus::ARB_LOST {
            Self::ArbitrationLost
        } else if status == TxStatus::NACK || status.contains(TxStatus::NACK) {
            Self::Nacked
        } else {
            Self::OtherFailure
        }
    }
    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

/// An event dequeued from the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    /// physical address or claimed logical addresses changed
    StateChange {
        phys_addr: PhysicalAddress,
        log_addr_mask: CecLogAddrMask,
    },
    /// received messages were dropped because the queue was full
    LostMessages(u32),
    /// an event kind this core does not act on
    Other(u32),
}

bitflags! {
    /// Which sources woke up [CecGateway::wait].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Readiness: u8 {
        /// a received frame is queued
        const DATA = 1 << 0;
        /// an adapter event is queued
        const EVENT = 1 << 1;
        /// [ShutdownSignal::raise] was called
        const SHUTDOWN = 1 << 2;
    }
}

/// Calls into a CEC adapter.
///
/// [CecDevice] talks to a kernel adapter, other implementations stand in for it.
/// None of the calls retry.
pub trait CecGateway: Send + Sync + 'static {
    fn capabilities(&self) -> Result<Capabilities>;
    fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()>;
    /// Submit a claim (or the all-zero structure to release). Returns the structure as
    /// updated by the adapter, including the claimed `log_addr_mask`.
    fn set_log_addrs(&self, log: CecLogAddrs) -> Result<CecLogAddrs>;
    fn log_addrs(&self) -> Result<CecLogAddrs>;
    fn phys_addr(&self) -> Result<PhysicalAddress>;
    /// Blocks until the adapter finished the transmit.
    fn transmit(&self, frame: &CecFrame) -> Result<TxStatus>;
    fn dequeue_event(&self) -> Result<AdapterEvent>;
    fn receive(&self) -> Result<(CecFrame, RxStatus)>;
    /// Block until a frame, an event or `shutdown` is ready. No timeout.
    fn wait(&self, shutdown: &ShutdownSignal) -> Result<Readiness>;
}

/// Wakes the event loop for termination. Separate from the data path so it is
/// seen even while frames keep arriving.
pub struct ShutdownSignal {
    fd: EventFd,
    raised: AtomicBool,
}

impl std::fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("fd", &self.fd.as_fd().as_raw_fd())
            .field("raised", &self.is_raised())
            .finish()
    }
}

impl ShutdownSignal {
    pub fn new() -> Result<Self> {
        let fd = EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)
            .map_err(|e| CecError::adapter_io("eventfd", e))?;
        Ok(Self {
            fd,
            raised: AtomicBool::new(false),
        })
    }
    pub fn raise(&self) -> Result<()> {
        self.raised.store(true, Ordering::SeqCst);
        self.fd
            .write(1)
            .map(drop)
            .map_err(|e| CecError::adapter_io("eventfd write", e))
    }
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
    /// Sleep for up to `timeout`, returning early when raised. `true` if raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let ms = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
        if let Err(e) = poll(&mut fds, PollTimeout::from(ms)) {
            trace!("polling shutdown signal: {e}");
        }
        self.is_raised()
    }
}

impl AsFd for ShutdownSignal {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

/// `poll(2)` on an adapter fd and the shutdown signal.
///
/// `POLLIN` on the adapter means a queued frame, `POLLPRI` a queued event.
pub fn poll_readiness(adapter: BorrowedFd<'_>, shutdown: &ShutdownSignal) -> Result<Readiness> {
    let mut fds = [
        PollFd::new(adapter, PollFlags::POLLIN | PollFlags::POLLPRI),
        PollFd::new(shutdown.as_fd(), PollFlags::POLLIN),
    ];
    let n = poll(&mut fds, PollTimeout::NONE).map_err(|e| CecError::adapter_io("poll", e))?;
    let mut ready = Readiness::empty();
    if n <= 0 {
        return Ok(ready);
    }
    let adapter = fds[0].revents().unwrap_or(PollFlags::empty());
    if adapter.contains(PollFlags::POLLIN) {
        ready |= Readiness::DATA;
    }
    if adapter.contains(PollFlags::POLLPRI) {
        ready |= Readiness::EVENT;
    }
    if fds[1]
        .revents()
        .is_some_and(|f| f.contains(PollFlags::POLLIN))
    {
        ready |= Readiness::SHUTDOWN;
    }
    Ok(ready)
}

/// A handle on a kernel CEC adapter, typically `/dev/cecX`.
#[derive(Debug)]
pub struct CecDevice(std::fs::File);

impl CecDevice {
    /**
     * Open a CEC device in blocking mode, so transmits and claims wait for their result.
     * ```no_run
     * # use hdmi_cec::CecDevice;
     * # fn main() -> hdmi_cec::Result<()> {
     * let cec = CecDevice::open("/dev/cec0")?;
     * # Ok(())
     * # }
     * ```
     */
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())
            .map(Self)
            .map_err(|e| CecError::adapter_io("open", e))
    }
    /// Full capability record, including driver and adapter names.
    pub fn caps(&self) -> Result<sys::CecCaps> {
        let mut caps = MaybeUninit::uninit();
        unsafe { sys::capabilities(self.0.as_raw_fd(), caps.as_mut_ptr()) }
            .map_err(|e| CecError::adapter_io("CEC_ADAP_G_CAPS", e))?;
        Ok(unsafe { caps.assume_init() })
    }
}

impl CecGateway for CecDevice {
    fn capabilities(&self) -> Result<Capabilities> {
        let caps = self.caps()?;
        debug!(
            driver = caps.driver(),
            name = caps.name(),
            available_log_addrs = caps.available_log_addrs(),
            "adapter capabilities {:?}",
            caps.capabilities()
        );
        Ok(caps.capabilities())
    }
    fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()> {
        let mode = u32::from(initiator) | u32::from(follower);
        unsafe { sys::set_mode(self.0.as_raw_fd(), &mode) }
            .map_err(|e| CecError::adapter_io("CEC_S_MODE", e))?;
        Ok(())
    }
    fn set_log_addrs(&self, mut log: CecLogAddrs) -> Result<CecLogAddrs> {
        unsafe { sys::set_log(self.0.as_raw_fd(), &mut log) }
            .map_err(|e| CecError::adapter_io("CEC_ADAP_S_LOG_ADDRS", e))?;
        Ok(log)
    }
    fn log_addrs(&self) -> Result<CecLogAddrs> {
        let mut log = CecLogAddrs::default();
        unsafe { sys::get_log(self.0.as_raw_fd(), &mut log) }
            .map_err(|e| CecError::adapter_io("CEC_ADAP_G_LOG_ADDRS", e))?;
        Ok(log)
    }
    fn phys_addr(&self) -> Result<PhysicalAddress> {
        let mut addr = 0;
        unsafe { sys::get_phys(self.0.as_raw_fd(), &mut addr) }
            .map_err(|e| CecError::adapter_io("CEC_ADAP_G_PHYS_ADDR", e))?;
        Ok(PhysicalAddress(addr))
    }
    fn transmit(&self, frame: &CecFrame) -> Result<TxStatus> {
        let mut msg = CecMsg::empty(0);
        let bytes = frame.as_bytes();
        msg.msg[..bytes.len()].copy_from_slice(bytes);
        msg.len = bytes.len() as u32;
        unsafe { sys::transmit(self.0.as_raw_fd(), &mut msg) }
            .map_err(|e| CecError::adapter_io("CEC_TRANSMIT", e))?;
        trace!(
            arb_lost = msg.tx_arb_lost_cnt,
            nack = msg.tx_nack_cnt,
            low_drive = msg.tx_low_drive_cnt,
            error = msg.tx_error_cnt,
            "transmit finished with {:?}",
            msg.tx_status
        );
        Ok(msg.tx_status)
    }
    fn dequeue_event(&self) -> Result<AdapterEvent> {
        let mut evt = sys::CecEvent::default();
        unsafe { sys::get_event(self.0.as_raw_fd(), &mut evt) }
            .map_err(|e| CecError::adapter_io("CEC_DQEVENT", e))?;
        // the payload variant is selected by `event`
        let event = unsafe {
            match evt.event {
                CEC_EVENT_STATE_CHANGE => AdapterEvent::StateChange {
                    phys_addr: PhysicalAddress(evt.payload.state_change.phys_addr),
                    log_addr_mask: evt.payload.state_change.log_addr_mask,
                },
                CEC_EVENT_LOST_MSGS => AdapterEvent::LostMessages(evt.payload.lost_msgs.lost_msgs),
                other => AdapterEvent::Other(other),
            }
        };
        Ok(event)
    }
    fn receive(&self) -> Result<(CecFrame, RxStatus)> {
        let mut msg = CecMsg::empty(RX_TIMEOUT_MS);
        unsafe { sys::receive(self.0.as_raw_fd(), &mut msg) }
            .map_err(|e| CecError::adapter_io("CEC_RECEIVE", e))?;
        let frame = CecFrame::from_bytes(msg.bytes())?;
        Ok((frame, msg.rx_status))
    }
    fn wait(&self, shutdown: &ShutdownSignal) -> Result<Readiness> {
        poll_readiness(self.0.as_fd(), shutdown)
    }
}

impl AsRawFd for CecDevice {
    fn as_raw_fd(&self) -> std::os::unix::prelude::RawFd {
        self.0.as_raw_fd()
    }
}

impl AsFd for CecDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_outcome_mapping() {
        assert_eq!(TxOutcome::from_status(TxStatus::OK), TxOutcome::Ok);
        assert_eq!(
            TxOutcome::from_status(TxStatus::ARB_LOST),
            TxOutcome::ArbitrationLost
        );
        assert_eq!(TxOutcome::from_status(TxStatus::NACK), TxOutcome::Nacked);
        assert_eq!(
            TxOutcome::from_status(TxStatus::NACK | TxStatus::MAX_RETRIES),
            TxOutcome::Nacked
        );
        assert_eq!(
            TxOutcome::from_status(TxStatus::ARB_LOST | TxStatus::NACK),
            TxOutcome::Nacked
        );
        assert_eq!(
            TxOutcome::from_status(TxStatus::ERROR | TxStatus::MAX_RETRIES),
            TxOutcome::OtherFailure
        );
        assert_eq!(
            TxOutcome::from_status(TxStatus::ARB_LOST | TxStatus::MAX_RETRIES),
            TxOutcome::OtherFailure
        );
        assert_eq!(
            TxOutcome::from_status(TxStatus::OK | TxStatus::LOW_DRIVE),
            TxOutcome::OtherFailure
        );
        assert_eq!(
            TxOutcome::from_status(TxStatus::empty()),
            TxOutcome::OtherFailure
        );
    }

    #[test]
    fn physical_address_display() {
        assert_eq!(PhysicalAddress(0x3300).to_string(), "3.3.0.0");
        assert_eq!(PhysicalAddress(0x1234).to_string(), "1.2.3.4");
        assert!(!PhysicalAddress::INVALID.is_valid());
        assert!(PhysicalAddress(0).is_valid());
    }

    #[test]
    fn shutdown_signal_wakes_poll() {
        let adapter = ShutdownSignal::new().unwrap();
        let shutdown = ShutdownSignal::new().unwrap();
        shutdown.raise().unwrap();
        assert!(shutdown.is_raised());
        let ready = poll_readiness(adapter.as_fd(), &shutdown).unwrap();
        assert_eq!(ready, Readiness::SHUTDOWN);
    }

    #[test]
    fn shutdown_wait_timeout() {
        let shutdown = ShutdownSignal::new().unwrap();
        let start = std::time::Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));

        shutdown.raise().unwrap();
        let start = std::time::Instant::now();
        assert!(shutdown.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn readable_adapter_reports_data() {
        // an eventfd with a pending count polls as POLLIN, like a queued frame
        let adapter = ShutdownSignal::new().unwrap();
        let shutdown = ShutdownSignal::new().unwrap();
        adapter.raise().unwrap();
        let ready = poll_readiness(adapter.as_fd(), &shutdown).unwrap();
        assert_eq!(ready, Readiness::DATA);
    }

    #[test]
    fn open_missing_device() {
        let err = CecDevice::open("/nonexistent/cec9").unwrap_err();
        assert!(matches!(err, CecError::AdapterIo { op: "open", .. }));
    }
}
