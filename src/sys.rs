//! Mirrors of the Linux CEC uapi (`linux/cec.h`) used by the adapter core.
//!
//! https://www.kernel.org/doc/html/latest/userspace-api/media/cec/cec-api.html

use bitflags::bitflags;
use nix::{ioctl_read, ioctl_readwrite, ioctl_write_ptr};
use num_enum::{IntoPrimitive, TryFromPrimitive};

//#define CEC_ADAP_G_CAPS         _IOWR('a',  0, struct cec_caps)
ioctl_readwrite! {
    /// Query adapter capabilities. Filled by the driver.
    capabilities, b'a', 0, CecCaps
}
//#define CEC_ADAP_G_PHYS_ADDR    _IOR('a',  1, __u16)
ioctl_read! {
    /// Query the physical address. `0xffff` if nothing is connected.
    get_phys, b'a', 1, u16
}
//#define CEC_ADAP_G_LOG_ADDRS    _IOR('a',  3, struct cec_log_addrs)
ioctl_read! {
    /// Query the claimed logical addresses.
    get_log, b'a', 3, CecLogAddrs
}
//#define CEC_ADAP_S_LOG_ADDRS    _IOWR('a',  4, struct cec_log_addrs)
ioctl_readwrite! {
    /// Claim logical addresses, or clear them with `num_log_addrs == 0`.
    /// Blocks until the claim finished when the physical address is valid.
    set_log, b'a', 4, CecLogAddrs
}
//#define CEC_TRANSMIT            _IOWR('a',  5, struct cec_msg)
ioctl_readwrite! {
    /// Transmit a message. Blocks until the transmit finished unless the fd is non-blocking.
    transmit, b'a', 5, CecMsg
}
//#define CEC_RECEIVE             _IOWR('a',  6, struct cec_msg)
ioctl_readwrite! {
    /// Receive a message, waiting at most `timeout` ms (0 waits forever).
    receive, b'a', 6, CecMsg
}
//#define CEC_DQEVENT             _IOWR('a',  7, struct cec_event)
ioctl_readwrite! {
    /// Dequeue a pending adapter event.
    get_event, b'a', 7, CecEvent
}
//#define CEC_S_MODE              _IOW('a',  9, __u32)
ioctl_write_ptr! {
    /// Set the initiator/follower mode of this filehandle.
    set_mode, b'a', 9, u32
}

/// Information about the CEC adapter.
#[derive(Debug)]
#[repr(C)]
pub struct CecCaps {
    driver: OSDStr<32>,
    name: OSDStr<32>,
    available_log_addrs: u32,
    capabilities: Capabilities,
    version: u32,
}
impl CecCaps {
    /// name of the CEC device driver
    pub fn driver(&self) -> &str {
        self.driver.as_ref()
    }
    /// name of the CEC device
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
    #[inline]
    pub fn available_log_addrs(&self) -> u32 {
        self.available_log_addrs
    }
    #[inline]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
    /// version of the CEC framework, `KERNEL_VERSION` encoded
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }
}
impl Default for CecCaps {
    fn default() -> Self {
        Self {
            driver: Default::default(),
            name: Default::default(),
            available_log_addrs: 0,
            capabilities: Capabilities::empty(),
            version: 0,
        }
    }
}

bitflags! {
    /// Capabilities of the CEC adapter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Userspace configures the physical address
        const PHYS_ADDR = 1 << 0;
        /// Userspace configures the logical addresses
        const LOG_ADDRS = 1 << 1;
        /// Userspace can transmit messages
        const TRANSMIT = 1 << 2;
        /// Core messages can be passed through to userspace
        const PASSTHROUGH = 1 << 3;
        /// Remote control support
        const RC = 1 << 4;
        /// Hardware can monitor all bus traffic
        const MONITOR_ALL = 1 << 5;
        /// Needs hotplug to be high before transmitting
        const NEEDS_HPD = 1 << 6;
        const MONITOR_PIN = 1 << 7;
        const CONNECTOR_INFO = 1 << 8;
    }
}

/// The most logical addresses one adapter can hold.
pub const CEC_MAX_LOG_ADDRS: usize = 4;

/// `struct cec_log_addrs`
///
/// Type fields are kept as raw bytes: the kernel accepts `0xff` as "no primary type"
/// for the unregistered address, which no enum variant represents.
#[derive(Debug, Clone)]
#[repr(C)]
pub struct CecLogAddrs {
    /// the claimed logical addresses. Set by the driver.
    pub log_addr: [u8; CEC_MAX_LOG_ADDRS],
    /// mask of claimed logical addresses. Set by the driver.
    pub log_addr_mask: CecLogAddrMask,
    /// [Version] the adapter implements
    pub cec_version: u8,
    /// how many addresses to claim; 0 clears all claims
    pub num_log_addrs: u8,
    pub vendor_id: u32,
    pub flags: CecLogAddrFlags,
    pub osd_name: OSDStr<15>,
    /// [CecPrimDevType] per address
    pub primary_device_type: [u8; CEC_MAX_LOG_ADDRS],
    /// [CecLogAddrType] per address
    pub log_addr_type: [u8; CEC_MAX_LOG_ADDRS],
    /// [AllDevTypes] per address (CEC 2.0)
    pub all_device_types: [u8; CEC_MAX_LOG_ADDRS],
    /// feature operands per address (CEC 2.0)
    pub features: [[u8; 12]; CEC_MAX_LOG_ADDRS],
}
impl Default for CecLogAddrs {
    /// The all-zero structure, which releases every claimed address.
    fn default() -> Self {
        Self {
            log_addr: [0; CEC_MAX_LOG_ADDRS],
            log_addr_mask: CecLogAddrMask::empty(),
            cec_version: 0,
            num_log_addrs: 0,
            vendor_id: 0,
            flags: CecLogAddrFlags::empty(),
            osd_name: Default::default(),
            primary_device_type: [0; CEC_MAX_LOG_ADDRS],
            log_addr_type: [0; CEC_MAX_LOG_ADDRS],
            all_device_types: [0; CEC_MAX_LOG_ADDRS],
            features: [[0; 12]; CEC_MAX_LOG_ADDRS],
        }
    }
}

bitflags! {
    /// Flags for [CecLogAddrs]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CecLogAddrFlags: u32 {
        /// Fall back to the unregistered address if no address of the requested type is free.
        const ALLOW_UNREG_FALLBACK = 1 << 0;
        /// Pass remote control messages through to the follower.
        const ALLOW_RC_PASSTHRU = 1 << 1;
        /// CDC-only device (HEC only)
        const CDC_ONLY = 1 << 2;
    }
}

/// CEC Version Operand
#[repr(u8)]
#[non_exhaustive]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
pub enum Version {
    V1_3A = 4,
    V1_4 = 5,
    V2_0 = 6,
}

/// Primary Device Type Operand
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecPrimDevType {
    TV = 0,
    RECORD = 1,
    TUNER = 3,
    PLAYBACK = 4,
    AUDIOSYSTEM = 5,
    SWITCH = 6,
    PROCESSOR = 7,
}

/// Logical address types a device can claim
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum CecLogAddrType {
    TV = 0,
    RECORD = 1,
    TUNER = 2,
    PLAYBACK = 3,
    AUDIOSYSTEM = 4,
    SPECIFIC = 5,
    UNREGISTERED = 6,
}

bitflags! {
    /// All Device Types Operand
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AllDevTypes: u8 {
        const TV = 0x80;
        const RECORD = 0x40;
        const TUNER = 0x20;
        const PLAYBACK = 0x10;
        const AUDIOSYSTEM = 0x08;
        const SWITCH = 0x04;
    }
}

/// Initiator part of [set_mode]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeInitiator {
    /// transmitting is not possible
    None = 0,
    /// shared access
    Send = 1,
    /// no other initiators allowed
    Exclusive = 2,
}

/// Follower part of [set_mode]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u32)]
pub enum CecModeFollower {
    RepliesOnly = 0x0 << 4,
    All = 0x1 << 4,
    Exclusive = 0x2 << 4,
    /// Exclusive follower that also receives the core messages the kernel would
    /// otherwise answer itself.
    ExclusivePassthru = 0x3 << 4,
    MonitorPin = 0xd << 4,
    Monitor = 0xe << 4,
    MonitorAll = 0xf << 4,
}

/// Size of the message buffer in `struct cec_msg`.
pub const CEC_MAX_MSG_SIZE: usize = 16;

/// `struct cec_msg`
#[derive(Debug, Clone)]
#[repr(C)]
pub struct CecMsg {
    pub tx_ts: u64,
    pub rx_ts: u64,
    pub len: u32,
    /// ms to wait in [receive]; 0 waits forever
    pub timeout: u32,
    pub sequence: u32,
    pub flags: u32,
    /// header, opcode and operands
    pub msg: [u8; CEC_MAX_MSG_SIZE],
    /// opcode of an expected reply, 0 for none
    pub reply: u8,
    pub rx_status: RxStatus,
    pub tx_status: TxStatus,
    pub tx_arb_lost_cnt: u8,
    pub tx_nack_cnt: u8,
    pub tx_low_drive_cnt: u8,
    pub tx_error_cnt: u8,
}
impl CecMsg {
    /// An all-zero message with the given receive timeout.
    pub fn empty(timeout: u32) -> Self {
        Self {
            tx_ts: 0,
            rx_ts: 0,
            len: 0,
            timeout,
            sequence: 0,
            flags: 0,
            msg: [0; CEC_MAX_MSG_SIZE],
            reply: 0,
            rx_status: RxStatus::empty(),
            tx_status: TxStatus::empty(),
            tx_arb_lost_cnt: 0,
            tx_nack_cnt: 0,
            tx_low_drive_cnt: 0,
            tx_error_cnt: 0,
        }
    }
    /// the valid part of the buffer
    pub fn bytes(&self) -> &[u8] {
        let len = (self.len as usize).min(CEC_MAX_MSG_SIZE);
        &self.msg[..len]
    }
}

bitflags! {
    /// `tx_status` of [CecMsg]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TxStatus: u8 {
        const OK          = 1 << 0;
        const ARB_LOST    = 1 << 1;
        const NACK        = 1 << 2;
        const LOW_DRIVE   = 1 << 3;
        const ERROR       = 1 << 4;
        const MAX_RETRIES = 1 << 5;
        const ABORTED     = 1 << 6;
        const TIMEOUT     = 1 << 7;
    }
}
bitflags! {
    /// `rx_status` of [CecMsg]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RxStatus: u8 {
        const OK            = 1 << 0;
        const TIMEOUT       = 1 << 1;
        const FEATURE_ABORT = 1 << 2;
        const ABORTED       = 1 << 3;
    }
}

/// The logical addresses defined by CEC 2.0
#[derive(Debug, Eq, PartialEq, Hash, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecLogicalAddress {
    Tv = 0,
    Record1 = 1,
    Record2 = 2,
    Tuner1 = 3,
    Playback1 = 4,
    Audiosystem = 5,
    Tuner2 = 6,
    Tuner3 = 7,
    Playback2 = 8,
    Record3 = 9,
    Tuner4 = 10,
    Playback3 = 11,
    Backup1 = 12,
    Backup2 = 13,
    Specific = 14,
    /// unregistered as initiator, broadcast as destination
    UnregisteredBroadcast = 15,
}
impl CecLogicalAddress {
    /// Address in the low nibble of `n`. Every nibble names an address.
    pub const fn from_nibble(n: u8) -> Self {
        match n & 0xf {
            0 => Self::Tv,
            1 => Self::Record1,
            2 => Self::Record2,
            3 => Self::Tuner1,
            4 => Self::Playback1,
            5 => Self::Audiosystem,
            6 => Self::Tuner2,
            7 => Self::Tuner3,
            8 => Self::Playback2,
            9 => Self::Record3,
            10 => Self::Tuner4,
            11 => Self::Playback3,
            12 => Self::Backup1,
            13 => Self::Backup2,
            14 => Self::Specific,
            _ => Self::UnregisteredBroadcast,
        }
    }
}

bitflags! {
    /// The logical addresses an adapter has claimed. Empty if unconfigured.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CecLogAddrMask: u16 {
        const Tv            = 1 << 0;
        const Record1       = 1 << 1;
        const Record2       = 1 << 2;
        const Tuner1        = 1 << 3;
        const Playback1     = 1 << 4;
        const Audiosystem   = 1 << 5;
        const Tuner2        = 1 << 6;
        const Tuner3        = 1 << 7;
        const Playback2     = 1 << 8;
        const Record3       = 1 << 9;
        const Tuner4        = 1 << 10;
        const Playback3     = 1 << 11;
        const Backup1       = 1 << 12;
        const Backup2       = 1 << 13;
        const Specific      = 1 << 14;
        const Unregistered  = 1 << 15;
    }
}
impl CecLogAddrMask {
    #[inline]
    pub fn is_playback(&self) -> bool {
        self.intersects(Self::Playback1 | Self::Playback2 | Self::Playback3)
    }
}
impl From<CecLogicalAddress> for CecLogAddrMask {
    fn from(addr: CecLogicalAddress) -> Self {
        Self::from_bits_retain(1 << u8::from(addr))
    }
}

pub const CEC_EVENT_STATE_CHANGE: u32 = 1;
pub const CEC_EVENT_LOST_MSGS: u32 = 2;

/// payload of [CEC_EVENT_STATE_CHANGE]
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CecEventStateChange {
    pub phys_addr: u16,
    pub log_addr_mask: CecLogAddrMask,
}

/// payload of [CEC_EVENT_LOST_MSGS]
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CecEventLostMsgs {
    pub lost_msgs: u32,
}

#[repr(C)]
pub union CecEventPayload {
    pub state_change: CecEventStateChange,
    pub lost_msgs: CecEventLostMsgs,
    raw: [u32; 16],
}

/// `struct cec_event`. `event` is kept raw, newer kernels define more kinds.
#[repr(C)]
pub struct CecEvent {
    pub ts: u64,
    pub event: u32,
    pub flags: u32,
    pub payload: CecEventPayload,
}
impl Default for CecEvent {
    fn default() -> Self {
        Self {
            ts: 0,
            event: 0,
            flags: 0,
            payload: CecEventPayload { raw: [0; 16] },
        }
    }
}

/// Opcodes this crate refers to by name. Frames carry the raw byte,
/// so opcodes missing here still pass through.
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecOpcode {
    FeatureAbort = 0x00,
    ImageViewOn = 0x04,
    TextViewOn = 0x0d,
    DeckStatus = 0x1b,
    GiveDeckStatus = 0x1a,
    SetMenuLanguage = 0x32,
    Standby = 0x36,
    Play = 0x41,
    DeckControl = 0x42,
    UserControlPressed = 0x44,
    UserControlReleased = 0x45,
    GiveOsdName = 0x46,
    SetOsdName = 0x47,
    SetOsdString = 0x64,
    RoutingChange = 0x80,
    RoutingInformation = 0x81,
    ActiveSource = 0x82,
    GivePhysicalAddr = 0x83,
    ReportPhysicalAddr = 0x84,
    RequestActiveSource = 0x85,
    SetStreamPath = 0x86,
    DeviceVendorId = 0x87,
    VendorCommand = 0x89,
    VendorRemoteButtonDown = 0x8a,
    VendorRemoteButtonUp = 0x8b,
    GiveDeviceVendorId = 0x8c,
    MenuRequest = 0x8d,
    MenuStatus = 0x8e,
    GiveDevicePowerStatus = 0x8f,
    ReportPowerStatus = 0x90,
    GetMenuLanguage = 0x91,
    InactiveSource = 0x9d,
    CecVersion = 0x9e,
    GetCecVersion = 0x9f,
    VendorCommandWithId = 0xa0,
    GiveFeatures = 0xa5,
    ReportFeatures = 0xa6,
    InitiateArc = 0xc0,
    ReportArcInitiated = 0xc1,
    ReportArcTerminated = 0xc2,
    RequestArcInitiation = 0xc3,
    RequestArcTermination = 0xc4,
    TerminateArc = 0xc5,
    CdcMessage = 0xf8,
    Abort = 0xff,
}

/// UI Command Operand of [CecOpcode::UserControlPressed]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive, Clone, Copy)]
#[repr(u8)]
pub enum CecUserControlCode {
    Select = 0x00,
    Up = 0x01,
    Down = 0x02,
    Left = 0x03,
    Right = 0x04,
    RootMenu = 0x09,
    SetupMenu = 0x0a,
    ContentsMenu = 0x0b,
    Exit = 0x0d,
    Number0 = 0x20,
    Number1 = 0x21,
    Number2 = 0x22,
    Number3 = 0x23,
    Number4 = 0x24,
    Number5 = 0x25,
    Number6 = 0x26,
    Number7 = 0x27,
    Number8 = 0x28,
    Number9 = 0x29,
    Enter = 0x2b,
    ChannelUp = 0x30,
    ChannelDown = 0x31,
    Power = 0x40,
    VolumeUp = 0x41,
    VolumeDown = 0x42,
    Mute = 0x43,
    Play = 0x44,
    Stop = 0x45,
    Pause = 0x46,
    Rewind = 0x48,
    FastForward = 0x49,
    PowerToggleFunction = 0x6b,
    PowerOffFunction = 0x6c,
    PowerOnFunction = 0x6d,
}

#[allow(non_camel_case_types)]
type c_char = u8;

/// NUL padded fixed size string as used by `struct cec_caps` and `struct cec_log_addrs`.
///
/// ```
/// # use hdmi_cec::OSDStr;
/// let name: OSDStr<15> = "pi4".try_into().unwrap();
/// assert_eq!(name.as_ref(), "pi4");
/// ```
#[repr(transparent)]
#[derive(Clone, PartialEq, Eq)]
pub struct OSDStr<const MAX: usize>([c_char; MAX]);

impl<const MAX: usize> TryFrom<&str> for OSDStr<MAX> {
    type Error = ();
    /// Fails for non-ascii input or input that leaves no room for the terminating NUL.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if !value.is_ascii() || value.len() >= MAX {
            return Err(());
        }
        let mut osd = Self::default();
        osd.0[..value.len()].copy_from_slice(value.as_bytes());
        Ok(osd)
    }
}
impl<const MAX: usize> AsRef<str> for OSDStr<MAX> {
    fn as_ref(&self) -> &str {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(MAX);
        std::str::from_utf8(&self.0[..end]).unwrap_or_default()
    }
}
impl<const MAX: usize> std::fmt::Display for OSDStr<MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}
impl<const MAX: usize> std::fmt::Debug for OSDStr<MAX> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_ref())
    }
}
impl<const MAX: usize> Default for OSDStr<MAX> {
    fn default() -> Self {
        Self([0; MAX])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uapi_struct_sizes() {
        assert_eq!(std::mem::size_of::<CecCaps>(), 76);
        assert_eq!(std::mem::size_of::<CecLogAddrs>(), 92);
        assert_eq!(std::mem::size_of::<CecMsg>(), 56);
        assert_eq!(std::mem::size_of::<CecEvent>(), 80);
    }

    #[test]
    fn nibble_covers_every_address() {
        for n in 0..16u8 {
            assert_eq!(u8::from(CecLogicalAddress::from_nibble(n)), n);
        }
        assert_eq!(
            CecLogicalAddress::from_nibble(0x4f),
            CecLogicalAddress::UnregisteredBroadcast
        );
    }

    #[test]
    fn mask_from_address() {
        assert_eq!(
            CecLogAddrMask::from(CecLogicalAddress::Playback1),
            CecLogAddrMask::Playback1
        );
        assert!(CecLogAddrMask::from(CecLogicalAddress::Playback3).is_playback());
        assert_eq!(
            CecLogAddrMask::from(CecLogicalAddress::UnregisteredBroadcast),
            CecLogAddrMask::Unregistered
        );
    }

    #[test]
    fn osd_str_rejects_long_and_non_ascii() {
        assert!(OSDStr::<3>::try_from("abc").is_err());
        assert!(OSDStr::<15>::try_from("fourteen chars").is_ok());
        assert!(OSDStr::<15>::try_from("Wohnzimmer-Tüv").is_err());
        let s: OSDStr<15> = "pi".try_into().unwrap();
        assert_eq!(s.to_string(), "pi");
    }
}
