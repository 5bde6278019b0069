//! Logical address negotiation.
//!
//! The adapter arbitrates on the bus; this side only describes what to claim.

use crate::config::AdapterConfig;
use crate::device::CecGateway;
use crate::error::{CecError, Result};
use crate::sys::{
    AllDevTypes, CecLogAddrFlags, CecLogAddrMask, CecLogAddrType, CecLogAddrs, CecLogicalAddress,
    CecPrimDevType, OSDStr, Version,
};
use tracing::{debug, warn};

/// Primary device type sent for addresses that have none.
const NO_PRIMARY_TYPE: u8 = 0xff;

/// What to claim for one logical address. Built per attempt, never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressClaim {
    pub address: CecLogicalAddress,
    pub address_type: CecLogAddrType,
    /// `None` for the reserved and unregistered addresses
    pub primary_type: Option<CecPrimDevType>,
    pub all_device_types: AllDevTypes,
    pub flags: CecLogAddrFlags,
    pub cec_version: Version,
    pub vendor_id: u32,
    pub osd_name: OSDStr<15>,
}

impl AddressClaim {
    /// Describe a claim for `address`. The broadcast address is never claimable.
    pub fn new(address: CecLogicalAddress, config: &AdapterConfig) -> Result<Self> {
        use CecLogicalAddress as A;

        let (address_type, primary_type, all_device_types, flags) = match address {
            A::UnregisteredBroadcast => return Err(CecError::InvalidAddress(address.into())),
            A::Tv => (
                CecLogAddrType::TV,
                Some(CecPrimDevType::TV),
                AllDevTypes::TV,
                CecLogAddrFlags::empty(),
            ),
            A::Record1 | A::Record2 | A::Record3 => (
                CecLogAddrType::RECORD,
                Some(CecPrimDevType::RECORD),
                AllDevTypes::RECORD,
                CecLogAddrFlags::empty(),
            ),
            A::Tuner1 | A::Tuner2 | A::Tuner3 | A::Tuner4 => (
                CecLogAddrType::TUNER,
                Some(CecPrimDevType::TUNER),
                AllDevTypes::TUNER,
                CecLogAddrFlags::empty(),
            ),
            A::Playback1 | A::Playback2 | A::Playback3 => (
                CecLogAddrType::PLAYBACK,
                Some(CecPrimDevType::PLAYBACK),
                AllDevTypes::PLAYBACK,
                CecLogAddrFlags::ALLOW_RC_PASSTHRU,
            ),
            A::Audiosystem => (
                CecLogAddrType::AUDIOSYSTEM,
                Some(CecPrimDevType::AUDIOSYSTEM),
                AllDevTypes::AUDIOSYSTEM,
                CecLogAddrFlags::empty(),
            ),
            A::Specific => (
                CecLogAddrType::SPECIFIC,
                Some(CecPrimDevType::PROCESSOR),
                AllDevTypes::SWITCH,
                CecLogAddrFlags::empty(),
            ),
            A::Backup1 | A::Backup2 => (
                CecLogAddrType::UNREGISTERED,
                None,
                AllDevTypes::empty(),
                CecLogAddrFlags::ALLOW_UNREG_FALLBACK,
            ),
        };
        Ok(Self {
            address,
            address_type,
            primary_type,
            all_device_types,
            flags,
            cec_version: config.cec_version(),
            vendor_id: config.vendor_id(),
            osd_name: config.osd_str(),
        })
    }

    /// Same as [AddressClaim::new] for a raw address byte.
    pub fn from_raw(address: u8, config: &AdapterConfig) -> Result<Self> {
        Self::new(CecLogicalAddress::try_from(address)?, config)
    }

    /// Kernel layout of this claim, one address, no features.
    pub fn to_log_addrs(&self) -> CecLogAddrs {
        let mut log = CecLogAddrs {
            cec_version: self.cec_version.into(),
            num_log_addrs: 1,
            vendor_id: self.vendor_id,
            flags: self.flags,
            osd_name: self.osd_name.clone(),
            ..Default::default()
        };
        log.log_addr[0] = self.address.into();
        log.log_addr_type[0] = self.address_type.into();
        log.primary_device_type[0] = self.primary_type.map_or(NO_PRIMARY_TYPE, u8::from);
        log.all_device_types[0] = self.all_device_types.bits();
        log
    }
}

/// Claim `address` on the adapter. Returns the mask the adapter reports as claimed.
pub fn claim<G: CecGateway + ?Sized>(
    gateway: &G,
    address: CecLogicalAddress,
    config: &AdapterConfig,
) -> Result<CecLogAddrMask> {
    let claim = AddressClaim::new(address, config)?;
    debug!(?address, ?claim.address_type, "claiming logical address");
    let log = gateway.set_log_addrs(claim.to_log_addrs())?;
    debug!(log_addr_mask = ?log.log_addr_mask, "logical address claimed");
    Ok(log.log_addr_mask)
}

/// Drop every claimed address. Failures are logged only.
pub fn release<G: CecGateway + ?Sized>(gateway: &G) {
    if let Err(e) = gateway.set_log_addrs(CecLogAddrs::default()) {
        warn!("releasing logical addresses: {e}");
    }
}
