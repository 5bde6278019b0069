use crate::sys::{OSDStr, Version};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::path::{Path, PathBuf};

/// HDMI LLC vendor id, used when no vendor id is configured.
pub const HDMI_LLC_VENDOR_ID: u32 = 0x000c03;
pub const DEFAULT_DEVICE: &str = "/dev/cec0";

/// Device class of the local device. Values match the HDMI control service's
/// device type numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DeviceType {
    Tv = 0,
    Recorder = 1,
    Tuner = 3,
    Playback = 4,
    AudioSystem = 5,
}
impl Default for DeviceType {
    fn default() -> Self {
        Self::Playback
    }
}

/// Static configuration of an adapter. Read once by [CecAdapter::open](crate::CecAdapter::open).
///
/// ```
/// # use hdmi_cec::{AdapterConfig, DeviceType};
/// let config = AdapterConfig::for_device("cec1")
///     .with_device_type(DeviceType::Playback)
///     .with_osd_name("living room");
/// assert_eq!(config.device_path().to_str(), Some("/dev/cec1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    device_type: DeviceType,
    vendor_id: u32,
    cec_version: Version,
    device_path: PathBuf,
    osd_name: Option<String>,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            vendor_id: HDMI_LLC_VENDOR_ID,
            cec_version: Version::V1_4,
            device_path: PathBuf::from(DEFAULT_DEVICE),
            osd_name: None,
        }
    }
}

impl AdapterConfig {
    /// Defaults for the adapter `/dev/<name>`, e.g. `cec0`.
    pub fn for_device(name: &str) -> Self {
        Self::default().with_device_path(Path::new("/dev").join(name))
    }
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }
    /// Only the low 24 bits are a vendor id; higher bits are dropped.
    pub fn with_vendor_id(mut self, vendor_id: u32) -> Self {
        self.vendor_id = vendor_id & 0x00ff_ffff;
        self
    }
    pub fn with_cec_version(mut self, version: Version) -> Self {
        self.cec_version = version;
        self
    }
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }
    /// Name the kernel reports in `Set OSD Name`. Ascii, at most 14 chars.
    pub fn with_osd_name(mut self, name: impl Into<String>) -> Self {
        self.osd_name = Some(name.into());
        self
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }
    pub fn vendor_id(&self) -> u32 {
        self.vendor_id
    }
    pub fn cec_version(&self) -> Version {
        self.cec_version
    }
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }
    pub fn osd_name(&self) -> Option<&str> {
        self.osd_name.as_deref()
    }
    /// OSD name in kernel layout. A name the kernel cannot carry is dropped.
    pub(crate) fn osd_str(&self) -> OSDStr<15> {
        match self.osd_name.as_deref() {
            Some(name) => OSDStr::try_from(name).unwrap_or_else(|()| {
                tracing::warn!(name, "OSD name is not ascii or longer than 14, not used");
                OSDStr::default()
            }),
            None => OSDStr::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AdapterConfig::default();
        assert_eq!(config.device_type(), DeviceType::Playback);
        assert_eq!(config.vendor_id(), 0x000c03);
        assert_eq!(config.cec_version(), Version::V1_4);
        assert_eq!(config.device_path(), Path::new("/dev/cec0"));
        assert_eq!(config.osd_name(), None);
    }

    #[test]
    fn vendor_id_is_24_bit() {
        let config = AdapterConfig::default().with_vendor_id(0xff12_3456);
        assert_eq!(config.vendor_id(), 0x12_3456);
    }

    #[test]
    fn osd_name_too_long_is_dropped() {
        let config = AdapterConfig::default().with_osd_name("a name that is far too long");
        assert_eq!(config.osd_str().as_ref(), "");
        let config = AdapterConfig::default().with_osd_name("pi4");
        assert_eq!(config.osd_str().as_ref(), "pi4");
    }

    #[test]
    fn device_type_from_raw() {
        assert_eq!(DeviceType::try_from(0u8).unwrap(), DeviceType::Tv);
        assert_eq!(DeviceType::try_from(4u8).unwrap(), DeviceType::Playback);
        assert_eq!(DeviceType::default(), DeviceType::Playback);
        assert!(DeviceType::try_from(2u8).is_err());
    }
}
