use crate::sys::{Capabilities, CecLogicalAddress};
use num_enum::TryFromPrimitiveError;

/// Errors returned by the adapter core.
///
/// Link-level transmit results are not errors, see [TxOutcome](crate::TxOutcome).
#[derive(Debug, thiserror::Error)]
pub enum CecError {
    /// A device call failed.
    #[error("{op} failed: {source}")]
    AdapterIo {
        op: &'static str,
        source: std::io::Error,
    },

    /// The address cannot be claimed (broadcast or out of range).
    #[error("logical address {0} cannot be claimed")]
    InvalidAddress(u8),

    /// A frame body or raw frame has an invalid length.
    #[error("invalid frame length {len} (expected {min}..={max})")]
    InvalidLength { len: usize, min: usize, max: usize },

    /// The adapter lacks logical address management, transmit or passthrough.
    #[error("adapter capabilities {0:?} lack LOG_ADDRS | TRANSMIT | PASSTHROUGH")]
    UnsupportedAdapter(Capabilities),

    /// Requested feature is outside of what a single port playback adapter does.
    #[error("{0} is not supported")]
    NotSupported(&'static str),

    /// CEC was disabled through [CecOption::EnableCec](crate::CecOption::EnableCec).
    #[error("CEC is disabled")]
    Disabled,

    /// The adapter has been closed.
    #[error("adapter is closed")]
    Closed,
}

impl CecError {
    pub fn adapter_io(op: &'static str, source: impl Into<std::io::Error>) -> Self {
        Self::AdapterIo {
            op,
            source: source.into(),
        }
    }
}

impl From<TryFromPrimitiveError<CecLogicalAddress>> for CecError {
    fn from(e: TryFromPrimitiveError<CecLogicalAddress>) -> Self {
        Self::InvalidAddress(e.number)
    }
}

pub type Result<T> = std::result::Result<T, CecError>;
