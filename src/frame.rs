//! Wire frames and the structured messages they carry.
//!
//! A frame is a header byte (initiator in the high nibble, destination in the low
//! nibble) followed by the opcode and its operands. A header-only frame is a poll.

use crate::error::{CecError, Result};
use crate::sys::CecLogicalAddress;

/// Longest opcode + operand sequence a frame carries.
pub const MAX_BODY_LEN: usize = 14;
/// Longest frame, header included.
pub const MAX_FRAME_LEN: usize = MAX_BODY_LEN + 1;

/// A CEC frame as it is put on / taken off the bus.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CecFrame {
    len: u8,
    buf: [u8; MAX_FRAME_LEN],
}

impl CecFrame {
    /// Build a frame from its raw bytes. `bytes` must hold 1 to 15 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > MAX_FRAME_LEN {
            return Err(CecError::InvalidLength {
                len: bytes.len(),
                min: 1,
                max: MAX_FRAME_LEN,
            });
        }
        let mut buf = [0; MAX_FRAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            len: bytes.len() as u8,
            buf,
        })
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }
    /// Never true, a frame always has its header.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn initiator(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.buf[0] >> 4)
    }
    pub fn destination(&self) -> CecLogicalAddress {
        CecLogicalAddress::from_nibble(self.buf[0])
    }
    /// Opcode byte, `None` for a poll
    pub fn opcode(&self) -> Option<u8> {
        (self.len > 1).then(|| self.buf[1])
    }
    pub fn operands(&self) -> &[u8] {
        if self.len > 2 {
            &self.buf[2..self.len as usize]
        } else {
            &[]
        }
    }
    pub fn is_poll(&self) -> bool {
        self.len == 1
    }
    pub fn is_broadcast(&self) -> bool {
        self.destination() == CecLogicalAddress::UnregisteredBroadcast
    }
    pub fn decode(&self) -> CecMessage {
        CecMessage {
            initiator: self.initiator(),
            destination: self.destination(),
            body: self.as_bytes()[1..].to_vec(),
        }
    }
}

impl std::fmt::Debug for CecFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CecFrame({:02x?})", self.as_bytes())
    }
}

/// A message as handed to and received from the HDMI control service.
///
/// `body` is the opcode followed by its operands, empty for a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CecMessage {
    pub initiator: CecLogicalAddress,
    pub destination: CecLogicalAddress,
    pub body: Vec<u8>,
}

impl CecMessage {
    pub fn new(
        initiator: CecLogicalAddress,
        destination: CecLogicalAddress,
        opcode: impl Into<u8>,
        operands: &[u8],
    ) -> Self {
        let mut body = Vec::with_capacity(1 + operands.len());
        body.push(opcode.into());
        body.extend_from_slice(operands);
        Self {
            initiator,
            destination,
            body,
        }
    }
    /// A header-only message used to check whether `destination` is present on the bus.
    pub fn poll(initiator: CecLogicalAddress, destination: CecLogicalAddress) -> Self {
        Self {
            initiator,
            destination,
            body: Vec::new(),
        }
    }
    pub fn opcode(&self) -> Option<u8> {
        self.body.first().copied()
    }
    pub fn operands(&self) -> &[u8] {
        self.body.get(1..).unwrap_or_default()
    }
    pub fn encode(&self) -> Result<CecFrame> {
        if self.body.len() > MAX_BODY_LEN {
            return Err(CecError::InvalidLength {
                len: self.body.len(),
                min: 0,
                max: MAX_BODY_LEN,
            });
        }
        let mut buf = [0; MAX_FRAME_LEN];
        buf[0] = u8::from(self.initiator) << 4 | u8::from(self.destination);
        buf[1..=self.body.len()].copy_from_slice(&self.body);
        Ok(CecFrame {
            len: self.body.len() as u8 + 1,
            buf,
        })
    }
}

impl TryFrom<&CecMessage> for CecFrame {
    type Error = CecError;
    fn try_from(msg: &CecMessage) -> Result<Self> {
        msg.encode()
    }
}

impl From<&CecFrame> for CecMessage {
    fn from(frame: &CecFrame) -> Self {
        frame.decode()
    }
}
