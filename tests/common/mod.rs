//! An in-memory adapter scripted by the test.
#![allow(dead_code)]

use hdmi_cec::*;
use nix::sys::eventfd::{EfdFlags, EventFd};
use std::collections::VecDeque;
use std::os::fd::AsFd;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub struct Script {
    pub caps: Capabilities,
    pub phys_addr: PhysicalAddress,
    pub fail_phys_addr: bool,
    pub tx_status: TxStatus,
    pub fail_set_mode: bool,
    pub fail_set_log_addrs: bool,
    pub mode: Option<(CecModeInitiator, CecModeFollower)>,
    pub claims: Vec<CecLogAddrs>,
    pub claimed: CecLogAddrs,
    pub transmitted: Vec<CecFrame>,
    events: VecDeque<AdapterEvent>,
    frames: VecDeque<(CecFrame, RxStatus)>,
    /// the event loop is blocked waiting
    idle: bool,
}

struct Inner {
    script: Mutex<Script>,
    changed: Condvar,
    kick: EventFd,
}

/// Clones share the same script, so the test keeps a handle after handing one to the adapter.
#[derive(Clone)]
pub struct ScriptedGateway(Arc<Inner>);

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::with_caps(Capabilities::PHYS_ADDR | REQUIRED_CAPABILITIES)
    }
    pub fn with_caps(caps: Capabilities) -> Self {
        let kick = EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK).unwrap();
        Self(Arc::new(Inner {
            script: Mutex::new(Script {
                caps,
                phys_addr: PhysicalAddress(0x1000),
                fail_phys_addr: false,
                tx_status: TxStatus::OK,
                fail_set_mode: false,
                fail_set_log_addrs: false,
                mode: None,
                claims: Vec::new(),
                claimed: CecLogAddrs::default(),
                transmitted: Vec::new(),
                events: VecDeque::new(),
                frames: VecDeque::new(),
                idle: false,
            }),
            changed: Condvar::new(),
            kick,
        }))
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.0.script.lock().unwrap()
    }

    /// Other handles alive besides this one.
    pub fn other_handles(&self) -> usize {
        Arc::strong_count(&self.0) - 1
    }

    pub fn push_event(&self, event: AdapterEvent) {
        self.script().events.push_back(event);
        self.0.kick.write(1).unwrap();
    }

    pub fn push_frame(&self, bytes: &[u8]) {
        self.push_frame_with_status(bytes, RxStatus::OK);
    }

    pub fn push_frame_with_status(&self, bytes: &[u8], status: RxStatus) {
        let frame = CecFrame::from_bytes(bytes).unwrap();
        self.script().frames.push_back((frame, status));
        self.0.kick.write(1).unwrap();
    }

    /// Block until everything queued was handled and the loop waits again.
    pub fn wait_idle(&self) {
        let deadline = Instant::now() + TIMEOUT;
        let mut script = self.script();
        while !(script.idle && script.events.is_empty() && script.frames.is_empty()) {
            let left = deadline
                .checked_duration_since(Instant::now())
                .expect("event loop never went idle");
            script = self.0.changed.wait_timeout(script, left).unwrap().0;
        }
    }

    fn set_idle(&self, idle: bool) {
        self.script().idle = idle;
        self.0.changed.notify_all();
    }
}

impl CecGateway for ScriptedGateway {
    fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.script().caps)
    }
    fn set_mode(&self, initiator: CecModeInitiator, follower: CecModeFollower) -> Result<()> {
        let mut script = self.script();
        if script.fail_set_mode {
            return Err(CecError::adapter_io(
                "CEC_S_MODE",
                std::io::ErrorKind::PermissionDenied,
            ));
        }
        script.mode = Some((initiator, follower));
        Ok(())
    }
    fn set_log_addrs(&self, mut log: CecLogAddrs) -> Result<CecLogAddrs> {
        if self.script().fail_set_log_addrs {
            return Err(CecError::adapter_io(
                "CEC_ADAP_S_LOG_ADDRS",
                std::io::ErrorKind::Other,
            ));
        }
        log.log_addr_mask = if log.num_log_addrs == 0 {
            CecLogAddrMask::empty()
        } else {
            CecLogicalAddress::try_from(log.log_addr[0])?.into()
        };
        let mut script = self.script();
        script.claims.push(log.clone());
        script.claimed = log.clone();
        Ok(log)
    }
    fn log_addrs(&self) -> Result<CecLogAddrs> {
        Ok(self.script().claimed.clone())
    }
    fn phys_addr(&self) -> Result<PhysicalAddress> {
        let script = self.script();
        if script.fail_phys_addr {
            return Err(CecError::adapter_io(
                "CEC_ADAP_G_PHYS_ADDR",
                std::io::ErrorKind::BrokenPipe,
            ));
        }
        Ok(script.phys_addr)
    }
    fn transmit(&self, frame: &CecFrame) -> Result<TxStatus> {
        let mut script = self.script();
        script.transmitted.push(*frame);
        Ok(script.tx_status)
    }
    fn dequeue_event(&self) -> Result<AdapterEvent> {
        let event = self.script().events.pop_front();
        self.0.changed.notify_all();
        event.ok_or_else(|| CecError::adapter_io("CEC_DQEVENT", std::io::ErrorKind::WouldBlock))
    }
    fn receive(&self) -> Result<(CecFrame, RxStatus)> {
        let frame = self.script().frames.pop_front();
        self.0.changed.notify_all();
        frame.ok_or_else(|| CecError::adapter_io("CEC_RECEIVE", std::io::ErrorKind::WouldBlock))
    }
    fn wait(&self, shutdown: &ShutdownSignal) -> Result<Readiness> {
        loop {
            {
                let script = self.script();
                let mut ready = Readiness::empty();
                if !script.events.is_empty() {
                    ready |= Readiness::EVENT;
                }
                if !script.frames.is_empty() {
                    ready |= Readiness::DATA;
                }
                if shutdown.is_raised() {
                    ready |= Readiness::SHUTDOWN;
                }
                if !ready.is_empty() {
                    return Ok(ready);
                }
            }
            self.set_idle(true);
            // the kick fd stands in for the adapter fd
            let polled = poll_readiness(self.0.kick.as_fd(), shutdown);
            self.set_idle(false);
            let _ = self.0.kick.read();
            if polled?.contains(Readiness::SHUTDOWN) {
                return Ok(Readiness::SHUTDOWN);
            }
        }
    }
}

/// Collects every delivered event.
pub fn collecting_callback() -> (EventCallback, std::sync::mpsc::Receiver<HdmiEvent>) {
    let (tx, rx) = std::sync::mpsc::channel();
    let tx = Mutex::new(tx);
    let callback: EventCallback = Arc::new(move |event: &HdmiEvent| {
        let _ = tx.lock().unwrap().send(event.clone());
    });
    (callback, rx)
}

pub fn playback_config() -> AdapterConfig {
    AdapterConfig::default()
        .with_device_type(DeviceType::Playback)
        .with_vendor_id(0x0c03)
        .with_cec_version(Version::V1_4)
}
