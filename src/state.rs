//! State shared between client threads and the event loop.

use crate::frame::CecMessage;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::error;

/// Notification handed to the registered callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HdmiEvent {
    /// The physical address became valid (`connected`) or invalid.
    HotPlug { port_id: u32, connected: bool },
    MessageReceived(CecMessage),
}

/// Runs on the event loop thread. Must not block for long.
pub type EventCallback = Arc<dyn Fn(&HdmiEvent) + Send + Sync>;

/// Runtime switches, toggled through
/// [HdmiCec::set_option](crate::HdmiCec::set_option).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeFlags {
    /// CEC as a whole. Off: nothing is delivered and nothing is sent.
    pub cec_enabled: bool,
    /// The HDMI control service is active. Off: only the standby subset is delivered.
    pub control_active: bool,
}

impl RuntimeFlags {
    pub const ACTIVE: Self = Self {
        cec_enabled: true,
        control_active: true,
    };
}

/// Flags behind one mutex plus the callback slot.
///
/// The flag lock is never held across a device call or a callback. The callback
/// slot is an atomic pointer swap: registering and loading never wait on a lock.
#[derive(Default)]
pub struct RuntimeState {
    flags: Mutex<RuntimeFlags>,
    callback: ArcSwapOption<EventCallback>,
}

impl RuntimeState {
    pub fn flags(&self) -> RuntimeFlags {
        *self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn set_flags(&self, flags: RuntimeFlags) {
        *self.flags.lock().unwrap_or_else(PoisonError::into_inner) = flags;
    }
    pub fn update_flags(&self, f: impl FnOnce(&mut RuntimeFlags)) {
        let mut flags = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *flags);
    }
    pub fn cec_enabled(&self) -> bool {
        self.flags().cec_enabled
    }

    /// Replace the callback. A delivery already in flight may still use the old one.
    pub fn set_callback(&self, callback: Option<EventCallback>) {
        self.callback.store(callback.map(Arc::new));
    }
    pub fn callback(&self) -> Option<EventCallback> {
        self.callback
            .load_full()
            .map(|callback| EventCallback::clone(&callback))
    }

    /// Hand `event` to the callback. Without one the event is dropped.
    pub fn deliver(&self, event: HdmiEvent) {
        match self.callback() {
            Some(callback) => callback(&event),
            None => error!("no event callback registered, dropping {event:?}"),
        }
    }
}

impl std::fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeState")
            .field("flags", &self.flags())
            .field("callback", &self.callback().is_some())
            .finish()
    }
}
