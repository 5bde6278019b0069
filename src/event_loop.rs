//! Background thread forwarding adapter events and received frames to the callback.

use crate::device::{AdapterEvent, CecGateway, Readiness, ShutdownSignal};
use crate::error::{CecError, Result};
use crate::filter;
use crate::state::{HdmiEvent, RuntimeState};
use crate::sys::RxStatus;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The only port of a single port adapter.
pub const PORT_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Start the loop on its own thread. It runs until `shutdown` is raised.
pub fn spawn<G: CecGateway>(
    gateway: Arc<G>,
    state: Arc<RuntimeState>,
    shutdown: Arc<ShutdownSignal>,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("cec-event".into())
        .spawn(move || run(&*gateway, &state, &shutdown))
        .map_err(|e| CecError::adapter_io("spawn event loop", e))
}

/// Pause after the first failed wait.
const WAIT_BACKOFF_MIN: Duration = Duration::from_millis(10);
/// Longest pause between failing waits.
const WAIT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before waiting again after `failures` consecutive failed waits.
pub fn wait_backoff(failures: u32) -> Duration {
    WAIT_BACKOFF_MIN
        .saturating_mul(1 << failures.saturating_sub(1).min(16))
        .min(WAIT_BACKOFF_MAX)
}

/// Wait and dispatch until shut down.
///
/// A raised [ShutdownSignal] stops the loop at the next wakeup of any kind, even
/// if its own wakeup never arrived.
pub fn run<G: CecGateway + ?Sized>(gateway: &G, state: &RuntimeState, shutdown: &ShutdownSignal) {
    info!("event loop started");
    let mut failures = 0u32;
    loop {
        let mut ready = match gateway.wait(shutdown) {
            Ok(ready) => ready,
            Err(e) if shutdown.is_raised() => {
                debug!("wait failed after shutdown: {e}");
                break;
            }
            Err(e) => {
                failures = failures.saturating_add(1);
                if failures == 1 {
                    warn!("waiting for the adapter: {e}");
                } else {
                    debug!(failures, "waiting for the adapter: {e}");
                }
                if shutdown.wait_timeout(wait_backoff(failures)) {
                    break;
                }
                continue;
            }
        };
        if failures > 0 {
            info!("adapter wait recovered after {failures} failures");
            failures = 0;
        }
        if shutdown.is_raised() {
            ready |= Readiness::SHUTDOWN;
        }
        if dispatch(gateway, state, ready) == LoopState::Stopped {
            break;
        }
    }
    info!("event loop stopped");
}

/// Handle one wakeup.
///
/// Shutdown is checked first and ends the loop without touching the adapter.
/// Then at most one adapter event and then at most one frame are handled, each
/// independently of how the other went.
pub fn dispatch<G: CecGateway + ?Sized>(
    gateway: &G,
    state: &RuntimeState,
    ready: Readiness,
) -> LoopState {
    if ready.contains(Readiness::SHUTDOWN) {
        return LoopState::Stopped;
    }
    if ready.contains(Readiness::EVENT) {
        handle_event(gateway, state);
    }
    if ready.contains(Readiness::DATA) {
        handle_frame(gateway, state);
    }
    LoopState::Running
}

fn handle_event<G: CecGateway + ?Sized>(gateway: &G, state: &RuntimeState) {
    let event = match gateway.dequeue_event() {
        Ok(event) => event,
        Err(e) => {
            warn!("dequeueing adapter event: {e}");
            return;
        }
    };
    if !state.cec_enabled() {
        debug!(?event, "CEC disabled, ignoring adapter event");
        return;
    }
    match event {
        AdapterEvent::StateChange {
            phys_addr,
            log_addr_mask,
        } => {
            debug!(%phys_addr, ?log_addr_mask, "adapter state changed");
            state.deliver(HdmiEvent::HotPlug {
                port_id: PORT_ID,
                connected: phys_addr.is_valid(),
            });
        }
        AdapterEvent::LostMessages(n) => warn!("adapter dropped {n} received messages"),
        AdapterEvent::Other(kind) => debug!(kind, "ignoring adapter event"),
    }
}

fn handle_frame<G: CecGateway + ?Sized>(gateway: &G, state: &RuntimeState) {
    let (frame, status) = match gateway.receive() {
        Ok(rx) => rx,
        Err(e) => {
            error!("receiving frame: {e}");
            return;
        }
    };
    if status != RxStatus::OK {
        debug!(?status, "dropping frame with bad receive status");
        return;
    }
    let flags = state.flags();
    if !flags.cec_enabled {
        return;
    }
    if !filter::should_deliver(&frame, flags.control_active) {
        debug!(?frame, "filtered message in standby");
        return;
    }
    state.deliver(HdmiEvent::MessageReceived(frame.decode()));
}
