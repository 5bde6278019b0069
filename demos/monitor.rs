use hdmi_cec::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(name) => AdapterConfig::for_device(&name),
        None => AdapterConfig::default(),
    }
    .with_osd_name("monitor");
    let cec = open_adapter(config)?;

    cec.register_event_callback(Arc::new(|event: &HdmiEvent| match event {
        HdmiEvent::HotPlug { port_id, connected } => {
            tracing::info!(port_id, connected, "hotplug")
        }
        HdmiEvent::MessageReceived(msg) => match msg.opcode().map(CecOpcode::try_from) {
            Some(Ok(opcode)) => tracing::info!(
                "{:?}->{:?} {:?} {:x?}",
                msg.initiator,
                msg.destination,
                opcode,
                msg.operands()
            ),
            _ => tracing::info!("{:?}->{:?} {:x?}", msg.initiator, msg.destination, msg.body),
        },
    }));

    let mask = cec.add_logical_address(CecLogicalAddress::Playback1)?;
    tracing::info!(?mask, phys = %cec.physical_address()?, "claimed");

    loop {
        std::thread::park();
    }
}
