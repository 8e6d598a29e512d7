use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use seine_service::{ChannelKind, Event, FrameConfig, IoService};
use tracing::info;

use crate::cmd::ServeArgs;
use crate::exit::{service_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

const DISPATCH_BUDGET: usize = 128;
const TICK: Duration = Duration::from_millis(10);

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = FrameConfig::new(args.max_frame_length, 0, 4, 0)
        .map_err(|err| CliError::new(USAGE, format!("invalid frame config: {err}")))?;

    let mut service = IoService::new(&[(args.host.as_str(), args.port)]);
    service
        .set_frame_config(0, config)
        .map_err(|err| service_error("frame config rejected", err))?;

    service.start(|svc, event| match event {
        Event::ConnectResponse {
            transport: Some(id),
            ..
        } => {
            info!(transport = %id, "client connected");
        }
        Event::ConnectResponse { error, .. } => {
            if let Some(err) = error {
                info!(%err, "accept failed");
            }
        }
        Event::Packet { transport, frame } => {
            info!(transport = %transport, len = frame.len(), "echoing frame");
            let _ = svc.write(transport, frame);
        }
        Event::ConnectionLost { transport, reason } => {
            info!(transport = %transport, %reason, "client gone");
        }
    });

    service
        .open(0, ChannelKind::TcpServer)
        .map_err(|err| service_error("bind failed", err))?;
    let addr = service
        .local_addr(0)
        .map_err(|err| service_error("no listen address", err))?;
    info!(%addr, "echo server ready");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        service.dispatch(DISPATCH_BUDGET);
        std::thread::sleep(TICK);
    }

    service.stop();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
