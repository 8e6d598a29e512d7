use std::cell::RefCell;
use std::io::SeekFrom;
use std::rc::Rc;
use std::time::{Duration, Instant};

use seine_service::{ChannelKind, Event, FrameConfig, IoService};
use seine_stream::{StreamReader, StreamWriter};
use tracing::debug;

use crate::cmd::SendArgs;
use crate::exit::{service_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};

const DISPATCH_BUDGET: usize = 128;
const TICK: Duration = Duration::from_millis(5);

enum Outcome {
    Reply(String),
    ConnectFailed(String),
    Lost(String),
}

pub fn run(args: SendArgs) -> CliResult<i32> {
    let config = FrameConfig::new(65535, 0, 4, 0)
        .map_err(|err| CliError::new(USAGE, format!("invalid frame config: {err}")))?;

    let mut service = IoService::new(&[(args.host.as_str(), args.port)]);
    service
        .set_frame_config(0, config)
        .map_err(|err| service_error("frame config rejected", err))?;

    let payload = frame_message(&args.message)
        .map_err(|err| CliError::new(USAGE, format!("message too large: {err}")))?;

    let outcome: Rc<RefCell<Option<Outcome>>> = Rc::new(RefCell::new(None));
    let state = Rc::clone(&outcome);
    service.start(move |svc, event| match event {
        Event::ConnectResponse {
            transport: Some(id),
            ..
        } => {
            debug!(transport = %id, "connected, sending message");
            let _ = svc.write(id, payload.clone());
        }
        Event::ConnectResponse { error, .. } => {
            let reason = error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            *state.borrow_mut() = Some(Outcome::ConnectFailed(reason));
            svc.stop();
        }
        Event::Packet { frame, .. } => {
            let mut reader = StreamReader::new(&frame);
            let text = reader
                .seek(SeekFrom::Current(4))
                .and_then(|_| reader.read_vstring())
                .unwrap_or_else(|err| format!("<unreadable reply: {err}>"));
            *state.borrow_mut() = Some(Outcome::Reply(text));
            svc.stop();
        }
        Event::ConnectionLost { reason, .. } => {
            *state.borrow_mut() = Some(Outcome::Lost(reason.to_string()));
            svc.stop();
        }
    });

    service
        .open(0, ChannelKind::TcpClient)
        .map_err(|err| service_error("connect setup failed", err))?;

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    while service.is_running() && Instant::now() < deadline {
        service.dispatch(DISPATCH_BUDGET);
        std::thread::sleep(TICK);
    }
    service.stop();

    let result = outcome.borrow_mut().take();
    match result {
        Some(Outcome::Reply(text)) => {
            println!("{text}");
            Ok(SUCCESS)
        }
        Some(Outcome::ConnectFailed(reason)) => {
            Err(CliError::new(FAILURE, format!("connect failed: {reason}")))
        }
        Some(Outcome::Lost(reason)) => Err(CliError::new(
            FAILURE,
            format!("connection lost before reply: {reason}"),
        )),
        None => Err(CliError::new(TIMEOUT, "timed out waiting for reply")),
    }
}

/// Length-framed message: 4-byte total-length header then a varint string.
fn frame_message(text: &str) -> seine_stream::Result<bytes::Bytes> {
    let mut w = StreamWriter::new();
    let header = w.push_length_placeholder()?;
    w.write_vstring(text)?;
    w.patch_length_placeholder(header)?;
    Ok(w.into_bytes())
}
