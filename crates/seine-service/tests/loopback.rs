//! Loopback tests driving real sockets through two cooperating services.

use std::cell::RefCell;
use std::io::SeekFrom;
use std::rc::Rc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use seine_service::{ChannelKind, ChannelState, Event, FrameConfig, IoService, ServiceError, TransportId};
use seine_stream::{StreamReader, StreamWriter};

const DEADLINE: Duration = Duration::from_secs(10);

type Sink = Rc<RefCell<Vec<Event>>>;

fn sink() -> Sink {
    Rc::new(RefCell::new(Vec::new()))
}

/// Start a service that records every event it sees.
fn start_recording(svc: &mut IoService, events: &Sink) {
    let events = Rc::clone(events);
    svc.start(move |_, event| events.borrow_mut().push(event));
}

/// Dispatch both services until `done` holds or the deadline passes.
fn pump(services: &mut [&mut IoService], mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        for svc in services.iter_mut() {
            svc.dispatch(128);
        }
        assert!(
            start.elapsed() < DEADLINE,
            "condition not reached before deadline"
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn framing() -> FrameConfig {
    FrameConfig::new(65535, 0, 4, 0).unwrap()
}

fn connected_transport(events: &Sink) -> Option<TransportId> {
    events.borrow().iter().find_map(|event| match event {
        Event::ConnectResponse {
            transport: Some(id),
            error: None,
            ..
        } => Some(*id),
        _ => None,
    })
}

fn first_packet(events: &Sink) -> Option<Bytes> {
    events.borrow().iter().find_map(|event| match event {
        Event::Packet { frame, .. } => Some(frame.clone()),
        _ => None,
    })
}

/// Bring up a listening server and a connected client, returning both
/// services plus their event sinks.
fn establish() -> (IoService, Sink, IoService, Sink) {
    let mut server = IoService::new(&[("127.0.0.1", 0)]);
    server.set_frame_config(0, framing()).unwrap();
    let server_events = sink();
    start_recording(&mut server, &server_events);
    server.open(0, ChannelKind::TcpServer).unwrap();
    let port = server.local_addr(0).unwrap().port();

    let mut client = IoService::new(&[("127.0.0.1", port)]);
    client.set_frame_config(0, framing()).unwrap();
    let client_events = sink();
    start_recording(&mut client, &client_events);
    client.open(0, ChannelKind::TcpClient).unwrap();

    pump(&mut [&mut server, &mut client], || {
        connected_transport(&server_events).is_some()
            && connected_transport(&client_events).is_some()
    });

    (server, server_events, client, client_events)
}

/// Serialized message exercising every stream primitive, with a 4-byte
/// total-length header patched in afterwards.
fn build_message() -> StreamWriter {
    let mut w = StreamWriter::with_capacity(256);
    let header = w.push_length_placeholder().unwrap();
    w.write_bool(true).unwrap();
    w.write_bool(false).unwrap();
    w.write_i8(256).unwrap();
    w.write_i16(20001).unwrap();
    w.write_i24(-298).unwrap();
    w.write_u24(16_777_215).unwrap();
    w.write_i32(20_191_011).unwrap();
    w.write_f32(28.9).unwrap();
    w.write_f64(209.79).unwrap();
    w.write_vstring("hello client!").unwrap();
    w.patch_length_placeholder(header).unwrap();
    w
}

#[test]
fn end_to_end_split_frame_reassembly() {
    let (mut server, server_events, mut client, client_events) = establish();
    let server_transport = connected_transport(&server_events).unwrap();

    let message = build_message();
    let part1 = message.sub(0, Some(10)).unwrap();
    let part2 = message.sub(10, None).unwrap();

    // Two non-contiguous sends with a pause in between; the client must
    // still see exactly one packet.
    server.write(server_transport, part1).unwrap();
    for _ in 0..10 {
        server.dispatch(128);
        client.dispatch(128);
        std::thread::sleep(Duration::from_millis(5));
    }
    // Only a fragment has arrived; no packet yet.
    assert!(first_packet(&client_events).is_none());
    server.write(server_transport, part2).unwrap();

    pump(&mut [&mut server, &mut client], || {
        first_packet(&client_events).is_some()
    });

    let frame = first_packet(&client_events).unwrap();
    assert_eq!(frame.len(), message.len());

    let mut r = StreamReader::new(&frame);
    assert_eq!(r.read_u32().unwrap() as usize, frame.len());
    assert!(r.read_bool().unwrap());
    assert!(!r.read_bool().unwrap());
    assert_eq!(r.read_i8().unwrap(), 0); // 256 wrapped on write
    assert_eq!(r.read_i16().unwrap(), 20001);
    assert_eq!(r.read_i24().unwrap(), -298);
    assert_eq!(r.read_u24().unwrap(), 16_777_215);
    assert_eq!(r.read_i32().unwrap(), 20_191_011);
    assert_eq!(r.read_f32().unwrap().to_bits(), 28.9f32.to_bits());
    assert_eq!(r.read_f64().unwrap().to_bits(), 209.79f64.to_bits());
    assert_eq!(r.read_vstring().unwrap(), "hello client!");
    assert_eq!(r.remaining(), 0);

    // Exactly one packet, not a packet per chunk.
    let packets = client_events
        .borrow()
        .iter()
        .filter(|e| matches!(e, Event::Packet { .. }))
        .count();
    assert_eq!(packets, 1);
}

#[test]
fn header_seek_skips_length_field() {
    let message = build_message();
    let bytes = message.into_bytes();

    let mut r = StreamReader::new(&bytes);
    r.seek(SeekFrom::Current(4)).unwrap();
    assert!(r.read_bool().unwrap());
}

#[test]
fn writes_preserve_fifo_order() {
    let (mut server, server_events, mut client, client_events) = establish();
    let transport = connected_transport(&server_events).unwrap();

    let mut first = StreamWriter::new();
    let h = first.push_length_placeholder().unwrap();
    first.write_vstring("first message").unwrap();
    first.patch_length_placeholder(h).unwrap();

    let mut second = StreamWriter::new();
    let h = second.push_length_placeholder().unwrap();
    second.write_vstring("second message").unwrap();
    second.patch_length_placeholder(h).unwrap();

    server.write(transport, first.into_bytes()).unwrap();
    server.write(transport, second.into_bytes()).unwrap();

    pump(&mut [&mut server, &mut client], || {
        client_events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Packet { .. }))
            .count()
            >= 2
    });

    let texts: Vec<String> = client_events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Packet { frame, .. } => {
                let mut r = StreamReader::new(frame);
                r.seek(SeekFrom::Current(4)).unwrap();
                Some(r.read_vstring().unwrap())
            }
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["first message", "second message"]);
}

#[test]
fn connect_refused_reported_as_event() {
    // Bind then drop to get a port with no listener.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let mut client = IoService::new(&[("127.0.0.1", port)]);
    let events = sink();
    start_recording(&mut client, &events);
    client.open(0, ChannelKind::TcpClient).unwrap();

    pump(&mut [&mut client], || !events.borrow().is_empty());

    let events = events.borrow();
    assert!(matches!(
        &events[0],
        Event::ConnectResponse {
            channel: 0,
            transport: None,
            error: Some(_),
        }
    ));
    drop(events);

    // The channel is back to Closed and may retry via open().
    assert_eq!(client.channel_state(0).unwrap(), ChannelState::Closed);
    assert!(client.open(0, ChannelKind::TcpClient).is_ok());
}

#[test]
fn server_accepts_multiple_transports() {
    let mut server = IoService::new(&[("127.0.0.1", 0)]);
    server.set_frame_config(0, framing()).unwrap();
    let server_events = sink();
    start_recording(&mut server, &server_events);
    server.open(0, ChannelKind::TcpServer).unwrap();
    let port = server.local_addr(0).unwrap().port();

    let mut client_a = IoService::new(&[("127.0.0.1", port)]);
    let a_events = sink();
    start_recording(&mut client_a, &a_events);
    client_a.open(0, ChannelKind::TcpClient).unwrap();

    let mut client_b = IoService::new(&[("127.0.0.1", port)]);
    let b_events = sink();
    start_recording(&mut client_b, &b_events);
    client_b.open(0, ChannelKind::TcpClient).unwrap();

    pump(&mut [&mut server, &mut client_a, &mut client_b], || {
        server_events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::ConnectResponse { transport: Some(_), .. }))
            .count()
            >= 2
    });

    assert_eq!(server.transport_count(), 2);
}

#[test]
fn peer_close_emits_connection_lost() {
    let (mut server, server_events, mut client, client_events) = establish();
    let server_transport = connected_transport(&server_events).unwrap();

    server.close_transport(server_transport).unwrap();
    assert!(matches!(
        server.write(server_transport, Bytes::from_static(b"late")),
        Err(ServiceError::ClosedTransport { .. })
    ));

    pump(&mut [&mut server, &mut client], || {
        client_events
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::ConnectionLost { .. }))
    });

    assert_eq!(client.transport_count(), 0);
    assert_eq!(client.channel_state(0).unwrap(), ChannelState::Closed);
}

#[test]
fn oversized_frame_closes_only_the_offending_transport() {
    let mut server = IoService::new(&[("127.0.0.1", 0)]);
    // Tiny cap so the client's first frame is rejected.
    server
        .set_frame_config(0, FrameConfig::new(16, 0, 4, 0).unwrap())
        .unwrap();
    let server_events = sink();
    start_recording(&mut server, &server_events);
    server.open(0, ChannelKind::TcpServer).unwrap();
    let port = server.local_addr(0).unwrap().port();

    let mut client = IoService::new(&[("127.0.0.1", port)]);
    client.set_frame_config(0, framing()).unwrap();
    let client_events = sink();
    start_recording(&mut client, &client_events);
    client.open(0, ChannelKind::TcpClient).unwrap();

    pump(&mut [&mut server, &mut client], || {
        connected_transport(&client_events).is_some()
    });
    let client_transport = connected_transport(&client_events).unwrap();

    let mut w = StreamWriter::new();
    let h = w.push_length_placeholder().unwrap();
    w.write_vstring("this frame is far larger than sixteen bytes")
        .unwrap();
    w.patch_length_placeholder(h).unwrap();
    client.write(client_transport, w.into_bytes()).unwrap();

    pump(&mut [&mut server, &mut client], || {
        server_events
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::ConnectionLost { .. }))
    });

    // The bad peer is gone; the listener keeps serving.
    assert_eq!(server.transport_count(), 0);
    assert_eq!(server.channel_state(0).unwrap(), ChannelState::Listening);
    assert!(!server_events
        .borrow()
        .iter()
        .any(|e| matches!(e, Event::Packet { .. })));
}

#[test]
fn stop_from_inside_callback_is_safe() {
    let (mut server, server_events, mut client, _client_events) = establish();
    let server_transport = connected_transport(&server_events).unwrap();

    // Re-register the client callback: stop the service on the first packet.
    let got_packet = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&got_packet);
    client.start(move |svc, event| {
        if matches!(event, Event::Packet { .. }) {
            *flag.borrow_mut() = true;
            svc.stop();
        }
    });

    let mut w = StreamWriter::new();
    let h = w.push_length_placeholder().unwrap();
    w.write_vstring("final").unwrap();
    w.patch_length_placeholder(h).unwrap();
    server.write(server_transport, w.into_bytes()).unwrap();

    pump(&mut [&mut server, &mut client], || *got_packet.borrow());

    assert!(!client.is_running());
    assert_eq!(client.transport_count(), 0);
    assert_eq!(client.dispatch(128), 0);
}
