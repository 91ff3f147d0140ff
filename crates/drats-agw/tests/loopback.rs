//! AGW client against a minimal in-process server on a loopback socket.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use drats_agw::*;

/// Read one frame from the server side of the socket.
fn read_frame(stream: &mut impl Read) -> AgwFrame {
    let mut header = [0u8; AGW_HEADER_SIZE];
    stream.read_exact(&mut header).unwrap();
    let len = AgwFrame::declared_len(&header).unwrap();
    let mut data = header.to_vec();
    data.resize(AGW_HEADER_SIZE + len, 0);
    stream.read_exact(&mut data[AGW_HEADER_SIZE..]).unwrap();
    AgwFrame::decode(&data).unwrap()
}

#[test]
fn test_raw_mode_echo() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        let enable = read_frame(&mut sock);
        assert_eq!(enable.kind, KIND_ENABLE_RAW);

        // Echo the UI frame back the way a monitoring server would, with an
        // unrelated frame queued first.
        let ui = read_frame(&mut sock);
        sock.write_all(&AgwFrame::new(KIND_HEARD).encode()).unwrap();
        sock.write_all(&ui.encode()).unwrap();
        ui
    });

    let mut agw = AgwConnection::connect("127.0.0.1", port, Some(Duration::from_millis(500))).unwrap();
    agw.enable_raw().unwrap();
    transmit_data(&mut agw, "CQ", &["KK7DS", "KK7DS-3"], b"foo").unwrap();

    let echoed = receive_data(&mut agw, true).unwrap();
    let sent = server.join().unwrap();

    assert_eq!(echoed, sent.payload);
    assert!(echoed.ends_with(b"\x3e\xf0foo"));
    assert_eq!(agw.queued(KIND_HEARD), 1);
}

#[test]
fn test_connected_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();

        let register = read_frame(&mut sock);
        assert_eq!(register.kind, KIND_REGISTER);
        sock.write_all(&AgwFrame::new(KIND_REGISTER).with_payload(vec![1]).encode())
            .unwrap();

        let connect = read_frame(&mut sock);
        assert_eq!(connect.to_call(), "RMS-10");
        sock.write_all(
            &AgwFrame::new(KIND_CONNECT)
                .with_payload(b"*** CONNECTED".to_vec())
                .encode(),
        )
        .unwrap();

        let data = read_frame(&mut sock);
        sock.write_all(
            &AgwFrame::new(KIND_DATA)
                .with_payload([b"ack:".as_slice(), &data.payload].concat())
                .encode(),
        )
        .unwrap();

        let bye = read_frame(&mut sock);
        assert_eq!(bye.kind, KIND_DISCONNECT);
        sock.write_all(&AgwFrame::new(KIND_DISCONNECT).encode()).unwrap();
    });

    let agw = AgwConnection::connect("127.0.0.1", port, Some(Duration::from_millis(200)))
        .unwrap()
        .into_shared();
    let mut session = AgwAx25Connection::new(agw, "KK7DS").unwrap();
    session.connect("RMS-10").unwrap();
    session.write_all(b"ping").unwrap();

    let mut reply = Vec::new();
    while reply.len() < 8 {
        let mut buf = [0u8; 16];
        match session.read(&mut buf) {
            Ok(n) => reply.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut || e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => panic!("read failed: {}", e),
        }
    }
    assert_eq!(reply, b"ack:ping");

    session.disconnect().unwrap();
    server.join().unwrap();
}
