use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::mpsc;
use std::time::Duration;

use super::{InboundError, Listener, ListenerEvent, ListenerState};
use crate::store::MailStore;

const EVENT_WAIT: Duration = Duration::from_secs(2);

fn start_listener() -> (Listener, SocketAddr, mpsc::Receiver<ListenerEvent>) {
    let (tx, rx) = mpsc::channel();
    let mut listener = Listener::new();
    let addr = listener.start("127.0.0.1", 0, tx).expect("listener starts");
    (listener, addr, rx)
}

fn send_command(stream: &mut TcpStream, reader: &mut BufReader<TcpStream>, command: &str) -> String {
    write!(stream, "{command}\r\n").expect("write command");
    stream.flush().expect("flush");
    read_reply(reader)
}

fn read_reply(reader: &mut BufReader<TcpStream>) -> String {
    let mut reply = String::new();
    reader.read_line(&mut reply).expect("read reply");
    reply.trim_end().to_string()
}

fn next_record(rx: &mpsc::Receiver<ListenerEvent>) -> Option<crate::store::ReceivedRecord> {
    while let Ok(event) = rx.recv_timeout(EVENT_WAIT) {
        if let ListenerEvent::Received(record) = event {
            return Some(record);
        }
    }
    None
}

#[test]
fn complete_session_produces_one_record() {
    let (mut listener, addr, rx) = start_listener();

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    assert!(read_reply(&mut reader).starts_with("220"));

    assert!(send_command(&mut stream, &mut reader, "HELO client.local").starts_with("250"));
    assert!(
        send_command(&mut stream, &mut reader, "MAIL FROM:<alice@example.com>")
            .starts_with("250")
    );
    assert!(
        send_command(&mut stream, &mut reader, "RCPT TO:<bob@example.org>").starts_with("250")
    );
    assert!(send_command(&mut stream, &mut reader, "DATA").starts_with("354"));

    write!(stream, "Subject: Test\r\n\r\nHello\r\n.\r\n").expect("write body");
    stream.flush().expect("flush");
    assert!(read_reply(&mut reader).starts_with("250"));

    assert!(send_command(&mut stream, &mut reader, "QUIT").starts_with("221"));

    // The consumer owns the store; the listener only ships events.
    let mut store = MailStore::new();
    let record = next_record(&rx).expect("one record");
    store.append(record);

    assert_eq!(store.len(), 1);
    let snapshot = store.snapshot();
    assert_eq!(snapshot[0].sender, "alice@example.com");
    assert_eq!(snapshot[0].recipients, "bob@example.org");
    assert_eq!(snapshot[0].subject, "Test");
    assert_eq!(snapshot[0].body.trim_end(), "Hello");

    listener.stop();
}

#[test]
fn multiple_recipients_are_joined() {
    let (mut listener, addr, rx) = start_listener();

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    read_reply(&mut reader);

    send_command(&mut stream, &mut reader, "EHLO client.local");
    send_command(&mut stream, &mut reader, "MAIL FROM:<alice@example.com>");
    send_command(&mut stream, &mut reader, "RCPT TO:<one@example.org>");
    send_command(&mut stream, &mut reader, "RCPT TO:<two@example.org>");
    send_command(&mut stream, &mut reader, "DATA");
    write!(stream, "Subject: Pair\r\n\r\nbody\r\n.\r\n").expect("write body");
    stream.flush().expect("flush");
    assert!(read_reply(&mut reader).starts_with("250"));
    send_command(&mut stream, &mut reader, "QUIT");

    let record = next_record(&rx).expect("one record");
    assert_eq!(record.recipients, "one@example.org, two@example.org");

    listener.stop();
}

#[test]
fn malformed_message_gets_permanent_failure_and_no_record() {
    let (mut listener, addr, rx) = start_listener();

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    read_reply(&mut reader);

    send_command(&mut stream, &mut reader, "HELO client.local");
    send_command(&mut stream, &mut reader, "MAIL FROM:<alice@example.com>");
    send_command(&mut stream, &mut reader, "RCPT TO:<bob@example.org>");
    send_command(&mut stream, &mut reader, "DATA");
    write!(stream, "this line is not a header\r\n.\r\n").expect("write body");
    stream.flush().expect("flush");
    assert!(read_reply(&mut reader).starts_with("550"));
    send_command(&mut stream, &mut reader, "QUIT");

    listener.stop();

    // Only log events, never a record.
    let mut records = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ListenerEvent::Received(_)) {
            records += 1;
        }
    }
    assert_eq!(records, 0);
}

#[test]
fn session_can_carry_several_messages() {
    let (mut listener, addr, rx) = start_listener();

    let mut stream = TcpStream::connect(addr).expect("connect");
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
    read_reply(&mut reader);

    send_command(&mut stream, &mut reader, "HELO client.local");
    for subject in ["first", "second"] {
        send_command(&mut stream, &mut reader, "MAIL FROM:<alice@example.com>");
        send_command(&mut stream, &mut reader, "RCPT TO:<bob@example.org>");
        send_command(&mut stream, &mut reader, "DATA");
        write!(stream, "Subject: {subject}\r\n\r\nbody\r\n.\r\n").expect("write body");
        stream.flush().expect("flush");
        assert!(read_reply(&mut reader).starts_with("250"));
    }
    send_command(&mut stream, &mut reader, "QUIT");

    let first = next_record(&rx).expect("first record");
    let second = next_record(&rx).expect("second record");
    assert_eq!(first.subject, "first");
    assert_eq!(second.subject, "second");

    listener.stop();
}

#[test]
fn stopping_a_stopped_listener_is_a_no_op() {
    let mut listener = Listener::new();
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert_eq!(listener.stop(), "listener already stopped");
    assert_eq!(listener.state(), ListenerState::Stopped);
}

#[test]
fn starting_twice_is_a_caller_error() {
    let (tx, _rx) = mpsc::channel();
    let mut listener = Listener::new();
    listener.start("127.0.0.1", 0, tx.clone()).expect("first start");
    let err = listener.start("127.0.0.1", 0, tx).expect_err("second start");
    assert!(matches!(err, InboundError::AlreadyRunning));
    listener.stop();
}

#[test]
fn listener_restarts_after_stop() {
    let (tx, _rx) = mpsc::channel();
    let mut listener = Listener::new();
    listener.start("127.0.0.1", 0, tx.clone()).expect("first start");
    assert!(listener.is_running());
    assert!(listener.bound_addr().is_some());
    listener.stop();
    assert_eq!(listener.state(), ListenerState::Stopped);
    assert!(listener.bound_addr().is_none());

    let addr = listener.start("127.0.0.1", 0, tx).expect("second start");
    assert!(listener.is_running());
    assert_eq!(listener.bound_addr(), Some(addr));
    listener.stop();
}

#[test]
fn bind_failure_reports_error_and_stays_stopped() {
    let (tx, _rx) = mpsc::channel();
    let mut blocker = Listener::new();
    let addr = blocker
        .start("127.0.0.1", 0, tx.clone())
        .expect("first listener");

    let mut listener = Listener::new();
    let err = listener
        .start("127.0.0.1", addr.port(), tx)
        .expect_err("port already bound");
    assert!(matches!(err, InboundError::Bind { .. }));
    assert_eq!(listener.state(), ListenerState::Stopped);

    blocker.stop();
}
