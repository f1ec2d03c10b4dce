//! Accept loop and per-connection handling for the inbound listener.
//!
//! The listener thread owns no shared state: every record and log line is
//! shipped over the event channel to the single consumer that owns the
//! [`MailStore`](crate::store::MailStore).

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::warn;

use super::parser::record_from_envelope;
use super::session::{Session, Step};
use crate::store::ReceivedRecord;

/// Events the listener ships to the store owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// A successfully parsed inbound message, ready to append to the store.
    Received(ReceivedRecord),
    /// A human-readable progress or diagnostic line.
    Log(String),
}

/// Poll interval for the shutdown flag while no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

pub(crate) fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    events: mpsc::Sender<ListenerEvent>,
) {
    if let Err(err) = listener.set_nonblocking(true) {
        warn!("cannot poll listener socket: {err}");
        events
            .send(ListenerEvent::Log(format!("listener failed: {err}")))
            .ok();
        return;
    }

    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let events = events.clone();
                let spawned = thread::Builder::new()
                    .name(format!("maildesk-conn-{peer}"))
                    .spawn(move || {
                        if let Err(err) = handle_connection(stream, peer, &events) {
                            warn!("connection from {peer} failed: {err}");
                        }
                    });
                if let Err(err) = spawned {
                    warn!("cannot spawn connection thread: {err}");
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(err) => {
                warn!("accept failed: {err}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    events: &mpsc::Sender<ListenerEvent>,
) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut session = Session::new();
    write_line(&mut stream, &Session::greeting())?;

    let mut line_buffer = Vec::new();
    loop {
        line_buffer.clear();
        if reader.read_until(b'\n', &mut line_buffer)? == 0 {
            break; // connection closed by peer
        }
        let line = String::from_utf8_lossy(&line_buffer);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() && !session.collecting_data() {
            continue;
        }

        match session.process_line(line) {
            Step::Reply(reply) => write_line(&mut stream, &reply)?,
            Step::Quit(reply) => {
                write_line(&mut stream, &reply)?;
                break;
            }
            Step::Collected => {}
            Step::Envelope(envelope) => match record_from_envelope(&envelope, peer) {
                Ok(record) => {
                    events
                        .send(ListenerEvent::Log(format!(
                            "received mail from {} - subject: {}",
                            record.sender, record.subject
                        )))
                        .ok();
                    events.send(ListenerEvent::Received(record)).ok();
                    write_line(&mut stream, "250 Message accepted for delivery")?;
                }
                Err(err) => {
                    warn!("failed to parse message from {peer}: {err}");
                    events
                        .send(ListenerEvent::Log(format!(
                            "error processing message from {}: {err}",
                            envelope.sender
                        )))
                        .ok();
                    write_line(&mut stream, "550 Error processing message")?;
                }
            },
        }
    }

    Ok(())
}

fn write_line(stream: &mut TcpStream, line: &str) -> std::io::Result<()> {
    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\r\n")?;
    stream.flush()
}
