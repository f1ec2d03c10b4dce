use std::sync::mpsc;

use anyhow::{Context, Result};
use maildesk_lib::{Listener, ListenerEvent, MailStore};

/// Runs the receiving endpoint until the process is interrupted. This thread
/// is the single consumer of the listener channel and the sole owner of the
/// record store.
pub fn run(host: &str, port: u16) -> Result<()> {
    let (tx, rx) = mpsc::channel();
    let mut listener = Listener::new();
    let addr = listener
        .start(host, port, tx)
        .context("starting listener")?;
    println!("listening on {addr} (Ctrl-C to stop)");

    let mut store = MailStore::new();
    while let Ok(event) = rx.recv() {
        match event {
            ListenerEvent::Log(line) => println!("{line}"),
            ListenerEvent::Received(record) => {
                println!(
                    "[{}] {} -> {} | {}",
                    record.received_at, record.sender, record.recipients, record.subject
                );
                if !record.body.is_empty() {
                    println!("{}", record.body.trim_end());
                }
                store.append(record);
                println!("({} message(s) stored)", store.len());
            }
        }
    }

    listener.stop();
    Ok(())
}
