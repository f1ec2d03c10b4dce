use std::time::Duration;

use anyhow::{Context, Result, bail};
use maildesk_lib::{
    AddressList, Credentials, DirectSendOptions, Message, RelayOptions, SendOutcome, Strategy,
    send, validate_address_list,
};

use crate::args::{Mode, SendArgs};

pub fn run(args: SendArgs) -> Result<()> {
    let to = checked_list(&args.to, "--to")?;
    if to.is_empty() {
        bail!("--to must name at least one recipient");
    }
    let cc = checked_list(&args.cc, "--cc")?;

    let mut builder = Message::builder(&args.from)
        .subject(&args.subject)
        .body(&args.body);
    for recipient in &to {
        builder = builder.to(recipient);
    }
    for recipient in &cc {
        builder = builder.cc(recipient);
    }
    for path in &args.attach {
        builder = builder.attach(path);
    }
    let message = builder.build().context("building message")?;

    let recipients = message.all_recipients();
    let strategy = strategy_from(&args)?;

    let outcome = send(&strategy, &args.from, &recipients, &message, |line| {
        println!("{line}");
    })
    .context("sending message")?;

    match outcome {
        SendOutcome::Relay(receipt) => {
            println!(
                "accepted for {} recipient(s): {}",
                receipt.accepted, receipt.reply
            );
        }
        SendOutcome::Direct(report) => {
            println!("sent: {}", report.sent);
            for failure in &report.failures {
                println!("failed ({}): {} - {}", failure.kind, failure.recipient, failure.detail);
            }
            if !report.all_sent() {
                bail!("{} recipient(s) failed", report.failures.len());
            }
        }
    }
    Ok(())
}

fn checked_list(input: &str, flag: &str) -> Result<Vec<String>> {
    match validate_address_list(input) {
        AddressList::Valid(addresses) => Ok(addresses),
        AddressList::Invalid(invalid) => {
            bail!("{flag} has invalid address(es): {}", invalid.join(", "))
        }
    }
}

fn strategy_from(args: &SendArgs) -> Result<Strategy> {
    let timeout = Duration::from_secs(args.timeout);
    match args.mode {
        Mode::Local => Ok(Strategy::Local {
            host: args.host.clone(),
            port: args.port.unwrap_or(2525),
            options: RelayOptions {
                connect_timeout: timeout,
                command_timeout: timeout,
                ..RelayOptions::default()
            },
        }),
        Mode::Direct => {
            let mut options = DirectSendOptions {
                connect_timeout: timeout,
                command_timeout: timeout,
                protocol_trace: args.trace,
                ..DirectSendOptions::default()
            };
            if let Some(helo) = &args.helo {
                options.helo_name = helo.clone();
            }
            Ok(Strategy::Direct { options })
        }
        Mode::Auth => {
            let user = args
                .user
                .clone()
                .context("--user is required for --mode auth")?;
            let password = args
                .password
                .clone()
                .context("--password is required for --mode auth")?;
            Ok(Strategy::Authenticated {
                host: args.host.clone(),
                port: args.port.unwrap_or(587),
                credentials: Credentials::new(user, password),
                options: RelayOptions {
                    connect_timeout: timeout,
                    command_timeout: timeout,
                    ..RelayOptions::default()
                },
            })
        }
    }
}
