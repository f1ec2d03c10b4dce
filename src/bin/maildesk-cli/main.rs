mod args;
mod send;
mod serve;

use anyhow::Result;
use clap::Parser;
use maildesk_lib::{validate_address, validate_address_list, validate_port, AddressList};

use args::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Validate {
            address,
            list,
            port,
        } => run_validate(address, list, port),
        Commands::Send(send_args) => send::run(send_args),
        Commands::Serve { host, port } => serve::run(&host, port),
    }
}

fn run_validate(
    address: Option<String>,
    list: Option<String>,
    port: Option<String>,
) -> Result<()> {
    let mut failed = false;

    if let Some(address) = address {
        if validate_address(&address) {
            println!("{address}: valid");
        } else {
            println!("{address}: invalid");
            failed = true;
        }
    }
    if let Some(list) = list {
        match validate_address_list(&list) {
            AddressList::Valid(addresses) => {
                println!("list valid ({} address(es))", addresses.len());
            }
            AddressList::Invalid(invalid) => {
                println!("list invalid: {}", invalid.join(", "));
                failed = true;
            }
        }
    }
    if let Some(port) = port {
        match validate_port(&port) {
            Ok(value) => println!("port valid: {value}"),
            Err(err) => {
                println!("port invalid: {err}");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}
