//! wirekv CLI Client
//!
//! Command-line interface for talking to a wirekv server.

use clap::{Parser, Subcommand};
use wirekv::Client;

/// wirekv CLI
#[derive(Parser, Debug)]
#[command(name = "wirekv-cli")]
#[command(about = "CLI for the wirekv key-value protocol")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> wirekv::Result<()> {
    let client = Client::connect(&args.server)?;

    match &args.command {
        Commands::Get { key } => match client.get(key)? {
            Some(value) => println!("{}", value),
            None => println!("(not found)"),
        },
        Commands::Set { key, value } => {
            if client.set(key, value)? {
                println!("OK");
            } else {
                println!("FAILED");
            }
        }
        Commands::Del { key } => {
            if client.delete(key)? {
                println!("OK");
            } else {
                println!("(not found)");
            }
        }
        Commands::Ping => {
            let rtt = client.ping()?;
            println!("PONG ({} us)", rtt.as_micros());
        }
    }

    Ok(())
}
