//! Send a message file straight to the recipient's mail exchangers
//!
//! ```text
//! mxsend send message.eml --to someone@example.com
//! mxsend send message.eml --server localhost:1025
//! mxsend resolve example.com
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mxsend::{Config, message};
use mxsend_delivery::{Deliverer, DeliveryContext, DeliveryOutcome, DeliveryRequest, MxOverride};
use tracing::info;

/// Deliver mail directly to the recipient's MX hosts
#[derive(Parser, Debug)]
#[command(name = "mxsend")]
#[command(about = "Deliver mail directly to the recipient's MX hosts", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (otherwise MXSEND_CONFIG or the default locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deliver a message file
    Send {
        /// RFC 5322 message to send
        file: PathBuf,

        /// Recipient address (defaults to the first To: address in the message)
        #[arg(short, long)]
        to: Option<String>,

        /// Envelope sender
        #[arg(short, long)]
        from: Option<String>,

        /// Identity announced with HELO
        #[arg(long)]
        helo: Option<String>,

        /// Deliver to this host:port instead of resolving MX records
        #[arg(short, long)]
        server: Option<MxOverride>,

        /// Port used for resolved mail servers
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show the hosts a domain's mail would be sent to
    Resolve {
        /// Domain to resolve
        domain: String,

        /// Port used for resolved mail servers
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mxsend_common::logging::init();

    let cli = Cli::parse();
    let (mut config, path) = Config::discover(cli.config.as_deref())?;
    if let Some(path) = path {
        info!(config = %path.display(), "Loaded configuration");
    }

    match cli.command {
        Commands::Send {
            file,
            to,
            from,
            helo,
            server,
            port,
        } => {
            if let Some(port) = port {
                config.delivery.port = port;
            }

            let body = message::load(&file)?;
            let recipient = match to {
                Some(to) => to,
                None => message::first_recipient(&body)?,
            };

            let mut request = DeliveryRequest::new(
                from.unwrap_or(config.sender),
                recipient,
                body,
            )
            .with_helo(helo.unwrap_or(config.helo));
            if let Some(server) = server {
                request = request.with_mx_override(server);
            }

            let deliverer = Deliverer::new(config.delivery)
                .context("Failed to set up the DNS resolver")?;
            let outcome = deliverer.deliver(&request, &DeliveryContext::new()).await;

            report(&request.recipient, &outcome);
            if !outcome.success {
                anyhow::bail!("Delivery to {} failed: {}", request.recipient, outcome.diagnostic);
            }
        }
        Commands::Resolve { domain, port } => {
            if let Some(port) = port {
                config.delivery.port = port;
            }

            let deliverer = Deliverer::new(config.delivery)
                .context("Failed to set up the DNS resolver")?;
            let request = DeliveryRequest::new("", format!("postmaster@{domain}"), Vec::<u8>::new());
            let servers = deliverer.candidates(&request).await?;

            println!("PRIORITY SERVER");
            for server in &servers {
                println!("{:<8} {}", server.priority, server.address());
            }
        }
    }

    Ok(())
}

fn report(recipient: &str, outcome: &DeliveryOutcome) {
    for (index, attempt) in outcome.attempts.iter().enumerate() {
        println!(
            "{}. {} {} in {}ms",
            index + 1,
            attempt.address(),
            attempt.state,
            attempt.duration_ms
        );
        if let Some(stage) = attempt.failed_stage {
            println!("   Failed at: {stage}");
        }
        if let Some(ref error) = attempt.error {
            println!("   Error: {error}");
        }
    }

    match &outcome.host {
        Some(host) if outcome.success => {
            println!("Delivered to {recipient} via {host}: {}", outcome.diagnostic);
        }
        _ => println!("Not delivered to {recipient}: {}", outcome.diagnostic),
    }
}
