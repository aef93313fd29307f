//! Check-in station CLI
//!
//! ## Usage
//! ```bash
//! # Verify a typed identifier
//! checkin --server http://localhost:8080 verify 29901010112345
//!
//! # Scan QR codes from captured frames
//! checkin scan ticket.png
//!
//! # Accept a pending application
//! checkin accept 7f0c2a8e-5d8b-4f0e-9a57-2b1f6f3c9d11
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ticket_gate::capture::StillImageBackend;
use ticket_gate::checkin_shell::{CheckinShell, CheckinView};
use ticket_gate::decoder::{DecodeOptions, InversionAttempts};
use ticket_gate::frame_sampler::{AlwaysDecode, DarkPixelGate, FrameGate};
use ticket_gate::scan_session::{ScanConfig, ScanEnvironment};
use ticket_gate::verify_client::VerifyClient;

#[derive(Parser, Debug)]
#[command(name = "checkin")]
#[command(about = "Ticket check-in station")]
struct Args {
    /// Check-in server URL
    #[arg(long, env = "CHECKIN_SERVER_URL", default_value = "http://localhost:8080")]
    server: String,

    /// Verification timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify a typed identifier
    Verify { identifier: String },

    /// Scan image files for a ticket code
    Scan {
        /// PNG or JPEG frames, presented in order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Frames presented per second
        #[arg(long, default_value_t = 10)]
        fps: u32,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 15)]
        scan_timeout_secs: u64,

        /// Decode every frame (skip the dark-pixel gate)
        #[arg(long)]
        no_gate: bool,

        /// Also try light-on-dark codes
        #[arg(long)]
        invert: bool,
    },

    /// Accept a pending application
    Accept { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "ticket_gate=debug,checkin=debug"
    } else {
        "ticket_gate=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = VerifyClient::with_timeout(&args.server, Duration::from_secs(args.timeout_secs))?;
    println!("Server: {}", args.server.cyan());

    match args.command {
        Command::Verify { identifier } => {
            let config = ScanConfig {
                verify_timeout_ms: args.timeout_secs * 1000,
                ..ScanConfig::default()
            };
            let backend = StillImageBackend::from_frames("none", Vec::new(), 1);
            let env = ScanEnvironment::new(Arc::new(backend), Arc::new(client)).with_config(config);
            let mut shell = CheckinShell::new(env);

            let started = Instant::now();
            let view = shell.submit_manual(&identifier).await;
            print_view(&view, started.elapsed());
            exit_for(&view)
        }

        Command::Scan {
            images,
            fps,
            scan_timeout_secs,
            no_gate,
            invert,
        } => {
            let backend = StillImageBackend::from_paths(&images, fps)?;
            println!("Frames: {} at {} fps", backend.frame_count(), fps);

            let gate: Arc<dyn FrameGate> = if no_gate {
                Arc::new(AlwaysDecode)
            } else {
                Arc::new(DarkPixelGate::default())
            };
            let config = ScanConfig {
                decode: DecodeOptions {
                    inversion_attempts: if invert {
                        InversionAttempts::AttemptBoth
                    } else {
                        InversionAttempts::DontInvert
                    },
                },
                verify_timeout_ms: args.timeout_secs * 1000,
                ..ScanConfig::default()
            };
            let env = ScanEnvironment::new(Arc::new(backend), Arc::new(client))
                .with_gate(gate)
                .with_config(config);
            let mut shell = CheckinShell::new(env);

            let started = Instant::now();
            let mut views = shell.subscribe();
            shell.start_scan().await?;
            println!("{}", "Scanning...".yellow());

            let settled = tokio::time::timeout(
                Duration::from_secs(scan_timeout_secs),
                views.wait_for(CheckinView::is_settled),
            )
            .await;
            let view = match settled {
                Ok(Ok(view)) => view.clone(),
                Ok(Err(_)) => return Err(anyhow!("check-in surface closed")),
                Err(_) => {
                    shell.stop_active().await;
                    println!("{} no code found within {}s", "✗".red(), scan_timeout_secs);
                    std::process::exit(2);
                }
            };
            shell.stop_active().await;

            print_view(&view, started.elapsed());
            exit_for(&view)
        }

        Command::Accept { id } => {
            match client.accept(&id).await {
                Ok(result) => {
                    println!("{} {}", "✓".green(), result.message.bold());
                    Ok(())
                }
                Err(e) => {
                    println!("{} {} ({})", "✗".red(), e.message, e.kind.to_string().yellow());
                    println!("   └─ {}", e.kind.remediation().dimmed());
                    std::process::exit(1);
                }
            }
        }
    }
}

fn print_view(view: &CheckinView, elapsed: Duration) {
    println!("{}", "─".repeat(60));
    match view {
        CheckinView::Admitted { result } => {
            println!("{} {}", "✅".green(), "ADMITTED".green().bold());
            println!("   Name:   {}", result.name.as_deref().unwrap_or("-").bold());
            println!("   Email:  {}", result.email.as_deref().unwrap_or("-"));
            println!("   Ticket: {}", result.ticket_number.as_deref().unwrap_or("-").cyan());
            println!("   └─ {}", result.message);
        }
        CheckinView::NotAdmitted { result } => {
            println!("{} {}", "❌".red(), "NOT ADMITTED".red().bold());
            if let Some(name) = &result.name {
                println!("   Name:   {}", name.bold());
            }
            println!("   └─ {}", result.message);
        }
        CheckinView::Failed { kind, message, .. } => {
            println!("{} {}", "⚠".yellow(), kind.to_string().to_uppercase().yellow().bold());
            println!("   └─ {}", message);
        }
        other => println!("{:?}", other),
    }
    println!("   {}", format!("({}ms)", elapsed.as_millis()).dimmed());
}

fn exit_for(view: &CheckinView) -> Result<()> {
    match view {
        CheckinView::Admitted { .. } => Ok(()),
        CheckinView::NotAdmitted { .. } => std::process::exit(1),
        _ => std::process::exit(2),
    }
}
