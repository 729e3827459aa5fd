//! wc-lite CLI
//!
//! Opens a bridge session, shows the session URI as a terminal QR code and,
//! once a wallet approves, asks it to sign a zero-amount payment from the
//! first approved account to itself. Signed transactions go to algod.
//!
//! Exit codes: 0 on completion, 1 on error or rejection, 130 on Ctrl-C.

use std::io;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use wc_lite::chain::AlgodClient;
use wc_lite::config::{DEFAULT_ALGOD_URL, DEFAULT_BRIDGE_URL, DEFAULT_NOTE};
use wc_lite::session::PeerMeta;
use wc_lite::workflow::{AutoConfirm, Confirmation, ResponseHandler, SigningController};
use wc_lite::{BridgeConfig, Session, SessionOutcome, SubmissionPolicy};

/// wc-lite: request wallet signatures over a WalletConnect bridge
#[derive(Parser)]
#[command(name = "wc-lite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bridge server URL
    #[arg(long, env = "WC_BRIDGE_URL", default_value = DEFAULT_BRIDGE_URL)]
    bridge: String,

    /// Algod node URL
    #[arg(long, env = "ALGOD_URL", default_value = DEFAULT_ALGOD_URL)]
    algod_url: String,

    /// Algod API token
    #[arg(long, env = "ALGOD_TOKEN", hide_env_values = true)]
    algod_token: Option<String>,

    /// Name shown in the wallet
    #[arg(long, default_value = "wc")]
    name: String,

    /// Description shown in the wallet
    #[arg(long, default_value = "WalletConnect Rust")]
    description: String,

    /// Note attached to the test transaction
    #[arg(long, default_value = DEFAULT_NOTE)]
    note: String,

    /// Seconds to wait for the relay before giving up (0 waits forever)
    #[arg(long, env = "WC_RECEIVE_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Submit every signed transaction instead of only the first
    #[arg(long)]
    submit_all: bool,

    /// Do not wait for Enter before sending the signing request
    #[arg(short, long)]
    yes: bool,

    /// Print the URI only, without a QR code
    #[arg(long)]
    no_qr: bool,
}

/// Waits for Enter on stdin
struct TerminalConfirm;

#[async_trait]
impl Confirmation for TerminalConfirm {
    async fn confirm(&mut self, prompt: &str) -> io::Result<()> {
        println!("{}..", prompt);

        let read = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().read_line(&mut line)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed before confirmation",
            ));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wc_lite=info")),
        )
        .init();

    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(SessionOutcome::Completed { tx_ids }) => {
            for id in tx_ids {
                println!("Sent tx: {}", id);
            }
            0
        }
        Ok(SessionOutcome::Rejected { reason }) => {
            eprintln!("Session rejected: {}", reason);
            1
        }
        Ok(SessionOutcome::Cancelled) => {
            eprintln!("Cancelled");
            130
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            1
        }
    };

    // A pending stdin read would otherwise block runtime shutdown
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<SessionOutcome> {
    let config = bridge_config(&cli);

    let chain = AlgodClient::new(&config.algod_url, config.algod_token.clone())
        .context("failed to create algod client")?;

    let mut handler: Box<dyn ResponseHandler> = if cli.yes {
        Box::new(SigningController::from_config(chain, AutoConfirm, &config))
    } else {
        Box::new(SigningController::from_config(chain, TerminalConfirm, &config))
    };

    let mut session = Session::connect(&config).await?;
    let uri = session.request_session(&config.peer_meta).await?;

    if !cli.no_qr {
        println!("{}", render_qr(&uri.to_string())?);
    }
    println!("{}", uri);

    session.subscribe().await?;

    let outcome = session.run(handler.as_mut(), shutdown_signal()).await?;
    Ok(outcome)
}

fn bridge_config(cli: &Cli) -> BridgeConfig {
    let policy = if cli.submit_all {
        SubmissionPolicy::All
    } else {
        SubmissionPolicy::First
    };

    BridgeConfig::new(cli.bridge.clone())
        .with_algod(cli.algod_url.clone(), cli.algod_token.clone())
        .with_peer_meta(PeerMeta {
            name: cli.name.clone(),
            description: cli.description.clone(),
            url: String::new(),
            icons: Vec::new(),
        })
        .with_receive_timeout((cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)))
        .with_note(cli.note.clone())
        .with_submission_policy(policy)
}

fn render_qr(data: &str) -> anyhow::Result<String> {
    let code = QrCode::with_error_correction_level(data, EcLevel::L)
        .context("session URI does not fit in a QR code")?;

    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
