//! # wc-lite
//!
//! Lightweight client for the WalletConnect v1 bridge protocol.
//!
//! A dApp backend or CLI asks a wallet for signatures without ever talking
//! to it directly: both sides exchange encrypted messages through a relay
//! ("bridge") on a shared topic. The key and topic reach the wallet out of
//! band, inside the session URI (usually shown as a QR code).
//!
//! ## Features
//!
//! - **Session bootstrap**: random 256-bit key and UUID topic per session
//! - **Encrypted pub/sub**: AES-256-CBC + HMAC-SHA256 envelopes over WebSocket
//! - **Typed dispatch**: every payload decodes to one [`InboundMessage`]
//! - **Pluggable collaborators**: transport, chain and confirmation are traits
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::FutureExt;
//! use wc_lite::chain::AlgodClient;
//! use wc_lite::workflow::{AutoConfirm, SigningController};
//! use wc_lite::{BridgeConfig, Session};
//!
//! # async fn example() -> wc_lite::Result<()> {
//! let config = BridgeConfig::default();
//! let mut session = Session::connect(&config).await?;
//!
//! let uri = session.request_session(&config.peer_meta).await?;
//! println!("Scan: {}", uri);
//! session.subscribe().await?;
//!
//! let chain = AlgodClient::new(&config.algod_url, None).expect("valid algod url");
//! let mut controller = SigningController::new(chain, AutoConfirm);
//! let outcome = session.run(&mut controller, tokio::signal::ctrl_c().map(|_| ())).await?;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              APPLICATION LAYER              │
//! │     CLI  |  QR rendering  |  confirmation   │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              WORKFLOW LAYER                 │
//! │   SigningController  |  ChainClient (algod) │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              SESSION LAYER                  │
//! │  Negotiation | Codec | Dispatch loop | URI  │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │              CRYPTO LAYER                   │
//! │   Key/topic generation | AES-CBC + HMAC     │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │             TRANSPORT LAYER                 │
//! │        WebSocket  |  In-memory (tests)      │
//! └─────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod session;
pub mod transport;
pub mod workflow;

// Re-export main types at crate root
pub use config::BridgeConfig;
pub use crypto::{CryptoError, CryptoResult, SessionKey, Topic};
pub use error::{Error, Result};
pub use session::{InboundMessage, Session, SessionOutcome, SessionState, SessionUri};
pub use workflow::{ResponseHandler, SigningController, SubmissionPolicy};
