//! Swarm Model Registry Protocol
//!
//! Independent inference nodes advertise the models they hold to a registry.
//! The registry folds those adverts into one listing per logical model and
//! lets clients stitch a single generation out of per-token calls spread
//! across the nodes that serve it.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────┐ register  ┌──────────┐ register  ┌──────┐
//!  │Peer A│──────────►│ Registry │◄──────────│Peer B│
//!  └──────┘   claim   └──────────┘   claim   └──────┘
//!     ▲                    │                     ▲
//!     └──── next_token ────┴───── next_token ────┘
//! ```
//!
//! ## Model codes
//! - Every advert maps to a 7-hex-char code (see [`code::code_for`])
//! - Adverts with the same code on different peers are one logical model
//!
//! ## Serving
//! - A peer claims a time-boxed lease on a code before advertising `serving`
//! - Generation round-robins token requests across serving peers

pub mod client;
pub mod code;
pub mod local;
pub mod types;

pub use client::{NextTokenClient, RegistryClient};
pub use code::{code_for, ModelCode};
pub use local::LocalModel;
pub use types::*;
