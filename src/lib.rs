//! Bank card lifecycle and transfer ledger
//!
//! # Overview
//!
//! This library issues bank cards, tracks their status and balance, and moves
//! funds between cards of the same owner while keeping an append-only audit
//! trail. A replay binary (`bankcards`) applies a CSV of card operations with
//! a sync or an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Cards, ledger entries, pagination, principals and errors
//! - [`security`] - Card number generation, field encryption and masking
//! - [`core`] - Business logic components:
//!   - [`core::lifecycle`] - Card creation, status transitions and validation
//!   - [`core::ledger`] - Transfers and the audit trail
//!   - [`core::engine`] - Replay of labelled operations
//! - [`io`] - CSV input and output
//! - [`strategy`] - Sync and async replay strategies
//! - [`cli`] / [`config`] / [`telemetry`] - Binary plumbing
//!
//! # Card States
//!
//! - **ACTIVE**: usable for transfers
//! - **BLOCKED**: blocked by an administrator or on the owner's request;
//!   an administrator may unblock it while it has not expired
//! - **EXPIRED**: set automatically once the expiry date has passed; final
//!
//! Card numbers and verification codes are only stored encrypted. Reads show
//! the masked number.

// Module declarations
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod security;
pub mod strategy;
pub mod telemetry;
pub mod types;

pub use config::BankConfig;
pub use core::{CardLifecycle, OperationEngine, TransferLedger};
pub use io::write_cards_csv;
pub use types::{
    Card, CardError, CardId, CardStatus, CardView, NewCard, Page, PageRequest, Principal,
    Transaction, TransactionStatus, TransferRequest, UserId,
};
