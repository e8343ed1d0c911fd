// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Travel Ledger - Confidential Visit Registry Service
//!
//! Records visits as encrypted (country, city) handles in a per-principal
//! append-only ledger. Plaintext is only ever returned to the owning
//! principal, through a signed and time-boxed decryption grant.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `coprocessor` - Encryption, proof verification, and grant-checked decryption
//! - `ledger` - Append-only visit partitions (in-memory or redb)
//! - `submission` - Encrypt-and-submit protocol
//! - `grants` - Authorize-and-decrypt sessions
//! - `service` - Both protocols behind one facade

pub mod api;
pub mod catalog;
pub mod config;
pub mod coprocessor;
pub mod encoder;
pub mod error;
pub mod grants;
pub mod ledger;
pub mod models;
pub mod reconcile;
pub mod service;
pub mod signer;
pub mod state;
pub mod submission;
pub mod util;
