// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{DEFAULT_CHAIN_ID, DEFAULT_DECRYPTION_ADDRESS, DEFAULT_REGISTRY_ADDRESS};
use crate::coprocessor::{DecryptionDomain, LocalCoprocessor};
use crate::ledger::{InMemoryLedger, LedgerBackend};
use crate::models::Scope;
use crate::service::{ServiceOptions, VisitService};
use crate::signer::LocalPrincipalSigner;

pub type RegistryService = VisitService<LocalCoprocessor, LedgerBackend>;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RegistryService>,
    /// Signer for the principal this instance records visits for.
    pub signer: Arc<LocalPrincipalSigner>,
    pub chain_id: u64,
    /// Cancelled on shutdown; every protocol run observes it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        service: RegistryService,
        signer: LocalPrincipalSigner,
        chain_id: u64,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service: Arc::new(service),
            signer: Arc::new(signer),
            chain_id,
            shutdown,
        }
    }
}

/// In-memory registry with a random principal and coprocessor seed.
impl Default for AppState {
    fn default() -> Self {
        let coprocessor = LocalCoprocessor::random(DecryptionDomain {
            chain_id: DEFAULT_CHAIN_ID,
            verifying_contract: DEFAULT_DECRYPTION_ADDRESS,
        });
        let ledger = LedgerBackend::Memory(InMemoryLedger::new(
            Scope(DEFAULT_REGISTRY_ADDRESS),
            Arc::new(coprocessor.clone()),
        ));
        let service = VisitService::new(
            Arc::new(coprocessor),
            Arc::new(ledger),
            ServiceOptions::default(),
        );
        Self::new(
            service,
            LocalPrincipalSigner::random(),
            DEFAULT_CHAIN_ID,
            CancellationToken::new(),
        )
    }
}
