// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use travel_ledger::{
    api::router,
    config::{AppConfig, LogFormat, PrincipalKeySource, DEFAULT_LOG_FILTER},
    coprocessor::{DecryptionDomain, LocalCoprocessor},
    ledger::{InMemoryLedger, LedgerBackend, RedbLedger},
    service::{ServiceOptions, VisitService},
    signer::{LocalPrincipalSigner, PrincipalSigner},
    state::AppState,
};

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn load_signer(source: &PrincipalKeySource) -> LocalPrincipalSigner {
    match source {
        PrincipalKeySource::PemFile(path) => {
            let pem = std::fs::read(path).expect("Failed to read principal key file");
            LocalPrincipalSigner::from_pem(&pem).expect("Invalid principal PEM key")
        }
        PrincipalKeySource::Hex(hex) => {
            LocalPrincipalSigner::from_hex(hex).expect("Invalid principal hex key")
        }
        PrincipalKeySource::Ephemeral => {
            warn!("No principal key configured, using an ephemeral key");
            LocalPrincipalSigner::random()
        }
    }
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");
    init_tracing(config.log_format);

    let domain = DecryptionDomain {
        chain_id: config.chain_id,
        verifying_contract: config.decryption_address,
    };
    let coprocessor = match config.coprocessor_seed {
        Some(seed) => LocalCoprocessor::new(seed, domain),
        None => {
            if config.ledger_path.is_some() {
                warn!("Persistent ledger without COPROCESSOR_SEED: stored visits will not decrypt after restart");
            }
            LocalCoprocessor::random(domain)
        }
    };
    let verifier = Arc::new(coprocessor.clone());

    let ledger = match &config.ledger_path {
        Some(path) => LedgerBackend::Redb(
            RedbLedger::open(path, config.registry, verifier).expect("Failed to open ledger database"),
        ),
        None => LedgerBackend::Memory(InMemoryLedger::new(config.registry, verifier)),
    };
    info!(backend = ledger.kind(), registry = %config.registry, "Ledger ready");

    let signer = load_signer(&config.principal_key);
    info!(principal = %signer.principal(), "Principal signer loaded");

    let service = VisitService::new(
        Arc::new(coprocessor),
        Arc::new(ledger),
        ServiceOptions {
            grant_duration_days: config.grant_duration_days,
            commit_timeout: config.commit_timeout,
            signature_timeout: config.signature_timeout,
        },
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(service, signer, config.chain_id, shutdown.clone());
    let app = router(state);

    // Cancel in-flight protocol runs first, then drain connections
    let handle = Handle::new();
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });
    }

    let addr = config.bind_addr;
    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");

            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .expect("Failed to load TLS certificate");

            info!(%addr, "Travel ledger listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            info!(%addr, "Travel ledger listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTP server failed");
        }
    }

    info!("Server stopped");
}
