// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component wiring for `courier serve`.
//!
//! Opens storage, builds the dispatch engine with the production channel
//! clients, spawns the scheduler loop, and serves the gateway until a
//! shutdown signal arrives. Cancellation prevents new scheduler ticks; an
//! in-flight tick finishes before the process exits.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use courier_audit::ActivityRecorder;
use courier_channels::discord::DiscordWebhook;
use courier_channels::email::MailerCache;
use courier_channels::line::LineClient;
use courier_config::CourierConfig;
use courier_core::CourierError;
use courier_dispatch::{Dispatcher, DispatcherConfig};
use courier_gateway::GatewayState;
use courier_scheduler::Scheduler;
use courier_storage::Database;

pub async fn run(config: CourierConfig) -> Result<(), CourierError> {
    let db = Arc::new(
        Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?,
    );
    tracing::info!(path = %config.storage.database_path, "storage ready");

    let audit = ActivityRecorder::new(db.clone());
    let dispatcher = Arc::new(Dispatcher::new(
        db.clone(),
        audit.clone(),
        Arc::new(MailerCache::new()),
        LineClient::new(),
        DiscordWebhook::new(),
        DispatcherConfig {
            service_name: config.service.name.clone(),
            default_email_subject: config.dispatch.default_email_subject.clone(),
            public_base_url: config.service.public_base_url.clone(),
            uploads_dir: config.service.uploads_dir.clone().into(),
            delivery_concurrency: config.dispatch.delivery_concurrency,
        },
    ));
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        audit.clone(),
        config.scheduler.batch_size,
    ));

    let cancel = CancellationToken::new();
    let runner_handle = if config.scheduler.enabled {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        let interval = config.scheduler.effective_interval();
        Some(tokio::spawn(async move {
            scheduler.run(interval, cancel).await;
        }))
    } else {
        tracing::info!("scheduler disabled via config");
        None
    };

    let state = GatewayState {
        db: db.clone(),
        dispatcher,
        scheduler,
        audit,
        line: LineClient::new(),
    };

    tokio::select! {
        result = courier_gateway::start_server(&config.service.bind_address, config.service.port, state) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    cancel.cancel();
    if let Some(handle) = runner_handle {
        let _ = handle.await;
    }
    db.close().await?;
    tracing::info!("shutdown complete");
    Ok(())
}
