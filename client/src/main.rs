//! jsync - one discovery and sync pass for a journal-sync account.
//!
//! Discovers the account's collections for every configured service type,
//! then syncs each selected collection against its local snapshot.

use jsync_client::{
    AppError, Config, HttpJournalClient, HttpResourceDownloader, SnapshotFile, SqliteRegistry,
};
use jsync_engine::{codec_for, discover, run_session, CollectionInfo, Credential, SyncSession};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Load configuration
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jsync=info,jsync_engine=info,jsync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_invalid_account() {
                tracing::error!("Account can't be synced: {}", e);
            } else {
                tracing::error!("Sync failed: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let credential = config.credential()?;

    tracing::info!(
        "Starting jsync for {} against {}",
        config.account,
        config.server_url
    );

    let journals = HttpJournalClient::new(&config.server_url, config.http_timeout)?;
    let downloader = HttpResourceDownloader::new(config.http_timeout)?;
    let mut registry = SqliteRegistry::open(&config.database_url)?;

    for service_type in &config.services {
        let collections = discover(
            &journals,
            &mut registry,
            &config.account,
            &credential,
            *service_type,
        )?;
        tracing::info!("{} {} collection(s) known", collections.len(), service_type);

        for collection in collections {
            if !collection.selected {
                tracing::info!(url = %collection.url, "Collection not selected, skipping");
                continue;
            }
            sync_collection(&config, &journals, &credential, &downloader, collection)?;
        }
    }

    Ok(())
}

fn sync_collection(
    config: &Config,
    journals: &HttpJournalClient,
    credential: &Credential,
    downloader: &HttpResourceDownloader,
    collection: CollectionInfo,
) -> Result<(), AppError> {
    let file = SnapshotFile::for_collection(&config.data_dir, &collection.url);
    let mut store = file.load()?;
    let codec = codec_for(collection.service_type);
    let mut session = SyncSession::new(&config.account, collection);

    let outcome = run_session(
        &mut session,
        journals,
        credential,
        &mut store,
        codec,
        downloader,
    );

    // Entries applied before a failure stay applied, so persist either way
    file.save(&store)?;
    let outcome = outcome?;

    tracing::info!(
        url = %session.collection.url,
        pulled = outcome.pulled,
        pushed = outcome.pushed,
        inserts = outcome.stats.inserts,
        updates = outcome.stats.updates,
        "Collection synced"
    );
    Ok(())
}
