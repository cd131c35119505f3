//! shipr: publish a static site build to object storage, uploading only what
//! changed since the last run.

mod source;

use crate::source::{Source, stale_keys};
use clap::Parser;
use futures::{StreamExt, stream};
use miette::{Result, miette};
use shipr_cache::HashCache;
use shipr_config::{Config, TargetConfig};
use shipr_publish::{Encoder, FileRecord, PublishEvent, PublishOptions, Publisher, Reporter, Summary};
use shipr_storage::{BackendHandle, StorageBackend};
use shipr_storage::backend::LocalBackend;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shipr")]
#[command(version)]
#[command(about = "Publish build output to object storage, skipping what hasn't changed")]
struct Cli {
    /// Build output directory to publish
    source: PathBuf,

    /// Configuration file (defaults to ./shipr.toml)
    #[arg(short, long, env = "SHIPR_CONFIG")]
    config: Option<PathBuf>,

    /// Upload every file, ignoring the cache and remote hashes
    #[arg(long)]
    force: bool,

    /// Never overwrite files that already exist remotely
    #[arg(long)]
    create_only: bool,

    /// Decide what would be published without uploading anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Forget cached files that are gone from the build output
    #[arg(long)]
    prune: bool,

    /// Also delete pruned files from the target
    #[arg(long, requires = "prune")]
    delete_remote: bool,

    /// Number of files to publish at once
    #[arg(short = 'j', long)]
    concurrency: Option<NonZeroUsize>,

    /// Timeout in seconds for each request to the target
    #[arg(long)]
    timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Command line flags win over configuration.
    fn apply(&self, config: &mut Config) {
        let publish = &mut config.publish;
        publish.force |= self.force;
        publish.create_only |= self.create_only;
        publish.dry_run |= self.dry_run;
        publish.delete_remote |= self.delete_remote;
        if let Some(concurrency) = self.concurrency {
            publish.concurrency = concurrency.get();
        }
        if let Some(timeout) = self.timeout {
            publish.timeout_secs = timeout;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let summary = run(&cli).await?;
    eprintln!("{summary}");
    Ok(match summary.failed {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

async fn run(cli: &Cli) -> Result<Summary> {
    let mut config = Config::load(cli.config.as_deref()).map_err(diagnose)?;
    cli.apply(&mut config);

    let target = target_backend(&config.target)?;
    let source = Source::open(&cli.source).map_err(diagnose)?;
    let keys = source.keys().await.map_err(diagnose)?;

    let cache = HashCache::load(config.cache_path()).with_flush_every(config.cache.flush_every);
    let ext = config.encoding.as_ref().map(|encoding| encoding.ext.as_str()).unwrap_or_default();
    let stale = match cli.prune {
        true => stale_keys(&cache, &keys, ext),
        false => Vec::new(),
    };
    let encoder = config
        .encoding
        .as_ref()
        .map(|encoding| Encoder::new(encoding.format).with_ext(&encoding.ext).smaller_only(encoding.smaller_only));
    let reporter = Reporter::from_names(&config.report.states).map_err(diagnose)?;
    let publisher = Publisher::new(target, cache, options(&config)).map_err(diagnose)?;
    tracing::info!(
        backend = publisher.backend().name(),
        files = keys.len(),
        stale = stale.len(),
        dry_run = config.publish.dry_run,
        "publishing"
    );

    // Failures before a record reaches the publisher.
    let failures = AtomicUsize::new(0);
    let records = source.records(keys, &failures).filter_map(|record| {
        let encoded = match &encoder {
            Some(encoder) => encoder.encode(record).inspect_err(|e| {
                tracing::error!(error = ?e, "could not encode file");
                failures.fetch_add(1, Ordering::Relaxed);
            }),
            None => Ok(record),
        };
        std::future::ready(encoded.ok())
    });
    let records = records.chain(stream::iter(stale.into_iter().map(FileRecord::deleted)));

    let mut summary = Summary::default();
    let mut events = std::pin::pin!(publisher.publish(records));
    while let Some(event) = events.next().await {
        match event {
            Ok(PublishEvent::Started) => {},
            Ok(PublishEvent::Published(record)) => {
                reporter.report(&record);
            },
            Ok(PublishEvent::Complete(complete)) => summary = complete,
            Err(e) => match e.path() {
                Some(path) => tracing::error!(path, error = ?e, "could not publish file"),
                None => return Err(diagnose(e)),
            },
        }
    }
    summary.failed += failures.load(Ordering::Relaxed);
    Ok(summary)
}

fn options(config: &Config) -> PublishOptions {
    PublishOptions {
        force: config.publish.force,
        create_only: config.publish.create_only,
        dry_run: config.publish.dry_run,
        delete_remote: config.publish.delete_remote,
        concurrency: config.publish.concurrency,
        timeout: config.timeout(),
        headers: config.publish.headers.clone(),
    }
}

fn target_backend(target: &TargetConfig) -> Result<BackendHandle> {
    match target {
        #[cfg(feature = "s3")]
        TargetConfig::S3 {
            bucket,
            prefix,
            region,
            endpoint,
            key_id,
            key_secret,
        } => {
            let backend = shipr_storage::backend::S3Backend::new(
                bucket,
                prefix.clone(),
                region,
                endpoint.as_deref(),
                key_id,
                key_secret,
            )
            .map_err(diagnose)?;
            Ok(Arc::new(backend))
        },
        #[cfg(not(feature = "s3"))]
        TargetConfig::S3 { .. } => Err(miette!("shipr was built without S3 support")),
        TargetConfig::Local { path } => {
            let root = std::path::absolute(path).map_err(|e| miette!("invalid target path {}: {e}", path.display()))?;
            let name = target.identifier();
            Ok(Arc::new(LocalBackend::new(name, root).map_err(diagnose)?))
        },
    }
}

/// Render an error tree as a diagnostic.
fn diagnose<E: std::fmt::Debug>(err: E) -> miette::Report {
    miette!("{err:?}")
}
