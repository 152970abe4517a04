mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::TimeDelta;
use clap::{Args, Parser, Subcommand};
use paytrail_classify::PayerClassifier;
use paytrail_core::{
    InterestRecord, PayerType, RunStage, SyncOptions, SyncRun, extract_payment, normalize_name,
};
use paytrail_store::{DuckStore, LedgerStore, ManualClassification, StoreError};
use paytrail_sync::{RegisterClient, RegisterSource, StaticSource, SyncError, Synchronizer};
use serde::Deserialize;
use tracing::{info, warn};

/// Follow the money in the register of members' financial interests.
#[derive(Parser, Debug)]
#[command(name = "paytrail", version, about, long_about = None)]
struct Cli {
    /// DuckDB ledger file.
    #[arg(long, env = "PAYTRAIL_DB", default_value = "paytrail.duckdb", global = true)]
    db: PathBuf,

    /// Age in seconds after which a run lock left by a crashed sync is taken over.
    #[arg(long, env = "PAYTRAIL_LOCK_TTL_SECS", default_value_t = 21_600, global = true)]
    lock_ttl_secs: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the register and rebuild the payment ledger.
    Sync(SyncArgs),
    /// Classify a payer name and show where the answer came from.
    Classify {
        name: String,
        /// JSON override file to apply first.
        #[arg(long, env = "PAYTRAIL_OVERRIDES")]
        overrides: Option<PathBuf>,
    },
    /// Extract payments from a JSON file of interest records.
    Extract {
        input: PathBuf,
        /// Print one JSON object per payment.
        #[arg(long)]
        json: bool,
    },
    /// Show a payer card, or pin its classification by hand.
    Payer(PayerArgs),
    /// Run SQL against the ledger and pretty-print the result.
    Query { sql: String },
    /// Clear the run lock left behind by a sync that did not finish.
    Unlock,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Interests API root.
    #[arg(
        long,
        env = "PAYTRAIL_INTERESTS_URL",
        default_value = "https://interests-api.parliament.uk/api/v1"
    )]
    interests_url: String,
    /// Members API root.
    #[arg(
        long,
        env = "PAYTRAIL_MEMBERS_URL",
        default_value = "https://members-api.parliament.uk/api"
    )]
    members_url: String,
    /// Read the register from a JSON dump instead of the network.
    #[arg(long, env = "PAYTRAIL_DUMP")]
    dump: Option<PathBuf>,
    /// JSON override file applied to every payer.
    #[arg(long, env = "PAYTRAIL_OVERRIDES")]
    overrides: Option<PathBuf>,
    #[arg(long, env = "PAYTRAIL_BATCH_SIZE", default_value_t = 500)]
    batch_size: usize,
    #[arg(long, env = "PAYTRAIL_PAGE_SIZE", default_value_t = 20)]
    page_size: usize,
    #[arg(long, env = "PAYTRAIL_PAGE_DELAY_MS", default_value_t = 250)]
    page_delay_ms: u64,
    #[arg(long, env = "PAYTRAIL_EARNINGS_CATEGORY_ID")]
    earnings_category_id: Option<u32>,
    #[arg(long, env = "PAYTRAIL_EARNINGS_CATEGORY_HINT", default_value = "Employment and earnings")]
    earnings_category_hint: String,
    #[arg(long, env = "PAYTRAIL_CURRENCY", default_value = "GBP")]
    currency: String,
    /// Abort the run after this many seconds.
    #[arg(long, env = "PAYTRAIL_DEADLINE_SECS")]
    deadline_secs: Option<u64>,
}

impl SyncArgs {
    fn options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.batch_size,
            page_size: self.page_size,
            page_delay_ms: self.page_delay_ms,
            earnings_category_id: self.earnings_category_id,
            earnings_category_hint: self.earnings_category_hint.clone(),
            currency: self.currency.clone(),
            deadline_secs: self.deadline_secs,
        }
    }
}

#[derive(Args, Debug)]
struct PayerArgs {
    name: String,
    /// Pin the payer to this type (Government, Company or Individual).
    #[arg(long = "set")]
    set: Option<PayerType>,
    #[arg(long, requires = "set")]
    subtype: Option<String>,
    #[arg(long, requires = "set")]
    reason: Option<String>,
}

/// Shapes accepted by `extract`: a bare array, a register page, or a dump.
#[derive(Deserialize)]
#[serde(untagged)]
enum InterestFile {
    Records(Vec<InterestRecord>),
    Page { items: Vec<InterestRecord> },
    Dump { interests: Vec<InterestRecord> },
}

impl InterestFile {
    fn into_records(self) -> Vec<InterestRecord> {
        match self {
            Self::Records(r) | Self::Page { items: r } | Self::Dump { interests: r } => r,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("paytrail v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let ledger = Ledger {
        path: cli.db,
        lock_ttl: TimeDelta::try_seconds(cli.lock_ttl_secs).context("lock TTL out of range")?,
    };
    match cli.command {
        Command::Sync(args) => cmd_sync(&ledger, &args).await,
        Command::Classify { name, overrides } => cmd_classify(&name, overrides.as_deref()),
        Command::Extract { input, json } => cmd_extract(&input, json),
        Command::Payer(args) => cmd_payer(&ledger, &args).await,
        Command::Query { sql } => cmd_query(&ledger, &sql),
        Command::Unlock => cmd_unlock(&ledger).await,
    }
}

struct Ledger {
    path: PathBuf,
    lock_ttl: TimeDelta,
}

impl Ledger {
    fn open(&self) -> anyhow::Result<DuckStore> {
        let store = DuckStore::open_persistent(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        Ok(store.with_lock_ttl(self.lock_ttl))
    }
}

fn classifier(overrides: Option<&Path>) -> anyhow::Result<PayerClassifier> {
    let mut classifier = PayerClassifier::new().context("compiling payer rules")?;
    if let Some(path) = overrides {
        let n = classifier
            .load_override_file(path)
            .with_context(|| format!("loading overrides from {}", path.display()))?;
        info!(overrides = n, path = %path.display(), "applied override file");
    }
    Ok(classifier)
}

async fn cmd_sync(ledger: &Ledger, args: &SyncArgs) -> anyhow::Result<()> {
    let store = ledger.open()?;
    let classifier = classifier(args.overrides.as_deref())?;
    let options = args.options();

    let source: Box<dyn RegisterSource> = match &args.dump {
        Some(path) => Box::new(
            StaticSource::from_json_file(path)
                .with_context(|| format!("reading register dump {}", path.display()))?,
        ),
        None => Box::new(RegisterClient::new(
            args.interests_url.clone(),
            args.members_url.clone(),
            &options,
        )),
    };

    let sync = Synchronizer::new(source.as_ref(), &store, &classifier, options);
    let run = match sync.run().await {
        Ok(run) => run,
        Err(SyncError::AlreadyRunning) => bail!(
            "another sync is already running against {} (see `paytrail unlock`)",
            ledger.path.display()
        ),
        Err(e) => {
            if let Some(run) = failed_run(&store).await {
                let counts = store.counts().await.ok();
                display::print_run_report(&run, counts.as_ref());
            }
            return Err(e).context("sync failed");
        }
    };

    let counts = store.counts().await.ok();
    display::print_run_report(&run, counts.as_ref());
    Ok(())
}

/// The run log row of a sync that just failed, if it was recorded.
async fn failed_run(store: &dyn LedgerStore) -> Option<SyncRun> {
    match store.latest_run().await {
        Ok(run) => run.filter(|r| r.stage == RunStage::Failed),
        Err(e) => {
            warn!(error = %e, "could not read back the failed run");
            None
        }
    }
}

fn cmd_classify(name: &str, overrides: Option<&Path>) -> anyhow::Result<()> {
    let classifier = classifier(overrides)?;
    let c = classifier.classify(name);
    println!("{name}");
    println!("  {:<26} {}", "normalized_name", normalize_name(name));
    println!("  {:<26} {}", "payer_type", c.payer_type);
    if let Some(subtype) = &c.subtype {
        println!("  {:<26} {}", "subtype", subtype);
    }
    println!("  {:<26} {}", "source", c.source.as_str());
    Ok(())
}

fn cmd_extract(input: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let records = serde_json::from_str::<InterestFile>(&raw)
        .with_context(|| format!("parsing interests from {}", input.display()))?
        .into_records();

    let mut extracted = 0usize;
    for record in &records {
        let Some(payment) = extract_payment(record) else {
            continue;
        };
        extracted += 1;
        if json {
            println!("{}", serde_json::to_string(&payment)?);
        } else {
            display::print_payment(&payment);
        }
    }
    info!(records = records.len(), extracted, "extraction finished");
    Ok(())
}

async fn cmd_payer(ledger: &Ledger, args: &PayerArgs) -> anyhow::Result<()> {
    let store = ledger.open()?;
    let key = normalize_name(&args.name);

    if let Some(payer_type) = args.set {
        let manual = ManualClassification {
            payer_type,
            subtype: args.subtype.clone(),
            reason: args.reason.clone(),
        };
        if !store.set_manual_classification(&key, &manual).await? {
            bail!("no payer named {:?}", args.name);
        }
        info!(payer = %key, %payer_type, "pinned payer classification");
    }

    match store.payer_batch(&key) {
        Ok(batch) => {
            display::print_payer_card(&batch);
            Ok(())
        }
        Err(StoreError::NoResults) => bail!("no payer named {:?}", args.name),
        Err(e) => Err(e.into()),
    }
}

fn cmd_query(ledger: &Ledger, sql: &str) -> anyhow::Result<()> {
    let store = ledger.open()?;
    let batches = store.query_arrow(sql).context("running query")?;
    arrow::util::pretty::print_batches(&batches)?;
    Ok(())
}

async fn cmd_unlock(ledger: &Ledger) -> anyhow::Result<()> {
    let store = ledger.open()?;
    store.release_run_lock().await.context("clearing run lock")?;
    info!(ledger = %ledger.path.display(), "run lock cleared");
    Ok(())
}
