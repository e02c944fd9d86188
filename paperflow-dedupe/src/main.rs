//! paperflow-dedupe - merge duplicate items in a Zotero library
//!
//! **Startup:**
//! 1. Load TOML config (missing file → defaults)
//! 2. Initialize logging from `[logging]`, then report the config origin
//! 3. Resolve credentials (CLI → ENV → TOML) and run options
//! 4. Resolve the collection scope, then run one merge pass

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use paperflow_common::config::{load_or_default, resolve_config_path};
use paperflow_common::logging::init_logging;
use paperflow_dedupe::config::{
    resolve_run_plan, resolve_zotero_settings, RunOverrides, API_BASE_ENV, API_KEY_ENV,
    USER_ID_ENV,
};
use paperflow_dedupe::services::resolve_collection_key;
use paperflow_dedupe::store::ZoteroClient;
use paperflow_dedupe::{run_merge, GroupingMode, ListScope, MergeRequest};
use tracing::{info, warn};

/// Command-line arguments for paperflow-dedupe
#[derive(Parser, Debug)]
#[command(name = "paperflow-dedupe")]
#[command(about = "Detect and merge duplicate items in a Zotero library")]
#[command(version)]
struct Args {
    /// Config file (default: platform config dir, or PAPERFLOW_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Zotero user id
    #[arg(long, env = USER_ID_ENV, hide_env_values = true)]
    user_id: Option<String>,

    /// Zotero API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Zotero API base URL
    #[arg(long, env = API_BASE_ENV)]
    api_base: Option<String>,

    /// Collection key to limit the scan
    #[arg(long)]
    collection: Option<String>,

    /// Collection name to limit the scan (resolved to a key)
    #[arg(long)]
    collection_name: Option<String>,

    /// Only consider items carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Max number of top-level items to scan (<= 0 means no limit)
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Grouping heuristic
    #[arg(long, value_enum)]
    group_by: Option<GroupingMode>,

    /// Preview actions without modifying the library
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let loaded = load_or_default(config_path.as_deref()).context("Failed to load config")?;
    let config = loaded.config;

    init_logging(&config.logging, "paperflow_dedupe")?;
    info!("Starting paperflow-dedupe v{}", env!("CARGO_PKG_VERSION"));
    loaded.origin.log();

    let settings = resolve_zotero_settings(
        args.user_id.as_deref(),
        args.api_key.as_deref(),
        args.api_base.as_deref(),
        &config.zotero,
    )?;

    let plan = resolve_run_plan(
        &RunOverrides {
            collection: args.collection,
            collection_name: args.collection_name,
            tag: args.tag,
            limit: args.limit,
            group_by: args.group_by,
            dry_run: args.dry_run,
        },
        &config.dedupe,
    )?;

    let client = ZoteroClient::new(&settings)?;

    let collection = resolve_collection_key(
        &client,
        plan.collection.as_deref(),
        plan.collection_name.as_deref(),
    )
    .await?;

    let request = MergeRequest {
        scope: ListScope {
            collection,
            tag: plan.tag,
            limit: plan.limit,
        },
        grouping_mode: plan.grouping_mode,
        dry_run: plan.dry_run,
    };

    info!(
        mode = %request.grouping_mode,
        dry_run = request.dry_run,
        collection = ?request.scope.collection,
        tag = ?request.scope.tag,
        limit = ?request.scope.limit,
        "Running duplicate merge"
    );

    let summary = run_merge(&client, &request)
        .await
        .context("Duplicate merge aborted")?;

    for failure in &summary.failures {
        warn!(
            key = %failure.key,
            operation = ?failure.operation,
            error = %failure.error,
            "Unresolved record"
        );
    }
    info!("{}", summary.display_string());

    Ok(())
}
