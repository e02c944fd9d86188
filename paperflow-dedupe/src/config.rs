//! Configuration resolution for paperflow-dedupe
//!
//! Credentials resolve CLI → ENV → TOML. Run options resolve CLI → TOML,
//! with the TOML `[dedupe]` table supplying stage defaults.

use crate::error::{DedupeError, Result};
use crate::services::GroupingMode;
use crate::store::ZoteroSettings;
use paperflow_common::config::{resolve_setting, DedupeStageConfig, ZoteroConfig, DEFAULT_API_BASE};
use tracing::info;

pub const USER_ID_ENV: &str = "ZOTERO_USER_ID";
pub const API_KEY_ENV: &str = "ZOTERO_API_KEY";
pub const API_BASE_ENV: &str = "ZOTERO_API_BASE";

/// Resolve Zotero connection settings
///
/// **Priority:** CLI → ENV → TOML, API base falling back to the public endpoint
pub fn resolve_zotero_settings(
    cli_user_id: Option<&str>,
    cli_api_key: Option<&str>,
    cli_api_base: Option<&str>,
    toml: &ZoteroConfig,
) -> Result<ZoteroSettings> {
    let user_id = resolve_setting(cli_user_id, USER_ID_ENV, toml.user_id.as_deref());
    let api_key = resolve_setting(cli_api_key, API_KEY_ENV, toml.api_key.as_deref());

    let (Some((user_id, user_source)), Some((api_key, key_source))) = (user_id, api_key) else {
        return Err(DedupeError::Config(format!(
            "Zotero credentials not configured. Please configure using one of:\n\
             1. Command line: --user-id <id> --api-key <key>\n\
             2. Environment: {}=<id> {}=<key>\n\
             3. TOML config: [zotero] user_id = \"...\" api_key = \"...\"\n\
             \n\
             Create an API key at: https://www.zotero.org/settings/keys",
            USER_ID_ENV, API_KEY_ENV
        )));
    };

    let api_base = resolve_setting(cli_api_base, API_BASE_ENV, toml.api_base.as_deref())
        .map(|(base, _)| base)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

    info!(
        user_source = %user_source,
        key_source = %key_source,
        api_base = %api_base,
        "Zotero credentials resolved"
    );

    Ok(ZoteroSettings {
        api_base,
        user_id,
        api_key,
    })
}

/// Run options given on the command line; `None` defers to TOML
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub collection: Option<String>,
    pub collection_name: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<i64>,
    pub group_by: Option<GroupingMode>,
    pub dry_run: bool,
}

/// Fully resolved options for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub collection: Option<String>,
    pub collection_name: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
    pub grouping_mode: GroupingMode,
    pub dry_run: bool,
}

/// Merge CLI overrides over the `[dedupe]` table
///
/// A limit of zero or less means "no limit". `--dry-run` can only switch a
/// dry run on, never off.
pub fn resolve_run_plan(cli: &RunOverrides, toml: &DedupeStageConfig) -> Result<RunPlan> {
    let non_blank = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

    let grouping_mode = match cli.group_by {
        Some(mode) => mode,
        None => toml.group_by.parse::<GroupingMode>().map_err(DedupeError::Config)?,
    };

    let limit = cli.limit.unwrap_or(toml.limit);

    Ok(RunPlan {
        collection: non_blank(&cli.collection).or_else(|| non_blank(&toml.collection)),
        collection_name: non_blank(&cli.collection_name)
            .or_else(|| non_blank(&toml.collection_name)),
        tag: non_blank(&cli.tag).or_else(|| non_blank(&toml.tag)),
        limit: usize::try_from(limit).ok().filter(|&l| l > 0),
        grouping_mode,
        dry_run: cli.dry_run || toml.dry_run,
    })
}
