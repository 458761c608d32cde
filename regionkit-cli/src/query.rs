//! `list` and `get` commands: hierarchical lookups with self-healing.

use std::{io::Write, sync::Arc};

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use regionkit_core::EntityKind;
use regionkit_data::{
    HealPolicy, HierarchyQueryService, ResponseStatus, SyncConfig, reply_entity, reply_list,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATA_DIR, ARG_DATABASE, ARG_ID, ARG_KIND, CliError, ENV_GET_DATA_DIR, ENV_GET_DATABASE,
    ENV_GET_ID, ENV_GET_KIND, ENV_LIST_DATA_DIR, ENV_LIST_DATABASE, ENV_LIST_KIND,
    workspace::{DiskQueryService, open_synchronizer, require, write_replies},
};

/// Which kinds resync on an empty lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum HealArg {
    /// Regions and sub-regions.
    #[default]
    Default,
    /// Every kind.
    All,
    /// No kind.
    Off,
}

impl From<HealArg> for HealPolicy {
    fn from(arg: HealArg) -> Self {
        match arg {
            HealArg::Default => Self::default(),
            HealArg::All => Self::all(),
            HealArg::Off => Self::none(),
        }
    }
}

/// Store, golden source and heal policy shared by the lookup commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LookupTarget {
    /// Path to the SQLite reference database.
    pub(crate) database: Utf8PathBuf,
    /// Directory holding the golden CSV files used for healing.
    pub(crate) data_dir: Utf8PathBuf,
    /// Heal policy.
    pub(crate) heal: HealPolicy,
}

impl LookupTarget {
    fn service(&self) -> Result<DiskQueryService, CliError> {
        let synchronizer =
            open_synchronizer(&self.database, &self.data_dir, SyncConfig::default())?;
        Ok(HierarchyQueryService::new(
            Arc::new(synchronizer),
            self.heal.clone(),
        ))
    }
}

/// CLI arguments for the `list` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "List every row of a kind, or only the rows within one \
                 region. An empty lookup for a healing kind triggers one \
                 resync from the golden source before answering.",
    about = "List entities of a kind"
)]
#[ortho_config(prefix = "REGIONKIT")]
pub(crate) struct ListArgs {
    /// Kind to list (regions, sub-regions, districts, settlements).
    #[arg(value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<String>,
    /// Only rows within this region.
    #[arg(long, value_name = "id")]
    #[serde(default)]
    pub(crate) region: Option<String>,
    /// Path to the SQLite reference database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory holding the golden CSV files.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Kinds that resync on an empty lookup.
    #[arg(long, value_enum)]
    #[serde(default)]
    pub(crate) heal: Option<HealArg>,
}

impl ListArgs {
    pub(crate) fn into_config(self) -> Result<ListConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ListConfig::try_from(merged)
    }
}

/// Resolved `list` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListConfig {
    /// Kind to list.
    pub(crate) kind: EntityKind,
    /// Region filter, unvalidated.
    pub(crate) region: Option<String>,
    /// Where to look.
    pub(crate) target: LookupTarget,
}

impl TryFrom<ListArgs> for ListConfig {
    type Error = CliError;

    fn try_from(args: ListArgs) -> Result<Self, Self::Error> {
        let kind: EntityKind = require(args.kind, ARG_KIND, ENV_LIST_KIND)?.parse()?;
        Ok(Self {
            kind,
            region: args.region,
            target: LookupTarget {
                database: require(args.database, ARG_DATABASE, ENV_LIST_DATABASE)?,
                data_dir: require(args.data_dir, ARG_DATA_DIR, ENV_LIST_DATA_DIR)?,
                heal: args.heal.unwrap_or_default().into(),
            },
        })
    }
}

/// CLI arguments for the `get` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Fetch a single row by identifier. A miss for a healing kind \
                 triggers one resync from the golden source before answering.",
    about = "Fetch one entity by identifier"
)]
#[ortho_config(prefix = "REGIONKIT")]
pub(crate) struct GetArgs {
    /// Kind of the row (regions, sub-regions, districts, settlements).
    #[arg(value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<String>,
    /// Identifier of the row.
    #[arg(value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<String>,
    /// Path to the SQLite reference database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory holding the golden CSV files.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Kinds that resync on a miss.
    #[arg(long, value_enum)]
    #[serde(default)]
    pub(crate) heal: Option<HealArg>,
}

impl GetArgs {
    pub(crate) fn into_config(self) -> Result<GetConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        GetConfig::try_from(merged)
    }
}

/// Resolved `get` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GetConfig {
    /// Kind of the row.
    pub(crate) kind: EntityKind,
    /// Identifier, unvalidated.
    pub(crate) id: String,
    /// Where to look.
    pub(crate) target: LookupTarget,
}

impl TryFrom<GetArgs> for GetConfig {
    type Error = CliError;

    fn try_from(args: GetArgs) -> Result<Self, Self::Error> {
        let kind: EntityKind = require(args.kind, ARG_KIND, ENV_GET_KIND)?.parse()?;
        Ok(Self {
            kind,
            id: require(args.id, ARG_ID, ENV_GET_ID)?,
            target: LookupTarget {
                database: require(args.database, ARG_DATABASE, ENV_GET_DATABASE)?,
                data_dir: require(args.data_dir, ARG_DATA_DIR, ENV_GET_DATA_DIR)?,
                heal: args.heal.unwrap_or_default().into(),
            },
        })
    }
}

pub(super) fn run_list(args: ListArgs, writer: &mut dyn Write) -> Result<ResponseStatus, CliError> {
    let config = args.into_config()?;
    run_list_config(&config, writer)
}

pub(super) fn run_list_config(
    config: &ListConfig,
    writer: &mut dyn Write,
) -> Result<ResponseStatus, CliError> {
    let service = config.target.service()?;
    let outcome = match config.region.as_deref() {
        Some(region) => service.list_by_region(config.kind, region),
        None => service.list_all(config.kind),
    };
    write_replies(writer, &[reply_list(config.kind, outcome)])
}

pub(super) fn run_get(args: GetArgs, writer: &mut dyn Write) -> Result<ResponseStatus, CliError> {
    let config = args.into_config()?;
    run_get_config(&config, writer)
}

pub(super) fn run_get_config(
    config: &GetConfig,
    writer: &mut dyn Write,
) -> Result<ResponseStatus, CliError> {
    let service = config.target.service()?;
    let outcome = service.find_by_id(config.kind, &config.id);
    write_replies(writer, &[reply_entity(config.kind, &config.id, outcome)])
}
