//! `sync` command: resync golden-source data into the reference store.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use regionkit_core::EntityKind;
use regionkit_data::{
    CancelToken, MalformedPolicy, PartitionStrategy, Reply, ResponseStatus, SyncConfig,
    reply_import,
};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATA_DIR, ARG_DATABASE, CliError, ENV_SYNC_DATA_DIR, ENV_SYNC_DATABASE,
    workspace::{open_synchronizer, require, write_replies},
};

/// Partitioning strategy accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum StrategyArg {
    /// Shard by identifier hash modulo the capacity.
    HashModulo,
    /// Contiguous chunks of at most the capacity.
    Chunked,
}

impl From<StrategyArg> for PartitionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::HashModulo => Self::HashModulo,
            StrategyArg::Chunked => Self::Chunked,
        }
    }
}

/// Malformed-row handling accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum MalformedArg {
    /// Log the row and keep loading.
    Skip,
    /// Fail the import.
    Abort,
}

impl From<MalformedArg> for MalformedPolicy {
    fn from(arg: MalformedArg) -> Self {
        match arg {
            MalformedArg::Skip => Self::Skip,
            MalformedArg::Abort => Self::Abort,
        }
    }
}

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Reload one kind, or every kind root first, from the golden \
                 CSV files and upsert it into the reference store. Prints one \
                 import envelope per kind.",
    about = "Resync reference data from the golden source"
)]
#[ortho_config(prefix = "REGIONKIT")]
pub(crate) struct SyncArgs {
    /// Kind to resync (regions, sub-regions, districts, settlements) or `all`.
    #[arg(value_name = "kind|all")]
    #[serde(default)]
    pub(crate) kind: Option<String>,
    /// Path to the SQLite reference database.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Directory holding the golden CSV files.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Worker threads writing partitions.
    #[arg(long, value_name = "n")]
    #[serde(default)]
    pub(crate) workers: Option<usize>,
    /// Target partition capacity.
    #[arg(long, value_name = "n")]
    #[serde(default)]
    pub(crate) partition_capacity: Option<usize>,
    /// Partitioning strategy.
    #[arg(long, value_enum)]
    #[serde(default)]
    pub(crate) strategy: Option<StrategyArg>,
    /// Whether a malformed row is skipped or fails the import.
    #[arg(long, value_enum)]
    #[serde(default)]
    pub(crate) on_malformed: Option<MalformedArg>,
}

impl SyncArgs {
    pub(crate) fn into_config(self) -> Result<SyncCommandConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SyncCommandConfig::try_from(merged)
    }
}

/// Resolved `sync` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyncCommandConfig {
    /// Kinds to resync, root first.
    pub(crate) kinds: Vec<EntityKind>,
    /// Path to the SQLite reference database.
    pub(crate) database: Utf8PathBuf,
    /// Directory holding the golden CSV files.
    pub(crate) data_dir: Utf8PathBuf,
    /// Synchronizer settings.
    pub(crate) sync: SyncConfig,
}

impl TryFrom<SyncArgs> for SyncCommandConfig {
    type Error = CliError;

    fn try_from(args: SyncArgs) -> Result<Self, Self::Error> {
        let kinds = match args.kind.as_deref().map(str::trim) {
            None | Some("all") => EntityKind::ALL.to_vec(),
            Some(raw) => vec![raw.parse::<EntityKind>()?],
        };
        let database = require(args.database, ARG_DATABASE, ENV_SYNC_DATABASE)?;
        let data_dir = require(args.data_dir, ARG_DATA_DIR, ENV_SYNC_DATA_DIR)?;

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            partition_capacity: args
                .partition_capacity
                .unwrap_or(defaults.partition_capacity),
            workers: args.workers.unwrap_or(defaults.workers),
            strategy: args.strategy.map_or(defaults.strategy, PartitionStrategy::from),
            malformed: args.on_malformed.map_or(defaults.malformed, MalformedPolicy::from),
        };
        Ok(Self {
            kinds,
            database,
            data_dir,
            sync,
        })
    }
}

pub(super) fn run_sync(args: SyncArgs, writer: &mut dyn Write) -> Result<ResponseStatus, CliError> {
    let config = args.into_config()?;
    run_sync_config(&config, writer)
}

pub(super) fn run_sync_config(
    config: &SyncCommandConfig,
    writer: &mut dyn Write,
) -> Result<ResponseStatus, CliError> {
    let synchronizer = open_synchronizer(&config.database, &config.data_dir, config.sync)?;
    let cancel = CancelToken::new();
    let replies: Vec<Reply> = config
        .kinds
        .iter()
        .map(|&kind| {
            let outcome = synchronizer.sync_with_cancel(kind, &cancel);
            if let Ok(report) = &outcome {
                info!(
                    "{kind} import: {} rows in {} partitions, {} rejected, took {:?}",
                    report.rows_written,
                    report.partitions,
                    report.rejected.len(),
                    report.elapsed
                );
            }
            reply_import(kind, outcome)
        })
        .collect();
    write_replies(writer, &replies)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SyncCommandConfig, CliError> {
    let merged = SyncArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SyncCommandConfig::try_from(merged)
}
