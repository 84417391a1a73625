//! Command implementations.
//!
//! Each command opens the snapshot file read-only, answers one question, and
//! writes plain text to the supplied writer.

use std::{io::Write, path::Path};

use rewind_state::{KindRegistry, SnapshotStore, StoreStats};
use rewind_types::{Resource, ResourceRecord, StoreConfig, Timestamp};
use snafu::ResultExt;
use tracing::info;

use crate::{
    Command, ConfigAction, LabelArgs, ListArgs,
    config::{CliConfig, config_schema},
    error::{NotFoundSnafu, OutputSnafu, RenderSnafu, Result, SnapshotSnafu},
};

/// Runs `command` against `config`, writing its report to `out`.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded, a looked-up resource
/// does not exist, or `out` cannot be written.
pub fn run(
    command: &Command,
    config: &CliConfig,
    registry: &KindRegistry,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Command::Range { file } => range(&open(file, &config.store)?, out),
        Command::List { file, args } => list(&open(file, &config.store)?, args, registry, out),
        Command::Get { file, id, at } => get(&open(file, &config.store)?, id, *at, out),
        Command::History { file, id } => history(&open(file, &config.store)?, id, out),
        Command::Labels { file, args } => labels(&open(file, &config.store)?, args, out),
        Command::Stats { file } => stats(&open(file, &config.store)?, out),
        Command::Config { action } => match action {
            ConfigAction::Schema => writeln!(out, "{}", config_schema()?).context(OutputSnafu),
            ConfigAction::Show => {
                let rendered = serde_json::to_string_pretty(config).context(RenderSnafu)?;
                writeln!(out, "{rendered}").context(OutputSnafu)
            },
        },
    }
}

fn open(file: &Path, config: &StoreConfig) -> Result<SnapshotStore<ResourceRecord>> {
    let store = SnapshotStore::load(file, config.clone()).context(SnapshotSnafu)?;
    info!(
        path = %file.display(),
        resources = store.resource_ids().len(),
        max_chain_length = store.config().max_chain_length,
        "Opened snapshot"
    );
    Ok(store)
}

/// Resolves `--at`, defaulting to the end of the recorded timeline.
fn instant(store: &SnapshotStore<ResourceRecord>, at: Option<Timestamp>) -> Option<Timestamp> {
    at.or_else(|| store.time_range().map(|r| r.end))
}

fn range(store: &SnapshotStore<ResourceRecord>, out: &mut dyn Write) -> Result<()> {
    let written = match store.time_range() {
        Some(range) => writeln!(out, "{}\t{}", range.start, range.end),
        None => writeln!(out, "empty"),
    };
    written.context(OutputSnafu)
}

fn list(
    store: &SnapshotStore<ResourceRecord>,
    args: &ListArgs,
    registry: &KindRegistry,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(at) = instant(store, args.at) else {
        return Ok(());
    };
    let filter = registry.filter(args.kind.as_deref(), args.namespace.as_deref());
    for resource in store.get_resources_at(at, &filter).context(SnapshotSnafu)? {
        writeln!(out, "{}\t{}", resource.valid_at(), resource.id()).context(OutputSnafu)?;
    }
    Ok(())
}

fn get(
    store: &SnapshotStore<ResourceRecord>,
    id: &str,
    at: Option<Timestamp>,
    out: &mut dyn Write,
) -> Result<()> {
    let at = instant(store, at).unwrap_or_default();
    let resource = store
        .get_resource_at(at, id)
        .context(SnapshotSnafu)?
        .ok_or_else(|| NotFoundSnafu { id, at }.build())?;
    writeln!(out, "{}", String::from_utf8_lossy(&resource.payload)).context(OutputSnafu)
}

fn history(store: &SnapshotStore<ResourceRecord>, id: &str, out: &mut dyn Write) -> Result<()> {
    for (timestamp, version) in store.get_resource_history(id).context(SnapshotSnafu)? {
        let written = match version {
            Some(resource) => {
                writeln!(out, "{timestamp}\tset\t{} bytes", resource.payload.len())
            },
            None => writeln!(out, "{timestamp}\tdeleted"),
        };
        written.context(OutputSnafu)?;
    }
    Ok(())
}

fn labels(
    store: &SnapshotStore<ResourceRecord>,
    args: &LabelArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let Some(at) = args.at else {
        for (timestamp, label) in store.labels().context(SnapshotSnafu)? {
            let label = if label.is_empty() { "(cleared)" } else { label.as_str() };
            writeln!(out, "{timestamp}\t{label}").context(OutputSnafu)?;
        }
        return Ok(());
    };

    let label = store.get_label(at).context(SnapshotSnafu)?;
    let prev = store.prev_label_time(at).context(SnapshotSnafu)?;
    let next = store.next_label_time(at).context(SnapshotSnafu)?;
    let show = |t: Option<Timestamp>| t.map_or_else(|| "-".to_string(), |t| t.to_string());
    writeln!(out, "label\t{label}").context(OutputSnafu)?;
    writeln!(out, "prev\t{}", show(prev)).context(OutputSnafu)?;
    writeln!(out, "next\t{}", show(next)).context(OutputSnafu)
}

fn stats(store: &SnapshotStore<ResourceRecord>, out: &mut dyn Write) -> Result<()> {
    let StoreStats { resources, labels } = store.stats();
    for (name, map) in [("resources", resources), ("labels", labels)] {
        writeln!(
            out,
            "{name}\tkeys={} keyframes={} diff_frames={} base_bytes={} delta_bytes={}",
            map.keys, map.keyframes, map.diff_frames, map.base_bytes, map.delta_bytes
        )
        .context(OutputSnafu)?;
    }
    Ok(())
}
