//! Typed resource history with label bookmarks and file persistence.
//!
//! A [`SnapshotStore`] wraps two [`TemporalMap`]s: one holding the encoded
//! form of every tracked resource keyed by its id, and one holding free-form
//! labels that operators place along the timeline. Both use the same delta
//! codec and chain bound.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    marker::PhantomData,
    path::Path,
};

use rewind_store::{MapStats, TemporalMap, codec_for};
use rewind_types::{Resource, ResourceFilter, StoreConfig, TimeRange, Timestamp, decode, encode};
use snafu::ResultExt;
use tracing::{debug, info};

use crate::{
    container,
    error::{CodecSnafu, ConfigSnafu, IoSnafu, Result, StoreSnafu},
};

/// Key under which the current label is recorded in the labels map.
const LABEL_KEY: &str = "label";

/// Storage statistics for both maps of a [`SnapshotStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Resource history.
    pub resources: MapStats,
    /// Label history.
    pub labels: MapStats,
}

/// Point-in-time store of resources of type `R`.
#[derive(Debug)]
pub struct SnapshotStore<R> {
    config: StoreConfig,
    resources: TemporalMap,
    labels: TemporalMap,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Default for SnapshotStore<R> {
    fn default() -> Self {
        Self::from_parts(StoreConfig::default(), None, None)
    }
}

impl<R: Resource> SnapshotStore<R> {
    /// Creates an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`](crate::StoreError::Config) if `config` fails validation.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate().context(ConfigSnafu)?;
        Ok(Self::from_parts(config, None, None))
    }

    fn from_parts(
        config: StoreConfig,
        resources: Option<TemporalMap>,
        labels: Option<TemporalMap>,
    ) -> Self {
        let resources = resources.unwrap_or_else(|| TemporalMap::from_config(&config));
        let labels = labels.unwrap_or_else(|| TemporalMap::from_config(&config));
        Self { config, resources, labels, _resource: PhantomData }
    }

    /// The configuration the store was built with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------------

    /// Records a new resource version at its `valid_at` time.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or its history rebuilt.
    pub fn add_resource(&self, resource: &R) -> Result<()> {
        let bytes = encode(resource).context(CodecSnafu { id: resource.id() })?;
        self.resources.add(resource.id(), resource.valid_at(), bytes).context(StoreSnafu)
    }

    /// Records a resource version only if the resource exists at its `valid_at` time.
    ///
    /// Returns `false` when the update was ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or its history rebuilt.
    pub fn update_resource(&self, resource: &R) -> Result<bool> {
        let bytes = encode(resource).context(CodecSnafu { id: resource.id() })?;
        let applied = self
            .resources
            .update(resource.id(), resource.valid_at(), bytes)
            .context(StoreSnafu)?;
        if !applied {
            debug!(
                id = resource.id(),
                valid_at = %resource.valid_at(),
                "Ignored update of absent resource"
            );
        }
        Ok(applied)
    }

    /// Records the deletion of a resource at its `valid_at` time.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource's history cannot be rebuilt.
    pub fn delete_resource(&self, resource: &R) -> Result<()> {
        self.resources.remove(resource.id(), resource.valid_at()).context(StoreSnafu)
    }

    /// Returns every resource live at `timestamp` that passes `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Fails as a whole if any stored resource cannot be replayed or decoded.
    pub fn get_resources_at(
        &self,
        timestamp: Timestamp,
        filter: &ResourceFilter,
    ) -> Result<Vec<R>> {
        let state = self.resources.state_at(timestamp).context(StoreSnafu)?;
        let mut out = Vec::with_capacity(state.len());
        for (id, bytes) in &state {
            let resource: R = decode(bytes).context(CodecSnafu { id })?;
            if filter.matches(&resource) {
                out.push(resource);
            }
        }
        Ok(out)
    }

    /// Returns the resource `id` as it was at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource's history cannot be replayed or decoded.
    pub fn get_resource_at(&self, timestamp: Timestamp, id: &str) -> Result<Option<R>> {
        match self.resources.get(id, timestamp).context(StoreSnafu)? {
            Some(bytes) => decode(&bytes).map(Some).context(CodecSnafu { id }),
            None => Ok(None),
        }
    }

    /// Every recorded version of resource `id`; `None` marks a deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource's history cannot be replayed or decoded.
    pub fn get_resource_history(&self, id: &str) -> Result<Vec<(Timestamp, Option<R>)>> {
        self.resources
            .history(id)
            .context(StoreSnafu)?
            .into_iter()
            .map(|(timestamp, bytes)| {
                let resource: Option<R> =
                    bytes.map(|b| decode(&b)).transpose().context(CodecSnafu { id })?;
                Ok((timestamp, resource))
            })
            .collect()
    }

    /// Ids of every resource ever recorded, including deleted ones.
    pub fn resource_ids(&self) -> Vec<String> {
        self.resources.keys()
    }

    /// Span of the resource timeline, `None` before the first resource write.
    pub fn time_range(&self) -> Option<TimeRange> {
        self.resources.time_range()
    }

    // ------------------------------------------------------------------------
    // Labels
    // ------------------------------------------------------------------------

    /// Sets the label in effect from `timestamp`; an empty label clears it.
    ///
    /// # Errors
    ///
    /// Returns an error if the label history cannot be rebuilt.
    pub fn set_label(&self, timestamp: Timestamp, label: &str) -> Result<()> {
        let result = if label.is_empty() {
            self.labels.remove(LABEL_KEY, timestamp)
        } else {
            self.labels.add(LABEL_KEY, timestamp, label.as_bytes().to_vec())
        };
        result.context(StoreSnafu)
    }

    /// Returns the label in effect at `timestamp`, or an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the label history cannot be replayed.
    pub fn get_label(&self, timestamp: Timestamp) -> Result<String> {
        let bytes = self.labels.get(LABEL_KEY, timestamp).context(StoreSnafu)?;
        Ok(bytes.map(|b| label_text(&b)).unwrap_or_default())
    }

    /// Every label change, ascending; a cleared label appears as an empty string.
    ///
    /// # Errors
    ///
    /// Returns an error if the label history cannot be replayed.
    pub fn labels(&self) -> Result<Vec<(Timestamp, String)>> {
        let history = self.labels.history(LABEL_KEY).context(StoreSnafu)?;
        Ok(history
            .into_iter()
            .map(|(t, v)| (t, v.map(|b| label_text(&b)).unwrap_or_default()))
            .collect())
    }

    /// Returns the first time after `timestamp` at which the label changes.
    ///
    /// Falls back to the end of the resource timeline when no later change
    /// exists, and returns `None` only if there is neither.
    ///
    /// # Errors
    ///
    /// Returns an error if the label history cannot be replayed.
    pub fn next_label_time(&self, timestamp: Timestamp) -> Result<Option<Timestamp>> {
        let history = self.labels.history(LABEL_KEY).context(StoreSnafu)?;
        let current = value_at(&history, timestamp);
        let next = history
            .iter()
            .find(|(t, value)| *t > timestamp && value.as_deref() != current)
            .map(|(t, _)| *t);
        Ok(next.or_else(|| self.time_range().map(|r| r.end)))
    }

    /// Returns the start of the label segment before the one in effect at `timestamp`.
    ///
    /// Falls back to the start of the resource timeline when the label never
    /// changed before `timestamp`, and returns `None` only if there is neither.
    ///
    /// # Errors
    ///
    /// Returns an error if the label history cannot be replayed.
    pub fn prev_label_time(&self, timestamp: Timestamp) -> Result<Option<Timestamp>> {
        let history = self.labels.history(LABEL_KEY).context(StoreSnafu)?;
        let current = value_at(&history, timestamp);
        let earlier = history.partition_point(|(t, _)| *t < timestamp);

        let Some(mut i) =
            history[..earlier].iter().rposition(|(_, value)| value.as_deref() != current)
        else {
            return Ok(self.time_range().map(|r| r.start));
        };
        // Walk back to the first write of that run of equal values.
        while i > 0 && history[i - 1].1 == history[i].1 {
            i -= 1;
        }
        Ok(Some(history[i].0))
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Serializes both maps into the two-blob container.
    ///
    /// # Errors
    ///
    /// Returns an error if either map cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let resources = self.resources.to_bytes().context(StoreSnafu)?;
        let labels = self.labels.to_bytes().context(StoreSnafu)?;
        container::pack(&resources, &labels)
    }

    /// Rebuilds a store from [`SnapshotStore::to_bytes`] output.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is truncated, either map fails to
    /// decode, or the maps were written with a different delta algorithm
    /// than `config` selects.
    pub fn from_bytes(bytes: &[u8], config: StoreConfig) -> Result<Self> {
        config.validate().context(ConfigSnafu)?;
        let (resources, labels) = container::unpack(bytes)?;
        let codec = codec_for(&config);
        let resources = TemporalMap::from_bytes(resources, codec.clone(), config.max_chain_length)
            .context(StoreSnafu)?;
        let labels =
            TemporalMap::from_bytes(labels, codec, config.max_chain_length).context(StoreSnafu)?;
        Ok(Self::from_parts(config, Some(resources), Some(labels)))
    }

    /// Writes the store to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails. The
    /// file may be partially written in that case.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let file = File::create(path).context(IoSnafu { path })?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes).context(IoSnafu { path })?;
        writer.flush().context(IoSnafu { path })?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            resources = self.resources.len(),
            "Saved snapshot"
        );
        Ok(())
    }

    /// Reads a store previously written by [`SnapshotStore::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    pub fn load(path: &Path, config: StoreConfig) -> Result<Self> {
        let bytes = fs::read(path).context(IoSnafu { path })?;
        let store = Self::from_bytes(&bytes, config)?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            resources = store.resources.len(),
            "Loaded snapshot"
        );
        Ok(store)
    }

    /// Storage statistics for both maps.
    pub fn stats(&self) -> StoreStats {
        StoreStats { resources: self.resources.stats(), labels: self.labels.stats() }
    }
}

fn label_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Value in effect at `timestamp` according to an ascending history.
fn value_at(history: &[(Timestamp, Option<Vec<u8>>)], timestamp: Timestamp) -> Option<&[u8]> {
    let live = history.partition_point(|(t, _)| *t <= timestamp);
    live.checked_sub(1).and_then(|i| history[i].1.as_deref())
}
