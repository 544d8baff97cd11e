//! The Dataset - loaded tables, reverse indexes and derived views.
//!
//! Construction runs Table Store → Reverse Index → Denormalizer to
//! completion before anything is returned, so a `Dataset` value is always
//! query-safe. It is immutable afterwards and can be shared by reference
//! (or `Arc`) across reader threads.
//!
//! # Usage
//!
//! ```ignore
//! use drivelog_core::{Dataset, DatasetConfig};
//!
//! let config = DatasetConfig::new("/data/lyft/train").with_table_root("/data/lyft/train/data");
//! let dataset = Dataset::open(config)?;
//! let sample = dataset.get::<Sample>(&scene.first_sample_token)?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use drivelog_env::{EnvError, MapMask, MapMaskProvider};
use nalgebra::Vector3;
use tracing::info;

use crate::config::DatasetConfig;
use crate::denormalize::{DerivedViews, SensorInfo};
use crate::error::{DatasetError, Result};
use crate::geometry::Box3D;
use crate::records::{
    CalibratedSensor, EgoPose, Log, Map, Sample, SampleAnnotation, SampleData, Sensor, TableName,
    Token,
};
use crate::store::{StoredRecord, TableStore};
use crate::transform::quaternion_from_wxyz;

/// A fully indexed dataset.
pub struct Dataset {
    config: DatasetConfig,
    store: TableStore,
    views: DerivedViews,
    /// Map token → opened mask
    map_masks: HashMap<Token, Arc<dyn MapMask>>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("config", &self.config)
            .field("tables", &self.store.counts())
            .field("map_masks", &self.map_masks.len())
            .finish()
    }
}

impl Dataset {
    /// Loads and indexes the dataset described by `config`. Map masks are
    /// not opened.
    pub fn open(config: DatasetConfig) -> Result<Self> {
        let store = TableStore::load(config.table_root(), config.allow_missing_tables)?;
        Self::from_store(config, store)
    }

    /// Loads the dataset and opens one mask per map record through
    /// `provider`.
    pub fn open_with_maps(config: DatasetConfig, provider: &dyn MapMaskProvider) -> Result<Self> {
        Self::open(config)?.with_map_masks(provider)
    }

    /// Opens one mask per map record at `data_root/filename`.
    pub fn with_map_masks(mut self, provider: &dyn MapMaskProvider) -> Result<Self> {
        for map in self.store.map.iter() {
            let path = self.config.data_root.join(&map.filename);
            let mask = provider.open(&path, self.config.map_resolution)?;
            self.map_masks.insert(map.token.clone(), mask);
        }
        info!("Opened {} map masks", self.map_masks.len());
        Ok(self)
    }

    /// Indexes an already-loaded store.
    pub fn from_store(config: DatasetConfig, store: TableStore) -> Result<Self> {
        let views = DerivedViews::build(&store)?;
        if config.verbose {
            for (table, count) in store.counts() {
                info!("{} {},", count, table);
            }
        }
        Ok(Self {
            config,
            store,
            views,
            map_masks: HashMap::new(),
        })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn views(&self) -> &DerivedViews {
        &self.views
    }

    // ========== Record access ==========

    /// O(1) record lookup.
    pub fn get<R: StoredRecord>(&self, token: &str) -> Result<&R> {
        self.store.get::<R>(token)
    }

    /// O(1) position lookup.
    pub fn index<R: StoredRecord>(&self, token: &str) -> Result<usize> {
        R::table(&self.store).index_of(token)
    }

    /// O(1) position lookup for a runtime-named table.
    pub fn get_index(&self, table: TableName, token: &str) -> Result<usize> {
        self.store.index(table, token)
    }

    /// O(n) scan for records whose `field` equals `value`.
    pub fn field_to_tokens(
        &self,
        table: TableName,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<String>> {
        self.store.field_to_tokens(table, field, value)
    }

    /// O(n) typed scan.
    pub fn tokens_where<R, F>(&self, predicate: F) -> Vec<&str>
    where
        R: StoredRecord,
        F: Fn(&R) -> bool,
    {
        R::table(&self.store).tokens_where(predicate)
    }

    // ========== Derived views ==========

    /// Category name of an annotation.
    pub fn category_name(&self, annotation_token: &str) -> Result<&str> {
        let i = self.index::<SampleAnnotation>(annotation_token)?;
        Ok(&self.views.annotation_category[i])
    }

    /// Modality and channel of a capture.
    pub fn sensor_info(&self, sample_data_token: &str) -> Result<&SensorInfo> {
        let i = self.index::<SampleData>(sample_data_token)?;
        self.views.sensor_at(i)
    }

    /// Channel → keyframe sample_data token for a sample.
    pub fn sample_keyframes(&self, sample_token: &str) -> Result<&BTreeMap<String, Token>> {
        let i = self.index::<Sample>(sample_token)?;
        Ok(&self.views.sample_keyframes[i])
    }

    /// Annotation tokens of a sample.
    pub fn sample_annotations(&self, sample_token: &str) -> Result<&[Token]> {
        let i = self.index::<Sample>(sample_token)?;
        Ok(&self.views.sample_annotations[i])
    }

    /// The sample's keyframe capture on `channel`.
    pub fn keyframe(&self, sample_token: &str, channel: &str) -> Result<&SampleData> {
        let token = self.sample_keyframes(sample_token)?.get(channel).ok_or_else(|| {
            DatasetError::precondition(format!("sample {} has no {} capture", sample_token, channel))
        })?;
        self.get::<SampleData>(token)
    }

    /// Map token of a log; `None` when the map table was absent.
    pub fn log_map_token(&self, log_token: &str) -> Result<Option<&str>> {
        let i = self.index::<Log>(log_token)?;
        Ok(self.views.log_map[i].as_deref())
    }

    /// Mask opened for `map_token` by [`Dataset::open_with_maps`].
    pub fn map_mask(&self, map_token: &str) -> Result<Arc<dyn MapMask>> {
        self.get::<Map>(map_token)?;
        self.map_masks
            .get(map_token)
            .cloned()
            .ok_or_else(|| EnvError::map_unavailable(map_token).into())
    }

    // ========== Paths ==========

    pub fn sample_data_path(&self, sample_data_token: &str) -> Result<PathBuf> {
        let sd = self.get::<SampleData>(sample_data_token)?;
        Ok(self.config.data_root.join(&sd.filename))
    }

    pub fn map_path(&self, map_token: &str) -> Result<PathBuf> {
        let map = self.get::<Map>(map_token)?;
        Ok(self.config.data_root.join(&map.filename))
    }

    // ========== Capture context ==========

    /// Calibration, sensor and ego pose behind a capture.
    pub fn capture_context(&self, sd: &SampleData) -> Result<(&CalibratedSensor, &Sensor, &EgoPose)> {
        let cs = self.get::<CalibratedSensor>(&sd.calibrated_sensor_token)?;
        let sensor = self.get::<Sensor>(&cs.sensor_token)?;
        let pose = self.get::<EgoPose>(&sd.ego_pose_token)?;
        Ok((cs, sensor, pose))
    }

    /// World-frame box for an annotation.
    pub fn get_box(&self, annotation_token: &str) -> Result<Box3D> {
        let ann = self.get::<SampleAnnotation>(annotation_token)?;
        let category = self.category_name(annotation_token)?;
        Ok(Self::box_from_annotation(ann, category))
    }

    pub(crate) fn box_from_annotation(ann: &SampleAnnotation, category: &str) -> Box3D {
        Box3D::new(
            Vector3::from(ann.translation),
            Vector3::from(ann.size),
            quaternion_from_wxyz(&ann.rotation),
            category,
            ann.token.clone(),
        )
    }
}
