//! The Denormalizer - derived views computed once after load.
//!
//! Raw records are never decorated in place. Instead every derived field
//! lives here, stored in dense vectors parallel to the owning table, so a
//! view is addressed by the same position the reverse index returns.
//!
//! Build order matters; later steps depend on earlier ones:
//! 1. annotation → category name
//! 2. sample_data → sensor modality/channel
//! 3. empty per-sample keyframe map and annotation list
//! 4. keyframe sample_data → `sample.data[channel]`
//! 5. annotation → `sample.anns`
//! 6. log → map backlink (requires `map.log_tokens`)

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::info;

use crate::error::{DatasetError, Result};
use crate::records::{Modality, TableName, Token};
use crate::store::TableStore;

/// Sensor identity attached to a sample_data record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    /// Raw modality label, validated on use
    pub modality: String,
    pub channel: String,
}

impl SensorInfo {
    pub fn modality(&self) -> Result<Modality> {
        self.modality.parse()
    }
}

/// Everything the engine derives from the raw tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedViews {
    /// Parallel to `sample_annotation`
    pub annotation_category: Vec<String>,
    /// Parallel to `sample_data`
    pub sample_data_sensor: Vec<SensorInfo>,
    /// Parallel to `sample`: channel → keyframe sample_data token
    pub sample_keyframes: Vec<BTreeMap<String, Token>>,
    /// Parallel to `sample`: annotation tokens in table order
    pub sample_annotations: Vec<Vec<Token>>,
    /// Parallel to `log`: owning map, if the map table is populated
    pub log_map: Vec<Option<Token>>,
}

impl DerivedViews {
    /// Computes all derived views. Pure: the store is only read, so
    /// building twice gives identical views.
    pub fn build(store: &TableStore) -> Result<Self> {
        let start = Instant::now();

        // 1. annotation → instance → category name
        let annotation_category = store
            .sample_annotation
            .iter()
            .map(|ann| {
                let instance = store.instance.get(&ann.instance_token)?;
                let category = store.category.get(&instance.category_token)?;
                Ok(category.name.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        // 2. sample_data → calibrated sensor → sensor
        let sample_data_sensor = store
            .sample_data
            .iter()
            .map(|sd| {
                let cs = store.calibrated_sensor.get(&sd.calibrated_sensor_token)?;
                let sensor = store.sensor.get(&cs.sensor_token)?;
                Ok(SensorInfo {
                    modality: sensor.modality.clone(),
                    channel: sensor.channel.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // 3. empty per-sample slots
        let mut sample_keyframes = vec![BTreeMap::new(); store.sample.len()];
        let mut sample_annotations = vec![Vec::new(); store.sample.len()];

        // 4. keyframes fill sample.data; one per channel per sample
        for (sd, sensor) in store.sample_data.iter().zip(&sample_data_sensor) {
            if !sd.is_key_frame {
                continue;
            }
            let slot = store.sample.index_of(&sd.sample_token)?;
            let channels: &mut BTreeMap<String, Token> = &mut sample_keyframes[slot];
            if let Some(first) = channels.get(&sensor.channel) {
                return Err(DatasetError::DuplicateKeyframe {
                    sample: sd.sample_token.clone(),
                    channel: sensor.channel.clone(),
                    first: first.clone(),
                    second: sd.token.clone(),
                });
            }
            channels.insert(sensor.channel.clone(), sd.token.clone());
        }

        // 5. annotations per sample
        for ann in store.sample_annotation.iter() {
            let slot = store.sample.index_of(&ann.sample_token)?;
            sample_annotations[slot].push(ann.token.clone());
        }

        // 6. log → map
        let log_map = Self::link_logs_to_maps(store)?;

        info!(
            "Reverse indexing done in {:.1}s ({} annotations, {} captures, {} samples)",
            start.elapsed().as_secs_f64(),
            annotation_category.len(),
            sample_data_sensor.len(),
            sample_keyframes.len()
        );

        Ok(Self {
            annotation_category,
            sample_data_sensor,
            sample_keyframes,
            sample_annotations,
            log_map,
        })
    }

    fn link_logs_to_maps(store: &TableStore) -> Result<Vec<Option<Token>>> {
        if store.map.is_empty() {
            return Ok(vec![None; store.log.len()]);
        }

        let mut log_to_map: HashMap<&str, &str> = HashMap::new();
        for map in store.map.iter() {
            let log_tokens = map.log_tokens.as_ref().ok_or_else(|| {
                DatasetError::Compatibility(format!(
                    "map {} has no log_tokens; this dataset variant is not supported",
                    map.token
                ))
            })?;
            for log_token in log_tokens {
                log_to_map.insert(log_token.as_str(), map.token.as_str());
            }
        }

        store
            .log
            .iter()
            .map(|log| {
                log_to_map
                    .get(log.token.as_str())
                    .map(|m| Some(m.to_string()))
                    .ok_or_else(|| {
                        DatasetError::Compatibility(format!("log {} is not covered by any map", log.token))
                    })
            })
            .collect()
    }

    /// Sensor info for the sample_data at `position`.
    pub fn sensor_at(&self, position: usize) -> Result<&SensorInfo> {
        self.sample_data_sensor
            .get(position)
            .ok_or_else(|| DatasetError::lookup(TableName::SampleData, position.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{
        CalibratedSensor, Category, Instance, Log, Map, Sample, SampleAnnotation, SampleData, Sensor,
    };
    use crate::table::Table;

    fn sample_data(token: &str, sample: &str, cs: &str, key: bool) -> SampleData {
        SampleData {
            token: token.into(),
            sample_token: sample.into(),
            ego_pose_token: "ep".into(),
            calibrated_sensor_token: cs.into(),
            timestamp: 0.0,
            fileformat: String::new(),
            is_key_frame: key,
            height: 0,
            width: 0,
            filename: format!("{}.bin", token),
            prev: None,
            next: None,
        }
    }

    fn store() -> TableStore {
        TableStore {
            category: Table::new(vec![Category { token: "cat".into(), name: "car".into(), description: String::new() }]),
            instance: Table::new(vec![Instance {
                token: "inst".into(),
                category_token: "cat".into(),
                nbr_annotations: 1,
                first_annotation_token: None,
                last_annotation_token: None,
            }]),
            sensor: Table::new(vec![Sensor { token: "lidar".into(), channel: "LIDAR_TOP".into(), modality: "lidar".into() }]),
            calibrated_sensor: Table::new(vec![CalibratedSensor {
                token: "cs".into(),
                sensor_token: "lidar".into(),
                translation: [0.0; 3],
                rotation: [1.0, 0.0, 0.0, 0.0],
                camera_intrinsic: vec![],
            }]),
            log: Table::new(vec![Log {
                token: "log".into(),
                vehicle: String::new(),
                date_captured: String::new(),
                location: "palo-alto".into(),
                logfile: String::new(),
            }]),
            sample: Table::new(vec![Sample {
                token: "s1".into(),
                scene_token: "scene".into(),
                timestamp: 0.0,
                prev: None,
                next: None,
            }]),
            sample_data: Table::new(vec![
                sample_data("sd1", "s1", "cs", true),
                sample_data("sd2", "s1", "cs", false),
            ]),
            sample_annotation: Table::new(vec![SampleAnnotation {
                token: "ann".into(),
                sample_token: "s1".into(),
                instance_token: "inst".into(),
                attribute_tokens: vec![],
                visibility_token: None,
                translation: [0.0; 3],
                size: [1.0; 3],
                rotation: [1.0, 0.0, 0.0, 0.0],
                num_lidar_pts: 0,
                num_radar_pts: 0,
                prev: None,
                next: None,
            }]),
            map: Table::new(vec![Map {
                token: "map".into(),
                filename: "maps/map.png".into(),
                category: String::new(),
                log_tokens: Some(vec!["log".into()]),
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_views() {
        let views = DerivedViews::build(&store()).unwrap();
        assert_eq!(views.annotation_category, vec!["car"]);
        assert_eq!(views.sample_data_sensor[1].channel, "LIDAR_TOP");
        assert_eq!(views.sample_keyframes[0].get("LIDAR_TOP").map(String::as_str), Some("sd1"));
        assert_eq!(views.sample_annotations[0], vec!["ann"]);
        assert_eq!(views.log_map, vec![Some("map".to_string())]);
    }

    #[test]
    fn test_build_is_idempotent() {
        let store = store();
        assert_eq!(DerivedViews::build(&store).unwrap(), DerivedViews::build(&store).unwrap());
    }

    #[test]
    fn test_duplicate_keyframe_fails_fast() {
        let mut store = store();
        store.sample_data = Table::new(vec![
            sample_data("sd1", "s1", "cs", true),
            sample_data("sd2", "s1", "cs", true),
        ]);
        assert!(matches!(
            DerivedViews::build(&store),
            Err(DatasetError::DuplicateKeyframe { .. })
        ));
    }

    #[test]
    fn test_map_without_log_tokens_is_incompatible() {
        let mut store = store();
        store.map = Table::new(vec![Map {
            token: "map".into(),
            filename: "maps/map.png".into(),
            category: String::new(),
            log_tokens: None,
        }]);
        assert!(matches!(DerivedViews::build(&store), Err(DatasetError::Compatibility(_))));
    }

    #[test]
    fn test_dangling_instance_is_lookup_error() {
        let mut store = store();
        store.instance = Table::default();
        assert!(matches!(
            DerivedViews::build(&store),
            Err(DatasetError::Lookup { table: TableName::Instance, .. })
        ));
    }

    #[test]
    fn test_empty_map_table_leaves_logs_unlinked() {
        let mut store = store();
        store.map = Table::default();
        let views = DerivedViews::build(&store).unwrap();
        assert_eq!(views.log_map, vec![None]);
    }
}
