//! Synthetic three-sample scene shared by the unit tests.
//!
//! Timeline (µs): s1 = 1_000_000, s2 = 1_500_000, s3 = 2_000_000.
//! LIDAR_TOP chain: lidar1 → lidar1b (non-key, 1_250_000, owned by s2) →
//! lidar2 → lidar3. CAM_FRONT and RADAR_FRONT keyframes on every sample.
//!
//! Instances: `car_a` annotated on all samples, driving +x at 4 m/s;
//! `ped_b` only on s2, behind the ego vehicle; `car_c` only on s2, ahead.

use drivelog_env::{MemoryPointCloudLoader, PointCloud};

use crate::config::DatasetConfig;
use crate::dataset::Dataset;
use crate::records::*;
use crate::store::TableStore;
use crate::table::Table;
use crate::transform::{quaternion_to_wxyz, yaw_rotation};

pub const IDENTITY: [f64; 4] = [1.0, 0.0, 0.0, 0.0];
/// Camera optical frame (z forward, x right, y down) → ego frame.
pub const CAMERA_ROTATION: [f64; 4] = [0.5, -0.5, 0.5, -0.5];
pub const DATA_ROOT: &str = "/data/synthetic";

pub fn yaw_wxyz(yaw: f64) -> [f64; 4] {
    quaternion_to_wxyz(&yaw_rotation(yaw))
}

fn capture(
    token: &str,
    sample: &str,
    cs: &str,
    timestamp: f64,
    key: bool,
    prev: Option<&str>,
    next: Option<&str>,
) -> SampleData {
    SampleData {
        token: token.into(),
        sample_token: sample.into(),
        ego_pose_token: format!("ep_{}", token),
        calibrated_sensor_token: cs.into(),
        timestamp,
        fileformat: String::new(),
        is_key_frame: key,
        height: if cs == "cs_cam" { 1200 } else { 0 },
        width: if cs == "cs_cam" { 1600 } else { 0 },
        filename: format!("samples/{}.bin", token),
        prev: prev.map(Into::into),
        next: next.map(Into::into),
    }
}

fn ego(token: &str, x: f64, timestamp: f64) -> EgoPose {
    EgoPose {
        token: format!("ep_{}", token),
        translation: [x, 0.0, 0.0],
        rotation: IDENTITY,
        timestamp,
    }
}

fn annotation(
    token: &str,
    sample: &str,
    instance: &str,
    translation: [f64; 3],
    rotation: [f64; 4],
    prev: Option<&str>,
    next: Option<&str>,
) -> SampleAnnotation {
    SampleAnnotation {
        token: token.into(),
        sample_token: sample.into(),
        instance_token: instance.into(),
        attribute_tokens: vec!["attr_moving".into()],
        visibility_token: None,
        translation,
        size: [2.0, 4.5, 1.6],
        rotation,
        num_lidar_pts: 10,
        num_radar_pts: 1,
        prev: prev.map(Into::into),
        next: next.map(Into::into),
    }
}

pub fn store() -> TableStore {
    let (t1, t2, t3) = (1_000_000.0, 1_500_000.0, 2_000_000.0);

    TableStore {
        category: Table::new(vec![
            Category { token: "cat_car".into(), name: "car".into(), description: String::new() },
            Category { token: "cat_ped".into(), name: "pedestrian".into(), description: String::new() },
        ]),
        attribute: Table::new(vec![Attribute {
            token: "attr_moving".into(),
            name: "object_action_driving_straight_forward".into(),
            description: String::new(),
        }]),
        instance: Table::new(vec![
            Instance { token: "car_a".into(), category_token: "cat_car".into(), nbr_annotations: 3, first_annotation_token: Some("a1".into()), last_annotation_token: Some("a3".into()) },
            Instance { token: "ped_b".into(), category_token: "cat_ped".into(), nbr_annotations: 1, first_annotation_token: Some("b2".into()), last_annotation_token: Some("b2".into()) },
            Instance { token: "car_c".into(), category_token: "cat_car".into(), nbr_annotations: 1, first_annotation_token: Some("c2".into()), last_annotation_token: Some("c2".into()) },
        ]),
        sensor: Table::new(vec![
            Sensor { token: "sensor_lidar".into(), channel: "LIDAR_TOP".into(), modality: "lidar".into() },
            Sensor { token: "sensor_cam".into(), channel: "CAM_FRONT".into(), modality: "camera".into() },
            Sensor { token: "sensor_radar".into(), channel: "RADAR_FRONT".into(), modality: "radar".into() },
        ]),
        calibrated_sensor: Table::new(vec![
            CalibratedSensor { token: "cs_lidar".into(), sensor_token: "sensor_lidar".into(), translation: [0.0, 0.0, 2.0], rotation: IDENTITY, camera_intrinsic: vec![] },
            CalibratedSensor {
                token: "cs_cam".into(),
                sensor_token: "sensor_cam".into(),
                translation: [1.5, 0.0, 1.5],
                rotation: CAMERA_ROTATION,
                camera_intrinsic: vec![[1000.0, 0.0, 800.0], [0.0, 1000.0, 600.0], [0.0, 0.0, 1.0]],
            },
            CalibratedSensor { token: "cs_radar".into(), sensor_token: "sensor_radar".into(), translation: [2.0, 0.0, 0.5], rotation: yaw_wxyz(0.1), camera_intrinsic: vec![] },
        ]),
        ego_pose: Table::new(vec![
            ego("lidar1", 10.0, t1),
            ego("lidar1b", 11.0, 1_250_000.0),
            ego("lidar2", 12.0, t2),
            ego("lidar3", 14.0, t3),
            ego("cam1", 10.0, t1),
            ego("cam2", 12.0, t2),
            ego("cam3", 14.0, t3),
            ego("radar2", 12.0, t2),
        ]),
        log: Table::new(vec![Log {
            token: "log1".into(),
            vehicle: "host-a004".into(),
            date_captured: "2019-01-30".into(),
            location: "Palo Alto".into(),
            logfile: String::new(),
        }]),
        scene: Table::new(vec![Scene {
            token: "scene1".into(),
            log_token: "log1".into(),
            nbr_samples: 3,
            first_sample_token: "s1".into(),
            last_sample_token: "s3".into(),
            name: "host-a004-lidar0-1232815252".into(),
            description: String::new(),
        }]),
        sample: Table::new(vec![
            Sample { token: "s1".into(), scene_token: "scene1".into(), timestamp: t1, prev: None, next: Some("s2".into()) },
            Sample { token: "s2".into(), scene_token: "scene1".into(), timestamp: t2, prev: Some("s1".into()), next: Some("s3".into()) },
            Sample { token: "s3".into(), scene_token: "scene1".into(), timestamp: t3, prev: Some("s2".into()), next: None },
        ]),
        sample_data: Table::new(vec![
            capture("lidar1", "s1", "cs_lidar", t1, true, None, Some("lidar1b")),
            capture("lidar1b", "s2", "cs_lidar", 1_250_000.0, false, Some("lidar1"), Some("lidar2")),
            capture("lidar2", "s2", "cs_lidar", t2, true, Some("lidar1b"), Some("lidar3")),
            capture("lidar3", "s3", "cs_lidar", t3, true, Some("lidar2"), None),
            capture("cam1", "s1", "cs_cam", t1, true, None, Some("cam2")),
            capture("cam2", "s2", "cs_cam", t2, true, Some("cam1"), Some("cam3")),
            capture("cam3", "s3", "cs_cam", t3, true, Some("cam2"), None),
            capture("radar2", "s2", "cs_radar", t2, true, None, None),
        ]),
        sample_annotation: Table::new(vec![
            annotation("a1", "s1", "car_a", [30.0, 0.0, 1.0], IDENTITY, None, Some("a2")),
            annotation("a2", "s2", "car_a", [32.0, 0.0, 1.0], yaw_wxyz(0.4), Some("a1"), Some("a3")),
            annotation("a3", "s3", "car_a", [34.0, 0.0, 1.0], yaw_wxyz(0.4), Some("a2"), None),
            annotation("b2", "s2", "ped_b", [5.0, 0.0, 1.0], IDENTITY, None, None),
            annotation("c2", "s2", "car_c", [25.0, 3.0, 1.0], IDENTITY, None, None),
        ]),
        map: Table::new(vec![Map {
            token: "map1".into(),
            filename: "maps/map_raster_palo_alto.png".into(),
            category: "semantic_prior".into(),
            log_tokens: Some(vec!["log1".into()]),
        }]),
        ..Default::default()
    }
}

pub fn config() -> DatasetConfig {
    DatasetConfig::new(DATA_ROOT).with_verbose(false)
}

pub fn dataset() -> Dataset {
    Dataset::from_store(config(), store()).expect("synthetic dataset indexes")
}

pub fn dataset_from(store: TableStore) -> Dataset {
    Dataset::from_store(config(), store).expect("synthetic dataset indexes")
}

/// One point per lidar capture, 10 m ahead of the sensor, tagged with a
/// per-capture intensity.
pub fn lidar_loader() -> MemoryPointCloudLoader {
    let mut loader = MemoryPointCloudLoader::new();
    for (i, token) in ["lidar1", "lidar1b", "lidar2", "lidar3"].iter().enumerate() {
        let cloud = PointCloud::from_point_major(4, &[10.0, 0.0, 0.0, i as f64]).expect("cloud");
        loader.insert(format!("{}/samples/{}.bin", DATA_ROOT, token), cloud);
    }
    loader
}
