//! Typed records for the 13 dataset tables.
//!
//! Each table is a JSON array of flat records keyed by an opaque `token`.
//! Linked-list pointers (`prev`/`next`) use the empty string for "end of
//! chain" on disk; here they deserialize to `None`.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DatasetError, Result};
use crate::transform::{quaternion_from_wxyz, RigidTransform};

/// Opaque record identifier, unique within its table.
pub type Token = String;

// ============================================================================
// TABLE IDENTITY
// ============================================================================

/// The closed set of dataset tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Category,
    Attribute,
    Visibility,
    Instance,
    Sensor,
    CalibratedSensor,
    EgoPose,
    Log,
    Scene,
    Sample,
    SampleData,
    SampleAnnotation,
    Map,
}

impl TableName {
    /// Load order. Later tables may reference earlier ones.
    pub const ALL: [TableName; 13] = [
        TableName::Category,
        TableName::Attribute,
        TableName::Visibility,
        TableName::Instance,
        TableName::Sensor,
        TableName::CalibratedSensor,
        TableName::EgoPose,
        TableName::Log,
        TableName::Scene,
        TableName::Sample,
        TableName::SampleData,
        TableName::SampleAnnotation,
        TableName::Map,
    ];

    /// File stem of the table (`<name>.json`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::Category => "category",
            TableName::Attribute => "attribute",
            TableName::Visibility => "visibility",
            TableName::Instance => "instance",
            TableName::Sensor => "sensor",
            TableName::CalibratedSensor => "calibrated_sensor",
            TableName::EgoPose => "ego_pose",
            TableName::Log => "log",
            TableName::Scene => "scene",
            TableName::Sample => "sample",
            TableName::SampleData => "sample_data",
            TableName::SampleAnnotation => "sample_annotation",
            TableName::Map => "map",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        TableName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DatasetError::UnknownTable(s.to_string()))
    }
}

/// A row of one dataset table.
pub trait Record: DeserializeOwned + Serialize + fmt::Debug {
    const TABLE: TableName;

    fn token(&self) -> &str;
}

macro_rules! impl_record {
    ($($ty:ty => $table:ident),* $(,)?) => {
        $(
            impl Record for $ty {
                const TABLE: TableName = TableName::$table;

                fn token(&self) -> &str {
                    &self.token
                }
            }
        )*
    };
}

impl_record! {
    Category => Category,
    Attribute => Attribute,
    Visibility => Visibility,
    Instance => Instance,
    Sensor => Sensor,
    CalibratedSensor => CalibratedSensor,
    EgoPose => EgoPose,
    Log => Log,
    Scene => Scene,
    Sample => Sample,
    SampleData => SampleData,
    SampleAnnotation => SampleAnnotation,
    Map => Map,
}

/// Empty-string links on disk, `Option` in memory.
mod link {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.filter(|s| !s.is_empty()))
    }
}

// ============================================================================
// SENSOR MODALITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Camera,
    Lidar,
    Radar,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Camera => "camera",
            Modality::Lidar => "lidar",
            Modality::Radar => "radar",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "camera" => Ok(Modality::Camera),
            "lidar" => Ok(Modality::Lidar),
            "radar" => Ok(Modality::Radar),
            other => Err(DatasetError::InvalidModality(other.to_string())),
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub token: Token,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub token: Token,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visibility {
    pub token: Token,
    pub level: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub token: Token,
    pub category_token: Token,
    #[serde(default)]
    pub nbr_annotations: usize,
    #[serde(default, with = "link")]
    pub first_annotation_token: Option<Token>,
    #[serde(default, with = "link")]
    pub last_annotation_token: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub token: Token,
    pub channel: String,
    /// Raw modality label; validated where modality-specific handling starts
    pub modality: String,
}

impl Sensor {
    pub fn modality(&self) -> Result<Modality> {
        self.modality.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedSensor {
    pub token: Token,
    pub sensor_token: Token,
    /// Mounting position relative to the ego frame (meters)
    pub translation: [f64; 3],
    /// Mounting orientation as [w, x, y, z]
    pub rotation: [f64; 4],
    /// 3×3 row-major intrinsic; empty for non-camera sensors
    #[serde(default)]
    pub camera_intrinsic: Vec<[f64; 3]>,
}

impl CalibratedSensor {
    /// Sensor → ego transform.
    pub fn pose(&self) -> RigidTransform {
        RigidTransform::new(quaternion_from_wxyz(&self.rotation), Vector3::from(self.translation))
    }

    /// Camera intrinsic, if this calibration carries a full 3×3 one.
    pub fn intrinsic(&self) -> Option<Matrix3<f64>> {
        if self.camera_intrinsic.len() != 3 {
            return None;
        }
        let k = &self.camera_intrinsic;
        Some(Matrix3::new(
            k[0][0], k[0][1], k[0][2], k[1][0], k[1][1], k[1][2], k[2][0], k[2][1], k[2][2],
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgoPose {
    pub token: Token,
    /// Vehicle position in the world frame (meters)
    pub translation: [f64; 3],
    /// Vehicle orientation as [w, x, y, z]
    pub rotation: [f64; 4],
    /// Microseconds
    pub timestamp: f64,
}

impl EgoPose {
    /// Ego → world transform.
    pub fn pose(&self) -> RigidTransform {
        RigidTransform::new(self.orientation(), Vector3::from(self.translation))
    }

    pub fn orientation(&self) -> UnitQuaternion<f64> {
        quaternion_from_wxyz(&self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub token: Token,
    #[serde(default)]
    pub vehicle: String,
    #[serde(default)]
    pub date_captured: String,
    pub location: String,
    #[serde(default)]
    pub logfile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub token: Token,
    pub log_token: Token,
    #[serde(default)]
    pub nbr_samples: usize,
    pub first_sample_token: Token,
    pub last_sample_token: Token,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub token: Token,
    pub scene_token: Token,
    /// Microseconds
    pub timestamp: f64,
    #[serde(default, with = "link")]
    pub prev: Option<Token>,
    #[serde(default, with = "link")]
    pub next: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub token: Token,
    pub sample_token: Token,
    pub ego_pose_token: Token,
    pub calibrated_sensor_token: Token,
    /// Microseconds
    pub timestamp: f64,
    #[serde(default)]
    pub fileformat: String,
    pub is_key_frame: bool,
    /// Image height in pixels (cameras only)
    #[serde(default)]
    pub height: u32,
    /// Image width in pixels (cameras only)
    #[serde(default)]
    pub width: u32,
    pub filename: String,
    #[serde(default, with = "link")]
    pub prev: Option<Token>,
    #[serde(default, with = "link")]
    pub next: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAnnotation {
    pub token: Token,
    pub sample_token: Token,
    pub instance_token: Token,
    #[serde(default)]
    pub attribute_tokens: Vec<Token>,
    #[serde(default, with = "link")]
    pub visibility_token: Option<Token>,
    /// Box center in the world frame (meters)
    pub translation: [f64; 3],
    /// Width, length, height (meters)
    pub size: [f64; 3],
    /// Box orientation as [w, x, y, z]
    pub rotation: [f64; 4],
    #[serde(default)]
    pub num_lidar_pts: i64,
    #[serde(default)]
    pub num_radar_pts: i64,
    #[serde(default, with = "link")]
    pub prev: Option<Token>,
    #[serde(default, with = "link")]
    pub next: Option<Token>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Map {
    pub token: Token,
    pub filename: String,
    #[serde(default)]
    pub category: String,
    /// Absent in legacy dataset variants
    #[serde(default)]
    pub log_tokens: Option<Vec<Token>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_links_become_none() {
        let sample: Sample = serde_json::from_str(
            r#"{"token": "s1", "scene_token": "sc", "timestamp": 1.0, "prev": "", "next": "s2"}"#,
        )
        .unwrap();
        assert_eq!(sample.prev, None);
        assert_eq!(sample.next.as_deref(), Some("s2"));

        let back = serde_json::to_value(&sample).unwrap();
        assert_eq!(back["prev"], "");
    }

    #[test]
    fn test_table_name_roundtrip() {
        for table in TableName::ALL {
            assert_eq!(table.as_str().parse::<TableName>().unwrap(), table);
        }
        assert_eq!(TableName::SampleData.file_name(), "sample_data.json");
        assert!(matches!(
            "lidarseg".parse::<TableName>(),
            Err(DatasetError::UnknownTable(name)) if name == "lidarseg"
        ));
    }

    #[test]
    fn test_modality_parse() {
        assert_eq!("lidar".parse::<Modality>().unwrap(), Modality::Lidar);
        assert!(matches!(
            "sonar".parse::<Modality>(),
            Err(DatasetError::InvalidModality(_))
        ));
    }

    #[test]
    fn test_map_without_log_tokens() {
        let map: Map = serde_json::from_str(r#"{"token": "m", "filename": "maps/a.png"}"#).unwrap();
        assert!(map.log_tokens.is_none());
    }

    #[test]
    fn test_intrinsic_requires_three_rows() {
        let cs = CalibratedSensor {
            token: "cs".into(),
            sensor_token: "s".into(),
            translation: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
            camera_intrinsic: vec![],
        };
        assert!(cs.intrinsic().is_none());
    }
}
