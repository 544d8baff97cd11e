//! The Table Store: all 13 tables, each with its reverse index.
//!
//! Loading is single-threaded and happens once. After `load` returns, the
//! store is immutable and safe to share across reader threads.

use std::path::Path;
use std::time::Instant;

use tracing::info;

use crate::error::Result;
use crate::records::{
    Attribute, CalibratedSensor, Category, EgoPose, Instance, Log, Map, Record, Sample,
    SampleAnnotation, SampleData, Scene, Sensor, TableName, Visibility,
};
use crate::table::Table;

/// Owner of every loaded record.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    pub category: Table<Category>,
    pub attribute: Table<Attribute>,
    pub visibility: Table<Visibility>,
    pub instance: Table<Instance>,
    pub sensor: Table<Sensor>,
    pub calibrated_sensor: Table<CalibratedSensor>,
    pub ego_pose: Table<EgoPose>,
    pub log: Table<Log>,
    pub scene: Table<Scene>,
    pub sample: Table<Sample>,
    pub sample_data: Table<SampleData>,
    pub sample_annotation: Table<SampleAnnotation>,
    pub map: Table<Map>,
}

/// Typed route from a record type to its table in the store.
pub trait StoredRecord: Record + Sized + 'static {
    fn table(store: &TableStore) -> &Table<Self>;
}

macro_rules! stored_in {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl StoredRecord for $ty {
                fn table(store: &TableStore) -> &Table<Self> {
                    &store.$field
                }
            }
        )*
    };
}

stored_in! {
    Category => category,
    Attribute => attribute,
    Visibility => visibility,
    Instance => instance,
    Sensor => sensor,
    CalibratedSensor => calibrated_sensor,
    EgoPose => ego_pose,
    Log => log,
    Scene => scene,
    Sample => sample,
    SampleData => sample_data,
    SampleAnnotation => sample_annotation,
    Map => map,
}

/// Runs `$body` with `$t` bound to the table named by `$name`.
macro_rules! with_table {
    ($store:expr, $name:expr, |$t:ident| $body:expr) => {
        match $name {
            TableName::Category => { let $t = &$store.category; $body }
            TableName::Attribute => { let $t = &$store.attribute; $body }
            TableName::Visibility => { let $t = &$store.visibility; $body }
            TableName::Instance => { let $t = &$store.instance; $body }
            TableName::Sensor => { let $t = &$store.sensor; $body }
            TableName::CalibratedSensor => { let $t = &$store.calibrated_sensor; $body }
            TableName::EgoPose => { let $t = &$store.ego_pose; $body }
            TableName::Log => { let $t = &$store.log; $body }
            TableName::Scene => { let $t = &$store.scene; $body }
            TableName::Sample => { let $t = &$store.sample; $body }
            TableName::SampleData => { let $t = &$store.sample_data; $body }
            TableName::SampleAnnotation => { let $t = &$store.sample_annotation; $body }
            TableName::Map => { let $t = &$store.map; $body }
        }
    };
}

impl TableStore {
    /// Loads every table from `dir` in dependency order.
    pub fn load(dir: &Path, allow_missing: bool) -> Result<Self> {
        let start = Instant::now();
        let store = Self {
            category: Table::load(dir, allow_missing)?,
            attribute: Table::load(dir, allow_missing)?,
            visibility: Table::load(dir, allow_missing)?,
            instance: Table::load(dir, allow_missing)?,
            sensor: Table::load(dir, allow_missing)?,
            calibrated_sensor: Table::load(dir, allow_missing)?,
            ego_pose: Table::load(dir, allow_missing)?,
            log: Table::load(dir, allow_missing)?,
            scene: Table::load(dir, allow_missing)?,
            sample: Table::load(dir, allow_missing)?,
            sample_data: Table::load(dir, allow_missing)?,
            sample_annotation: Table::load(dir, allow_missing)?,
            map: Table::load(dir, allow_missing)?,
        };
        info!(
            "Loaded {} tables from {} in {:.1}s",
            TableName::ALL.len(),
            dir.display(),
            start.elapsed().as_secs_f64()
        );
        Ok(store)
    }

    /// Typed table access.
    pub fn table<R: StoredRecord>(&self) -> &Table<R> {
        R::table(self)
    }

    /// Typed O(1) record lookup.
    pub fn get<R: StoredRecord>(&self, token: &str) -> Result<&R> {
        R::table(self).get(token)
    }

    /// O(1) position lookup for a table named at runtime.
    pub fn index(&self, table: TableName, token: &str) -> Result<usize> {
        with_table!(self, table, |t| t.index_of(token))
    }

    pub fn len(&self, table: TableName) -> usize {
        with_table!(self, table, |t| t.len())
    }

    /// Record count per table, in load order.
    pub fn counts(&self) -> Vec<(TableName, usize)> {
        TableName::ALL.iter().map(|t| (*t, self.len(*t))).collect()
    }

    /// Linear field scan on a table named at runtime.
    pub fn field_to_tokens(
        &self,
        table: TableName,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<String>> {
        with_table!(self, table, |t| t.field_to_tokens(field, value))
    }

    /// A record of a runtime-named table as JSON.
    pub fn get_json(&self, table: TableName, token: &str) -> Result<serde_json::Value> {
        with_table!(self, table, |t| {
            let record = t.get(token)?;
            serde_json::to_value(record).map_err(|source| crate::error::DatasetError::Json {
                table,
                source,
            })
        })
    }
}
