//! A loaded table: dense record array plus its token → position index.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{DatasetError, Result};
use crate::records::{Record, TableName};

/// Records of one table in file order, with O(1) token lookup.
#[derive(Debug, Clone)]
pub struct Table<R: Record> {
    records: Vec<R>,
    index: HashMap<String, usize>,
}

impl<R: Record> Default for Table<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Record> Table<R> {
    /// Builds the reverse index over `records`. A repeated token keeps the
    /// position of its last occurrence.
    pub fn new(records: Vec<R>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.token().to_string(), i))
            .collect();
        Self { records, index }
    }

    /// Reads `<dir>/<table>.json`.
    ///
    /// A missing file yields an empty table when `allow_missing` is set and
    /// `NotFound` otherwise.
    pub fn load(dir: &Path, allow_missing: bool) -> Result<Self> {
        let path = dir.join(R::TABLE.file_name());
        if !path.is_file() {
            if allow_missing {
                warn!("Table file {} missing, substituting an empty table", path.display());
                return Ok(Self::default());
            }
            return Err(DatasetError::NotFound {
                table: R::TABLE,
                path: path.display().to_string(),
            });
        }

        let raw = fs::read_to_string(&path).map_err(|source| DatasetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let records: Vec<R> = serde_json::from_str(&raw).map_err(|source| DatasetError::Json {
            table: R::TABLE,
            source,
        })?;
        debug!("Loaded {} records from {}", records.len(), path.display());

        Ok(Self::new(records))
    }

    pub fn name(&self) -> TableName {
        R::TABLE
    }

    /// Position of the record with `token`.
    pub fn index_of(&self, token: &str) -> Result<usize> {
        self.index
            .get(token)
            .copied()
            .ok_or_else(|| DatasetError::lookup(R::TABLE, token))
    }

    /// Record with `token`.
    pub fn get(&self, token: &str) -> Result<&R> {
        self.index_of(token).map(|i| &self.records[i])
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Record at `position`.
    pub fn at(&self, position: usize) -> Option<&R> {
        self.records.get(position)
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Tokens of records matching `predicate`, in table order. O(n).
    pub fn tokens_where<F>(&self, predicate: F) -> Vec<&str>
    where
        F: Fn(&R) -> bool,
    {
        self.records
            .iter()
            .filter(|r| predicate(r))
            .map(|r| r.token())
            .collect()
    }

    /// Tokens of records whose serialized `field` equals `value`. O(n).
    pub fn field_to_tokens(&self, field: &str, value: &serde_json::Value) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for record in &self.records {
            let json = serde_json::to_value(record).map_err(|source| DatasetError::Json {
                table: R::TABLE,
                source,
            })?;
            match json.get(field) {
                Some(v) if v == value => matches.push(record.token().to_string()),
                Some(_) => {}
                None => {
                    return Err(DatasetError::UnknownField {
                        table: R::TABLE,
                        field: field.to_string(),
                    })
                }
            }
        }
        Ok(matches)
    }
}

impl<'a, R: Record> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
