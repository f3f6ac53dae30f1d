//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Zirun.
//! The Zirun project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Zirun Data Module
//!
//! Values that flow between plugins.
//!
//! A plugin returns one [`ZiData`]: a JSON value, a column table, a list of
//! typed arrays (one per channel), a shared records bundle, or a lazy
//! [`ZiSequence`] of chunks. Each plugin declares a [`ZiOutputSchema`]; the
//! orchestrator checks inputs against their producer's schema before a
//! computation and casts outputs to the declared schema afterwards.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, ZiError};
use crate::records::ZiRecordsBundle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiDType {
    I16,
    I32,
    I64,
    U32,
    F32,
    F64,
}

impl ZiDType {
    pub fn is_float(&self) -> bool {
        matches!(self, ZiDType::F32 | ZiDType::F64)
    }

    pub fn width(&self) -> usize {
        match self {
            ZiDType::I16 => 2,
            ZiDType::I32 | ZiDType::U32 | ZiDType::F32 => 4,
            ZiDType::I64 | ZiDType::F64 => 8,
        }
    }
}

/// Homogeneous numeric array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum ZiArray {
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl ZiArray {
    pub fn dtype(&self) -> ZiDType {
        match self {
            ZiArray::I16(_) => ZiDType::I16,
            ZiArray::I32(_) => ZiDType::I32,
            ZiArray::I64(_) => ZiDType::I64,
            ZiArray::U32(_) => ZiDType::U32,
            ZiArray::F32(_) => ZiDType::F32,
            ZiArray::F64(_) => ZiDType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ZiArray::I16(v) => v.len(),
            ZiArray::I32(v) => v.len(),
            ZiArray::I64(v) => v.len(),
            ZiArray::U32(v) => v.len(),
            ZiArray::F32(v) => v.len(),
            ZiArray::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.len() * self.dtype().width()
    }

    fn integers(&self) -> Option<Vec<i64>> {
        match self {
            ZiArray::I16(v) => Some(v.iter().map(|x| *x as i64).collect()),
            ZiArray::I32(v) => Some(v.iter().map(|x| *x as i64).collect()),
            ZiArray::I64(v) => Some(v.clone()),
            ZiArray::U32(v) => Some(v.iter().map(|x| *x as i64).collect()),
            ZiArray::F32(_) | ZiArray::F64(_) => None,
        }
    }

    fn floats(&self) -> Vec<f64> {
        match self {
            ZiArray::I16(v) => v.iter().map(|x| *x as f64).collect(),
            ZiArray::I32(v) => v.iter().map(|x| *x as f64).collect(),
            ZiArray::I64(v) => v.iter().map(|x| *x as f64).collect(),
            ZiArray::U32(v) => v.iter().map(|x| *x as f64).collect(),
            ZiArray::F32(v) => v.iter().map(|x| *x as f64).collect(),
            ZiArray::F64(v) => v.clone(),
        }
    }

    /// Converts to `dtype`, failing on values the target cannot represent.
    pub fn cast(&self, dtype: ZiDType) -> std::result::Result<ZiArray, String> {
        if self.dtype() == dtype {
            return Ok(self.clone());
        }
        match dtype {
            ZiDType::F64 => return Ok(ZiArray::F64(self.floats())),
            ZiDType::F32 => {
                return Ok(ZiArray::F32(
                    self.floats().into_iter().map(|v| v as f32).collect(),
                ))
            }
            _ => {}
        }

        let integers = match self.integers() {
            Some(values) => values,
            None => self
                .floats()
                .into_iter()
                .map(|f| {
                    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                        Ok(f as i64)
                    } else {
                        Err(format!("{f} is not an integer"))
                    }
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        fn narrow<T: TryFrom<i64>>(
            values: Vec<i64>,
            dtype: ZiDType,
        ) -> std::result::Result<Vec<T>, String> {
            values
                .into_iter()
                .map(|v| T::try_from(v).map_err(|_| format!("{v} does not fit {dtype:?}")))
                .collect()
        }

        Ok(match dtype {
            ZiDType::I16 => ZiArray::I16(narrow(integers, dtype)?),
            ZiDType::I32 => ZiArray::I32(narrow(integers, dtype)?),
            ZiDType::U32 => ZiArray::U32(narrow(integers, dtype)?),
            _ => ZiArray::I64(integers),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZiColumn {
    pub name: String,
    pub values: ZiArray,
}

/// Named columns of equal length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiTable {
    columns: Vec<ZiColumn>,
}

impl ZiTable {
    pub fn new(columns: Vec<(impl Into<String>, ZiArray)>) -> Result<Self> {
        let columns: Vec<ZiColumn> = columns
            .into_iter()
            .map(|(name, values)| ZiColumn {
                name: name.into(),
                values,
            })
            .collect();
        if let Some(first) = columns.first() {
            let rows = first.values.len();
            for column in &columns {
                if column.values.len() != rows {
                    return Err(ZiError::validation(format!(
                        "column '{}' has {} rows, expected {rows}",
                        column.name,
                        column.values.len()
                    )));
                }
            }
        }
        for (index, column) in columns.iter().enumerate() {
            if columns[..index].iter().any(|c| c.name == column.name) {
                return Err(ZiError::validation(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(ZiTable { columns })
    }

    pub fn column(&self, name: &str) -> Option<&ZiArray> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.values)
    }

    pub fn columns(&self) -> &[ZiColumn] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn size_bytes(&self) -> usize {
        self.columns.iter().map(|c| c.values.size_bytes()).sum()
    }

    /// Reorders and casts columns to exactly match `schema`.
    pub fn cast_to(&self, schema: &ZiTableSchema) -> std::result::Result<ZiTable, String> {
        if let Some(extra) = self
            .columns
            .iter()
            .find(|c| !schema.columns.iter().any(|(name, _)| *name == c.name))
        {
            return Err(format!("unexpected column '{}'", extra.name));
        }
        let columns = schema
            .columns
            .iter()
            .map(|(name, dtype)| {
                let values = self
                    .column(name)
                    .ok_or_else(|| format!("missing column '{name}'"))?
                    .cast(*dtype)
                    .map_err(|err| format!("column '{name}': {err}"))?;
                Ok(ZiColumn {
                    name: name.clone(),
                    values,
                })
            })
            .collect::<std::result::Result<Vec<_>, String>>()?;
        Ok(ZiTable { columns })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ZiTableSchema {
    pub columns: Vec<(String, ZiDType)>,
}

impl ZiTableSchema {
    pub fn new(columns: &[(&str, ZiDType)]) -> Self {
        ZiTableSchema {
            columns: columns
                .iter()
                .map(|(name, dtype)| (name.to_string(), *dtype))
                .collect(),
        }
    }

    /// An empty schema accepts any table and skips the cast.
    pub fn is_concrete(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Declared shape of a plugin's output.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiOutputSchema {
    #[default]
    Untyped,
    Value,
    Records,
    Table(ZiTableSchema),
    /// One array per channel, optionally of a fixed dtype.
    Arrays(Option<ZiDType>),
}

impl ZiOutputSchema {
    /// Checks that `data` has the declared shape. Sequences pass; their
    /// chunks are checked one by one.
    pub fn check_shape(&self, data: &ZiData) -> std::result::Result<(), String> {
        let ok = match (self, data) {
            (_, ZiData::Sequence(_)) | (ZiOutputSchema::Untyped, _) => true,
            (ZiOutputSchema::Value, ZiData::Value(_)) => true,
            (ZiOutputSchema::Records, ZiData::Records(_)) => true,
            (ZiOutputSchema::Table(_), ZiData::Table(_)) => true,
            (ZiOutputSchema::Arrays(_), ZiData::Arrays(_)) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "expected {}, got {}",
                self.describe(),
                data.kind_name()
            ))
        }
    }

    /// Casts a non-sequence value to the declared schema where one is fixed.
    ///
    /// Heterogeneous array lists and untyped schemas are returned unchanged.
    pub fn cast(&self, data: ZiData) -> std::result::Result<ZiData, String> {
        self.check_shape(&data)?;
        match (self, data) {
            (ZiOutputSchema::Table(schema), ZiData::Table(table)) if schema.is_concrete() => {
                Ok(ZiData::Table(table.cast_to(schema)?))
            }
            (ZiOutputSchema::Arrays(Some(dtype)), ZiData::Arrays(arrays)) => {
                let homogeneous = arrays.windows(2).all(|w| w[0].dtype() == w[1].dtype());
                if !homogeneous {
                    return Ok(ZiData::Arrays(arrays));
                }
                let cast = arrays
                    .iter()
                    .enumerate()
                    .map(|(channel, array)| {
                        array
                            .cast(*dtype)
                            .map_err(|err| format!("channel {channel}: {err}"))
                    })
                    .collect::<std::result::Result<Vec<_>, String>>()?;
                Ok(ZiData::Arrays(cast))
            }
            (_, data) => Ok(data),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            ZiOutputSchema::Untyped => "anything",
            ZiOutputSchema::Value => "value",
            ZiOutputSchema::Records => "records",
            ZiOutputSchema::Table(_) => "table",
            ZiOutputSchema::Arrays(_) => "arrays",
        }
    }
}

/// Lazy sequence of chunks produced by a plugin or read from storage.
pub struct ZiSequence {
    inner: Box<dyn Iterator<Item = Result<ZiData>> + Send + Sync>,
}

impl ZiSequence {
    pub fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<ZiData>> + Send + Sync + 'static,
    {
        ZiSequence {
            inner: Box::new(iter),
        }
    }

    pub fn from_chunks(chunks: Vec<ZiData>) -> Self {
        ZiSequence::new(chunks.into_iter().map(Ok))
    }

    /// Replays materialised chunks without consuming them.
    pub fn from_shared(chunks: Arc<Vec<ZiData>>) -> Self {
        let len = chunks.len();
        ZiSequence::new((0..len).map(move |index| {
            chunks[index]
                .try_clone()
                .ok_or_else(|| ZiError::internal("nested sequences cannot be replayed"))
        }))
    }

    /// Drains the sequence, failing on the first bad chunk.
    pub fn collect_chunks(self) -> Result<Vec<ZiData>> {
        self.inner.collect()
    }
}

impl Iterator for ZiSequence {
    type Item = Result<ZiData>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for ZiSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ZiSequence(..)")
    }
}

#[derive(Debug)]
pub enum ZiData {
    Value(Value),
    Table(ZiTable),
    Arrays(Vec<ZiArray>),
    Records(Arc<ZiRecordsBundle>),
    Sequence(ZiSequence),
}

impl ZiData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ZiData::Value(_) => "value",
            ZiData::Table(_) => "table",
            ZiData::Arrays(_) => "arrays",
            ZiData::Records(_) => "records",
            ZiData::Sequence(_) => "sequence",
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, ZiData::Sequence(_))
    }

    /// Clones everything except sequences, which can only be consumed once.
    pub fn try_clone(&self) -> Option<ZiData> {
        Some(match self {
            ZiData::Value(v) => ZiData::Value(v.clone()),
            ZiData::Table(t) => ZiData::Table(t.clone()),
            ZiData::Arrays(a) => ZiData::Arrays(a.clone()),
            ZiData::Records(r) => ZiData::Records(Arc::clone(r)),
            ZiData::Sequence(_) => return None,
        })
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ZiData::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    pub fn as_table(&self) -> Option<&ZiTable> {
        match self {
            ZiData::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_arrays(&self) -> Option<&[ZiArray]> {
        match self {
            ZiData::Arrays(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&Arc<ZiRecordsBundle>> {
        match self {
            ZiData::Records(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Option<ZiSequence> {
        match self {
            ZiData::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Approximate in-memory payload size; unknown for sequences.
    pub fn size_bytes(&self) -> Option<usize> {
        match self {
            ZiData::Value(v) => Some(v.to_string().len()),
            ZiData::Table(t) => Some(t.size_bytes()),
            ZiData::Arrays(a) => Some(a.iter().map(ZiArray::size_bytes).sum()),
            ZiData::Records(r) => Some(r.size_bytes()),
            ZiData::Sequence(_) => None,
        }
    }

    /// Shape description used in diagnostics.
    pub fn shape(&self) -> String {
        match self {
            ZiData::Value(_) => "scalar".to_string(),
            ZiData::Table(t) => format!("{} rows x {} columns", t.num_rows(), t.columns().len()),
            ZiData::Arrays(a) => format!(
                "{} arrays [{}]",
                a.len(),
                a.iter()
                    .map(|x| x.len().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ZiData::Records(r) => format!("{} records, {} samples", r.len(), r.pool().len()),
            ZiData::Sequence(_) => "lazy".to_string(),
        }
    }
}

impl From<Value> for ZiData {
    fn from(value: Value) -> Self {
        ZiData::Value(value)
    }
}

impl From<i64> for ZiData {
    fn from(value: i64) -> Self {
        ZiData::Value(Value::from(value))
    }
}

impl From<f64> for ZiData {
    fn from(value: f64) -> Self {
        ZiData::Value(Value::from(value))
    }
}

impl From<ZiTable> for ZiData {
    fn from(table: ZiTable) -> Self {
        ZiData::Table(table)
    }
}

impl From<Vec<ZiArray>> for ZiData {
    fn from(arrays: Vec<ZiArray>) -> Self {
        ZiData::Arrays(arrays)
    }
}

impl From<ZiRecordsBundle> for ZiData {
    fn from(bundle: ZiRecordsBundle) -> Self {
        ZiData::Records(Arc::new(bundle))
    }
}

impl From<ZiSequence> for ZiData {
    fn from(sequence: ZiSequence) -> Self {
        ZiData::Sequence(sequence)
    }
}
