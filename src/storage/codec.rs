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

//! Byte encoding of artifact parts.
//!
//! Every part starts with one envelope byte: `0` for raw payloads, `1` for
//! zstd-compressed payloads. Records bundles use their binary wire format.
//! Numeric arrays and tables are little-endian binary so that NaN and
//! infinities survive; plain values are JSON.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{ZiArray, ZiData, ZiDType, ZiTable};
use crate::errors::{Result, ZiError};
use crate::records::record::ZiLeReader;
use crate::records::ZiRecordsBundle;

const ENVELOPE_RAW: u8 = 0;
#[cfg(feature = "compression")]
const ENVELOPE_ZSTD: u8 = 1;
#[cfg(feature = "compression")]
const ZSTD_LEVEL: i32 = 3;

/// Payload kind of one stored part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZiPartKind {
    Value,
    Table,
    Array,
    Arrays,
    Records,
}

fn seal(payload: Vec<u8>) -> Result<Vec<u8>> {
    #[cfg(feature = "compression")]
    {
        let compressed = zstd::encode_all(payload.as_slice(), ZSTD_LEVEL)?;
        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(ENVELOPE_ZSTD);
        out.extend_from_slice(&compressed);
        Ok(out)
    }
    #[cfg(not(feature = "compression"))]
    {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(ENVELOPE_RAW);
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

fn unseal(bytes: &[u8]) -> Result<Vec<u8>> {
    match bytes.split_first() {
        Some((&ENVELOPE_RAW, payload)) => Ok(payload.to_vec()),
        #[cfg(feature = "compression")]
        Some((&ENVELOPE_ZSTD, payload)) => Ok(zstd::decode_all(payload)?),
        Some((envelope, _)) => Err(ZiError::validation(format!(
            "unsupported part envelope {envelope}"
        ))),
        None => Err(ZiError::validation("empty artifact part")),
    }
}

fn dtype_tag(dtype: ZiDType) -> u8 {
    match dtype {
        ZiDType::I16 => 0,
        ZiDType::I32 => 1,
        ZiDType::I64 => 2,
        ZiDType::U32 => 3,
        ZiDType::F32 => 4,
        ZiDType::F64 => 5,
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn read_len(reader: &mut ZiLeReader<'_>) -> Result<usize> {
    usize::try_from(u64::from_le_bytes(reader.take()?))
        .map_err(|_| ZiError::validation("payload length does not fit in memory"))
}

fn write_array(out: &mut Vec<u8>, array: &ZiArray) {
    out.push(dtype_tag(array.dtype()));
    write_len(out, array.len());
    match array {
        ZiArray::I16(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        ZiArray::I32(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        ZiArray::I64(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        ZiArray::U32(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        ZiArray::F32(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        ZiArray::F64(values) => values.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
    }
}

fn read_values<T, const N: usize>(
    reader: &mut ZiLeReader<'_>,
    len: usize,
    convert: fn([u8; N]) -> T,
) -> Result<Vec<T>> {
    let bytes = reader.take_slice(
        len.checked_mul(N)
            .ok_or_else(|| ZiError::validation("array length overflows"))?,
    )?;
    Ok(bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            convert(raw)
        })
        .collect())
}

fn read_array(reader: &mut ZiLeReader<'_>) -> Result<ZiArray> {
    let [tag] = reader.take::<1>()?;
    let len = read_len(reader)?;
    Ok(match tag {
        0 => ZiArray::I16(read_values::<_, 2>(reader, len, i16::from_le_bytes)?),
        1 => ZiArray::I32(read_values::<_, 4>(reader, len, i32::from_le_bytes)?),
        2 => ZiArray::I64(read_values::<_, 8>(reader, len, i64::from_le_bytes)?),
        3 => ZiArray::U32(read_values::<_, 4>(reader, len, u32::from_le_bytes)?),
        4 => ZiArray::F32(read_values::<_, 4>(reader, len, f32::from_le_bytes)?),
        5 => ZiArray::F64(read_values::<_, 8>(reader, len, f64::from_le_bytes)?),
        other => {
            return Err(ZiError::validation(format!("unknown array dtype tag {other}")))
        }
    })
}

fn arrays_to_bytes(arrays: &[ZiArray]) -> Vec<u8> {
    let mut out = Vec::new();
    write_len(&mut out, arrays.len());
    for array in arrays {
        write_array(&mut out, array);
    }
    out
}

fn arrays_from_bytes(bytes: &[u8]) -> Result<Vec<ZiArray>> {
    let mut reader = ZiLeReader::new(bytes);
    let count = read_len(&mut reader)?;
    let arrays = (0..count)
        .map(|_| read_array(&mut reader))
        .collect::<Result<Vec<_>>>()?;
    reader.finish()?;
    Ok(arrays)
}

fn table_to_bytes(table: &ZiTable) -> Vec<u8> {
    let mut out = Vec::with_capacity(table.size_bytes() + 16);
    write_len(&mut out, table.columns().len());
    for column in table.columns() {
        write_len(&mut out, column.name.len());
        out.extend_from_slice(column.name.as_bytes());
        write_array(&mut out, &column.values);
    }
    out
}

fn table_from_bytes(bytes: &[u8]) -> Result<ZiTable> {
    let mut reader = ZiLeReader::new(bytes);
    let count = read_len(&mut reader)?;
    let mut columns = Vec::new();
    for _ in 0..count {
        let name_len = read_len(&mut reader)?;
        let name = std::str::from_utf8(reader.take_slice(name_len)?)
            .map_err(|err| ZiError::validation(format!("column name is not utf-8: {err}")))?
            .to_string();
        columns.push((name, read_array(&mut reader)?));
    }
    reader.finish()?;
    ZiTable::new(columns)
}

/// Encodes one non-sequence value as a part.
pub fn encode_part(data: &ZiData) -> Result<(ZiPartKind, Vec<u8>)> {
    let (kind, payload) = match data {
        ZiData::Value(value) => (ZiPartKind::Value, serde_json::to_vec(value)?),
        ZiData::Table(table) => (ZiPartKind::Table, table_to_bytes(table)),
        ZiData::Arrays(arrays) => (ZiPartKind::Arrays, arrays_to_bytes(arrays)),
        ZiData::Records(bundle) => (ZiPartKind::Records, bundle.to_bytes()),
        ZiData::Sequence(_) => {
            return Err(ZiError::internal("sequences are stored chunk by chunk"))
        }
    };
    Ok((kind, seal(payload)?))
}

pub fn encode_array(array: &ZiArray) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(array.size_bytes() + 9);
    write_array(&mut payload, array);
    seal(payload)
}

pub fn decode_part(kind: ZiPartKind, bytes: &[u8]) -> Result<ZiData> {
    let payload = unseal(bytes)?;
    Ok(match kind {
        ZiPartKind::Value => ZiData::Value(serde_json::from_slice(&payload)?),
        ZiPartKind::Table => ZiData::Table(table_from_bytes(&payload)?),
        ZiPartKind::Arrays => ZiData::Arrays(arrays_from_bytes(&payload)?),
        ZiPartKind::Array => ZiData::Arrays(vec![decode_array(bytes)?]),
        ZiPartKind::Records => {
            ZiData::Records(Arc::new(ZiRecordsBundle::from_bytes(&payload)?))
        }
    })
}

pub fn decode_array(bytes: &[u8]) -> Result<ZiArray> {
    let payload = unseal(bytes)?;
    let mut reader = ZiLeReader::new(&payload);
    let array = read_array(&mut reader)?;
    reader.finish()?;
    Ok(array)
}
