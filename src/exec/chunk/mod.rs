// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Columnar insert payloads.
//!
//! An [`InsertChunk`] is one unit of insert work: a table id, a row
//! count, and one payload per column. Payloads are a closed variant set
//! so every consumer matches exhaustively; a new storage kind cannot be
//! silently mishandled.
use std::collections::HashSet;

use crate::catalog::StorageClass;
use crate::common::ids::{ColumnId, TableId};

/// Raw column payload. Fixed-width payloads hold element bit patterns as
/// unsigned integers of the element width; signedness is a property of
/// the column's semantic type, applied where it matters (shard key
/// math), not of the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValues {
    Fixed1(Vec<u8>),
    Fixed2(Vec<u16>),
    Fixed4(Vec<u32>),
    Fixed8(Vec<u64>),
    VarString(Vec<String>),
    VarArray(Vec<Vec<u8>>),
}

impl ColumnValues {
    /// Number of stored elements. For a default-valued payload this is 1
    /// regardless of the chunk's row count.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Fixed1(v) => v.len(),
            ColumnValues::Fixed2(v) => v.len(),
            ColumnValues::Fixed4(v) => v.len(),
            ColumnValues::Fixed8(v) => v.len(),
            ColumnValues::VarString(v) => v.len(),
            ColumnValues::VarArray(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage_class(&self) -> StorageClass {
        match self {
            ColumnValues::Fixed1(_) => StorageClass::Fixed1,
            ColumnValues::Fixed2(_) => StorageClass::Fixed2,
            ColumnValues::Fixed4(_) => StorageClass::Fixed4,
            ColumnValues::Fixed8(_) => StorageClass::Fixed8,
            ColumnValues::VarString(_) => StorageClass::VarString,
            ColumnValues::VarArray(_) => StorageClass::VarArray,
        }
    }

    /// Raw element width in bytes; errors for variable-length payloads.
    pub fn element_width(&self) -> Result<usize, String> {
        self.storage_class().element_width()
    }

    /// Copy the elements at `rows` into a newly owned payload, in the
    /// given order. When `is_default` is set the payload carries one
    /// broadcast value; `rows` is ignored and only element 0 is read,
    /// yielding a length-1 payload that stays broadcast.
    ///
    /// Row indices past the payload length are a caller bug and panic.
    pub fn copy_rows(&self, rows: &[usize], is_default: bool) -> ColumnValues {
        let broadcast = [0usize];
        let rows: &[usize] = if is_default { &broadcast } else { rows };
        match self {
            ColumnValues::Fixed1(v) => ColumnValues::Fixed1(gather(v, rows)),
            ColumnValues::Fixed2(v) => ColumnValues::Fixed2(gather(v, rows)),
            ColumnValues::Fixed4(v) => ColumnValues::Fixed4(gather(v, rows)),
            ColumnValues::Fixed8(v) => ColumnValues::Fixed8(gather(v, rows)),
            ColumnValues::VarString(v) => ColumnValues::VarString(gather(v, rows)),
            ColumnValues::VarArray(v) => ColumnValues::VarArray(gather(v, rows)),
        }
    }
}

fn gather<T: Clone>(src: &[T], rows: &[usize]) -> Vec<T> {
    let mut out = Vec::with_capacity(rows.len());
    for &row in rows {
        out.push(src[row].clone());
    }
    out
}

/// One columnar insert batch, owned by the caller for the duration of a
/// single insert call.
#[derive(Debug, Clone)]
pub struct InsertChunk {
    pub table_id: TableId,
    pub row_count: usize,
    pub column_ids: Vec<ColumnId>,
    pub columns: Vec<ColumnValues>,
    /// Marks columns whose payload is one value broadcast to all rows.
    pub is_default: Vec<bool>,
}

impl InsertChunk {
    pub fn new(table_id: TableId, row_count: usize) -> Self {
        Self {
            table_id,
            row_count,
            column_ids: Vec::new(),
            columns: Vec::new(),
            is_default: Vec::new(),
        }
    }

    pub fn push_column(&mut self, column_id: ColumnId, values: ColumnValues, is_default: bool) {
        self.column_ids.push(column_id);
        self.columns.push(values);
        self.is_default.push(is_default);
    }

    pub fn column_index(&self, column_id: ColumnId) -> Option<usize> {
        self.column_ids.iter().position(|id| *id == column_id)
    }

    pub fn column_count(&self) -> usize {
        self.column_ids.len()
    }

    /// Structural invariants checked at the insert entry point: parallel
    /// vectors in lock-step, unique column ids, and payload lengths
    /// consistent with the row count (1 for broadcast columns).
    pub fn validate(&self) -> Result<(), String> {
        if self.columns.len() != self.column_ids.len()
            || self.is_default.len() != self.column_ids.len()
        {
            return Err(format!(
                "insert chunk for table {} is malformed: {} column ids, {} payloads, {} default flags",
                self.table_id,
                self.column_ids.len(),
                self.columns.len(),
                self.is_default.len()
            ));
        }

        let mut seen = HashSet::with_capacity(self.column_ids.len());
        for column_id in &self.column_ids {
            if !seen.insert(*column_id) {
                return Err(format!(
                    "insert chunk for table {} repeats column id {}",
                    self.table_id, column_id
                ));
            }
        }

        for (idx, values) in self.columns.iter().enumerate() {
            let expected = if self.is_default[idx] {
                1
            } else {
                self.row_count
            };
            if values.len() != expected {
                return Err(format!(
                    "insert chunk for table {} column {} has {} elements, expected {}",
                    self.table_id,
                    self.column_ids[idx],
                    values.len(),
                    expected
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_fixed_width_rows() {
        let values = ColumnValues::Fixed4(vec![10, 20, 30, 40, 50]);
        let out = values.copy_rows(&[4, 0, 2], false);
        assert_eq!(out, ColumnValues::Fixed4(vec![50, 10, 30]));
    }

    #[test]
    fn gather_keeps_requested_order() {
        let values = ColumnValues::Fixed8(vec![1, 2, 3, 4]);
        let out = values.copy_rows(&[3, 1], false);
        assert_eq!(out, ColumnValues::Fixed8(vec![4, 2]));
    }

    #[test]
    fn gather_string_rows_are_independently_owned() {
        let values = ColumnValues::VarString(vec!["a".into(), "b".into(), "c".into()]);
        let out = values.copy_rows(&[2, 2], false);
        assert_eq!(out, ColumnValues::VarString(vec!["c".into(), "c".into()]));
        drop(values);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn gather_array_rows() {
        let values = ColumnValues::VarArray(vec![vec![1, 2], vec![3], vec![]]);
        let out = values.copy_rows(&[1, 0], false);
        assert_eq!(out, ColumnValues::VarArray(vec![vec![3], vec![1, 2]]));
    }

    #[test]
    fn default_payload_rebroadcasts_single_element() {
        let values = ColumnValues::Fixed2(vec![99]);
        // Row indices are ignored for broadcast payloads.
        let out = values.copy_rows(&[5, 6, 7], true);
        assert_eq!(out, ColumnValues::Fixed2(vec![99]));
    }

    #[test]
    fn element_width_per_class() {
        assert_eq!(ColumnValues::Fixed1(vec![0]).element_width(), Ok(1));
        assert_eq!(ColumnValues::Fixed2(vec![0]).element_width(), Ok(2));
        assert_eq!(ColumnValues::Fixed4(vec![0]).element_width(), Ok(4));
        assert_eq!(ColumnValues::Fixed8(vec![0]).element_width(), Ok(8));
        assert!(ColumnValues::VarString(vec![]).element_width().is_err());
        assert!(ColumnValues::VarArray(vec![]).element_width().is_err());
    }

    fn sample_chunk() -> InsertChunk {
        let mut chunk = InsertChunk::new(TableId::new(1), 3);
        chunk.push_column(
            ColumnId::new(1),
            ColumnValues::Fixed8(vec![7, 8, 9]),
            false,
        );
        chunk.push_column(ColumnId::new(2), ColumnValues::Fixed4(vec![42]), true);
        chunk
    }

    #[test]
    fn validate_accepts_consistent_chunk() {
        sample_chunk().validate().expect("chunk is well formed");
    }

    #[test]
    fn validate_rejects_duplicate_column_ids() {
        let mut chunk = sample_chunk();
        chunk.push_column(ColumnId::new(1), ColumnValues::Fixed1(vec![0, 1, 2]), false);
        let err = chunk.validate().expect_err("duplicate id");
        assert!(err.contains("repeats column id 1"), "err={}", err);
    }

    #[test]
    fn validate_rejects_short_payload() {
        let mut chunk = sample_chunk();
        chunk.push_column(ColumnId::new(3), ColumnValues::Fixed1(vec![0]), false);
        let err = chunk.validate().expect_err("length mismatch");
        assert!(err.contains("expected 3"), "err={}", err);
    }

    #[test]
    fn validate_rejects_multi_element_default_payload() {
        let mut chunk = sample_chunk();
        chunk.push_column(ColumnId::new(3), ColumnValues::Fixed1(vec![0, 1]), true);
        let err = chunk.validate().expect_err("broadcast payload must be 1 element");
        assert!(err.contains("expected 1"), "err={}", err);
    }

    #[test]
    fn column_index_by_id() {
        let chunk = sample_chunk();
        assert_eq!(chunk.column_index(ColumnId::new(2)), Some(1));
        assert_eq!(chunk.column_index(ColumnId::new(9)), None);
    }
}
