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
//! Builds the per-shard chunk for one bucket of a sharded insert.
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::catalog::{Catalog, ColumnDescriptor, TableDescriptor};
use crate::common::config;
use crate::exec::chunk::{ColumnValues, InsertChunk};

/// Copy `rows` of `source` into a self-contained chunk addressed to one
/// physical shard table.
///
/// Column resolution is positional by id: the physical replica may
/// order its columns differently from the logical table, so each source
/// column id is located in the logical column list and the physical
/// descriptor at that position is used. Columns are gathered
/// concurrently, one unit of work per column, capped by
/// `runtime.insert_copy_threads`; the first failure wins after every
/// worker has finished, and the failed bucket produces no chunk.
///
/// The returned chunk exclusively owns its gathered buffers and
/// preserves the source column order; broadcast columns stay broadcast.
pub fn copy_shard_chunk(
    catalog: &dyn Catalog,
    source: &InsertChunk,
    shard_table: &TableDescriptor,
    rows: &[usize],
) -> Result<InsertChunk, String> {
    let logical_columns = catalog.column_descriptors(source.table_id, true, true, true)?;
    let physical_columns = catalog.column_descriptors(shard_table.table_id, true, true, true)?;

    let mut resolved: Vec<&ColumnDescriptor> = Vec::with_capacity(source.column_count());
    for column_id in &source.column_ids {
        let position = logical_columns
            .iter()
            .position(|cd| cd.column_id == *column_id)
            .ok_or_else(|| {
                format!(
                    "column {} is not part of table {}",
                    column_id, source.table_id
                )
            })?;
        let physical = physical_columns.get(position).ok_or_else(|| {
            format!(
                "shard table '{}' has no column at position {} for column {}",
                shard_table.name, position, column_id
            )
        })?;
        resolved.push(physical);
    }

    let column_count = source.column_count();
    let copied: Vec<OnceLock<Result<ColumnValues, String>>> =
        (0..column_count).map(|_| OnceLock::new()).collect();
    let workers = config::insert_copy_threads().clamp(1, column_count.max(1));
    let next_column = AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let col = next_column.fetch_add(1, Ordering::Relaxed);
                    if col >= column_count {
                        break;
                    }
                    let _ = copied[col].set(copy_column(source, resolved[col], col, rows));
                }
            });
        }
    });

    // Assemble in source column order, carrying the physical replica's
    // column ids.
    let mut shard_chunk = InsertChunk::new(shard_table.table_id, rows.len());
    for (col, cell) in copied.into_iter().enumerate() {
        let values = cell
            .into_inner()
            .expect("every column copy worker completed")?;
        shard_chunk.push_column(resolved[col].column_id, values, source.is_default[col]);
    }
    Ok(shard_chunk)
}

fn copy_column(
    source: &InsertChunk,
    physical: &ColumnDescriptor,
    col: usize,
    rows: &[usize],
) -> Result<ColumnValues, String> {
    let values = &source.columns[col];
    let expected = physical.logical_type.storage_class();
    let actual = values.storage_class();
    if actual != expected {
        return Err(format!(
            "column {} payload is {:?} but physical column '{}' stores {:?}",
            source.column_ids[col], actual, physical.name, expected
        ));
    }
    Ok(values.copy_rows(rows, source.is_default[col]))
}
