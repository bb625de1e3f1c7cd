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
//! Entry point of the insert distribution path.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::catalog::{Catalog, TableDescriptor};
use crate::common::config;
use crate::exec::chunk::InsertChunk;
use crate::runtime::leaf_router::{LeafConnector, LeafRouter};
use crate::runtime::shard_copy::copy_shard_chunk;
use crate::runtime::shard_router::{self, BucketRows};

/// Distributes insert chunks across shard tables and leaf nodes.
///
/// Unsharded tables take the rotation path: each chunk goes whole to
/// the next leaf in turn. Sharded tables are split by shard key into
/// per-bucket chunks that are built and dispatched concurrently, one
/// worker per non-empty bucket. A failed dispatch fails the call, but
/// only after every in-flight bucket has been awaited.
pub struct InsertDistributor {
    catalog: Arc<dyn Catalog>,
    router: LeafRouter,
}

impl InsertDistributor {
    pub fn new(catalog: Arc<dyn Catalog>, connector: Arc<dyn LeafConnector>) -> Self {
        Self {
            catalog,
            router: LeafRouter::new(connector),
        }
    }

    pub fn router(&self) -> &LeafRouter {
        &self.router
    }

    pub fn insert_chunk(&self, chunk: InsertChunk) -> Result<(), String> {
        chunk.validate()?;
        let table = self.catalog.table(chunk.table_id)?;
        if table.shard_count == 0 {
            let leaf_index = self.router.next_leaf();
            debug!(
                target: "mudstone::insert",
                table_id = %chunk.table_id,
                leaf_index,
                rows = chunk.row_count,
                "unsharded insert"
            );
            return self.router.dispatch(leaf_index, chunk);
        }
        self.insert_sharded(&table, &chunk)
    }

    fn insert_sharded(&self, table: &TableDescriptor, chunk: &InsertChunk) -> Result<(), String> {
        let leaf_count = self.router.leaf_count();
        let buckets = self.route_to_buckets(table, chunk, leaf_count)?;
        let shard_tables = self.catalog.physical_shard_tables(chunk.table_id)?;
        if shard_tables.len() != table.shard_count {
            return Err(format!(
                "table '{}' declares {} shards but the catalog lists {} physical tables",
                table.name,
                table.shard_count,
                shard_tables.len()
            ));
        }

        let occupied: Vec<(usize, &Vec<usize>)> = buckets
            .iter()
            .enumerate()
            .filter(|(_, rows)| !rows.is_empty())
            .collect();
        info!(
            target: "mudstone::insert",
            table_id = %chunk.table_id,
            rows = chunk.row_count,
            buckets = buckets.len(),
            occupied = occupied.len(),
            "sharded insert fan-out"
        );
        if occupied.is_empty() {
            return Ok(());
        }

        let workers = match config::insert_dispatch_threads() {
            0 => occupied.len(),
            cap => cap.min(occupied.len()),
        };
        let next_bucket = AtomicUsize::new(0);
        let first_error: Mutex<Option<String>> = Mutex::new(None);
        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    loop {
                        let i = next_bucket.fetch_add(1, Ordering::Relaxed);
                        let Some(&(bucket, rows)) = occupied.get(i) else {
                            break;
                        };
                        let outcome =
                            self.copy_and_dispatch(table, &shard_tables, chunk, bucket, rows);
                        if let Err(err) = outcome {
                            let mut slot =
                                first_error.lock().unwrap_or_else(|e| e.into_inner());
                            if slot.is_none() {
                                *slot = Some(err);
                            }
                        }
                    }
                });
            }
        });
        match first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Validate the shard key column and assign every row to a bucket.
    /// Runs before any dispatch; a failure here means nothing was sent.
    fn route_to_buckets(
        &self,
        table: &TableDescriptor,
        chunk: &InsertChunk,
        leaf_count: usize,
    ) -> Result<BucketRows, String> {
        let key_column = self
            .catalog
            .shard_key_column(chunk.table_id)?
            .ok_or_else(|| {
                format!(
                    "table '{}' is sharded but has no shard key column",
                    table.name
                )
            })?;
        let key_index = chunk.column_index(key_column.column_id).ok_or_else(|| {
            format!(
                "insert chunk for table '{}' is missing shard key column '{}'",
                table.name, key_column.name
            )
        })?;
        if !key_column.logical_type.storage_class().is_fixed_width() {
            return Err(format!(
                "shard key column '{}' of table '{}' has type {:?}, which cannot be sharded on",
                key_column.name, table.name, key_column.logical_type
            ));
        }
        Ok(shard_router::route_rows(
            &chunk.columns[key_index],
            key_column.logical_type.has_signed_values(),
            chunk.row_count,
            table.shard_count,
            leaf_count,
            chunk.is_default[key_index],
        ))
    }

    fn copy_and_dispatch(
        &self,
        table: &TableDescriptor,
        shard_tables: &[TableDescriptor],
        chunk: &InsertChunk,
        bucket: usize,
        rows: &[usize],
    ) -> Result<(), String> {
        let shard_table_index = bucket % table.shard_count;
        let leaf_index = bucket / table.shard_count;
        let shard_chunk = copy_shard_chunk(
            self.catalog.as_ref(),
            chunk,
            &shard_tables[shard_table_index],
            rows,
        )?;
        debug!(
            target: "mudstone::insert",
            table_id = %chunk.table_id,
            bucket,
            shard_table_index,
            leaf_index,
            rows = rows.len(),
            "dispatch shard rows"
        );
        self.router.dispatch(leaf_index, shard_chunk)
    }
}
