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
//! Common utilities and helpers for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::TempDir;

use mudstone::{
    Catalog, ColumnDescriptor, ColumnId, InsertChunk, LeafConnector, LogicalType, MemoryCatalog,
    TableDescriptor, TableId,
};
use mudstone::{mudstone_config, mudstone_logging};

/// Logical table id used by the fixtures below.
pub const LOGICAL_TABLE: TableId = TableId(1);

/// Test configuration for integration tests.
pub struct TestConfig {
    /// Temporary directory for test artifacts
    pub temp_dir: TempDir,
    /// Test config path
    pub config_path: PathBuf,
}

impl TestConfig {
    /// Create a new test configuration with default settings.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("test_mudstone.toml");

        let config_content = r#"
log_level = "debug"

[runtime]
insert_copy_threads = 2
insert_dispatch_threads = 4
"#;
        std::fs::write(&config_path, config_content)?;

        Ok(Self {
            temp_dir,
            config_path,
        })
    }

    /// Initialize logging for tests.
    pub fn init_logging(&self) {
        mudstone_logging::init_with_level("debug");
    }

    /// Load the test configuration.
    pub fn load_config(&self) -> anyhow::Result<&'static mudstone_config::MudstoneConfig> {
        mudstone_config::init_from_path(&self.config_path)
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new().expect("Failed to create test config")
    }
}

/// Storage stand-in recording every dispatched chunk.
pub struct RecordingConnector {
    leaves: usize,
    dispatched: Mutex<Vec<(usize, InsertChunk)>>,
}

impl RecordingConnector {
    pub fn new(leaves: usize) -> Self {
        Self {
            leaves,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatched(&self) -> Vec<(usize, InsertChunk)> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl LeafConnector for RecordingConnector {
    fn leaf_count(&self) -> usize {
        self.leaves
    }

    fn insert_to_leaf(&self, leaf_index: usize, chunk: InsertChunk) -> Result<(), String> {
        self.dispatched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((leaf_index, chunk));
        Ok(())
    }
}

pub fn standard_columns(key_type: LogicalType) -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new(ColumnId::new(1), "id", key_type),
        ColumnDescriptor::new(
            ColumnId::new(2),
            "label",
            LogicalType::Text {
                dict_encoded: false,
            },
        ),
    ]
}

/// Unsharded table with the standard two columns.
pub fn unsharded_catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.add_table(
        TableDescriptor::unsharded(LOGICAL_TABLE, "plain"),
        standard_columns(LogicalType::BigInt),
    );
    catalog
}

/// Sharded table whose physical shard tables get ids 100, 101, ...
pub fn sharded_catalog(shard_count: usize, key_type: LogicalType) -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.add_table(
        TableDescriptor::sharded(LOGICAL_TABLE, "events", shard_count, ColumnId::new(1)),
        standard_columns(key_type),
    );
    for shard in 0..shard_count {
        let id = TableId::new(100 + shard as u32);
        catalog.add_table(
            TableDescriptor::unsharded(id, format!("events${}", shard)),
            standard_columns(key_type),
        );
        catalog
            .add_physical_shard(LOGICAL_TABLE, id)
            .expect("attach physical shard");
    }
    catalog
}

/// Shard index of a physical table created by [`sharded_catalog`].
pub fn shard_index_of(catalog: &MemoryCatalog, table_id: TableId) -> usize {
    catalog
        .physical_shard_tables(LOGICAL_TABLE)
        .expect("physical shard tables")
        .iter()
        .position(|td| td.table_id == table_id)
        .expect("dispatched chunk targets a known shard table")
}
