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
//! Table and column metadata consumed by the insert distribution path.
//!
//! The engine does not own schema storage; it reads descriptors through
//! the [`Catalog`] trait. [`MemoryCatalog`] is the in-process
//! implementation used by tests and embedding callers.
use std::collections::HashMap;

use crate::common::ids::{ColumnId, TableId};

/// Semantic SQL type of a column, as recorded in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Date,
    Time,
    Timestamp,
    /// Dictionary-encoded text stores a fixed-width dictionary id;
    /// unencoded text stores the bytes themselves.
    Text { dict_encoded: bool },
    Array,
    Geometry,
}

impl LogicalType {
    /// Physical storage representation backing a column of this type.
    ///
    /// Every type classifies into exactly one storage class; kinds with
    /// no defined raw element width land in a variable-length class.
    pub fn storage_class(self) -> StorageClass {
        match self {
            LogicalType::Boolean | LogicalType::TinyInt => StorageClass::Fixed1,
            LogicalType::SmallInt => StorageClass::Fixed2,
            LogicalType::Int | LogicalType::Float => StorageClass::Fixed4,
            LogicalType::BigInt
            | LogicalType::Double
            | LogicalType::Decimal { .. }
            | LogicalType::Date
            | LogicalType::Time
            | LogicalType::Timestamp => StorageClass::Fixed8,
            LogicalType::Text { dict_encoded: true } => StorageClass::Fixed4,
            LogicalType::Text {
                dict_encoded: false,
            } => StorageClass::VarString,
            // Geometry is carried as rendered text until import materializes it.
            LogicalType::Geometry => StorageClass::VarString,
            LogicalType::Array => StorageClass::VarArray,
        }
    }

    /// Whether raw element bits must be interpreted as a signed integer
    /// when computing a shard bucket. Dictionary ids and boolean bits
    /// are unsigned; every other fixed-width scalar is stored signed.
    pub fn has_signed_values(self) -> bool {
        match self {
            LogicalType::TinyInt
            | LogicalType::SmallInt
            | LogicalType::Int
            | LogicalType::BigInt
            | LogicalType::Decimal { .. }
            | LogicalType::Date
            | LogicalType::Time
            | LogicalType::Timestamp => true,
            LogicalType::Boolean
            | LogicalType::Float
            | LogicalType::Double
            | LogicalType::Text { .. }
            | LogicalType::Array
            | LogicalType::Geometry => false,
        }
    }
}

/// Closed set of physical column storage representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Fixed1,
    Fixed2,
    Fixed4,
    Fixed8,
    VarString,
    VarArray,
}

impl StorageClass {
    /// Raw element width in bytes for fixed-width classes.
    pub fn element_width(self) -> Result<usize, String> {
        match self {
            StorageClass::Fixed1 => Ok(1),
            StorageClass::Fixed2 => Ok(2),
            StorageClass::Fixed4 => Ok(4),
            StorageClass::Fixed8 => Ok(8),
            StorageClass::VarString => {
                Err("string columns have variable length elements".to_string())
            }
            StorageClass::VarArray => {
                Err("array columns have variable length elements".to_string())
            }
        }
    }

    pub fn is_fixed_width(self) -> bool {
        !matches!(self, StorageClass::VarString | StorageClass::VarArray)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub column_id: ColumnId,
    pub name: String,
    pub logical_type: LogicalType,
    pub is_system: bool,
    pub is_virtual: bool,
    pub is_delete_marker: bool,
}

impl ColumnDescriptor {
    pub fn new(column_id: ColumnId, name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            column_id,
            name: name.into(),
            logical_type,
            is_system: false,
            is_virtual: false,
            is_delete_marker: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub table_id: TableId,
    pub name: String,
    /// 0 means the table is not sharded.
    pub shard_count: usize,
    pub shard_key: Option<ColumnId>,
}

impl TableDescriptor {
    pub fn unsharded(table_id: TableId, name: impl Into<String>) -> Self {
        Self {
            table_id,
            name: name.into(),
            shard_count: 0,
            shard_key: None,
        }
    }

    pub fn sharded(
        table_id: TableId,
        name: impl Into<String>,
        shard_count: usize,
        shard_key: ColumnId,
    ) -> Self {
        Self {
            table_id,
            name: name.into(),
            shard_count,
            shard_key: Some(shard_key),
        }
    }
}

/// Read-only schema access required by the insert path. The caller holds
/// whatever schema lock is needed for the duration of an insert call.
pub trait Catalog: Send + Sync {
    fn table(&self, table_id: TableId) -> Result<TableDescriptor, String>;

    /// Physical shard tables of a sharded logical table, ordered by
    /// shard index. Empty for unsharded tables.
    fn physical_shard_tables(&self, table_id: TableId) -> Result<Vec<TableDescriptor>, String>;

    /// Column descriptors in catalog order, filtered by the include
    /// flags for system, virtual and delete-marker columns.
    fn column_descriptors(
        &self,
        table_id: TableId,
        include_system: bool,
        include_virtual: bool,
        include_delete_marker: bool,
    ) -> Result<Vec<ColumnDescriptor>, String>;

    fn shard_key_column(&self, table_id: TableId) -> Result<Option<ColumnDescriptor>, String>;

    fn shard_count(&self, table_id: TableId) -> Result<usize, String> {
        Ok(self.table(table_id)?.shard_count)
    }
}

struct TableEntry {
    descriptor: TableDescriptor,
    columns: Vec<ColumnDescriptor>,
    physical_tables: Vec<TableId>,
}

/// In-memory catalog. Registration order of physical tables defines
/// their shard index.
#[derive(Default)]
pub struct MemoryCatalog {
    tables: HashMap<TableId, TableEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, descriptor: TableDescriptor, columns: Vec<ColumnDescriptor>) {
        self.tables.insert(
            descriptor.table_id,
            TableEntry {
                descriptor,
                columns,
                physical_tables: Vec::new(),
            },
        );
    }

    /// Attach an already registered table as the next physical shard of
    /// `logical`.
    pub fn add_physical_shard(&mut self, logical: TableId, physical: TableId) -> Result<(), String> {
        if !self.tables.contains_key(&physical) {
            return Err(format!("unknown physical table id {}", physical));
        }
        let entry = self
            .tables
            .get_mut(&logical)
            .ok_or_else(|| format!("unknown table id {}", logical))?;
        entry.physical_tables.push(physical);
        Ok(())
    }

    fn entry(&self, table_id: TableId) -> Result<&TableEntry, String> {
        self.tables
            .get(&table_id)
            .ok_or_else(|| format!("unknown table id {}", table_id))
    }
}

impl Catalog for MemoryCatalog {
    fn table(&self, table_id: TableId) -> Result<TableDescriptor, String> {
        Ok(self.entry(table_id)?.descriptor.clone())
    }

    fn physical_shard_tables(&self, table_id: TableId) -> Result<Vec<TableDescriptor>, String> {
        let entry = self.entry(table_id)?;
        entry
            .physical_tables
            .iter()
            .map(|id| self.table(*id))
            .collect()
    }

    fn column_descriptors(
        &self,
        table_id: TableId,
        include_system: bool,
        include_virtual: bool,
        include_delete_marker: bool,
    ) -> Result<Vec<ColumnDescriptor>, String> {
        let entry = self.entry(table_id)?;
        Ok(entry
            .columns
            .iter()
            .filter(|cd| {
                (include_system || !cd.is_system)
                    && (include_virtual || !cd.is_virtual)
                    && (include_delete_marker || !cd.is_delete_marker)
            })
            .cloned()
            .collect())
    }

    fn shard_key_column(&self, table_id: TableId) -> Result<Option<ColumnDescriptor>, String> {
        let entry = self.entry(table_id)?;
        let Some(key_id) = entry.descriptor.shard_key else {
            return Ok(None);
        };
        let cd = entry
            .columns
            .iter()
            .find(|cd| cd.column_id == key_id)
            .ok_or_else(|| {
                format!(
                    "table {} declares shard key column {} but has no such column",
                    entry.descriptor.name, key_id
                )
            })?;
        Ok(Some(cd.clone()))
    }
}
