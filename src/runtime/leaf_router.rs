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
//! Leaf selection and chunk hand-off to the storage layer.
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::exec::chunk::InsertChunk;

/// Storage collaborator owning the physical placement of chunks on leaf
/// nodes. Synchronous from the dispatching task's point of view; the
/// router neither retries nor transforms its result.
pub trait LeafConnector: Send + Sync {
    fn leaf_count(&self) -> usize;

    fn insert_to_leaf(&self, leaf_index: usize, chunk: InsertChunk) -> Result<(), String>;
}

/// Routes chunks to leaves. Owns the only piece of cross-insert mutable
/// state in the distribution path: the rotation cursor handing
/// unsharded inserts to leaves in turn.
pub struct LeafRouter {
    connector: Arc<dyn LeafConnector>,
    cursor: Mutex<usize>,
}

impl LeafRouter {
    pub fn new(connector: Arc<dyn LeafConnector>) -> Self {
        Self {
            connector,
            cursor: Mutex::new(0),
        }
    }

    pub fn leaf_count(&self) -> usize {
        self.connector.leaf_count()
    }

    /// Return the leaf next in rotation and advance the cursor with
    /// wraparound. The advance is unconditional; it sticks even if the
    /// dispatch that follows fails.
    pub fn next_leaf(&self) -> usize {
        let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let leaf_index = *cursor;
        *cursor += 1;
        if *cursor >= self.connector.leaf_count() {
            *cursor = 0;
        }
        leaf_index
    }

    pub fn dispatch(&self, leaf_index: usize, chunk: InsertChunk) -> Result<(), String> {
        debug!(
            target: "mudstone::insert",
            leaf_index,
            table_id = %chunk.table_id,
            rows = chunk.row_count,
            "dispatch chunk to leaf"
        );
        self.connector.insert_to_leaf(leaf_index, chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullConnector {
        leaves: usize,
    }

    impl LeafConnector for NullConnector {
        fn leaf_count(&self) -> usize {
            self.leaves
        }

        fn insert_to_leaf(&self, _leaf_index: usize, _chunk: InsertChunk) -> Result<(), String> {
            Ok(())
        }
    }

    fn router(leaves: usize) -> LeafRouter {
        LeafRouter::new(Arc::new(NullConnector { leaves }))
    }

    #[test]
    fn rotation_is_cyclic_under_sequential_calls() {
        let router = router(3);
        let observed: Vec<usize> = (0..9).map(|_| router.next_leaf()).collect();
        assert_eq!(observed, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn rotation_is_fair() {
        let router = router(4);
        let mut counts = [0usize; 4];
        for _ in 0..40 {
            counts[router.next_leaf()] += 1;
        }
        assert_eq!(counts, [10, 10, 10, 10]);
    }

    #[test]
    fn single_leaf_always_wins() {
        let router = router(1);
        for _ in 0..5 {
            assert_eq!(router.next_leaf(), 0);
        }
    }

    #[test]
    fn concurrent_calls_never_observe_the_same_value() {
        let router = Arc::new(router(64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let router = Arc::clone(&router);
            handles.push(std::thread::spawn(move || {
                (0..8).map(|_| router.next_leaf()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<usize> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("worker finished"))
            .collect();
        // 64 calls against 64 leaves must cover every leaf exactly once.
        all.sort_unstable();
        assert_eq!(all, (0..64).collect::<Vec<_>>());
    }
}
