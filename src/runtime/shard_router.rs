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
//! Row-to-bucket assignment for sharded tables.
//!
//! A bucket is one (shard table, leaf) pair, numbered in
//! `[0, shard_count * leaf_count)`: bucket `b` maps to shard table
//! `b % shard_count` on leaf `b / shard_count`.
use crate::exec::chunk::ColumnValues;

/// Per-bucket row index lists, each in ascending source-row order.
pub type BucketRows = Vec<Vec<usize>>;

/// Assign every row of a chunk to a bucket by its shard key value.
///
/// Signed key types use `((key % n) + n) % n` so negative keys still
/// land in `[0, n)`; unsigned key types take the plain remainder. When
/// `is_default` is set the key payload holds one broadcast value and
/// all `row_count` rows go to that value's bucket.
///
/// The insert path validates the key column up front; a variable-length
/// key payload here is a logic error and panics.
pub fn route_rows(
    key: &ColumnValues,
    signed_key: bool,
    row_count: usize,
    shard_count: usize,
    leaf_count: usize,
    is_default: bool,
) -> BucketRows {
    let n_buckets = shard_count * leaf_count;
    assert!(n_buckets > 0, "bucket count must be positive");

    match key {
        ColumnValues::Fixed1(values) => fill_buckets(values, row_count, n_buckets, is_default, |v| {
            if signed_key {
                signed_bucket(v as i8 as i64, n_buckets)
            } else {
                unsigned_bucket(v as u64, n_buckets)
            }
        }),
        ColumnValues::Fixed2(values) => fill_buckets(values, row_count, n_buckets, is_default, |v| {
            if signed_key {
                signed_bucket(v as i16 as i64, n_buckets)
            } else {
                unsigned_bucket(v as u64, n_buckets)
            }
        }),
        ColumnValues::Fixed4(values) => fill_buckets(values, row_count, n_buckets, is_default, |v| {
            if signed_key {
                signed_bucket(v as i32 as i64, n_buckets)
            } else {
                unsigned_bucket(v as u64, n_buckets)
            }
        }),
        ColumnValues::Fixed8(values) => fill_buckets(values, row_count, n_buckets, is_default, |v| {
            if signed_key {
                signed_bucket(v as i64, n_buckets)
            } else {
                unsigned_bucket(v, n_buckets)
            }
        }),
        ColumnValues::VarString(_) | ColumnValues::VarArray(_) => {
            panic!("shard key column must have fixed width elements")
        }
    }
}

fn fill_buckets<T: Copy>(
    values: &[T],
    row_count: usize,
    n_buckets: usize,
    is_default: bool,
    bucket_of: impl Fn(T) -> usize,
) -> BucketRows {
    let mut buckets: BucketRows = vec![Vec::new(); n_buckets];
    if is_default {
        // One broadcast key value: a single bucket takes every row.
        let rows = &mut buckets[bucket_of(values[0])];
        rows.reserve(row_count);
        rows.extend(0..row_count);
    } else {
        for row in 0..row_count {
            buckets[bucket_of(values[row])].push(row);
        }
    }
    buckets
}

fn unsigned_bucket(key: u64, n_buckets: usize) -> usize {
    (key % n_buckets as u64) as usize
}

fn signed_bucket(key: i64, n_buckets: usize) -> usize {
    let n = n_buckets as i64;
    (((key % n) + n) % n) as usize
}
