// Copyright (c) 2026-present
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Block store: the persistence seam between the engine and Postgres
//! (spec §6). Single-threaded, synchronous I/O throughout, matching the
//! no-concurrent-writers design this engine assumes (spec §5) — there is
//! no connection pool here, just one `postgres::Client` per dataset
//! operation.

use log::info;
use postgres::{Client, NoTls};

use crate::block::Block;
use crate::config::DbConfig;
use crate::error::Result;
use crate::metadata::DatasetDescriptor;
use crate::planner::{HeadRange, Overlap};

/// Persistence operations a dataset needs from its backing store.
///
/// Implementors own exactly one connection and are not `Send`; the engine
/// never shares a store across threads (spec §5: one writer, synchronous
/// I/O, no background compaction).
pub trait BlockStore {
    /// Creates `metadata_<name>` and `point_<name>` if they do not already
    /// exist, and writes `descriptor` into the former.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on any SQL failure.
    fn create_dataset(&mut self, descriptor: &DatasetDescriptor) -> Result<()>;

    /// Appends `blocks` to `point_<name>`. Blocks are written in the order
    /// given; the builder is responsible for head ordering.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on any SQL failure.
    fn append_blocks(&mut self, name: &str, blocks: &[Block]) -> Result<()>;

    /// Loads the descriptor for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] if the dataset does not
    /// exist or the row cannot be read, or
    /// [`crate::error::Error::CorruptDescriptor`] if the stored JSON fails
    /// validation.
    fn load_descriptor(&mut self, name: &str) -> Result<DatasetDescriptor>;

    /// Fetches every block whose head falls in one of `ranges`, or is one
    /// of `overlaps`, per the `sfc_head BETWEEN` / `sfc_head = ANY(...)`
    /// query shape in spec §6.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on any SQL failure.
    fn fetch_blocks(
        &mut self,
        name: &str,
        ranges: &[HeadRange],
        overlaps: &[Overlap],
    ) -> Result<Vec<Block>>;

    /// Streams every block of the dataset in head order, for export.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on any SQL failure.
    fn scan_all(&mut self, name: &str) -> Result<Vec<Block>>;
}

/// [`BlockStore`] backed by a synchronous `postgres::Client`.
pub struct PostgresBlockStore {
    client: Client,
}

impl PostgresBlockStore {
    /// Opens a connection using `config`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] if the connection cannot be
    /// established.
    pub fn connect(config: &DbConfig) -> Result<Self> {
        let client = Client::connect(&config.connection_string(), NoTls)?;
        Ok(Self { client })
    }

    fn metadata_table(name: &str) -> String {
        format!("metadata_{name}")
    }

    fn point_table(name: &str) -> String {
        format!("point_{name}")
    }
}

impl BlockStore for PostgresBlockStore {
    fn create_dataset(&mut self, descriptor: &DatasetDescriptor) -> Result<()> {
        let metadata_table = Self::metadata_table(&descriptor.name);
        let point_table = Self::point_table(&descriptor.name);

        self.client.batch_execute(&format!(
            "CREATE TABLE IF NOT EXISTS {metadata_table} (descriptor JSONB NOT NULL);
             CREATE TABLE IF NOT EXISTS {point_table} (
                 sfc_head BIGINT NOT NULL,
                 sfc_tail BIGINT NOT NULL,
                 z DOUBLE PRECISION NOT NULL
             );
             CREATE INDEX IF NOT EXISTS {point_table}_head_idx ON {point_table} (sfc_head);"
        ))?;

        self.client.execute(
            &format!("INSERT INTO {metadata_table} (descriptor) VALUES ($1)"),
            &[&descriptor.to_json()?],
        )?;

        info!("created dataset tables for {}", descriptor.name);
        Ok(())
    }

    fn append_blocks(&mut self, name: &str, blocks: &[Block]) -> Result<()> {
        let point_table = Self::point_table(name);
        let mut txn = self.client.transaction()?;
        {
            let statement = txn.prepare(&format!(
                "INSERT INTO {point_table} (sfc_head, sfc_tail, z) VALUES ($1, $2, $3)"
            ))?;
            for block in blocks {
                for (tail, z) in block.tails.iter().zip(&block.zs) {
                    txn.execute(&statement, &[&block.head, tail, z])?;
                }
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn load_descriptor(&mut self, name: &str) -> Result<DatasetDescriptor> {
        let metadata_table = Self::metadata_table(name);
        let row = self
            .client
            .query_one(&format!("SELECT descriptor FROM {metadata_table}"), &[])?;
        let text: String = row.get(0);
        DatasetDescriptor::from_json(&text)
    }

    fn fetch_blocks(
        &mut self,
        name: &str,
        ranges: &[HeadRange],
        overlaps: &[Overlap],
    ) -> Result<Vec<Block>> {
        let point_table = Self::point_table(name);
        let mut rows = Vec::new();

        if !ranges.is_empty() {
            let starts: Vec<i64> = ranges.iter().map(|r| r.start).collect();
            let ends: Vec<i64> = ranges.iter().map(|r| r.end).collect();
            let query = format!(
                "SELECT p.sfc_head, p.sfc_tail, p.z
                 FROM {point_table} p
                 JOIN UNNEST($1::bigint[], $2::bigint[]) AS r(lo, hi)
                   ON p.sfc_head BETWEEN r.lo AND r.hi
                 ORDER BY p.sfc_head, p.sfc_tail"
            );
            rows.extend(self.client.query(&query, &[&starts, &ends])?);
        }

        if !overlaps.is_empty() {
            let heads: Vec<i64> = overlaps.iter().map(|o| o.head).collect();
            let query = format!(
                "SELECT sfc_head, sfc_tail, z FROM {point_table}
                 WHERE sfc_head = ANY($1) ORDER BY sfc_head, sfc_tail"
            );
            rows.extend(self.client.query(&query, &[&heads])?);
        }

        Ok(rows_to_blocks(rows))
    }

    fn scan_all(&mut self, name: &str) -> Result<Vec<Block>> {
        let point_table = Self::point_table(name);
        let rows = self.client.query(
            &format!("SELECT sfc_head, sfc_tail, z FROM {point_table} ORDER BY sfc_head, sfc_tail"),
            &[],
        )?;
        Ok(rows_to_blocks(rows))
    }
}

fn rows_to_blocks(rows: Vec<postgres::Row>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for row in rows {
        let head: i64 = row.get(0);
        let tail: i64 = row.get(1);
        let z: f64 = row.get(2);
        match blocks.last_mut() {
            Some(b) if b.head == head => {
                b.tails.push(tail);
                b.zs.push(z);
            }
            _ => blocks.push(Block {
                head,
                tails: vec![tail],
                zs: vec![z],
            }),
        }
    }
    blocks
}
