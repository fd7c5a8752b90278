//! # redb-backed Registry Storage
//!
//! Durable storage for the desk using the redb embedded database, giving
//! ACID commits and crash safety (copy-on-write B-trees) with zero
//! configuration.
//!
//! ## Layout
//!
//! The large, frequently listed collections get a table each, keyed by
//! record id. The smaller books are stored whole under a name in the
//! `sections` table. Every value is postcard-encoded.
//!
//! A save rewrites every table inside one write transaction, so a commit
//! is visible entirely or not at all.

use crate::primitives::FORMAT_VERSION;
use crate::registry::Registry;
use crate::{AllocationId, AssetId, ChecklistId, DeskError, RoomId};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Assets: AssetId(u64) -> serialized Asset
const ASSETS: TableDefinition<u64, &[u8]> = TableDefinition::new("assets");

/// Rooms: RoomId(u64) -> serialized Room
const ROOMS: TableDefinition<u64, &[u8]> = TableDefinition::new("rooms");

/// Allocations: AllocationId(u64) -> serialized AllocationRecord
const ALLOCATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("allocations");

/// Checklists: ChecklistId(u64) -> serialized Checklist
const CHECKLISTS: TableDefinition<u64, &[u8]> = TableDefinition::new("checklists");

/// Whole sections: name -> serialized value
const SECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sections");

/// Metadata: key -> u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_ID_KEY: &str = "next_id";
const FORMAT_KEY: &str = "format_version";

fn io_err(e: impl std::fmt::Display) -> DeskError {
    DeskError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DeskError> {
    postcard::to_stdvec(value).map_err(|e| DeskError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DeskError> {
    postcard::from_bytes(bytes).map_err(|e| DeskError::DeserializationError(e.to_string()))
}

/// A disk-backed registry store.
pub struct RedbRegistry {
    db: Database,
}

impl std::fmt::Debug for RedbRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbRegistry").finish_non_exhaustive()
    }
}

impl RedbRegistry {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeskError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            for table in [ASSETS, ROOMS, ALLOCATIONS, CHECKLISTS] {
                let _ = write_txn.open_table(table).map_err(io_err)?;
            }
            let _ = write_txn.open_table(SECTIONS).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            if meta.get(FORMAT_KEY).map_err(io_err)?.is_none() {
                meta.insert(FORMAT_KEY, u64::from(FORMAT_VERSION))
                    .map_err(io_err)?;
            }
            drop(meta);
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Read the whole registry.
    pub fn load(&self) -> Result<Registry, DeskError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let mut registry = Registry::default();

        {
            let meta = read_txn.open_table(METADATA).map_err(io_err)?;
            let version = meta
                .get(FORMAT_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(u64::from(FORMAT_VERSION));
            if version != u64::from(FORMAT_VERSION) {
                return Err(DeskError::DeserializationError(format!(
                    "Unsupported version: {} (expected {})",
                    version, FORMAT_VERSION
                )));
            }
            registry.next_id = meta
                .get(NEXT_ID_KEY)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
        }

        registry.assets = read_keyed(&read_txn, ASSETS, AssetId)?;
        registry.rooms = read_keyed(&read_txn, ROOMS, RoomId)?;
        registry.allocations = read_keyed(&read_txn, ALLOCATIONS, AllocationId)?;
        registry.checklists = read_keyed(&read_txn, CHECKLISTS, ChecklistId)?;

        let sections = read_txn.open_table(SECTIONS).map_err(io_err)?;
        let section = |name: &str| -> Result<Option<Vec<u8>>, DeskError> {
            Ok(sections
                .get(name)
                .map_err(io_err)?
                .map(|v| v.value().to_vec()))
        };
        macro_rules! load_section {
            ($($field:ident),+ $(,)?) => {
                $(
                    if let Some(bytes) = section(stringify!($field))? {
                        registry.$field = decode(&bytes)?;
                    }
                )+
            };
        }
        load_section!(
            employees,
            room_types,
            follow_ups,
            custody,
            clearances,
            fleet,
            maintenance,
            tickets,
            outbox,
            recipients,
            sequencer,
        );

        Ok(registry)
    }

    /// Replace the stored registry in a single write transaction.
    pub fn save(&self, registry: &Registry) -> Result<(), DeskError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;

        write_keyed(&write_txn, ASSETS, registry.assets.iter().map(|(k, v)| (k.0, v)))?;
        write_keyed(&write_txn, ROOMS, registry.rooms.iter().map(|(k, v)| (k.0, v)))?;
        write_keyed(
            &write_txn,
            ALLOCATIONS,
            registry.allocations.iter().map(|(k, v)| (k.0, v)),
        )?;
        write_keyed(
            &write_txn,
            CHECKLISTS,
            registry.checklists.iter().map(|(k, v)| (k.0, v)),
        )?;

        {
            let mut sections = write_txn.open_table(SECTIONS).map_err(io_err)?;
            let mut put = |name: &str, bytes: Vec<u8>| -> Result<(), DeskError> {
                sections.insert(name, bytes.as_slice()).map_err(io_err)?;
                Ok(())
            };
            put("employees", encode(&registry.employees)?)?;
            put("room_types", encode(&registry.room_types)?)?;
            put("follow_ups", encode(&registry.follow_ups)?)?;
            put("custody", encode(&registry.custody)?)?;
            put("clearances", encode(&registry.clearances)?)?;
            put("fleet", encode(&registry.fleet)?)?;
            put("maintenance", encode(&registry.maintenance)?)?;
            put("tickets", encode(&registry.tickets)?)?;
            put("outbox", encode(&registry.outbox)?)?;
            put("recipients", encode(&registry.recipients)?)?;
            put("sequencer", encode(&registry.sequencer)?)?;

            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(NEXT_ID_KEY, registry.next_id).map_err(io_err)?;
            meta.insert(FORMAT_KEY, u64::from(FORMAT_VERSION))
                .map_err(io_err)?;
        }

        write_txn.commit().map_err(io_err)?;
        Ok(())
    }
}

fn read_keyed<K: Ord, T: DeserializeOwned>(
    txn: &ReadTransaction,
    definition: TableDefinition<'static, u64, &'static [u8]>,
    key: fn(u64) -> K,
) -> Result<BTreeMap<K, T>, DeskError> {
    let table = txn.open_table(definition).map_err(io_err)?;
    let mut out = BTreeMap::new();
    for entry in table.iter().map_err(io_err)? {
        let (k, v) = entry.map_err(io_err)?;
        out.insert(key(k.value()), decode(v.value())?);
    }
    Ok(out)
}

/// Clear `definition` and write every record anew.
fn write_keyed<'a, T: Serialize + 'a>(
    txn: &WriteTransaction,
    definition: TableDefinition<'static, u64, &'static [u8]>,
    records: impl Iterator<Item = (u64, &'a T)>,
) -> Result<(), DeskError> {
    txn.delete_table(definition).map_err(io_err)?;
    let mut table = txn.open_table(definition).map_err(io_err)?;
    for (id, record) in records {
        let bytes = encode(record)?;
        table.insert(id, bytes.as_slice()).map_err(io_err)?;
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
