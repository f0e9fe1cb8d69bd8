use crate::domain::{RegistryKind, Trade};
use crate::foundation::TradeError;
use crate::infrastructure::storage::rocks::schema::*;
use crate::infrastructure::storage::TradeStore;
use crate::storage_err;
use bincode::Options;
use log::{debug, info, trace};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options as RocksOptions, WriteBatch, DB};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct RocksTradeStore {
    db: Arc<DB>,
    // Serializes whole-collection rewrites.
    write_lock: Mutex<()>,
}

fn open_db_with_cfs(path: &Path) -> Result<DB, TradeError> {
    let mut options = RocksOptions::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_use_fsync(true);
    options.set_paranoid_checks(true);

    let cfs = vec![
        ColumnFamilyDescriptor::new(CF_DEFAULT, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_METADATA, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_PENDING_TRADES, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_CLOSED_TRADES, RocksOptions::default()),
        ColumnFamilyDescriptor::new(CF_FAILED_TRADES, RocksOptions::default()),
    ];

    DB::open_cf_descriptors(&options, path, cfs).map_err(|err| storage_err!("rocksdb open_cf_descriptors", err))
}

impl RocksTradeStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TradeError> {
        let path = path.as_ref();
        debug!("opening RocksTradeStore path={}", path.display());
        let db = open_db_with_cfs(path)?;
        let store = Self { db: Arc::new(db), write_lock: Mutex::new(()) };
        store.check_schema_version()?;
        info!("RocksTradeStore opened path={}", path.display());
        Ok(store)
    }

    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self, TradeError> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| storage_err!("fs::create_dir_all open_in_dir", err))?;
        Self::open(dir.join(DB_DIR_NAME))
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily, TradeError> {
        self.db.cf_handle(name).ok_or_else(|| TradeError::StorageError {
            operation: "rocksdb cf_handle".to_string(),
            details: format!("missing column family: {}", name),
        })
    }

    fn check_schema_version(&self) -> Result<(), TradeError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, KEY_SCHEMA_VERSION).map_err(|err| storage_err!("rocksdb get_cf schema_version", err))? {
            None => {
                info!("initializing fresh trade db schema_version={}", SCHEMA_VERSION);
                self.db
                    .put_cf(cf, KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_be_bytes())
                    .map_err(|err| storage_err!("rocksdb put_cf schema_version", err))
            }
            Some(bytes) => {
                let array: [u8; 4] =
                    bytes.as_slice().try_into().map_err(|_| storage_err!("schema_version decode", "corrupt schema version"))?;
                let stored = u32::from_be_bytes(array);
                if stored != SCHEMA_VERSION {
                    return Err(TradeError::StorageError {
                        operation: "schema_version check".to_string(),
                        details: format!("stored={} current={}", stored, SCHEMA_VERSION),
                    });
                }
                Ok(())
            }
        }
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TradeError> {
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(value).map_err(|err| err.into())
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, TradeError> {
        bincode::DefaultOptions::new().with_fixint_encoding().deserialize(bytes).map_err(|err| err.into())
    }
}

impl TradeStore for RocksTradeStore {
    fn load(&self, kind: RegistryKind) -> Result<Vec<Trade>, TradeError> {
        let cf = self.cf_handle(cf_for(kind))?;
        let mut trades = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|err| storage_err!("rocksdb iterator_cf", err))?;
            trades.push(Self::decode::<Trade>(&value)?);
        }
        debug!("trades loaded kind={} count={}", kind, trades.len());
        Ok(trades)
    }

    fn save(&self, kind: RegistryKind, trades: &[Trade]) -> Result<(), TradeError> {
        let _guard = self.write_lock.lock().map_err(|_| storage_err!("rocks trade store lock", "poisoned"))?;
        let cf = self.cf_handle(cf_for(kind))?;

        let keep: HashSet<&[u8]> = trades.iter().map(|trade| trade.id.as_str().as_bytes()).collect();
        let mut batch = WriteBatch::default();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item.map_err(|err| storage_err!("rocksdb iterator_cf", err))?;
            if !keep.contains(key.as_ref()) {
                trace!("removing stale trade key kind={} key={}", kind, String::from_utf8_lossy(&key));
                batch.delete_cf(cf, key);
            }
        }
        for trade in trades {
            batch.put_cf(cf, trade.id.as_str().as_bytes(), Self::encode(trade)?);
        }
        self.db.write(batch).map_err(|err| storage_err!("rocksdb write batch", err))?;
        debug!("trades saved kind={} count={}", kind, trades.len());
        Ok(())
    }
}
