//! The driver module centralizes the logic for
//! reading and writing data in the metadata store.
//!
//! It defines the traits a DB driver must implement to back
//! the survey collection.

use std::fmt;

pub mod rocksdb;
use self::rocksdb::{RocksDBDriver, RocksDBTransaction};

pub type KVBytes = (Box<[u8]>, Box<[u8]>);

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Failed to decode a serialized record. error: {}", source)]
    JsonDecoderFailed { source: anyhow::Error },

    #[error("Failed to encode a new serialized record. error: {}", source)]
    JsonEncoderFailed { source: anyhow::Error },

    #[error(transparent)]
    RocksDBFailure {
        #[from]
        source: self::rocksdb::Error,
    },
}

/// Writer defines all the write operations for a given driver.
pub trait Writer {
    /// Start a new Transaction in the database.
    fn transaction(&self) -> Transaction<'_>;
}

/// Reader defines all the read operations for a give driver.
pub trait Reader {
    // Get an item from the database.
    fn get<N, K>(&self, cf: N, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        N: AsRef<str>,
        K: AsRef<[u8]>;

    /// Iterate over the Key/Value pairs whose key starts with `prefix`.
    fn iter_prefix<'db, N>(
        &'db self,
        cf: N,
        prefix: &'db [u8],
        options: IterOptions,
    ) -> impl Iterator<Item = Result<KVBytes, Error>> + 'db
    where
        N: AsRef<str>;
}

/// Options that you can provide to iterate over a Key/Value pair.
pub enum IterOptions {
    RocksDB(::rocksdb::ReadOptions),
}

impl IterOptions {
    /// 4MB
    pub const DEFAULT_BLOCK_SIZE: usize = 4_194_304;

    pub fn new_rocksdb_options() -> Self {
        let mut read_options = ::rocksdb::ReadOptions::default();
        read_options.set_readahead_size(Self::DEFAULT_BLOCK_SIZE);

        IterOptions::RocksDB(read_options)
    }
}

impl Default for IterOptions {
    fn default() -> Self {
        Self::new_rocksdb_options()
    }
}

/// Multiple options to configure different database drivers.
///
/// The only option at the moment is RocksDB
#[non_exhaustive]
pub enum ConnectionOptions {
    RocksDB(self::rocksdb::Options),
}

/// Open a connection to a database.
pub fn open_database(options: ConnectionOptions) -> Result<RocksDBDriver, Error> {
    match options {
        ConnectionOptions::RocksDB(options) => RocksDBDriver::open(options).map_err(Into::into),
    }
}

/// Transaction is a wrapper around specific database transactions.
/// Since different databases have different transaction semantics,
/// this enum allow us to hide those semantics from the caller's
/// point of view.
pub enum Transaction<'db> {
    RocksDB(RocksDBTransaction<'db>),
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::RocksDB(_) => write!(f, "Transaction::RocksDB"),
        }
    }
}

impl<'db> Transaction<'db> {
    pub fn commit(self) -> Result<(), Error> {
        let Self::RocksDB(tx) = self;
        tx.commit()
    }

    /// Reads a key and locks it until the transaction finishes.
    pub fn get_for_update<N, K>(&self, cf: N, key: K) -> Result<Option<Vec<u8>>, Error>
    where
        N: AsRef<str>,
        K: AsRef<[u8]>,
    {
        let Self::RocksDB(tx) = self;
        tx.get_for_update(cf.as_ref(), key)
    }

    pub fn put<N, K, V>(&self, cf: N, key: K, value: V) -> Result<(), Error>
    where
        N: AsRef<str>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let Self::RocksDB(tx) = self;
        tx.put(cf.as_ref(), key, value)
    }

    pub fn delete<N, K>(&self, cf: N, key: K) -> Result<(), Error>
    where
        N: AsRef<str>,
        K: AsRef<[u8]>,
    {
        let Self::RocksDB(tx) = self;
        tx.delete(cf.as_ref(), key)
    }
}
