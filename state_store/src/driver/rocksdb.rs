use std::path::PathBuf;

use ::rocksdb::{
    ColumnFamily,
    ColumnFamilyDescriptor,
    Direction,
    Error as RocksDBError,
    IteratorMode,
    Options as RocksDBOptions,
    Transaction,
    TransactionDB,
    TransactionDBOptions,
};
use survey_utils::OptionInspectNone;
use tracing::error;

use super::{Error as DriverError, IterOptions, KVBytes, Reader, Writer};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to open RocksDB database. error: {}", source)]
    OpenDatabaseFailed { source: RocksDBError },

    #[error("Column family {name} is not registered")]
    MissingColumnFamily { name: String },

    #[error(transparent)]
    GenericRocksDBFailure { source: RocksDBError },
}

impl Error {
    fn into_generic(source: RocksDBError) -> DriverError {
        Self::GenericRocksDBFailure { source }.into()
    }
}

/// Options to start a connection with RocksDB.
pub struct Options {
    pub path: PathBuf,
    pub column_families: Vec<ColumnFamilyDescriptor>,
}

/// Driver to connect with a RocksDB database.
pub struct RocksDBDriver {
    db: TransactionDB,
}

impl RocksDBDriver {
    /// Open a new connection with a RocksDB database.
    pub(crate) fn open(driver_options: Options) -> Result<RocksDBDriver, Error> {
        let mut db_opts = RocksDBOptions::default();
        db_opts.create_missing_column_families(true);
        db_opts.create_if_missing(true);

        let db = TransactionDB::open_cf_descriptors(
            &db_opts,
            &TransactionDBOptions::default(),
            &driver_options.path,
            driver_options.column_families,
        )
        .map_err(|source| Error::OpenDatabaseFailed { source })?;

        Ok(RocksDBDriver { db })
    }

    fn column_family(&self, name: &str) -> Result<&ColumnFamily, DriverError> {
        self.db
            .cf_handle(name)
            .inspect_none(|| {
                error!("failed to get column family handle for {}", name);
            })
            .ok_or_else(|| {
                Error::MissingColumnFamily {
                    name: name.to_string(),
                }
                .into()
            })
    }
}

impl Writer for RocksDBDriver {
    fn transaction(&self) -> super::Transaction<'_> {
        let tx = self.db.transaction();

        super::Transaction::RocksDB(RocksDBTransaction { db: self, tx })
    }
}

impl Reader for RocksDBDriver {
    fn get<N, K>(&self, cf: N, key: K) -> Result<Option<Vec<u8>>, DriverError>
    where
        N: AsRef<str>,
        K: AsRef<[u8]>,
    {
        let cf = self.column_family(cf.as_ref())?;
        self.db.get_cf(cf, key).map_err(Error::into_generic)
    }

    fn iter_prefix<'db, N>(
        &'db self,
        cf: N,
        prefix: &'db [u8],
        options: IterOptions,
    ) -> impl Iterator<Item = Result<KVBytes, DriverError>> + 'db
    where
        N: AsRef<str>,
    {
        let IterOptions::RocksDB(read_options) = options;

        // A missing column family yields a single error item.
        let (head, iter) = match self.column_family(cf.as_ref()) {
            Ok(cf) => {
                let mode = IteratorMode::From(prefix, Direction::Forward);
                (None, Some(self.db.iterator_cf_opt(cf, read_options, mode)))
            }
            Err(err) => (Some(Err(err)), None),
        };

        let rows = iter
            .into_iter()
            .flatten()
            .map(|item| item.map_err(Error::into_generic))
            .take_while(move |item| match item {
                Ok((key, _)) => key.starts_with(prefix),
                Err(_) => true,
            });
        head.into_iter().chain(rows)
    }
}

pub struct RocksDBTransaction<'a> {
    db: &'a RocksDBDriver,
    tx: Transaction<'a, TransactionDB>,
}

impl<'a> RocksDBTransaction<'a> {
    pub fn commit(self) -> Result<(), DriverError> {
        self.tx.commit().map_err(Error::into_generic)
    }

    pub fn get_for_update<K: AsRef<[u8]>>(
        &self,
        table: &str,
        key: K,
    ) -> Result<Option<Vec<u8>>, DriverError> {
        let cf = self.db.column_family(table)?;
        self.tx
            .get_for_update_cf(cf, key, true)
            .map_err(Error::into_generic)
    }

    pub fn put<K: AsRef<[u8]>, V: AsRef<[u8]>>(
        &self,
        table: &str,
        key: K,
        value: V,
    ) -> Result<(), DriverError> {
        let cf = self.db.column_family(table)?;
        self.tx.put_cf(cf, key, value).map_err(Error::into_generic)
    }

    pub fn delete<K: AsRef<[u8]>>(&self, table: &str, key: K) -> Result<(), DriverError> {
        let cf = self.db.column_family(table)?;
        self.tx.delete_cf(cf, key).map_err(Error::into_generic)
    }
}
