use super::StoreCursor;
use crate::common::*;
use heed::{types::Bytes, Database, Env, EnvFlags, EnvOpenOptions};

/// A read-only cursor over the main database of an LMDB environment.
///
/// Each movement runs in its own short read transaction. The cursor keeps
/// a copy of the current entry, so it holds no transaction between calls.
pub struct LmdbCursor {
    env: Env,
    db: Database<Bytes, Bytes>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl LmdbCursor {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::Io {
                path: path.to_owned(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "LMDB environment directory not found",
                ),
            });
        }

        let mut options = EnvOpenOptions::new();
        // SAFETY: the environment is opened read-only and is not opened
        // twice by this process.
        let env = unsafe { options.flags(EnvFlags::READ_ONLY).open(path)? };

        let rtxn = env.read_txn()?;
        let db: Database<Bytes, Bytes> = env
            .open_database(&rtxn, None)?
            .ok_or(Error::StoreExhausted)?;
        rtxn.commit()?;

        info!("opened LMDB record store '{}'", path.display());

        Ok(Self {
            env,
            db,
            current: None,
        })
    }

    /// The number of entries in the store.
    pub fn len(&self) -> Result<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.db.len(&rtxn)?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Debug for LmdbCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbCursor")
            .field("path", &self.env.path())
            .field("valid", &self.current.is_some())
            .finish()
    }
}

impl StoreCursor for LmdbCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        let rtxn = self.env.read_txn()?;
        self.current = self
            .db
            .first(&rtxn)?
            .map(|(key, value)| (key.to_vec(), value.to_vec()));
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let next = match &self.current {
            Some((key, _)) => {
                let rtxn = self.env.read_txn()?;
                self.db
                    .get_greater_than(&rtxn, key.as_slice())?
                    .map(|(key, value)| (key.to_vec(), value.to_vec()))
            }
            None => return Ok(()),
        };
        self.current = next;
        Ok(())
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn value_bytes(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(_, value)| value.as_slice())
    }
}
