//! Read-only access to the ordered key-value record store.

mod cursor;
mod lmdb;
mod memory;

pub use cursor::*;
pub use lmdb::*;
pub use memory::*;

use crate::common::*;

/// The narrow cursor contract of an ordered key-value store.
///
/// Implementations only read. The pipeline never writes to a store.
pub trait StoreCursor: Send {
    /// Move to the first key in store order.
    fn seek_to_first(&mut self) -> Result<()>;

    /// Move to the next key in store order.
    ///
    /// The cursor becomes invalid when it moves past the last key.
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor points to an entry.
    fn valid(&self) -> bool;

    /// The value bytes at the cursor, or `None` if the cursor is invalid.
    fn value_bytes(&self) -> Option<&[u8]>;
}

impl<C> StoreCursor for Box<C>
where
    C: StoreCursor + ?Sized,
{
    fn seek_to_first(&mut self) -> Result<()> {
        (**self).seek_to_first()
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }

    fn valid(&self) -> bool {
        (**self).valid()
    }

    fn value_bytes(&self) -> Option<&[u8]> {
        (**self).value_bytes()
    }
}
