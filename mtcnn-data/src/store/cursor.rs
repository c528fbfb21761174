use super::StoreCursor;
use crate::common::*;

/// A cyclic cursor over a record store.
///
/// It restarts from the first key after the last one, so the store is seen
/// as an infinite stream. The logical offset counts every [`advance`] call,
/// wraparounds included, and never resets.
///
/// [`advance`]: RecordCursor::advance
#[derive(Debug)]
pub struct RecordCursor<C> {
    inner: C,
    offset: u64,
}

impl<C> RecordCursor<C>
where
    C: StoreCursor,
{
    /// Position the cursor at the first record.
    ///
    /// It fails with [`Error::StoreExhausted`] if the store is empty.
    pub fn open(mut inner: C) -> Result<Self> {
        inner.seek_to_first()?;
        if !inner.valid() {
            return Err(Error::StoreExhausted);
        }
        Ok(Self { inner, offset: 0 })
    }

    pub fn advance(&mut self) -> Result<()> {
        self.inner.next()?;
        if !self.inner.valid() {
            debug!("restarting record traversal from the first key");
            self.inner.seek_to_first()?;
        }
        self.offset += 1;
        Ok(())
    }

    pub fn current(&self) -> Result<&[u8]> {
        self.inner.value_bytes().ok_or(Error::StoreExhausted)
    }

    /// The logical offset of the current record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}
