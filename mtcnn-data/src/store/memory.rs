use super::StoreCursor;
use crate::common::*;

/// An in-memory ordered record store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create a cursor over a snapshot of the current entries.
    pub fn cursor(&self) -> MemoryCursor {
        let entries: Vec<_> = self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        MemoryCursor {
            entries: Arc::new(entries),
            position: None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MemoryStore
where
    K: Into<Vec<u8>>,
    V: Into<Vec<u8>>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self { entries }
    }
}

/// A cursor over a [`MemoryStore`] snapshot.
#[derive(Debug, Clone)]
pub struct MemoryCursor {
    entries: Arc<Vec<(Vec<u8>, Vec<u8>)>>,
    position: Option<usize>,
}

impl MemoryCursor {
    /// The key at the cursor, or `None` if the cursor is invalid.
    pub fn key_bytes(&self) -> Option<&[u8]> {
        let (key, _) = self.entries.get(self.position?)?;
        Some(key)
    }
}

impl StoreCursor for MemoryCursor {
    fn seek_to_first(&mut self) -> Result<()> {
        self.position = Some(0);
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        if let Some(position) = &mut self.position {
            *position += 1;
        }
        Ok(())
    }

    fn valid(&self) -> bool {
        matches!(self.position, Some(position) if position < self.entries.len())
    }

    fn value_bytes(&self) -> Option<&[u8]> {
        let (_, value) = self.entries.get(self.position?)?;
        Some(value)
    }
}
