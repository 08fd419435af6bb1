use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::RandomAccess;
use crate::codec::Endian;
use crate::config::DEFAULT_MEMORY_CAPACITY;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Store {
    data: Vec<u8>,
    len: usize,
}

impl Store {
    fn grow_to(&mut self, new_len: usize) {
        if new_len > self.data.len() {
            self.data.resize(new_len.saturating_mul(2), 0);
        }
        if new_len > self.len {
            // stale bytes may linger past a previous shrink
            self.data[self.len..new_len].fill(0);
        }
        self.len = new_len;
    }
}

/// Bytes owned jointly by every [`MemoryHandle`] opened over them.
///
/// Writes through any handle are seen by the others, and by whoever kept a
/// clone of this value.
#[derive(Debug, Clone, Default)]
pub struct SharedBytes(Arc<RwLock<Store>>);

impl SharedBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self(Arc::new(RwLock::new(Store { data: bytes, len })))
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Arc::new(RwLock::new(Store {
            data: vec![0; capacity],
            len: 0,
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.0.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.0.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.read().data.len()
    }

    /// A copy of the logical content.
    pub fn to_vec(&self) -> Vec<u8> {
        let store = self.read();
        store.data[..store.len].to_vec()
    }

    /// The logical content, without copying when no one else holds it.
    pub fn into_vec(self) -> Vec<u8> {
        match Arc::try_unwrap(self.0) {
            Ok(lock) => {
                let mut store = lock.into_inner().unwrap_or_else(|e| e.into_inner());
                store.data.truncate(store.len);
                store.data
            }
            Err(shared) => SharedBytes(shared).to_vec(),
        }
    }
}

impl From<Vec<u8>> for SharedBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// A growable in-memory store.
///
/// The backing vector is its capacity; the logical length is tracked
/// separately so repeated small appends do not reallocate each time. Handles
/// opened over the same [`SharedBytes`] share content and length but keep
/// their own position and byte order.
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    shared: SharedBytes,
    position: usize,
    order: Endian,
}

impl Default for MemoryHandle {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryHandle {
    /// An empty store with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_shared(SharedBytes::with_capacity(capacity))
    }

    /// Wrap `bytes`; the whole vector is the logical content.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::from_shared(SharedBytes::new(bytes))
    }

    pub fn from_shared(shared: SharedBytes) -> Self {
        Self {
            shared,
            position: 0,
            order: Endian::Big,
        }
    }

    pub fn shared(&self) -> &SharedBytes {
        &self.shared
    }

    /// A copy of the logical content.
    pub fn to_vec(&self) -> Vec<u8> {
        self.shared.to_vec()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.shared.into_vec()
    }
}

fn to_index(pos: u64) -> Result<usize> {
    usize::try_from(pos).map_err(|_| Error::OutOfBounds(pos))
}

impl RandomAccess for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let store = self.shared.read();
        if self.position >= store.len {
            return Ok(0);
        }
        let n = buf.len().min(store.len - self.position);
        buf[..n].copy_from_slice(&store.data[self.position..self.position + n]);
        drop(store);
        self.position += n;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        let end = self
            .position
            .checked_add(buf.len())
            .ok_or(Error::OutOfBounds(u64::MAX))?;
        let mut store = self.shared.write();
        if end > store.len {
            store.grow_to(end);
        }
        store.data[self.position..end].copy_from_slice(buf);
        drop(store);
        self.position = end;
        Ok(())
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.position = to_index(pos)?;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn length(&self) -> u64 {
        self.shared.len() as u64
    }

    fn set_length(&mut self, len: u64) -> Result<()> {
        let len = to_index(len)?;
        let mut store = self.shared.write();
        if len > store.len {
            store.grow_to(len);
        } else {
            store.len = len;
        }
        Ok(())
    }

    fn order(&self) -> Endian {
        self.order
    }

    fn set_order(&mut self, order: Endian) {
        self.order = order;
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_past_the_end_are_truncated() {
        let mut h = MemoryHandle::from_vec(b"hello".to_vec());
        h.seek(3).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(h.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(h.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn growth_doubles_the_requested_size() {
        let mut h = MemoryHandle::with_capacity(4);
        h.write(&[1; 10]).unwrap();
        assert_eq!(h.length(), 10);
        assert_eq!(h.capacity(), 20);
        assert_eq!(h.position(), 10);
    }

    #[test]
    fn handles_over_shared_bytes_see_each_others_writes() {
        let shared = SharedBytes::new(vec![1u8, 2, 3]);
        let mut a = MemoryHandle::from_shared(shared.clone());
        let mut b = MemoryHandle::from_shared(shared.clone());
        a.write_u8(9).unwrap();
        a.seek(3).unwrap();
        a.write_u16(0x0405).unwrap();
        assert_eq!(shared.to_vec(), [9, 2, 3, 4, 5]);
        assert_eq!(b.length(), 5);
        assert_eq!(b.position(), 0);
        assert_eq!(b.read_u8().unwrap(), 9);
    }

    #[test]
    fn shrinking_then_growing_zero_fills() {
        let mut h = MemoryHandle::from_vec(vec![7; 8]);
        h.set_length(2).unwrap();
        h.set_length(6).unwrap();
        assert_eq!(h.to_vec(), [7, 7, 0, 0, 0, 0]);
    }

    #[test]
    fn fixed_width_reads_fail_without_moving() {
        let mut h = MemoryHandle::from_vec(vec![0; 3]);
        h.seek(1).unwrap();
        assert!(matches!(h.read_u32(), Err(Error::EndOfStream)));
        assert_eq!(h.position(), 1);
        assert_eq!(h.read_u16().unwrap(), 0);
    }
}
