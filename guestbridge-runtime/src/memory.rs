//! Bounds-checked access to guest linear memory.
//!
//! Every access re-reads the current memory length: guest code may grow
//! memory during any call, so no length is ever cached here. Span reads and
//! writes check the whole span first and either transfer all of it or
//! nothing.

use guestbridge_core::error::{BridgeError, Result};
use guestbridge_core::types::GuestPtr;
use std::ops::Range;
use wasmtime::{AsContext, AsContextMut, Instance, Memory};

/// A fixed-size value that can be copied in and out of guest memory.
///
/// Values are stored little endian, as WASM does.
pub trait MemoryScalar: Copy + Default + Send + Sync + 'static {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes.
    fn from_le(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes.
    fn write_le(self, out: &mut [u8]);
}

macro_rules! impl_memory_scalar {
    ($($ty:ty),* $(,)?) => {
        $(impl MemoryScalar for $ty {
            const SIZE: usize = std::mem::size_of::<$ty>();

            fn from_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }
        })*
    };
}

impl_memory_scalar!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl MemoryScalar for GuestPtr {
    const SIZE: usize = 4;

    fn from_le(bytes: &[u8]) -> Self {
        GuestPtr::new(<i32 as MemoryScalar>::from_le(bytes))
    }

    fn write_le(self, out: &mut [u8]) {
        self.as_i32().write_le(out);
    }
}

/// Byte range covering `len` bytes at `offset`, if it lies inside
/// `memory_len`.
pub(crate) fn checked_range(offset: GuestPtr, len: usize, memory_len: usize) -> Option<Range<usize>> {
    let start = offset.as_usize()?;
    let end = start.checked_add(len)?;
    (end <= memory_len).then_some(start..end)
}

/// Typed accessor over one guest memory.
#[derive(Debug, Clone, Copy)]
pub struct GuestMemory {
    memory: Memory,
}

impl GuestMemory {
    /// Wrap a memory handle.
    pub fn new(memory: Memory) -> Self {
        Self { memory }
    }

    /// Look up a memory export by name.
    pub fn from_instance(
        store: impl AsContextMut,
        instance: &Instance,
        name: &str,
    ) -> Option<Self> {
        instance.get_memory(store, name).map(Self::new)
    }

    /// Underlying engine handle.
    pub fn raw(&self) -> Memory {
        self.memory
    }

    /// Current length in bytes.
    pub fn len(&self, store: impl AsContext) -> usize {
        self.memory.data_size(&store)
    }

    /// Whether the memory is currently empty.
    pub fn is_empty(&self, store: impl AsContext) -> bool {
        self.len(store) == 0
    }

    fn out_of_bounds(offset: GuestPtr, len: usize, memory_len: usize) -> BridgeError {
        BridgeError::MemoryAccess {
            offset,
            len: len as u64,
            memory_len: memory_len as u64,
        }
    }

    /// Copy `out.len()` bytes starting at `offset` into `out`.
    pub fn read_into(&self, store: impl AsContext, offset: GuestPtr, out: &mut [u8]) -> Result<()> {
        let data = self.memory.data(&store);
        let range = checked_range(offset, out.len(), data.len())
            .ok_or_else(|| Self::out_of_bounds(offset, out.len(), data.len()))?;
        out.copy_from_slice(&data[range]);
        Ok(())
    }

    /// Read `len` bytes starting at `offset`.
    pub fn read_bytes(&self, store: impl AsContext, offset: GuestPtr, len: usize) -> Result<Vec<u8>> {
        let data = self.memory.data(&store);
        let range = checked_range(offset, len, data.len())
            .ok_or_else(|| Self::out_of_bounds(offset, len, data.len()))?;
        Ok(data[range].to_vec())
    }

    /// Write `bytes` starting at `offset`.
    pub fn write_bytes(&self, mut store: impl AsContextMut, offset: GuestPtr, bytes: &[u8]) -> Result<()> {
        let data = self.memory.data_mut(&mut store);
        let memory_len = data.len();
        let range = checked_range(offset, bytes.len(), memory_len)
            .ok_or_else(|| Self::out_of_bounds(offset, bytes.len(), memory_len))?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a scalar, reporting out-of-range access.
    pub fn try_read<T: MemoryScalar>(&self, store: impl AsContext, offset: GuestPtr) -> Result<T> {
        let data = self.memory.data(&store);
        let range = checked_range(offset, T::SIZE, data.len())
            .ok_or_else(|| Self::out_of_bounds(offset, T::SIZE, data.len()))?;
        Ok(T::from_le(&data[range]))
    }

    /// Read a scalar, or the default value when out of range.
    pub fn read<T: MemoryScalar>(&self, store: impl AsContext, offset: GuestPtr) -> T {
        self.try_read(store, offset).unwrap_or_default()
    }

    /// Write a scalar, reporting out-of-range access.
    pub fn try_write<T: MemoryScalar>(
        &self,
        mut store: impl AsContextMut,
        offset: GuestPtr,
        value: T,
    ) -> Result<()> {
        let data = self.memory.data_mut(&mut store);
        let memory_len = data.len();
        let range = checked_range(offset, T::SIZE, memory_len)
            .ok_or_else(|| Self::out_of_bounds(offset, T::SIZE, memory_len))?;
        value.write_le(&mut data[range]);
        Ok(())
    }

    /// Write a scalar. Out-of-range writes are dropped; returns whether the
    /// write happened.
    pub fn write<T: MemoryScalar>(&self, store: impl AsContextMut, offset: GuestPtr, value: T) -> bool {
        self.try_write(store, offset, value).is_ok()
    }

    /// Read `count` consecutive scalars.
    pub fn read_span<T: MemoryScalar>(
        &self,
        store: impl AsContext,
        offset: GuestPtr,
        count: usize,
    ) -> Result<Vec<T>> {
        let data = self.memory.data(&store);
        let byte_len = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| Self::out_of_bounds(offset, usize::MAX, data.len()))?;
        let range = checked_range(offset, byte_len, data.len())
            .ok_or_else(|| Self::out_of_bounds(offset, byte_len, data.len()))?;
        Ok(data[range].chunks_exact(T::SIZE).map(T::from_le).collect())
    }

    /// Write consecutive scalars.
    pub fn write_span<T: MemoryScalar>(
        &self,
        mut store: impl AsContextMut,
        offset: GuestPtr,
        values: &[T],
    ) -> Result<()> {
        let data = self.memory.data_mut(&mut store);
        let memory_len = data.len();
        let byte_len = values
            .len()
            .checked_mul(T::SIZE)
            .ok_or_else(|| Self::out_of_bounds(offset, usize::MAX, memory_len))?;
        let range = checked_range(offset, byte_len, memory_len)
            .ok_or_else(|| Self::out_of_bounds(offset, byte_len, memory_len))?;
        for (chunk, value) in data[range].chunks_exact_mut(T::SIZE).zip(values) {
            value.write_le(chunk);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::{Engine, MemoryType, Store};

    fn memory(pages: u32) -> (Store<()>, GuestMemory) {
        let engine = Engine::default();
        let mut store = Store::new(&engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(pages, None)).unwrap();
        (store, GuestMemory::new(memory))
    }

    #[test]
    fn range_checks() {
        assert_eq!(checked_range(GuestPtr::new(0), 4, 4), Some(0..4));
        assert_eq!(checked_range(GuestPtr::new(1), 4, 4), None);
        assert_eq!(checked_range(GuestPtr::new(-1), 1, 4), None);
        assert_eq!(checked_range(GuestPtr::new(i32::MAX), usize::MAX, usize::MAX), None);
    }

    #[test]
    fn scalar_round_trip() {
        let (mut store, mem) = memory(1);
        assert!(mem.write(&mut store, GuestPtr::new(16), -7i64));
        assert_eq!(mem.read::<i64>(&store, GuestPtr::new(16)), -7);
        assert!(mem.write(&mut store, GuestPtr::new(32), 1.5f32));
        assert_eq!(mem.read::<f32>(&store, GuestPtr::new(32)), 1.5);
        assert!(mem.write(&mut store, GuestPtr::new(48), GuestPtr::new(1024)));
        assert_eq!(mem.read::<GuestPtr>(&store, GuestPtr::new(48)), GuestPtr::new(1024));
        assert_eq!(mem.read::<GuestPtr>(&store, GuestPtr::new(65_534)), GuestPtr::default());
    }

    #[test]
    fn out_of_range_reads_default() {
        let (mut store, mem) = memory(1);
        let last = GuestPtr::new(65_536 - 4);
        assert!(mem.write(&mut store, last, 99i32));
        assert_eq!(mem.read::<i32>(&store, last), 99);
        assert_eq!(mem.read::<i64>(&store, last), 0);

        let err = mem.try_read::<i64>(&store, last).unwrap_err();
        assert_eq!(err.code(), "E303");
        assert!(!mem.write(&mut store, GuestPtr::new(65_536), 1u8));
    }

    #[test]
    fn spans_are_all_or_nothing() {
        let (mut store, mem) = memory(1);
        let start = GuestPtr::new(65_536 - 8);
        assert!(mem
            .write_span(&mut store, start, &[1u32, 2, 3])
            .is_err());
        assert_eq!(mem.read_span::<u32>(&store, start, 2).unwrap(), vec![0, 0]);

        mem.write_span(&mut store, start, &[5u32, 6]).unwrap();
        assert_eq!(mem.read_span::<u32>(&store, start, 2).unwrap(), vec![5, 6]);
        assert!(mem.read_span::<u32>(&store, start, 3).is_err());
    }

    #[test]
    fn length_is_requeried() {
        let (mut store, mem) = memory(1);
        let offset = GuestPtr::new(70_000);
        assert!(mem.try_read::<u8>(&store, offset).is_err());
        mem.raw().grow(&mut store, 1).unwrap();
        assert_eq!(mem.len(&store), 131_072);
        assert!(mem.try_read::<u8>(&store, offset).is_ok());
    }
}
