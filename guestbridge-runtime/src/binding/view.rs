//! Views over guest memory at fixed addresses.

use super::memory::MemoryBinding;
use crate::memory::MemoryScalar;
use guestbridge_core::types::GuestPtr;
use std::marker::PhantomData;
use std::sync::Arc;

/// A scalar field at an address in a bound memory.
#[derive(Debug, Clone)]
pub struct MemoryView<T> {
    memory: Arc<MemoryBinding>,
    address: GuestPtr,
    _marker: PhantomData<fn() -> T>,
}

impl<T: MemoryScalar> MemoryView<T> {
    /// View the `T` at `address`.
    pub fn new(memory: Arc<MemoryBinding>, address: GuestPtr) -> Self {
        Self {
            memory,
            address,
            _marker: PhantomData,
        }
    }

    /// Address being viewed.
    pub fn address(&self) -> GuestPtr {
        self.address
    }

    /// Move the view.
    pub fn set_address(&mut self, address: GuestPtr) {
        self.address = address;
    }

    /// Current value, the default when out of range.
    pub fn read(&self) -> T {
        self.memory.read(self.address)
    }

    /// Store a value; out-of-range writes are dropped.
    pub fn write(&self, value: T) -> bool {
        self.memory.write(self.address, value)
    }
}

/// A pixel buffer living in guest memory.
#[derive(Debug, Clone)]
pub struct FrameCopy {
    memory: Arc<MemoryBinding>,
    /// Address of the first pixel.
    pub address: GuestPtr,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Bytes per pixel.
    pub bytes_per_pixel: u32,
}

impl FrameCopy {
    /// Describe a frame of `width * height` pixels at `address`.
    pub fn new(memory: Arc<MemoryBinding>, address: GuestPtr, width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        Self {
            memory,
            address,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Frame size in bytes, `None` on overflow.
    pub fn byte_len(&self) -> Option<usize> {
        let pixels = (self.width as usize).checked_mul(self.height as usize)?;
        pixels.checked_mul(self.bytes_per_pixel as usize)
    }

    /// Copy the whole frame out. `None` if any of it is out of range.
    pub fn capture(&self) -> Option<Vec<u8>> {
        let len = self.byte_len()?;
        match self.memory.read_bytes(self.address, len) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(error = %e, width = self.width, height = self.height, "Frame copy skipped");
                None
            }
        }
    }
}
