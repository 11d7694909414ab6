// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opaque payload blobs.
//!
//! A [`BlackBox`] captures one element's persisted fields once and replays
//! them for every load pass. The bytes are owned through a [`BlobAllocator`]
//! so a subsystem with its own allocation rules can hold them.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Allocation hooks used by [`BlackBox`]
pub trait BlobAllocator: Send + Sync + fmt::Debug {
    /// Allocate a zeroed buffer of `len` bytes
    fn allocate(&self, len: usize) -> Vec<u8>;

    /// Copy `src` into `dst`; lengths are equal
    fn copy(&self, dst: &mut [u8], src: &[u8]) {
        dst.copy_from_slice(src);
    }

    /// Give a buffer back
    fn release(&self, data: Vec<u8>);
}

/// Global heap allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BlobAllocator for HeapAllocator {
    fn allocate(&self, len: usize) -> Vec<u8> {
        vec![0; len]
    }

    fn release(&self, data: Vec<u8>) {
        drop(data);
    }
}

/// Deep-copied payload blob
pub struct BlackBox {
    data: Vec<u8>,
    allocator: Arc<dyn BlobAllocator>,
}

impl BlackBox {
    /// Copy `payload` through `allocator`
    pub fn new(payload: &[u8], allocator: Arc<dyn BlobAllocator>) -> Self {
        let data = Self::copy_in(payload, allocator.as_ref());
        Self { data, allocator }
    }

    /// Capture a field tree using the heap allocator
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::from_value_in(value, Arc::new(HeapAllocator))
    }

    /// Capture a field tree using `allocator`
    pub fn from_value_in(value: &Value, allocator: Arc<dyn BlobAllocator>) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self::new(&bytes, allocator))
    }

    /// Replay the captured field tree
    pub fn value(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// Raw payload bytes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the payload; the old buffer is released before the new one is allocated
    pub fn assign(&mut self, payload: &[u8]) {
        let old = std::mem::take(&mut self.data);
        self.allocator.release(old);
        self.data = Self::copy_in(payload, self.allocator.as_ref());
    }

    fn copy_in(payload: &[u8], allocator: &dyn BlobAllocator) -> Vec<u8> {
        let mut data = allocator.allocate(payload.len());
        allocator.copy(&mut data, payload);
        data
    }
}

impl Clone for BlackBox {
    fn clone(&self) -> Self {
        Self::new(&self.data, Arc::clone(&self.allocator))
    }
}

impl Drop for BlackBox {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.allocator.release(data);
    }
}

impl fmt::Debug for BlackBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackBox")
            .field("len", &self.data.len())
            .field("allocator", &self.allocator)
            .finish()
    }
}
