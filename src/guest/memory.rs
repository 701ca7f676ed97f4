//! Read-only access to guest linear memory
//!
//! The host never keeps a view of guest memory. Every read asks the memory
//! for its current size and backing buffer, checks the requested window, and
//! copies the bytes out. A guest may grow its memory between (or during)
//! frames, which detaches any previously obtained buffer.

use super::error::BoundsError;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

/// Host-readable guest memory
pub trait LinearMemory {
    /// Current size in bytes
    ///
    /// Wider than an address: a full 65536-page memory is exactly 4 GiB.
    fn byte_len(&self) -> u64;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`
    ///
    /// Implementations measure the memory at call time and fail without
    /// touching `buf` if the window does not fit.
    fn read_exact_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), BoundsError>;
}

/// Check that `len` bytes at `offset` fit in `memory_size` bytes
pub fn check_bounds(
    offset: u32,
    len: u32,
    memory_size: u64,
) -> Result<Range<usize>, BoundsError> {
    let end = u64::from(offset) + u64::from(len);
    if end > memory_size {
        return Err(BoundsError {
            address: offset,
            size: len,
            memory_size,
        });
    }
    Ok(offset as usize..end as usize)
}

/// Read a fixed-size window
pub fn read_array<M: LinearMemory + ?Sized, const N: usize>(
    memory: &M,
    offset: u32,
) -> Result<[u8; N], BoundsError> {
    let mut buf = [0u8; N];
    memory.read_exact_at(offset, &mut buf)?;
    Ok(buf)
}

/// Page-granular memory kept on the Rust heap
///
/// Stands in for a guest's memory where no JS engine is around: native
/// builds and tests. Growth reallocates, just like a real instance.
#[derive(Debug, Clone)]
pub struct HeapMemory {
    pages: u32,
    data: Vec<u8>,
}

impl HeapMemory {
    /// Page size in bytes (64KB)
    pub const PAGE_SIZE: u32 = 65536;

    /// Create new memory with given number of pages
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            data: vec![0; pages as usize * Self::PAGE_SIZE as usize],
        }
    }

    /// Memory of an exact byte size (not page aligned)
    pub fn with_len(len: u32) -> Self {
        Self {
            pages: len.div_ceil(Self::PAGE_SIZE),
            data: vec![0; len as usize],
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Grow by `delta` pages, returning the previous page count
    pub fn grow(&mut self, delta: u32) -> u32 {
        let old = self.pages;
        self.pages += delta;
        self.data
            .resize(self.pages as usize * Self::PAGE_SIZE as usize, 0);
        old
    }

    /// Guest-side write
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), BoundsError> {
        let range = check_bounds(offset, data.len() as u32, self.byte_len())?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

impl LinearMemory for HeapMemory {
    fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_exact_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), BoundsError> {
        let range = check_bounds(offset, buf.len() as u32, self.byte_len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }
}

impl<M: LinearMemory> LinearMemory for Rc<RefCell<M>> {
    fn byte_len(&self) -> u64 {
        self.borrow().byte_len()
    }

    fn read_exact_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), BoundsError> {
        self.borrow().read_exact_at(offset, buf)
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::MemorySlot;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{check_bounds, LinearMemory};
    use crate::guest::error::BoundsError;
    use js_sys::{ArrayBuffer, Reflect, Uint8Array, WebAssembly};
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::{JsCast, JsValue};

    /// `byteLength` read as a JS number, so 4 GiB does not wrap to 0
    fn byte_length(buffer: &ArrayBuffer) -> u64 {
        Reflect::get(buffer, &JsValue::from_str("byteLength"))
            .ok()
            .and_then(|v| v.as_f64())
            .map_or(0, |n| n as u64)
    }

    /// The instance's exported memory, filled in after instantiation
    ///
    /// The import table has to exist before the instance does, so the
    /// callback is built around an empty slot. An empty slot reads as a
    /// zero-length memory.
    #[derive(Clone, Default)]
    pub struct MemorySlot(Rc<RefCell<Option<WebAssembly::Memory>>>);

    impl MemorySlot {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, memory: WebAssembly::Memory) {
            *self.0.borrow_mut() = Some(memory);
        }

        pub fn is_set(&self) -> bool {
            self.0.borrow().is_some()
        }

        /// The buffer backing the memory right now
        fn current_buffer(&self) -> Option<ArrayBuffer> {
            self.0
                .borrow()
                .as_ref()
                .map(|m| m.buffer().unchecked_into::<ArrayBuffer>())
        }
    }

    impl LinearMemory for MemorySlot {
        fn byte_len(&self) -> u64 {
            self.current_buffer().map_or(0, |b| byte_length(&b))
        }

        fn read_exact_at(&self, offset: u32, buf: &mut [u8]) -> Result<(), BoundsError> {
            let Some(buffer) = self.current_buffer() else {
                return Err(BoundsError {
                    address: offset,
                    size: buf.len() as u32,
                    memory_size: 0,
                });
            };
            // Size and view come from the same buffer object
            check_bounds(offset, buf.len() as u32, byte_length(&buffer))?;
            let view = Uint8Array::new_with_byte_offset_and_length(&buffer, offset, buf.len() as u32);
            view.copy_to(buf);
            Ok(())
        }
    }
}
