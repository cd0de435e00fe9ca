//! Post-relocation heap over the reserved malloc carve-out.

use core::{
    alloc::Layout,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};
use hal::Error;
use spin::Mutex;
use talc::{ErrOnOom, Span, Talc};

pub struct Heap {
    talc: Mutex<Talc<ErrOnOom>>,
}

impl Heap {
    pub const fn new() -> Self {
        Self {
            talc: Mutex::new(Talc::new(ErrOnOom)),
        }
    }

    /// Hands `len` bytes at `base` to the allocator.
    ///
    /// # Safety
    ///
    /// The memory must stay valid, and untouched by anything but this heap,
    /// for as long as the heap is used.
    pub unsafe fn claim(&self, base: NonNull<u8>, len: usize) -> Result<(), Error> {
        self.talc
            .lock()
            .claim(Span::from_base_size(base.as_ptr(), len))
            .map(|_| ())
            .map_err(|()| Error::NoMemory)
    }

    pub fn alloc(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        unsafe { self.talc.lock().malloc(layout) }.map_err(|()| Error::NoMemory)
    }

    /// # Safety
    ///
    /// `ptr` must come from [`Heap::alloc`] on this heap with the same `layout`.
    pub unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        self.talc.lock().free(ptr, layout)
    }

    /// Zeroed byte buffer, freed on drop.
    pub fn alloc_buf(&self, len: usize) -> Result<HeapBuf<'_>, Error> {
        if len == 0 {
            return Err(Error::Invalid);
        }
        let layout = Layout::from_size_align(len, 8).map_err(|_| Error::Invalid)?;
        let ptr = self.alloc(layout)?;
        unsafe { ptr.as_ptr().write_bytes(0, len) };
        Ok(HeapBuf {
            heap: self,
            ptr,
            layout,
        })
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned heap allocation.
pub struct HeapBuf<'h> {
    heap: &'h Heap,
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Deref for HeapBuf<'_> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for HeapBuf<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for HeapBuf<'_> {
    fn drop(&mut self) {
        unsafe { self.heap.free(self.ptr, self.layout) }
    }
}
