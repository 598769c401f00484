use std::{
    alloc::{alloc_zeroed, dealloc, handle_alloc_error, realloc, Layout},
    ptr::NonNull,
};

use crate::ComponentInfo;

/// Upper bound for the byte size of a single column
pub(crate) const MAX_COLUMN_BYTES: usize = 1 << 30;

/// Holds `cap` contiguous values of a single component type.
///
/// The value for slot `i` lives at byte offset `i * size`. Memory is zeroed on
/// allocation and growth.
#[derive(Debug)]
pub(crate) struct Column {
    data: NonNull<u8>,
    cap: usize,
    layout: Layout,
    construct: unsafe fn(*mut u8),
}

/// Components are `Send + Sync` plain data
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// Allocates space for storage of `cap` components.
    pub(crate) fn new(info: &ComponentInfo, cap: usize) -> Self {
        let mut column = Self {
            data: dangling(info.layout()),
            cap: 0,
            layout: info.layout(),
            construct: info.construct,
        };

        column.grow(cap);
        column
    }

    fn array_layout(&self, cap: usize) -> Layout {
        let size = self.layout.size() * cap;
        assert!(
            size <= MAX_COLUMN_BYTES,
            "Component column of {size} bytes exceeds the {MAX_COLUMN_BYTES} byte limit"
        );

        match Layout::from_size_align(size, self.layout.align()) {
            Ok(v) => v,
            Err(_) => panic!("Invalid column layout for {cap} values"),
        }
    }

    /// Grows the storage to hold at least `new_cap` values, zeroing the new tail.
    pub(crate) fn grow(&mut self, new_cap: usize) {
        if new_cap <= self.cap {
            return;
        }

        let old_layout = self.array_layout(self.cap);
        let new_layout = self.array_layout(new_cap);

        if new_layout.size() == 0 {
            self.cap = new_cap;
            return;
        }

        let ptr = unsafe {
            if old_layout.size() == 0 {
                alloc_zeroed(new_layout)
            } else {
                let ptr = realloc(self.data.as_ptr(), old_layout, new_layout.size());
                if !ptr.is_null() {
                    ptr.add(old_layout.size())
                        .write_bytes(0, new_layout.size() - old_layout.size());
                }
                ptr
            }
        };

        self.data = match NonNull::new(ptr) {
            Some(v) => v,
            None => handle_alloc_error(new_layout),
        };
        self.cap = new_cap;
    }

    #[inline(always)]
    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    #[inline(always)]
    pub(crate) fn size(&self) -> usize {
        self.layout.size()
    }

    /// # Safety
    /// `slot` must be less than the capacity
    #[inline(always)]
    pub(crate) unsafe fn at(&self, slot: usize) -> *const u8 {
        debug_assert!(slot < self.cap);
        self.data.as_ptr().add(self.layout.size() * slot)
    }

    /// # Safety
    /// `slot` must be less than the capacity
    #[inline(always)]
    pub(crate) unsafe fn at_mut(&mut self, slot: usize) -> *mut u8 {
        debug_assert!(slot < self.cap);
        self.data.as_ptr().add(self.layout.size() * slot)
    }

    /// Constructs the default value in place.
    ///
    /// # Safety
    /// `slot` must be less than the capacity
    pub(crate) unsafe fn construct(&mut self, slot: usize) {
        let dst = self.at_mut(slot);
        (self.construct)(dst)
    }

    /// Copies the value at `src_slot` of `src` into `dst_slot`
    ///
    /// # Safety
    /// Both slots must be in bounds for their columns, which must hold the same type
    #[inline]
    pub(crate) unsafe fn copy_from(&mut self, dst_slot: usize, src: &Column, src_slot: usize) {
        debug_assert_eq!(self.layout, src.layout);
        core::ptr::copy_nonoverlapping(src.at(src_slot), self.at_mut(dst_slot), self.size());
    }

    /// Returns the values as a slice of `T`
    ///
    /// # Safety
    /// The column must hold values of type `T`, and every value must be initialized
    pub(crate) unsafe fn as_slice<T>(&self, len: usize) -> &[T] {
        debug_assert!(len <= self.cap);
        core::slice::from_raw_parts(self.data.as_ptr().cast::<T>(), len)
    }

    /// # Safety
    /// See [`Self::as_slice`]
    pub(crate) unsafe fn as_slice_mut<T>(&mut self, len: usize) -> &mut [T] {
        debug_assert!(len <= self.cap);
        core::slice::from_raw_parts_mut(self.data.as_ptr().cast::<T>(), len)
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        let layout = self.array_layout(self.cap);
        if layout.size() > 0 {
            unsafe { dealloc(self.data.as_ptr(), layout) }
        }
    }
}

fn dangling(layout: Layout) -> NonNull<u8> {
    // An aligned, non-null address for zero sized or unallocated columns
    match NonNull::new(layout.align() as *mut u8) {
        Some(v) => v,
        None => NonNull::dangling(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentId, ComponentInfo};

    #[derive(Default, Clone, Copy, Debug, PartialEq)]
    struct Position(f32, f32);

    #[test]
    fn grow_zero_extends() {
        let info = ComponentInfo::of::<Position>(ComponentId::new(0));
        let mut column = Column::new(&info, 4);

        unsafe {
            column.as_slice_mut::<Position>(4)[3] = Position(1.0, 2.0);
        }

        column.grow(8);
        assert_eq!(column.cap(), 8);

        let values = unsafe { column.as_slice::<Position>(8) };
        assert_eq!(values[3], Position(1.0, 2.0));
        assert!(values[4..].iter().all(|v| *v == Position(0.0, 0.0)));
    }

    #[test]
    fn zero_sized() {
        #[derive(Default, Clone, Copy)]
        struct Marker;

        let info = ComponentInfo::of::<Marker>(ComponentId::new(0));
        let mut column = Column::new(&info, 16);
        column.grow(1024);
        unsafe { column.construct(1000) };
        assert_eq!(column.cap(), 1024);
    }
}
