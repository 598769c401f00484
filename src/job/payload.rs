use core::{marker::PhantomData, mem, mem::MaybeUninit};

use super::JOB_PAYLOAD_SIZE;

const PAYLOAD_ALIGN: usize = 16;

#[repr(C, align(16))]
struct Inline([MaybeUninit<u8>; JOB_PAYLOAD_SIZE]);

struct Fits<F>(PhantomData<F>);

impl<F> Fits<F> {
    const OK: () = assert!(
        mem::size_of::<F>() <= JOB_PAYLOAD_SIZE && mem::align_of::<F>() <= PAYLOAD_ALIGN,
        "Job closure does not fit in the inline payload"
    );
}

/// A type erased `FnOnce` stored inline in a job slot.
pub(crate) struct Payload {
    data: Inline,
    call: Option<unsafe fn(*mut u8)>,
    drop: Option<unsafe fn(*mut u8)>,
}

impl Payload {
    pub(crate) const fn empty() -> Self {
        Self {
            data: Inline([MaybeUninit::uninit(); JOB_PAYLOAD_SIZE]),
            call: None,
            drop: None,
        }
    }

    /// Stores `func`, dropping any previous function which was never run.
    ///
    /// Fails to compile if `F` is larger than the payload.
    ///
    /// # Safety
    /// Data borrowed by `func` must outlive the call or drop of the payload
    pub(crate) unsafe fn set<F: FnOnce() + Send>(&mut self, func: F) {
        #[allow(clippy::let_unit_value)]
        let () = Fits::<F>::OK;

        self.clear();
        self.data.0.as_mut_ptr().cast::<F>().write(func);
        self.call = Some(call_erased::<F>);
        self.drop = Some(drop_erased::<F>);
    }

    /// Runs the stored function, if any
    pub(crate) fn run(&mut self) {
        if let Some(call) = self.call.take() {
            self.drop = None;
            // Safety
            // `call` was stored together with a value of the matching type
            unsafe { call(self.data.0.as_mut_ptr().cast()) }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.call = None;
        if let Some(drop) = self.drop.take() {
            unsafe { drop(self.data.0.as_mut_ptr().cast()) }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.call.is_none()
    }
}

impl Drop for Payload {
    fn drop(&mut self) {
        self.clear()
    }
}

unsafe fn call_erased<F: FnOnce()>(ptr: *mut u8) {
    // The value is moved out, so it is consumed even if it panics
    let func = ptr.cast::<F>().read();
    func()
}

unsafe fn drop_erased<F>(ptr: *mut u8) {
    ptr.cast::<F>().drop_in_place()
}
