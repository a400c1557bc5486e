//! Thread-scoped storage backing the C boundary
//!
//! Every boundary operation that fails records its message here before
//! returning non-zero; a successful call does not clear it, so `last_error`
//! is genuinely the last observed error. String-returning getters use a
//! separate slot, so reading an output string never invalidates the error
//! message (and vice versa). Pointers stay valid until the next call that
//! writes the same slot on the same thread; callers copy to retain.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
    static STRING_RETURN: RefCell<CString> = RefCell::new(CString::default());
}

fn to_cstring(text: &str) -> CString {
    // Engine messages never contain nul, but the boundary must not panic.
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}

pub(crate) fn set_last_error(message: &str) {
    LAST_ERROR.with(|slot| {
        *slot.borrow_mut() = to_cstring(message);
    });
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ptr())
}

pub(crate) fn return_string(text: &str) -> *const c_char {
    STRING_RETURN.with(|slot| {
        *slot.borrow_mut() = to_cstring(text);
        slot.borrow().as_ptr()
    })
}

pub(crate) fn return_string_with_len(text: &str) -> (*const c_char, usize) {
    STRING_RETURN.with(|slot| {
        *slot.borrow_mut() = to_cstring(text);
        let stored = slot.borrow();
        (stored.as_ptr(), stored.as_bytes().len())
    })
}
