//! Thread-local error channel.
//!
//! Every [`CryptoError`] is recorded here when it is constructed, so callers
//! that only see a boolean or an absent result can still ask what went wrong
//! on this thread.

use std::cell::RefCell;

use crate::error::CryptoError;

thread_local! {
    static LAST_ERROR: RefCell<Option<CryptoError>> = const { RefCell::new(None) };
}

pub(crate) fn push(error: CryptoError) {
    tracing::debug!("provider error: {}", error);
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = Some(error);
    });
}

/// Peek at the most recent error on the current thread.
pub fn last_error() -> Option<CryptoError> {
    LAST_ERROR.with(|e| e.borrow().clone())
}

/// Take the most recent error from the current thread, clearing the slot.
pub fn take_last_error() -> Option<CryptoError> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Clear the error slot for the current thread.
pub fn clear_errors() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}
