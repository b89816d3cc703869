pub mod advertisement;
pub mod application;
pub mod callback;
pub mod characteristic;
pub mod constants;
pub mod descriptor;
pub mod options;
pub mod properties;
pub mod property_table;
pub mod service;
pub mod subscription;

use crate::{Error, ErrorType, Result};
use std::sync::{Mutex, MutexGuard};

// Guards are never held across a callback, an export or an await, so a
// poisoned lock still protects consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Bumps a per-parent child counter. Indices are never reused, so running
/// out is an error rather than a wrap back to a path that may still be taken.
pub(crate) fn next_index(last_index: &mut u16, parent: &str, child: &str) -> Result<u16> {
    let index = last_index.checked_add(1).ok_or_else(|| {
        Error::new(
            format!("{} has no {} index left", parent, child),
            format!("at most {} per parent", u16::MAX),
            ErrorType::InvalidArguments,
        )
    })?;
    *last_index = index;
    Ok(index)
}
