use super::{characteristic::Characteristic, descriptor::Descriptor, options::AttributeOptions};
use crate::{Error, ErrorType, Result};
use std::{fmt, sync::Arc};

pub type ReadCallback =
    dyn Fn(&Characteristic, &AttributeOptions) -> Result<Vec<u8>> + Send + Sync;
pub type WriteCallback =
    dyn Fn(&Characteristic, &AttributeOptions, Vec<u8>) -> Result<()> + Send + Sync;
pub type NotifyCallback = dyn Fn(&Characteristic) -> Result<()> + Send + Sync;
pub type DescriptorReadCallback =
    dyn Fn(&Descriptor, &AttributeOptions) -> Result<Vec<u8>> + Send + Sync;
pub type DescriptorWriteCallback =
    dyn Fn(&Descriptor, &AttributeOptions, Vec<u8>) -> Result<()> + Send + Sync;

/// Holder for an optionally bound callback.
///
/// Invoking an empty slot is an error of kind [`ErrorType::NotImplemented`].
pub struct CallbackSlot<F: ?Sized> {
    callback: Option<Arc<F>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn empty() -> Self {
        CallbackSlot { callback: None }
    }

    pub fn bound(callback: Arc<F>) -> Self {
        CallbackSlot {
            callback: Some(callback),
        }
    }

    pub fn set(&mut self, callback: Arc<F>) {
        self.callback = Some(callback);
    }

    pub fn clear(&mut self) {
        self.callback = None;
    }

    pub fn is_bound(&self) -> bool {
        self.callback.is_some()
    }

    /// Returns the bound callback, or a `NotImplemented` error naming `operation`.
    pub fn get(&self, operation: &str) -> Result<Arc<F>> {
        self.callback.clone().ok_or_else(|| {
            Error::new(
                format!("no {} callback bound", operation),
                "",
                ErrorType::NotImplemented,
            )
        })
    }
}

impl<F: ?Sized> Clone for CallbackSlot<F> {
    fn clone(&self) -> Self {
        CallbackSlot {
            callback: self.callback.clone(),
        }
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackSlot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bound() {
            write!(f, "CallbackSlot(bound)")
        } else {
            write!(f, "CallbackSlot(empty)")
        }
    }
}

/// The four callback slots of a characteristic.
///
/// The application keeps one set of these and copies it into every
/// characteristic it creates.
#[derive(Clone, Default, Debug)]
pub struct CharacteristicCallbacks {
    pub read: CallbackSlot<ReadCallback>,
    pub write: CallbackSlot<WriteCallback>,
    pub start_notify: CallbackSlot<NotifyCallback>,
    pub stop_notify: CallbackSlot<NotifyCallback>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_fails_with_not_implemented() {
        let slot: CallbackSlot<NotifyCallback> = CallbackSlot::empty();
        let err = slot.get("start notify").err().unwrap();
        assert_eq!(err.kind(), ErrorType::NotImplemented);
        assert_eq!(err.message, "no start notify callback bound");
    }

    #[test]
    fn clones_share_the_callback_but_not_the_slot() {
        let mut slot: CallbackSlot<NotifyCallback> = CallbackSlot::bound(Arc::new(|_| Ok(())));
        let copy = slot.clone();
        slot.clear();
        assert!(!slot.is_bound());
        assert!(copy.is_bound());
    }
}
