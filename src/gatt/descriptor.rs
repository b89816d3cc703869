use super::{
    callback::{CallbackSlot, DescriptorReadCallback, DescriptorWriteCallback},
    constants::GATT_DESCRIPTOR_INTERFACE,
    lock,
    options::AttributeOptions,
    properties::DescriptorFlag,
    property_table::{Access, GattObject, PropertyDef, PropertyKind, PropertyValue},
};
use crate::{peripheral::ObjectServer, Error, ErrorType, Result};
use dbus::arg::PropMap;
use log::debug;
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

#[derive(Default)]
struct DescriptorCallbacks {
    read: CallbackSlot<DescriptorReadCallback>,
    write: CallbackSlot<DescriptorWriteCallback>,
    strict: bool,
}

/// A GATT descriptor.
///
/// Reads and writes go to the bound callbacks. Without a callback the
/// descriptor serves its stored value and stores what is written, unless it
/// was made strict with [`Descriptor::set_strict`].
pub struct Descriptor {
    uuid: Uuid,
    path: String,
    characteristic_path: String,
    flags: Vec<DescriptorFlag>,
    value: Mutex<Vec<u8>>,
    callbacks: Mutex<DescriptorCallbacks>,
    server: Arc<dyn ObjectServer>,
}

impl Descriptor {
    pub(crate) fn new(
        uuid: Uuid,
        flags: &[DescriptorFlag],
        index: u16,
        characteristic_path: &str,
        value: Vec<u8>,
        server: Arc<dyn ObjectServer>,
    ) -> Self {
        let path = format!("{}/descriptor{:04}", characteristic_path, index);
        debug!("New descriptor {} at {}", uuid, path);
        Descriptor {
            uuid,
            path,
            characteristic_path: characteristic_path.to_string(),
            flags: flags.to_vec(),
            value: Mutex::new(value),
            callbacks: Mutex::new(DescriptorCallbacks::default()),
            server,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn characteristic_path(&self) -> &str {
        &self.characteristic_path
    }

    pub fn flags(&self) -> &[DescriptorFlag] {
        &self.flags
    }

    pub fn value(&self) -> Vec<u8> {
        lock(&self.value).clone()
    }

    /// Stores `value` and emits a `PropertiesChanged` signal for it.
    pub fn set_value(&self, value: Vec<u8>) {
        *lock(&self.value) = value.clone();
        self.server.emit_properties_changed(
            &self.path,
            GATT_DESCRIPTOR_INTERFACE,
            vec![("Value", PropertyValue::Bytes(value))],
        );
    }

    pub fn set_read_callback<F>(&self, callback: F)
    where
        F: Fn(&Descriptor, &AttributeOptions) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        lock(&self.callbacks).read.set(Arc::new(callback));
    }

    pub fn set_write_callback<F>(&self, callback: F)
    where
        F: Fn(&Descriptor, &AttributeOptions, Vec<u8>) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).write.set(Arc::new(callback));
    }

    pub fn clear_callbacks(&self) {
        let mut callbacks = lock(&self.callbacks);
        callbacks.read.clear();
        callbacks.write.clear();
    }

    /// In strict mode an unbound read or write fails instead of echoing the stored value.
    pub fn set_strict(&self, strict: bool) {
        lock(&self.callbacks).strict = strict;
    }

    /// `ReadValue` as called by the daemon.
    pub fn read_value(&self, options: &PropMap) -> Result<Vec<u8>> {
        let (read, strict) = {
            let callbacks = lock(&self.callbacks);
            (callbacks.read.clone(), callbacks.strict)
        };
        let callback = match read.get("descriptor read") {
            Ok(callback) => Some(callback),
            Err(err) if strict => return Err(err),
            Err(_) => None,
        };
        let options = AttributeOptions::decode(options)?;
        match callback {
            Some(callback) => callback(self, &options),
            None => {
                let value = self.value();
                let offset = options.offset as usize;
                if offset > value.len() {
                    return Err(Error::from_type(ErrorType::InvalidOffset));
                }
                Ok(value[offset..].to_vec())
            }
        }
    }

    /// `WriteValue` as called by the daemon.
    pub fn write_value(&self, value: Vec<u8>, options: &PropMap) -> Result<()> {
        let (write, strict) = {
            let callbacks = lock(&self.callbacks);
            (callbacks.write.clone(), callbacks.strict)
        };
        let callback = match write.get("descriptor write") {
            Ok(callback) => Some(callback),
            Err(err) if strict => return Err(err),
            Err(_) => None,
        };
        let options = AttributeOptions::decode(options)?;
        match callback {
            Some(callback) => callback(self, &options, value),
            None => {
                *lock(&self.value) = value;
                Ok(())
            }
        }
    }
}

static PROPERTIES: &[PropertyDef<Descriptor>] = &[
    PropertyDef {
        name: "UUID",
        kind: PropertyKind::Str,
        access: Access::Read,
        get: |d| PropertyValue::Str(d.uuid.to_string()),
        set: None,
    },
    PropertyDef {
        name: "Characteristic",
        kind: PropertyKind::ObjectPath,
        access: Access::Read,
        get: |d| PropertyValue::ObjectPath(d.characteristic_path.clone()),
        set: None,
    },
    PropertyDef {
        name: "Value",
        kind: PropertyKind::Bytes,
        access: Access::ReadWrite,
        get: |d| PropertyValue::Bytes(d.value()),
        set: Some(|d, value| {
            d.set_value(value.into_bytes()?);
            Ok(())
        }),
    },
    PropertyDef {
        name: "Flags",
        kind: PropertyKind::StrList,
        access: Access::Read,
        get: |d| PropertyValue::StrList(d.flags.iter().map(|f| f.to_string()).collect()),
        set: None,
    },
];

impl GattObject for Descriptor {
    const INTERFACE: &'static str = GATT_DESCRIPTOR_INTERFACE;

    fn properties() -> &'static [PropertyDef<Self>] {
        PROPERTIES
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("uuid", &self.uuid)
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("value", &self.value())
            .finish()
    }
}
