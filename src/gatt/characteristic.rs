use super::{
    callback::CharacteristicCallbacks,
    constants::GATT_CHARACTERISTIC_INTERFACE,
    descriptor::Descriptor,
    lock, next_index,
    options::AttributeOptions,
    properties::{CharacteristicFlag, DescriptorFlag},
    property_table::{Access, GattObject, PropertyDef, PropertyKind, PropertyValue},
    subscription::SubscribedCharacteristics,
};
use crate::{
    peripheral::{ExportedObject, ObjectServer},
    Error, ErrorType, Result,
};
use dbus::arg::PropMap;
use log::{debug, info};
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

#[derive(Default)]
struct Descriptors {
    list: Vec<Arc<Descriptor>>,
    last_index: u16,
}

/// A GATT characteristic.
///
/// Remote reads, writes and subscriptions are forwarded to the bound
/// callbacks. Setting the value with [`Characteristic::set_value`] emits a
/// `PropertiesChanged` signal, which the daemon turns into a notification or
/// indication for subscribed centrals.
pub struct Characteristic {
    uuid: Uuid,
    path: String,
    service_path: String,
    flags: Vec<CharacteristicFlag>,
    notifying: bool,
    value: Mutex<Vec<u8>>,
    callbacks: Mutex<CharacteristicCallbacks>,
    descriptors: Mutex<Descriptors>,
    subscriptions: Arc<SubscribedCharacteristics>,
    server: Arc<dyn ObjectServer>,
}

impl Characteristic {
    pub(crate) fn new(
        uuid: Uuid,
        flags: &[CharacteristicFlag],
        index: u16,
        service_path: &str,
        value: Vec<u8>,
        subscriptions: Arc<SubscribedCharacteristics>,
        server: Arc<dyn ObjectServer>,
    ) -> Self {
        let path = format!("{}/characteristic{:04}", service_path, index);
        debug!("New characteristic {} at {}", uuid, path);
        Characteristic {
            uuid,
            path,
            service_path: service_path.to_string(),
            flags: flags.to_vec(),
            notifying: flags.iter().any(|f| f.is_subscribable()),
            value: Mutex::new(value),
            callbacks: Mutex::new(CharacteristicCallbacks::default()),
            descriptors: Mutex::new(Descriptors::default()),
            subscriptions,
            server,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn service_path(&self) -> &str {
        &self.service_path
    }

    pub fn flags(&self) -> &[CharacteristicFlag] {
        &self.flags
    }

    /// Whether the flags allow notify or indicate. Fixed at construction.
    pub fn is_notifying(&self) -> bool {
        self.notifying
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.contains(&self.path)
    }

    pub fn value(&self) -> Vec<u8> {
        lock(&self.value).clone()
    }

    /// Stores `value` and emits exactly one `PropertiesChanged` signal carrying it.
    pub fn set_value(&self, value: Vec<u8>) {
        *lock(&self.value) = value.clone();
        self.server.emit_properties_changed(
            &self.path,
            GATT_CHARACTERISTIC_INTERFACE,
            vec![("Value", PropertyValue::Bytes(value))],
        );
    }

    pub fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        lock(&self.descriptors).list.clone()
    }

    pub fn set_read_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic, &AttributeOptions) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        lock(&self.callbacks).read.set(Arc::new(callback));
    }

    pub fn set_write_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic, &AttributeOptions, Vec<u8>) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).write.set(Arc::new(callback));
    }

    pub fn set_start_notify_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).start_notify.set(Arc::new(callback));
    }

    pub fn set_stop_notify_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).stop_notify.set(Arc::new(callback));
    }

    pub fn callbacks(&self) -> CharacteristicCallbacks {
        lock(&self.callbacks).clone()
    }

    pub fn set_callbacks(&self, callbacks: CharacteristicCallbacks) {
        *lock(&self.callbacks) = callbacks;
    }

    /// `ReadValue` as called by the daemon.
    pub fn read_value(&self, options: &PropMap) -> Result<Vec<u8>> {
        let read = lock(&self.callbacks).read.get("read")?;
        let options = AttributeOptions::decode(options)?;
        read(self, &options)
    }

    /// `WriteValue` as called by the daemon.
    ///
    /// The stored value is left alone; the callback decides whether to call
    /// [`Characteristic::set_value`].
    pub fn write_value(&self, value: Vec<u8>, options: &PropMap) -> Result<()> {
        let write = lock(&self.callbacks).write.get("write")?;
        let options = AttributeOptions::decode(options)?;
        write(self, &options, value)
    }

    /// `StartNotify` as called by the daemon.
    pub fn start_notify(&self) -> Result<()> {
        if !self.notifying {
            return Err(Error::new(
                format!("{} does not support notify or indicate", self.uuid),
                "",
                ErrorType::NotPermitted,
            ));
        }
        let start = lock(&self.callbacks).start_notify.get("start notify")?;
        start(self)?;
        if self.subscriptions.insert(&self.path, self.uuid) {
            info!("Central subscribed to {}", self.uuid);
        }
        Ok(())
    }

    /// `StopNotify` as called by the daemon.
    pub fn stop_notify(&self) -> Result<()> {
        let stop = lock(&self.callbacks).stop_notify.get("stop notify")?;
        stop(self)?;
        if self.subscriptions.remove(&self.path) {
            info!("Central unsubscribed from {}", self.uuid);
        }
        Ok(())
    }

    /// `Confirm` as called by the daemon when a central acknowledged an indication.
    pub fn confirm(&self) {
        info!("Indication of {} confirmed", self.uuid);
    }

    /// Creates a descriptor under this characteristic and exports it.
    pub fn add_descriptor(
        &self,
        uuid: Uuid,
        flags: &[DescriptorFlag],
        value: Vec<u8>,
    ) -> Result<Arc<Descriptor>> {
        let index = {
            let mut descriptors = lock(&self.descriptors);
            next_index(&mut descriptors.last_index, &self.path, "descriptor")?
        };
        let descriptor = Arc::new(Descriptor::new(
            uuid,
            flags,
            index,
            &self.path,
            value,
            self.server.clone(),
        ));
        self.server
            .export(ExportedObject::Descriptor(descriptor.clone()))?;
        lock(&self.descriptors).list.push(descriptor.clone());
        Ok(descriptor)
    }
}

static PROPERTIES: &[PropertyDef<Characteristic>] = &[
    PropertyDef {
        name: "UUID",
        kind: PropertyKind::Str,
        access: Access::Read,
        get: |c| PropertyValue::Str(c.uuid.to_string()),
        set: None,
    },
    PropertyDef {
        name: "Service",
        kind: PropertyKind::ObjectPath,
        access: Access::Read,
        get: |c| PropertyValue::ObjectPath(c.service_path.clone()),
        set: None,
    },
    PropertyDef {
        name: "Value",
        kind: PropertyKind::Bytes,
        access: Access::ReadWrite,
        get: |c| PropertyValue::Bytes(c.value()),
        set: Some(|c, value| {
            c.set_value(value.into_bytes()?);
            Ok(())
        }),
    },
    PropertyDef {
        name: "Notifying",
        kind: PropertyKind::Bool,
        access: Access::Read,
        get: |c| PropertyValue::Bool(c.notifying),
        set: None,
    },
    PropertyDef {
        name: "Flags",
        kind: PropertyKind::StrList,
        access: Access::Read,
        get: |c| PropertyValue::StrList(c.flags.iter().map(|f| f.to_string()).collect()),
        set: None,
    },
];

impl GattObject for Characteristic {
    const INTERFACE: &'static str = GATT_CHARACTERISTIC_INTERFACE;

    fn properties() -> &'static [PropertyDef<Self>] {
        PROPERTIES
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Characteristic")
            .field("uuid", &self.uuid)
            .field("path", &self.path)
            .field("flags", &self.flags)
            .field("notifying", &self.notifying)
            .field("value", &self.value())
            .field("callbacks", &*lock(&self.callbacks))
            .finish()
    }
}
