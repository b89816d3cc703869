use super::{
    callback::CharacteristicCallbacks,
    characteristic::Characteristic,
    constants::GATT_SERVICE_INTERFACE,
    lock, next_index,
    properties::CharacteristicFlag,
    property_table::{Access, GattObject, PropertyDef, PropertyKind, PropertyValue},
    subscription::SubscribedCharacteristics,
};
use crate::{
    peripheral::{ExportedObject, ObjectServer},
    Result,
};
use log::debug;
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

#[derive(Default)]
struct Characteristics {
    list: Vec<Arc<Characteristic>>,
    last_index: u16,
}

/// A GATT service. Created through [`crate::Application::add_service`].
pub struct Service {
    uuid: Uuid,
    primary: bool,
    path: String,
    characteristics: Mutex<Characteristics>,
    subscriptions: Arc<SubscribedCharacteristics>,
    server: Arc<dyn ObjectServer>,
}

impl Service {
    pub(crate) fn new(
        uuid: Uuid,
        primary: bool,
        index: u16,
        base_path: &str,
        subscriptions: Arc<SubscribedCharacteristics>,
        server: Arc<dyn ObjectServer>,
    ) -> Self {
        let path = format!("{}/service{:04x}", base_path, index);
        debug!("New service {} at {} (primary: {})", uuid, path, primary);
        Service {
            uuid,
            primary,
            path,
            characteristics: Mutex::new(Characteristics::default()),
            subscriptions,
            server,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn characteristics(&self) -> Vec<Arc<Characteristic>> {
        lock(&self.characteristics).list.clone()
    }

    /// Creates a characteristic without callbacks and exports it.
    pub fn add_characteristic(
        &self,
        uuid: Uuid,
        flags: &[CharacteristicFlag],
        value: Option<Vec<u8>>,
    ) -> Result<Arc<Characteristic>> {
        self.create_characteristic(uuid, flags, value, CharacteristicCallbacks::default())
    }

    /// Callbacks are bound before the characteristic becomes reachable on the bus.
    ///
    /// The list lock is released while exporting; the dispatcher reads it.
    pub(crate) fn create_characteristic(
        &self,
        uuid: Uuid,
        flags: &[CharacteristicFlag],
        value: Option<Vec<u8>>,
        callbacks: CharacteristicCallbacks,
    ) -> Result<Arc<Characteristic>> {
        let index = {
            let mut characteristics = lock(&self.characteristics);
            next_index(&mut characteristics.last_index, &self.path, "characteristic")?
        };
        let characteristic = Characteristic::new(
            uuid,
            flags,
            index,
            &self.path,
            value.unwrap_or_default(),
            self.subscriptions.clone(),
            self.server.clone(),
        );
        characteristic.set_callbacks(callbacks);
        let characteristic = Arc::new(characteristic);
        self.server
            .export(ExportedObject::Characteristic(characteristic.clone()))?;
        lock(&self.characteristics).list.push(characteristic.clone());
        Ok(characteristic)
    }
}

static PROPERTIES: &[PropertyDef<Service>] = &[
    PropertyDef {
        name: "UUID",
        kind: PropertyKind::Str,
        access: Access::Read,
        get: |s| PropertyValue::Str(s.uuid.to_string()),
        set: None,
    },
    PropertyDef {
        name: "Primary",
        kind: PropertyKind::Bool,
        access: Access::Read,
        get: |s| PropertyValue::Bool(s.primary),
        set: None,
    },
];

impl GattObject for Service {
    const INTERFACE: &'static str = GATT_SERVICE_INTERFACE;

    fn properties() -> &'static [PropertyDef<Self>] {
        PROPERTIES
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("uuid", &self.uuid)
            .field("primary", &self.primary)
            .field("path", &self.path)
            .field("characteristics", &self.characteristics())
            .finish()
    }
}
