pub mod bluez;

use crate::gatt::{
    advertisement::Advertisement, characteristic::Characteristic, descriptor::Descriptor,
    property_table::{GattObject, PropertyValue}, service::Service,
};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// An object to publish on the bus.
#[derive(Clone)]
pub enum ExportedObject {
    /// Root of an application tree; carries only the object manager.
    Application(String),
    Service(Arc<Service>),
    Characteristic(Arc<Characteristic>),
    Descriptor(Arc<Descriptor>),
    Advertisement(Arc<Advertisement>),
}

impl ExportedObject {
    pub fn path(&self) -> &str {
        match self {
            ExportedObject::Application(path) => path,
            ExportedObject::Service(s) => s.path(),
            ExportedObject::Characteristic(c) => c.path(),
            ExportedObject::Descriptor(d) => d.path(),
            ExportedObject::Advertisement(a) => a.path(),
        }
    }
}

/// Publishes attribute objects on the message bus.
///
/// Implementations dispatch inbound method calls and property access to the
/// exported objects. Exporting a path that is already exported is an error.
pub trait ObjectServer: Send + Sync {
    fn export(&self, object: ExportedObject) -> Result<()>;

    fn unexport(&self, path: &str) -> Result<()>;

    /// Fire-and-forget `PropertiesChanged` signal.
    fn emit_properties_changed(
        &self,
        path: &str,
        interface: &'static str,
        changed: Vec<(&'static str, PropertyValue)>,
    );
}

/// The Bluetooth adapter surface an application is registered with.
#[async_trait]
pub trait AdapterGateway: Send + Sync {
    fn name(&self) -> &str;

    async fn power_on(&self) -> Result<()>;

    async fn power_off(&self) -> Result<()>;

    async fn is_powered(&self) -> Result<bool>;

    async fn discoverable_on(&self, timeout: u32) -> Result<()>;

    async fn discoverable_off(&self) -> Result<()>;

    async fn address(&self) -> Result<String>;

    async fn set_alias(&self, alias: &str) -> Result<()>;

    async fn register_application(&self, path: &str) -> Result<()>;

    async fn unregister_application(&self, path: &str) -> Result<()>;

    async fn register_advertisement(&self, path: &str) -> Result<()>;

    async fn unregister_advertisement(&self, path: &str) -> Result<()>;

    async fn active_advertising_instances(&self) -> Result<u8>;

    async fn supported_advertising_features(&self) -> Result<Vec<String>>;
}
