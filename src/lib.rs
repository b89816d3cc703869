//! Expose a Linux host as a Bluetooth Low Energy GATT peripheral.
//!
//! The attribute tree (application, services, characteristics, descriptors)
//! and the advertisements live in [`gatt`]. They are published on a message
//! bus through the [`peripheral::ObjectServer`] seam and registered with a
//! Bluetooth adapter through [`peripheral::AdapterGateway`]. The BlueZ
//! implementation of both seams is in [`peripheral::bluez`].

pub mod error;
pub mod gatt;
pub mod peripheral;
mod uuid_ext;

#[cfg(test)]
mod testing;

pub use error::{Error, ErrorType, Result};
pub use gatt::{
    advertisement::{Advertisement, AdvertisementData, AdvertisementType},
    application::Application,
    characteristic::Characteristic,
    descriptor::Descriptor,
    options::{AttributeOptions, WriteType},
    properties::{CharacteristicFlag, DescriptorFlag},
    property_table::GattObject,
    service::Service,
};
pub use peripheral::bluez::{is_bluez_available, BluezAdapter, BluezSession, DbusObjectServer};
pub use peripheral::{AdapterGateway, ExportedObject, ObjectServer};
pub use uuid_ext::SdpShortUuid;
