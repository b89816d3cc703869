use super::{
    constants::LE_ADVERTISEMENT_INTERFACE,
    lock,
    property_table::{Access, GattObject, PropertyDef, PropertyKind, PropertyValue},
};
use crate::{Error, ErrorType, Result};
use log::{debug, info};
use std::{collections::BTreeMap, fmt, sync::Mutex};
use strum::{Display, EnumString, IntoStaticStr};
use uuid::Uuid;

pub const MIN_TX_POWER: i16 = -127;
pub const MAX_TX_POWER: i16 = 20;
/// Advertising intervals are in milliseconds.
pub const MIN_INTERVAL: u32 = 20;
pub const MAX_INTERVAL: u32 = 10_485_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum AdvertisementType {
    Broadcast,
    #[default]
    Peripheral,
}

/// Advertising parameters.
///
/// Tx power and intervals can only be changed through the validating
/// setters. The interval pair is checked as a whole by
/// [`AdvertisementData::validate`] once every change is applied, so the
/// bounds can be set in either order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementData {
    pub advertisement_type: AdvertisementType,
    pub local_name: String,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    pub solicit_uuids: Vec<Uuid>,
    pub service_data: BTreeMap<String, Vec<u8>>,
    pub includes: Vec<String>,
    pub appearance: u16,
    pub timeout: u16,
    pub discoverable: bool,
    tx_power: i16,
    min_interval: u32,
    max_interval: u32,
}

impl Default for AdvertisementData {
    fn default() -> Self {
        AdvertisementData {
            advertisement_type: AdvertisementType::Peripheral,
            local_name: String::new(),
            service_uuids: Vec::new(),
            manufacturer_data: BTreeMap::new(),
            solicit_uuids: Vec::new(),
            service_data: BTreeMap::new(),
            includes: Vec::new(),
            // Generic computer
            appearance: 0x0180,
            timeout: 3600,
            discoverable: true,
            tx_power: 20,
            min_interval: 100,
            max_interval: 100,
        }
    }
}

impl AdvertisementData {
    /// Defaults advertising `local_name` and `service_uuids`.
    pub fn new(local_name: impl Into<String>, service_uuids: Vec<Uuid>) -> Self {
        AdvertisementData {
            local_name: local_name.into(),
            service_uuids,
            ..AdvertisementData::default()
        }
    }

    pub fn tx_power(&self) -> i16 {
        self.tx_power
    }

    pub fn min_interval(&self) -> u32 {
        self.min_interval
    }

    pub fn max_interval(&self) -> u32 {
        self.max_interval
    }

    pub fn set_tx_power(&mut self, tx_power: i16) -> Result<()> {
        if !(MIN_TX_POWER..=MAX_TX_POWER).contains(&tx_power) {
            return Err(Error::new(
                format!("tx power {} out of range", tx_power),
                format!("expected {} to {} dBm", MIN_TX_POWER, MAX_TX_POWER),
                ErrorType::InvalidArguments,
            ));
        }
        self.tx_power = tx_power;
        Ok(())
    }

    pub fn set_min_interval(&mut self, interval: u32) -> Result<()> {
        check_interval(interval)?;
        self.min_interval = interval;
        Ok(())
    }

    pub fn set_max_interval(&mut self, interval: u32) -> Result<()> {
        check_interval(interval)?;
        self.max_interval = interval;
        Ok(())
    }

    /// Checks the constraints spanning more than one field.
    pub fn validate(&self) -> Result<()> {
        if self.min_interval > self.max_interval {
            return Err(Error::new(
                format!(
                    "min interval {} ms exceeds max interval {} ms",
                    self.min_interval, self.max_interval
                ),
                "",
                ErrorType::InvalidArguments,
            ));
        }
        Ok(())
    }
}

fn check_interval(interval: u32) -> Result<()> {
    if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&interval) {
        return Err(Error::new(
            format!("interval {} ms out of range", interval),
            format!("expected {} to {} ms", MIN_INTERVAL, MAX_INTERVAL),
            ErrorType::InvalidArguments,
        ));
    }
    Ok(())
}

/// An LE advertisement exported on the bus.
pub struct Advertisement {
    path: String,
    data: Mutex<AdvertisementData>,
}

impl Advertisement {
    pub(crate) fn new(index: u32, base_path: &str, data: AdvertisementData) -> Self {
        let path = format!("{}/advertisement{}", base_path, index);
        debug!("New advertisement at {}", path);
        Advertisement {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn data(&self) -> AdvertisementData {
        lock(&self.data).clone()
    }

    /// Changes the parameters. Changes after registration only reach the
    /// controller on the next registration.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut AdvertisementData) -> Result<()>,
    {
        let mut data = lock(&self.data).clone();
        f(&mut data)?;
        data.validate()?;
        *lock(&self.data) = data;
        Ok(())
    }

    /// `Release` as called by the daemon when it drops the advertisement.
    pub fn release(&self) {
        info!("Advertisement {} released", self.path);
    }
}

fn uuid_strings(uuids: &[Uuid]) -> Vec<String> {
    uuids.iter().map(|u| u.to_string()).collect()
}

static PROPERTIES: &[PropertyDef<Advertisement>] = &[
    PropertyDef {
        name: "Type",
        kind: PropertyKind::Str,
        access: Access::Read,
        get: |a| PropertyValue::Str(lock(&a.data).advertisement_type.to_string()),
        set: None,
    },
    PropertyDef {
        name: "ServiceUUIDs",
        kind: PropertyKind::StrList,
        access: Access::Read,
        get: |a| PropertyValue::StrList(uuid_strings(&lock(&a.data).service_uuids)),
        set: None,
    },
    PropertyDef {
        name: "ManufacturerData",
        kind: PropertyKind::U16BytesMap,
        access: Access::Read,
        get: |a| PropertyValue::U16BytesMap(lock(&a.data).manufacturer_data.clone()),
        set: None,
    },
    PropertyDef {
        name: "SolicitUUIDs",
        kind: PropertyKind::StrList,
        access: Access::Read,
        get: |a| PropertyValue::StrList(uuid_strings(&lock(&a.data).solicit_uuids)),
        set: None,
    },
    PropertyDef {
        name: "ServiceData",
        kind: PropertyKind::StrBytesMap,
        access: Access::Read,
        get: |a| PropertyValue::StrBytesMap(lock(&a.data).service_data.clone()),
        set: None,
    },
    PropertyDef {
        name: "Includes",
        kind: PropertyKind::StrList,
        access: Access::Read,
        get: |a| PropertyValue::StrList(lock(&a.data).includes.clone()),
        set: None,
    },
    PropertyDef {
        name: "TxPower",
        kind: PropertyKind::I16,
        access: Access::Read,
        get: |a| PropertyValue::I16(lock(&a.data).tx_power),
        set: None,
    },
    PropertyDef {
        name: "MinInterval",
        kind: PropertyKind::U32,
        access: Access::Read,
        get: |a| PropertyValue::U32(lock(&a.data).min_interval),
        set: None,
    },
    PropertyDef {
        name: "MaxInterval",
        kind: PropertyKind::U32,
        access: Access::Read,
        get: |a| PropertyValue::U32(lock(&a.data).max_interval),
        set: None,
    },
    PropertyDef {
        name: "LocalName",
        kind: PropertyKind::Str,
        access: Access::Read,
        get: |a| PropertyValue::Str(lock(&a.data).local_name.clone()),
        set: None,
    },
    PropertyDef {
        name: "Appearance",
        kind: PropertyKind::U16,
        access: Access::Read,
        get: |a| PropertyValue::U16(lock(&a.data).appearance),
        set: None,
    },
    PropertyDef {
        name: "Timeout",
        kind: PropertyKind::U16,
        access: Access::Read,
        get: |a| PropertyValue::U16(lock(&a.data).timeout),
        set: None,
    },
    PropertyDef {
        name: "Discoverable",
        kind: PropertyKind::Bool,
        access: Access::Read,
        get: |a| PropertyValue::Bool(lock(&a.data).discoverable),
        set: None,
    },
];

impl GattObject for Advertisement {
    const INTERFACE: &'static str = LE_ADVERTISEMENT_INTERFACE;

    fn properties() -> &'static [PropertyDef<Self>] {
        PROPERTIES
    }

    fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for Advertisement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advertisement")
            .field("path", &self.path)
            .field("data", &*lock(&self.data))
            .finish()
    }
}
