pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const BLUEZ_ERROR_PREFIX: &str = "org.bluez.Error.";

// BlueZ interfaces
pub const LE_ADVERTISEMENT_INTERFACE: &str = "org.bluez.LEAdvertisement1";
pub const LE_ADVERTISING_MANAGER_INTERFACE: &str = "org.bluez.LEAdvertisingManager1";

// GATT interfaces
pub const GATT_MANAGER_INTERFACE: &str = "org.bluez.GattManager1";
pub const GATT_SERVICE_INTERFACE: &str = "org.bluez.GattService1";
pub const GATT_CHARACTERISTIC_INTERFACE: &str = "org.bluez.GattCharacteristic1";
pub const GATT_DESCRIPTOR_INTERFACE: &str = "org.bluez.GattDescriptor1";
