use uuid::Uuid;

const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Builds full UUIDs from the 16 and 32 bit aliases assigned by the Bluetooth SIG.
pub trait SdpShortUuid<T> {
    fn from_sdp_short_uuid(uuid: T) -> Self;
}

impl SdpShortUuid<u16> for Uuid {
    fn from_sdp_short_uuid(uuid: u16) -> Self {
        Uuid::from_u128(BLUETOOTH_BASE_UUID | ((uuid as u128) << 96))
    }
}

impl SdpShortUuid<u32> for Uuid {
    fn from_sdp_short_uuid(uuid: u32) -> Self {
        Uuid::from_u128(BLUETOOTH_BASE_UUID | ((uuid as u128) << 96))
    }
}
