use strum::{Display, EnumString, IntoStaticStr};

/// Characteristic property and permission flags, spelled the way the
/// Bluetooth daemon expects them in the `Flags` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum CharacteristicFlag {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
    Indicate,
    AuthenticatedSignedWrites,
    ExtendedProperties,
    ReliableWrite,
    WritableAuxiliaries,
    EncryptRead,
    EncryptWrite,
    EncryptNotify,
    EncryptIndicate,
    EncryptAuthenticatedRead,
    EncryptAuthenticatedWrite,
    EncryptAuthenticatedNotify,
    EncryptAuthenticatedIndicate,
    SecureRead,
    SecureWrite,
    SecureNotify,
    SecureIndicate,
    Authorize,
}

impl CharacteristicFlag {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// True for the flags that let a central subscribe to value changes.
    pub fn is_subscribable(self) -> bool {
        matches!(self, CharacteristicFlag::Notify | CharacteristicFlag::Indicate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DescriptorFlag {
    Read,
    Write,
    EncryptRead,
    EncryptWrite,
    EncryptAuthenticatedRead,
    EncryptAuthenticatedWrite,
    SecureRead,
    SecureWrite,
    Authorize,
}

impl DescriptorFlag {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
