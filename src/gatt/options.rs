use crate::{Error, ErrorType, Result};
use dbus::arg::{PropMap, RefArg};
use strum::{Display, EnumString};

/// Kind of write a central requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum WriteType {
    /// Write without response.
    Command,
    /// Write with response.
    Request,
    /// Reliable write.
    Reliable,
}

/// Options the daemon passes along with a read or write of a characteristic
/// or descriptor.
///
/// Most callbacks can ignore them. They matter for long values (`offset`)
/// and for authorization decisions (`device`, `prepare_authorize`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeOptions {
    /// Byte offset into the value.
    pub offset: u16,
    /// Exchanged MTU of the link, if the daemon reported one.
    pub mtu: Option<u16>,
    /// Object path of the remote device.
    pub device: Option<String>,
    /// Link type, e.g. `LE` or `BR/EDR`.
    pub link: Option<String>,
    pub write_type: Option<WriteType>,
    /// True when this is a prepare-write authorization request.
    pub prepare_authorize: bool,
}

impl AttributeOptions {
    pub fn decode(options: &PropMap) -> Result<Self> {
        let write_type = match read_str(options, "type")? {
            Some(value) => Some(value.parse().map_err(|_| {
                Error::new(
                    format!("unknown write type {:?}", value),
                    "expected command, request or reliable",
                    ErrorType::InvalidArguments,
                )
            })?),
            None => None,
        };
        Ok(Self {
            offset: read_u16(options, "offset")?.unwrap_or_default(),
            mtu: read_u16(options, "mtu")?,
            device: read_str(options, "device")?,
            link: read_str(options, "link")?,
            write_type,
            prepare_authorize: read_bool(options, "prepare-authorize")?.unwrap_or(false),
        })
    }
}

fn invalid_option(key: &str) -> Error {
    Error::new(
        format!("option {:?} has an unexpected type", key),
        "",
        ErrorType::InvalidArguments,
    )
}

fn read_u16(options: &PropMap, key: &str) -> Result<Option<u16>> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => value
            .0
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| invalid_option(key)),
    }
}

fn read_str(options: &PropMap, key: &str) -> Result<Option<String>> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => value
            .0
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid_option(key)),
    }
}

fn read_bool(options: &PropMap, key: &str) -> Result<Option<bool>> {
    match options.get(key) {
        None => Ok(None),
        Some(value) => value
            .0
            .as_any()
            .downcast_ref::<bool>()
            .map(|b| Some(*b))
            .ok_or_else(|| invalid_option(key)),
    }
}
