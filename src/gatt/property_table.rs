//! Per-type property tables.
//!
//! Each exported attribute type lists its bus properties once, as a static
//! table of [`PropertyDef`]. The bus layer walks the table to publish the
//! properties, so no exporter needs to know the attribute types by heart.

use crate::{Error, ErrorType, Result};
use std::collections::BTreeMap;

/// Wire type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// `s`
    Str,
    /// `b`
    Bool,
    /// `ay`
    Bytes,
    /// `as`
    StrList,
    /// `o`
    ObjectPath,
    /// `q`
    U16,
    /// `n`
    I16,
    /// `u`
    U32,
    /// `a{qv}` with byte array values
    U16BytesMap,
    /// `a{sv}` with byte array values
    StrBytesMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    Bytes(Vec<u8>),
    StrList(Vec<String>),
    ObjectPath(String),
    U16(u16),
    I16(i16),
    U32(u32),
    U16BytesMap(BTreeMap<u16, Vec<u8>>),
    StrBytesMap(BTreeMap<String, Vec<u8>>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Str(_) => PropertyKind::Str,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Bytes(_) => PropertyKind::Bytes,
            PropertyValue::StrList(_) => PropertyKind::StrList,
            PropertyValue::ObjectPath(_) => PropertyKind::ObjectPath,
            PropertyValue::U16(_) => PropertyKind::U16,
            PropertyValue::I16(_) => PropertyKind::I16,
            PropertyValue::U32(_) => PropertyKind::U32,
            PropertyValue::U16BytesMap(_) => PropertyKind::U16BytesMap,
            PropertyValue::StrBytesMap(_) => PropertyKind::StrBytesMap,
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            PropertyValue::Bytes(bytes) => Ok(bytes),
            other => Err(Error::new(
                format!("expected a byte array, got {:?}", other.kind()),
                "",
                ErrorType::InvalidArguments,
            )),
        }
    }
}

pub type Getter<T> = fn(&T) -> PropertyValue;
pub type Setter<T> = fn(&T, PropertyValue) -> Result<()>;

pub struct PropertyDef<T: 'static> {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub access: Access,
    pub get: Getter<T>,
    pub set: Option<Setter<T>>,
}

/// An attribute that can be exported on the bus.
pub trait GattObject: Send + Sync + Sized + 'static {
    const INTERFACE: &'static str;

    fn properties() -> &'static [PropertyDef<Self>];

    fn path(&self) -> &str;

    fn property(&self, name: &str) -> Option<PropertyValue> {
        Self::properties()
            .iter()
            .find(|def| def.name == name)
            .map(|def| (def.get)(self))
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        let def = Self::properties()
            .iter()
            .find(|def| def.name == name)
            .ok_or_else(|| {
                Error::new(format!("no property {}", name), "", ErrorType::NotFound)
            })?;
        match (def.access, def.set) {
            (Access::ReadWrite, Some(set)) if value.kind() == def.kind => set(self, value),
            (Access::ReadWrite, Some(_)) => Err(Error::new(
                format!("property {} expects {:?}", name, def.kind),
                "",
                ErrorType::InvalidArguments,
            )),
            _ => Err(Error::new(
                format!("property {} is read-only", name),
                "",
                ErrorType::NotPermitted,
            )),
        }
    }

    fn all_properties(&self) -> Vec<(&'static str, PropertyValue)> {
        Self::properties()
            .iter()
            .map(|def| (def.name, (def.get)(self)))
            .collect()
    }
}
