use super::object_path;
use crate::{
    gatt::{
        advertisement::Advertisement,
        characteristic::Characteristic,
        descriptor::Descriptor,
        lock,
        property_table::{Access, GattObject, PropertyKind, PropertyValue},
        service::Service,
    },
    peripheral::{ExportedObject, ObjectServer},
    Error, ErrorType, Result,
};
use dbus::{
    arg::{PropMap, RefArg, Variant},
    channel::{MatchingReceiver, Sender},
    message::{MatchRule, SignalArgs},
    nonblock::{stdintf::org_freedesktop_dbus::PropertiesPropertiesChanged, SyncConnection},
    Message, MethodErr, Path,
};
use dbus_crossroads::{Crossroads, IfaceBuilder, IfaceToken};
use log::{debug, warn};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

#[derive(Debug, Clone, Copy)]
enum Kind {
    Application,
    Service,
    Characteristic,
    Descriptor,
    Advertisement,
}

struct Tree {
    crossroads: Crossroads,
    exported: BTreeMap<String, Kind>,
}

struct Tokens {
    object_manager: IfaceToken<()>,
    service: IfaceToken<Arc<Service>>,
    characteristic: IfaceToken<Arc<Characteristic>>,
    descriptor: IfaceToken<Arc<Descriptor>>,
    advertisement: IfaceToken<Arc<Advertisement>>,
}

/// Publishes attribute objects on a D-Bus connection through crossroads.
///
/// Inbound method calls are dispatched while the object tree is locked, so
/// callbacks must not export or unexport objects. Attribute lists are never
/// locked across an export, so other threads may add objects meanwhile.
pub struct DbusObjectServer {
    sender: Arc<dyn Sender + Send + Sync>,
    tree: Arc<Mutex<Tree>>,
    tokens: Tokens,
}

fn kind_mismatch(value: PropertyValue) -> MethodErr {
    MethodErr::failed(&format!("unexpected property type {:?}", value.kind()))
}

macro_rules! table_property {
    ($ib:expr, $def:expr, $ty:ty, $variant:ident, |$v:ident| $to_dbus:expr, |$w:ident| $from_dbus:expr) => {{
        let get = $def.get;
        let builder = $ib
            .property::<$ty, _>($def.name)
            .get(move |_, object| match get(&**object) {
                PropertyValue::$variant($v) => $to_dbus,
                other => Err(kind_mismatch(other)),
            });
        if let (Access::ReadWrite, Some(set)) = ($def.access, $def.set) {
            builder.set(move |_, object, $w: $ty| {
                set(&**object, PropertyValue::$variant($from_dbus))?;
                Ok(None)
            });
        }
    }};
}

/// Adds every entry of the property table of `T` to the interface.
fn table_properties<T: GattObject>(ib: &mut IfaceBuilder<Arc<T>>) {
    for def in T::properties() {
        match def.kind {
            PropertyKind::Str => table_property!(ib, def, String, Str, |v| Ok(v), |v| v),
            PropertyKind::Bool => table_property!(ib, def, bool, Bool, |v| Ok(v), |v| v),
            PropertyKind::Bytes => table_property!(ib, def, Vec<u8>, Bytes, |v| Ok(v), |v| v),
            PropertyKind::StrList => {
                table_property!(ib, def, Vec<String>, StrList, |v| Ok(v), |v| v)
            }
            PropertyKind::ObjectPath => table_property!(
                ib,
                def,
                Path<'static>,
                ObjectPath,
                |v| Path::new(v).map_err(|e| MethodErr::failed(&e)),
                |v| v.to_string()
            ),
            PropertyKind::U16 => table_property!(ib, def, u16, U16, |v| Ok(v), |v| v),
            PropertyKind::I16 => table_property!(ib, def, i16, I16, |v| Ok(v), |v| v),
            PropertyKind::U32 => table_property!(ib, def, u32, U32, |v| Ok(v), |v| v),
            PropertyKind::U16BytesMap => table_property!(
                ib,
                def,
                HashMap<u16, Variant<Vec<u8>>>,
                U16BytesMap,
                |v| Ok(v.into_iter().map(|(k, b)| (k, Variant(b))).collect()),
                |v| v.into_iter().map(|(k, b)| (k, b.0)).collect()
            ),
            PropertyKind::StrBytesMap => table_property!(
                ib,
                def,
                HashMap<String, Variant<Vec<u8>>>,
                StrBytesMap,
                |v| Ok(v.into_iter().map(|(k, b)| (k, Variant(b))).collect()),
                |v| v.into_iter().map(|(k, b)| (k, b.0)).collect()
            ),
        }
    }
}

fn boxed(value: PropertyValue) -> Option<Box<dyn RefArg>> {
    let boxed: Box<dyn RefArg> = match value {
        PropertyValue::Str(v) => Box::new(v),
        PropertyValue::Bool(v) => Box::new(v),
        PropertyValue::Bytes(v) => Box::new(v),
        PropertyValue::StrList(v) => Box::new(v),
        PropertyValue::ObjectPath(v) => Box::new(Path::new(v).ok()?),
        PropertyValue::U16(v) => Box::new(v),
        PropertyValue::I16(v) => Box::new(v),
        PropertyValue::U32(v) => Box::new(v),
        PropertyValue::U16BytesMap(v) => Box::new(
            v.into_iter()
                .map(|(k, b)| (k, Variant(b)))
                .collect::<HashMap<_, _>>(),
        ),
        PropertyValue::StrBytesMap(v) => Box::new(
            v.into_iter()
                .map(|(k, b)| (k, Variant(b)))
                .collect::<HashMap<_, _>>(),
        ),
    };
    Some(boxed)
}

fn register_interfaces(cr: &mut Crossroads) -> Tokens {
    let object_manager = cr.object_manager::<()>();
    let service = cr.register(Service::INTERFACE, |ib: &mut IfaceBuilder<Arc<Service>>| {
        table_properties(ib);
    });
    let characteristic = cr.register(
        Characteristic::INTERFACE,
        |ib: &mut IfaceBuilder<Arc<Characteristic>>| {
            table_properties(ib);
            ib.method(
                "ReadValue",
                ("options",),
                ("value",),
                |_, c, (options,): (PropMap,)| Ok((c.read_value(&options)?,)),
            );
            ib.method(
                "WriteValue",
                ("value", "options"),
                (),
                |_, c, (value, options): (Vec<u8>, PropMap)| {
                    c.write_value(value, &options)?;
                    Ok(())
                },
            );
            ib.method("StartNotify", (), (), |_, c, _: ()| {
                c.start_notify()?;
                Ok(())
            });
            ib.method("StopNotify", (), (), |_, c, _: ()| {
                c.stop_notify()?;
                Ok(())
            });
            ib.method("Confirm", (), (), |_, c, _: ()| {
                c.confirm();
                Ok(())
            });
        },
    );
    let descriptor = cr.register(
        Descriptor::INTERFACE,
        |ib: &mut IfaceBuilder<Arc<Descriptor>>| {
            table_properties(ib);
            ib.method(
                "ReadValue",
                ("options",),
                ("value",),
                |_, d, (options,): (PropMap,)| Ok((d.read_value(&options)?,)),
            );
            ib.method(
                "WriteValue",
                ("value", "options"),
                (),
                |_, d, (value, options): (Vec<u8>, PropMap)| {
                    d.write_value(value, &options)?;
                    Ok(())
                },
            );
        },
    );
    let advertisement = cr.register(
        Advertisement::INTERFACE,
        |ib: &mut IfaceBuilder<Arc<Advertisement>>| {
            table_properties(ib);
            ib.method("Release", (), (), |_, a, _: ()| {
                a.release();
                Ok(())
            });
        },
    );
    Tokens {
        object_manager,
        service,
        characteristic,
        descriptor,
        advertisement,
    }
}

struct SharedSender<'a>(&'a (dyn Sender + Send + Sync));

impl Sender for SharedSender<'_> {
    fn send(&self, msg: Message) -> std::result::Result<u32, ()> {
        self.0.send(msg)
    }
}

fn dispatch<S: Sender>(tree: &Mutex<Tree>, msg: Message, sender: &S) {
    if lock(tree).crossroads.handle_message(msg, sender).is_err() {
        debug!("Unhandled method call");
    }
}

impl DbusObjectServer {
    /// Registers the GATT and advertisement interfaces and starts serving
    /// method calls received on `connection`.
    pub fn new(connection: Arc<SyncConnection>) -> Self {
        let server = Self::with_sender(connection.clone());
        let tree = server.tree.clone();
        connection.start_receive(
            MatchRule::new_method_call(),
            Box::new(move |msg, conn| {
                dispatch(&tree, msg, conn);
                true
            }),
        );
        server
    }

    /// A server whose replies and signals go to `sender`. Nothing is
    /// received until method calls are passed to [`DbusObjectServer::handle_message`].
    pub fn with_sender(sender: Arc<dyn Sender + Send + Sync>) -> Self {
        let mut crossroads = Crossroads::new();
        let tokens = register_interfaces(&mut crossroads);
        DbusObjectServer {
            sender,
            tree: Arc::new(Mutex::new(Tree {
                crossroads,
                exported: BTreeMap::new(),
            })),
            tokens,
        }
    }

    /// Dispatches one inbound method call; the reply goes to the server's sender.
    pub fn handle_message(&self, msg: Message) {
        dispatch(&self.tree, msg, &SharedSender(&*self.sender));
    }

    pub fn exported_paths(&self) -> Vec<String> {
        lock(&self.tree).exported.keys().cloned().collect()
    }
}

impl ObjectServer for DbusObjectServer {
    fn export(&self, object: ExportedObject) -> Result<()> {
        let path = object_path(object.path())?;
        let mut tree = lock(&self.tree);
        if tree.exported.contains_key(&*path) {
            return Err(Error::new(
                format!("{} is already exported", path),
                "",
                ErrorType::InvalidArguments,
            ));
        }
        let kind = match object {
            ExportedObject::Application(_) => {
                tree.crossroads
                    .insert(path.clone(), &[self.tokens.object_manager], ());
                Kind::Application
            }
            ExportedObject::Service(s) => {
                tree.crossroads
                    .insert(path.clone(), &[self.tokens.service], s);
                Kind::Service
            }
            ExportedObject::Characteristic(c) => {
                tree.crossroads
                    .insert(path.clone(), &[self.tokens.characteristic], c);
                Kind::Characteristic
            }
            ExportedObject::Descriptor(d) => {
                tree.crossroads
                    .insert(path.clone(), &[self.tokens.descriptor], d);
                Kind::Descriptor
            }
            ExportedObject::Advertisement(a) => {
                tree.crossroads
                    .insert(path.clone(), &[self.tokens.advertisement], a);
                Kind::Advertisement
            }
        };
        debug!("Exported {:?} at {}", kind, path);
        tree.exported.insert(path.to_string(), kind);
        Ok(())
    }

    fn unexport(&self, path: &str) -> Result<()> {
        let mut tree = lock(&self.tree);
        let kind = tree.exported.remove(path).ok_or_else(|| {
            Error::new(format!("{} is not exported", path), "", ErrorType::NotFound)
        })?;
        let path = object_path(path)?;
        let cr = &mut tree.crossroads;
        match kind {
            Kind::Application => {
                let _: Option<()> = cr.remove(&path);
            }
            Kind::Service => {
                let _: Option<Arc<Service>> = cr.remove(&path);
            }
            Kind::Characteristic => {
                let _: Option<Arc<Characteristic>> = cr.remove(&path);
            }
            Kind::Descriptor => {
                let _: Option<Arc<Descriptor>> = cr.remove(&path);
            }
            Kind::Advertisement => {
                let _: Option<Arc<Advertisement>> = cr.remove(&path);
            }
        }
        debug!("Unexported {:?} at {}", kind, path);
        Ok(())
    }

    fn emit_properties_changed(
        &self,
        path: &str,
        interface: &'static str,
        changed: Vec<(&'static str, PropertyValue)>,
    ) {
        let path = match object_path(path) {
            Ok(path) => path,
            Err(err) => {
                warn!("Not emitting PropertiesChanged: {}", err);
                return;
            }
        };
        let changed_properties: PropMap = changed
            .into_iter()
            .filter_map(|(name, value)| boxed(value).map(|v| (name.to_string(), Variant(v))))
            .collect();
        let signal = PropertiesPropertiesChanged {
            interface_name: interface.to_string(),
            changed_properties,
            invalidated_properties: Vec::new(),
        };
        if self.sender.send(signal.to_emit_message(&path)).is_err() {
            warn!("Failed to send PropertiesChanged for {}", path);
        }
    }
}
