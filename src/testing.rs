//! Bus and adapter doubles for unit tests.

use crate::gatt::{lock, property_table::PropertyValue};
use crate::peripheral::{AdapterGateway, ExportedObject, ObjectServer};
use crate::{Error, ErrorType, Result};
use async_trait::async_trait;
use dbus::arg::{RefArg, Variant};
use std::collections::{BTreeMap, HashSet};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

type ExportHook = Arc<dyn Fn() + Send + Sync>;

pub(crate) fn option<T: RefArg + 'static>(value: T) -> Variant<Box<dyn RefArg>> {
    let boxed: Box<dyn RefArg> = Box::new(value);
    Variant(boxed)
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Signal {
    pub path: String,
    pub interface: &'static str,
    pub changed: Vec<(&'static str, PropertyValue)>,
}

#[derive(Default)]
pub(crate) struct RecordingServer {
    objects: Mutex<BTreeMap<String, ExportedObject>>,
    signals: Mutex<Vec<Signal>>,
    export_hook: Mutex<Option<ExportHook>>,
    hook_finished: Mutex<Vec<bool>>,
}

impl RecordingServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn is_exported(&self, path: &str) -> bool {
        lock(&self.objects).contains_key(path)
    }

    pub fn object(&self, path: &str) -> Option<ExportedObject> {
        lock(&self.objects).get(path).cloned()
    }

    pub fn signals(&self) -> Vec<Signal> {
        lock(&self.signals).clone()
    }

    /// Runs `hook` on another thread during every export, the way a bus
    /// dispatcher thread would touch the tree while a child is published.
    pub fn on_export<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.export_hook) = Some(Arc::new(hook));
    }

    /// One entry per export with a hook: whether the hook returned while
    /// the export was still in progress.
    pub fn hook_finished(&self) -> Vec<bool> {
        lock(&self.hook_finished).clone()
    }

    fn run_export_hook(&self) {
        let Some(hook) = lock(&self.export_hook).clone() else {
            return;
        };
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            hook();
            let _ = tx.send(());
        });
        let finished = rx.recv_timeout(Duration::from_secs(2)).is_ok();
        lock(&self.hook_finished).push(finished);
    }
}

impl ObjectServer for RecordingServer {
    fn export(&self, object: ExportedObject) -> Result<()> {
        self.run_export_hook();
        let mut objects = lock(&self.objects);
        let path = object.path().to_string();
        if objects.contains_key(&path) {
            return Err(Error::new(
                format!("{} is already exported", path),
                "",
                ErrorType::InvalidArguments,
            ));
        }
        objects.insert(path, object);
        Ok(())
    }

    fn unexport(&self, path: &str) -> Result<()> {
        match lock(&self.objects).remove(path) {
            Some(_) => Ok(()),
            None => Err(Error::new(
                format!("{} is not exported", path),
                "",
                ErrorType::NotFound,
            )),
        }
    }

    fn emit_properties_changed(
        &self,
        path: &str,
        interface: &'static str,
        changed: Vec<(&'static str, PropertyValue)>,
    ) {
        lock(&self.signals).push(Signal {
            path: path.to_string(),
            interface,
            changed,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AdapterCall {
    SetAlias(String),
    RegisterApplication(String),
    UnregisterApplication(String),
    RegisterAdvertisement(String),
    UnregisterAdvertisement(String),
}

/// Scripted adapter that records every call and fails the operations it is told to.
#[derive(Default)]
pub(crate) struct MockAdapter {
    calls: Mutex<Vec<AdapterCall>>,
    failing: Mutex<HashSet<&'static str>>,
    powered: Mutex<bool>,
    advertisements: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, operation: &'static str) {
        lock(&self.failing).insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        lock(&self.failing).remove(operation);
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        lock(&self.calls).clone()
    }

    pub fn alias(&self) -> Option<String> {
        lock(&self.calls).iter().rev().find_map(|call| match call {
            AdapterCall::SetAlias(alias) => Some(alias.clone()),
            _ => None,
        })
    }

    fn record(&self, operation: &'static str, call: AdapterCall) -> Result<()> {
        lock(&self.calls).push(call);
        self.check(operation)
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if lock(&self.failing).contains(operation) {
            return Err(Error::new(
                "org.bluez.Error.Failed",
                format!("{} failed", operation),
                ErrorType::Transport,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl AdapterGateway for MockAdapter {
    fn name(&self) -> &str {
        "hci0"
    }

    async fn power_on(&self) -> Result<()> {
        self.check("power_on")?;
        *lock(&self.powered) = true;
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        self.check("power_off")?;
        *lock(&self.powered) = false;
        Ok(())
    }

    async fn is_powered(&self) -> Result<bool> {
        Ok(*lock(&self.powered))
    }

    async fn discoverable_on(&self, _timeout: u32) -> Result<()> {
        self.check("discoverable_on")
    }

    async fn discoverable_off(&self) -> Result<()> {
        self.check("discoverable_off")
    }

    async fn address(&self) -> Result<String> {
        Ok("00:11:22:33:44:55".to_string())
    }

    async fn set_alias(&self, alias: &str) -> Result<()> {
        self.record("set_alias", AdapterCall::SetAlias(alias.to_string()))
    }

    async fn register_application(&self, path: &str) -> Result<()> {
        self.record(
            "register_application",
            AdapterCall::RegisterApplication(path.to_string()),
        )
    }

    async fn unregister_application(&self, path: &str) -> Result<()> {
        self.record(
            "unregister_application",
            AdapterCall::UnregisterApplication(path.to_string()),
        )
    }

    async fn register_advertisement(&self, path: &str) -> Result<()> {
        self.record(
            "register_advertisement",
            AdapterCall::RegisterAdvertisement(path.to_string()),
        )?;
        lock(&self.advertisements).push(path.to_string());
        Ok(())
    }

    async fn unregister_advertisement(&self, path: &str) -> Result<()> {
        self.record(
            "unregister_advertisement",
            AdapterCall::UnregisterAdvertisement(path.to_string()),
        )?;
        lock(&self.advertisements).retain(|p| p != path);
        Ok(())
    }

    async fn active_advertising_instances(&self) -> Result<u8> {
        Ok(lock(&self.advertisements).len() as u8)
    }

    async fn supported_advertising_features(&self) -> Result<Vec<String>> {
        Ok(vec!["CanSetTxPower".to_string(), "HardwareOffload".to_string()])
    }
}
