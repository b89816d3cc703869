use super::object_path;
use crate::{
    gatt::constants::{BLUEZ_SERVICE, GATT_MANAGER_INTERFACE, LE_ADVERTISING_MANAGER_INTERFACE},
    peripheral::AdapterGateway,
    Result,
};
use async_trait::async_trait;
use bluer::Adapter;
use dbus::{
    arg::PropMap,
    nonblock::{stdintf::org_freedesktop_dbus::Properties, Proxy, SyncConnection},
};
use log::{debug, info};
use std::{sync::Arc, time::Duration};

const TIMEOUT: Duration = Duration::from_secs(120);

/// A BlueZ adapter such as `hci0`.
///
/// Adapter properties go through bluer. Application and advertisement
/// registration is called directly on the adapter object with the
/// connection the objects are exported on, since BlueZ calls back into the
/// registering connection.
pub struct BluezAdapter {
    adapter: Adapter,
    connection: Arc<SyncConnection>,
}

impl BluezAdapter {
    pub(crate) fn new(adapter: Adapter, connection: Arc<SyncConnection>) -> Self {
        BluezAdapter {
            adapter,
            connection,
        }
    }

    pub fn inner(&self) -> &Adapter {
        &self.adapter
    }

    fn proxy(&self) -> Proxy<'_, Arc<SyncConnection>> {
        Proxy::new(
            BLUEZ_SERVICE,
            format!("/org/bluez/{}", self.adapter.name()),
            TIMEOUT,
            self.connection.clone(),
        )
    }
}

#[async_trait]
impl AdapterGateway for BluezAdapter {
    fn name(&self) -> &str {
        self.adapter.name()
    }

    async fn power_on(&self) -> Result<()> {
        self.adapter.set_powered(true).await?;
        info!("Powered on {}", self.name());
        Ok(())
    }

    async fn power_off(&self) -> Result<()> {
        self.adapter.set_powered(false).await?;
        info!("Powered off {}", self.name());
        Ok(())
    }

    async fn is_powered(&self) -> Result<bool> {
        Ok(self.adapter.is_powered().await?)
    }

    async fn discoverable_on(&self, timeout: u32) -> Result<()> {
        self.adapter.set_discoverable_timeout(timeout).await?;
        self.adapter.set_discoverable(true).await?;
        debug!("{} discoverable for {}s", self.name(), timeout);
        Ok(())
    }

    async fn discoverable_off(&self) -> Result<()> {
        self.adapter.set_discoverable(false).await?;
        Ok(())
    }

    async fn address(&self) -> Result<String> {
        Ok(self.adapter.address().await?.to_string())
    }

    async fn set_alias(&self, alias: &str) -> Result<()> {
        self.adapter.set_alias(alias.to_string()).await?;
        Ok(())
    }

    async fn register_application(&self, path: &str) -> Result<()> {
        let path = object_path(path)?;
        self.proxy()
            .method_call::<(), _, _, _>(
                GATT_MANAGER_INTERFACE,
                "RegisterApplication",
                (path, PropMap::new()),
            )
            .await?;
        Ok(())
    }

    async fn unregister_application(&self, path: &str) -> Result<()> {
        let path = object_path(path)?;
        self.proxy()
            .method_call::<(), _, _, _>(GATT_MANAGER_INTERFACE, "UnregisterApplication", (path,))
            .await?;
        Ok(())
    }

    async fn register_advertisement(&self, path: &str) -> Result<()> {
        let path = object_path(path)?;
        self.proxy()
            .method_call::<(), _, _, _>(
                LE_ADVERTISING_MANAGER_INTERFACE,
                "RegisterAdvertisement",
                (path, PropMap::new()),
            )
            .await?;
        Ok(())
    }

    async fn unregister_advertisement(&self, path: &str) -> Result<()> {
        let path = object_path(path)?;
        self.proxy()
            .method_call::<(), _, _, _>(
                LE_ADVERTISING_MANAGER_INTERFACE,
                "UnregisterAdvertisement",
                (path,),
            )
            .await?;
        Ok(())
    }

    async fn active_advertising_instances(&self) -> Result<u8> {
        Ok(self.adapter.active_advertising_instances().await?)
    }

    async fn supported_advertising_features(&self) -> Result<Vec<String>> {
        let features: Vec<String> = self
            .proxy()
            .get(LE_ADVERTISING_MANAGER_INTERFACE, "SupportedFeatures")
            .await?;
        Ok(features)
    }
}
