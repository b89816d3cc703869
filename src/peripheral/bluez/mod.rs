mod adapter;
mod error;
mod object_server;

pub use adapter::BluezAdapter;
pub use object_server::DbusObjectServer;

use crate::{gatt::constants::BLUEZ_SERVICE, Error, ErrorType, Result};
use dbus::{
    nonblock::{stdintf::org_freedesktop_dbus::Introspectable, Proxy, SyncConnection},
    Path,
};
use log::{info, warn};
use std::{sync::Arc, time::Duration};

const DEFAULT_ADAPTER: &str = "hci0";

pub(crate) fn object_path(path: &str) -> Result<Path<'static>> {
    Path::new(path.to_string()).map_err(|e| {
        Error::new(
            format!("invalid object path {:?}", path),
            e,
            ErrorType::InvalidArguments,
        )
    })
}

/// Connection to the Bluetooth daemon.
///
/// Holds a bluer session for the adapters and a separate system bus
/// connection on which the attribute objects are exported.
pub struct BluezSession {
    session: bluer::Session,
    connection: Arc<SyncConnection>,
    server: Arc<DbusObjectServer>,
}

impl BluezSession {
    pub async fn new() -> Result<Self> {
        let session = bluer::Session::new().await?;
        let (resource, connection) = dbus_tokio::connection::new_system_sync()?;
        tokio::spawn(async move {
            let err = resource.await;
            warn!("Lost connection to D-Bus: {}", err);
        });
        let server = Arc::new(DbusObjectServer::new(connection.clone()));
        Ok(BluezSession {
            session,
            connection,
            server,
        })
    }

    /// The object server to build applications on.
    pub fn object_server(&self) -> Arc<DbusObjectServer> {
        self.server.clone()
    }

    pub async fn adapter_names(&self) -> Result<Vec<String>> {
        Ok(self.session.adapter_names().await?)
    }

    /// Picks the first adapter whose name contains `name`, `hci0` by default.
    pub async fn select_adapter(&self, name: Option<&str>) -> Result<BluezAdapter> {
        let wanted = name.unwrap_or(DEFAULT_ADAPTER);
        let found = self
            .adapter_names()
            .await?
            .into_iter()
            .find(|adapter| adapter.contains(wanted))
            .ok_or_else(|| {
                Error::new(
                    format!("no Bluetooth adapter matching {:?}", wanted),
                    "",
                    ErrorType::NotFound,
                )
            })?;
        let adapter = self.session.adapter(&found)?;
        info!("Selected adapter {}", found);
        Ok(BluezAdapter::new(adapter, self.connection.clone()))
    }
}

/// Whether the Bluetooth daemon answers on the system bus.
pub async fn is_bluez_available() -> bool {
    let (resource, connection) = match dbus_tokio::connection::new_system_sync() {
        Ok(conn) => conn,
        Err(err) => {
            warn!("{}", err);
            return false;
        }
    };
    let handle = tokio::spawn(async move {
        resource.await;
    });
    let proxy = Proxy::new(BLUEZ_SERVICE, "/org/bluez", Duration::from_secs(5), connection);
    let available = match proxy.introspect().await {
        Ok(_) => true,
        Err(err) => {
            warn!("{}", err);
            false
        }
    };
    handle.abort();
    available
}
