use super::{
    advertisement::{Advertisement, AdvertisementData},
    callback::CharacteristicCallbacks,
    characteristic::Characteristic,
    lock, next_index,
    options::AttributeOptions,
    properties::CharacteristicFlag,
    property_table::GattObject,
    service::Service,
    subscription::SubscribedCharacteristics,
};
use crate::{
    peripheral::{AdapterGateway, ExportedObject, ObjectServer},
    Error, ErrorType, Result,
};
use log::{debug, info, warn};
use std::{
    fmt,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

#[derive(Default)]
struct Services {
    list: Vec<Arc<Service>>,
    last_index: u16,
}

#[derive(Default)]
struct Advertisements {
    list: Vec<Arc<Advertisement>>,
    last_index: u32,
}

/// Root of a GATT attribute tree.
///
/// The application exports itself at `/<name>` where `name` is the
/// application name stripped of everything outside `[A-Za-z0-9_]`. Services
/// are numbered from 1 and the first one added is the primary service.
///
/// Callbacks set on the application are copied onto every characteristic
/// created afterwards through [`Application::add_characteristic`].
/// Characteristics created earlier keep the callbacks they were given.
///
/// Callbacks run inside the bus dispatcher and must not add services,
/// characteristics or descriptors. Other threads may add them while the
/// dispatcher is serving calls.
pub struct Application {
    name: String,
    path: String,
    services: Mutex<Services>,
    advertisements: Mutex<Advertisements>,
    callbacks: Mutex<CharacteristicCallbacks>,
    subscriptions: Arc<SubscribedCharacteristics>,
    server: Arc<dyn ObjectServer>,
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

impl Application {
    /// Creates the application and exports its root object.
    pub fn new(name: &str, server: Arc<dyn ObjectServer>) -> Result<Self> {
        let sanitized = sanitize(name);
        if sanitized.is_empty() {
            return Err(Error::new(
                format!("application name {:?} has no path-safe characters", name),
                "expected at least one of A-Z, a-z, 0-9 or _",
                ErrorType::InvalidArguments,
            ));
        }
        let path = format!("/{}", sanitized);
        server.export(ExportedObject::Application(path.clone()))?;
        debug!("New application {:?} at {}", name, path);
        Ok(Application {
            name: name.to_string(),
            path,
            services: Mutex::new(Services::default()),
            advertisements: Mutex::new(Advertisements::default()),
            callbacks: Mutex::new(CharacteristicCallbacks::default()),
            subscriptions: Arc::new(SubscribedCharacteristics::new()),
            server,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn services(&self) -> Vec<Arc<Service>> {
        lock(&self.services).list.clone()
    }

    pub fn advertisements(&self) -> Vec<Arc<Advertisement>> {
        lock(&self.advertisements).list.clone()
    }

    pub fn subscriptions(&self) -> &SubscribedCharacteristics {
        &self.subscriptions
    }

    pub fn add_service(&self, uuid: Uuid) -> Result<Arc<Service>> {
        let index = {
            let mut services = lock(&self.services);
            next_index(&mut services.last_index, &self.path, "service")?
        };
        let service = Arc::new(Service::new(
            uuid,
            index == 1,
            index,
            &self.path,
            self.subscriptions.clone(),
            self.server.clone(),
        ));
        self.server.export(ExportedObject::Service(service.clone()))?;
        lock(&self.services).list.push(service.clone());
        Ok(service)
    }

    /// Adds a characteristic to the first service with `service_uuid`,
    /// bound to the application's current callbacks.
    pub fn add_characteristic(
        &self,
        service_uuid: Uuid,
        uuid: Uuid,
        value: Option<Vec<u8>>,
        flags: &[CharacteristicFlag],
    ) -> Result<Arc<Characteristic>> {
        let service = lock(&self.services)
            .list
            .iter()
            .find(|s| s.uuid() == service_uuid)
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    format!("no service with UUID {}", service_uuid),
                    "",
                    ErrorType::NotFound,
                )
            })?;
        let callbacks = lock(&self.callbacks).clone();
        service.create_characteristic(uuid, flags, value, callbacks)
    }

    pub fn set_read_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic, &AttributeOptions) -> Result<Vec<u8>> + Send + Sync + 'static,
    {
        lock(&self.callbacks).read.set(Arc::new(callback));
    }

    pub fn set_write_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic, &AttributeOptions, Vec<u8>) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).write.set(Arc::new(callback));
    }

    pub fn set_start_notify_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).start_notify.set(Arc::new(callback));
    }

    pub fn set_stop_notify_callback<F>(&self, callback: F)
    where
        F: Fn(&Characteristic) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.callbacks).stop_notify.set(Arc::new(callback));
    }

    pub async fn register(&self, adapter: &dyn AdapterGateway) -> Result<()> {
        adapter.register_application(&self.path).await?;
        info!("Application {} registered on {}", self.path, adapter.name());
        Ok(())
    }

    pub async fn unregister(&self, adapter: &dyn AdapterGateway) -> Result<()> {
        adapter.unregister_application(&self.path).await?;
        info!("Application {} unregistered from {}", self.path, adapter.name());
        Ok(())
    }

    /// Sets the adapter alias to the application name and advertises the
    /// first service.
    pub async fn start_advertising(&self, adapter: &dyn AdapterGateway) -> Result<Arc<Advertisement>> {
        self.start_advertising_with(adapter, |_| Ok(())).await
    }

    /// Like [`Application::start_advertising`], with a chance to adjust the
    /// advertisement before it is registered.
    pub async fn start_advertising_with<F>(
        &self,
        adapter: &dyn AdapterGateway,
        configure: F,
    ) -> Result<Arc<Advertisement>>
    where
        F: FnOnce(&mut AdvertisementData) -> Result<()>,
    {
        let first_service = lock(&self.services)
            .list
            .first()
            .map(|s| s.uuid())
            .ok_or_else(|| {
                Error::new(
                    "no service to advertise",
                    "add a service before advertising",
                    ErrorType::NotFound,
                )
            })?;

        let mut data = AdvertisementData::new(&self.name, vec![first_service]);
        configure(&mut data)?;
        data.validate()?;
        adapter.set_alias(&self.name).await?;

        let index = {
            let mut advertisements = lock(&self.advertisements);
            let index = advertisements.last_index.checked_add(1).ok_or_else(|| {
                Error::new(
                    format!("{} has no advertisement index left", self.path),
                    "",
                    ErrorType::InvalidArguments,
                )
            })?;
            advertisements.last_index = index;
            index
        };
        let advertisement = Arc::new(Advertisement::new(index, &self.path, data));
        self.server
            .export(ExportedObject::Advertisement(advertisement.clone()))?;

        if let Err(err) = adapter.register_advertisement(advertisement.path()).await {
            if let Err(unexport) = self.server.unexport(advertisement.path()) {
                warn!("Failed to unexport {}: {}", advertisement.path(), unexport);
            }
            return Err(err);
        }
        lock(&self.advertisements).list.push(advertisement.clone());
        info!("Advertising {} on {}", advertisement.path(), adapter.name());
        Ok(advertisement)
    }

    /// Clears the adapter alias and stops every tracked advertisement.
    ///
    /// Stops at the first failure; advertisements not yet stopped remain
    /// tracked.
    pub async fn stop_all_advertising(&self, adapter: &dyn AdapterGateway) -> Result<()> {
        adapter.set_alias("").await?;
        loop {
            let next = lock(&self.advertisements).list.first().cloned();
            let Some(advertisement) = next else {
                break;
            };
            self.stop_advertising(adapter, &advertisement).await?;
        }
        Ok(())
    }

    pub async fn stop_advertising(
        &self,
        adapter: &dyn AdapterGateway,
        advertisement: &Arc<Advertisement>,
    ) -> Result<()> {
        let tracked = lock(&self.advertisements)
            .list
            .iter()
            .any(|a| Arc::ptr_eq(a, advertisement));
        if !tracked {
            return Err(Error::new(
                format!("{} is not an advertisement of {}", advertisement.path(), self.path),
                "",
                ErrorType::NotFound,
            ));
        }
        adapter
            .unregister_advertisement(advertisement.path())
            .await?;
        lock(&self.advertisements)
            .list
            .retain(|a| !Arc::ptr_eq(a, advertisement));
        self.server.unexport(advertisement.path())?;
        info!("Stopped advertising {}", advertisement.path());
        Ok(())
    }

    /// Whether the adapter has any advertisement active, ours or not.
    pub async fn is_advertising(&self, adapter: &dyn AdapterGateway) -> Result<bool> {
        Ok(adapter.active_advertising_instances().await? > 0)
    }

    pub async fn supported_advertising_features(
        &self,
        adapter: &dyn AdapterGateway,
    ) -> Result<Vec<String>> {
        adapter.supported_advertising_features().await
    }

    /// True while a central is subscribed to at least one characteristic.
    ///
    /// A central that is connected but not subscribed is not seen.
    pub fn is_connected(&self) -> bool {
        !self.subscriptions.is_empty()
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("services", &self.services())
            .field("advertisements", &self.advertisements())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::property_table::PropertyValue;
    use crate::testing::{AdapterCall, MockAdapter, RecordingServer};
    use crate::SdpShortUuid;
    use dbus::arg::PropMap;

    fn uuid16(uuid: u16) -> Uuid {
        Uuid::from_sdp_short_uuid(uuid)
    }

    fn demo() -> (Application, Arc<RecordingServer>) {
        let server = RecordingServer::new();
        let app = Application::new("Demo", server.clone()).unwrap();
        (app, server)
    }

    #[test]
    fn name_is_sanitized_into_the_base_path() {
        let server = RecordingServer::new();
        let app = Application::new("My Pi-4 (den)_1", server.clone()).unwrap();
        assert_eq!(app.path(), "/MyPi4den_1");
        assert_eq!(app.name(), "My Pi-4 (den)_1");
        assert!(server.is_exported("/MyPi4den_1"));

        let err = Application::new("--- ---", server).unwrap_err();
        assert_eq!(err.kind(), ErrorType::InvalidArguments);
    }

    #[test]
    fn only_the_first_service_is_primary() {
        let (app, server) = demo();
        let services: Vec<_> = (0..18)
            .map(|i| app.add_service(uuid16(0x1800 + i)).unwrap())
            .collect();

        assert!(services[0].is_primary());
        assert!(services[1..].iter().all(|s| !s.is_primary()));
        assert_eq!(services[0].path(), "/Demo/service0001");
        assert_eq!(services[9].path(), "/Demo/service000a");
        assert_eq!(services[17].path(), "/Demo/service0012");
        assert_eq!(
            services[0].property("Primary"),
            Some(PropertyValue::Bool(true))
        );
        assert!(server.is_exported("/Demo/service0012"));
        match server.object("/Demo/service0001") {
            Some(ExportedObject::Service(exported)) => assert!(Arc::ptr_eq(&exported, &services[0])),
            other => panic!("unexpected export {:?}", other.map(|o| o.path().to_string())),
        }
    }

    #[test]
    fn service_list_is_readable_during_export() {
        let server = RecordingServer::new();
        let app = Arc::new(Application::new("Demo", server.clone()).unwrap());
        let reader = app.clone();
        server.on_export(move || {
            let _ = reader.services();
            let _ = format!("{:?}", reader);
        });

        app.add_service(uuid16(0x180D)).unwrap();
        app.add_characteristic(uuid16(0x180D), uuid16(0x2A37), None, &[])
            .unwrap();

        assert_eq!(server.hook_finished(), vec![true, true]);
        assert_eq!(app.services().len(), 1);
    }

    #[test]
    fn exhausted_service_indices_are_an_error() {
        let (app, server) = demo();
        lock(&app.services).last_index = u16::MAX;

        let err = app.add_service(uuid16(0x180D)).unwrap_err();
        assert_eq!(err.kind(), ErrorType::InvalidArguments);
        assert_eq!(server.paths(), vec!["/Demo".to_string()]);
        assert!(app.services().is_empty());
    }

    #[test]
    fn add_characteristic_to_unknown_service_is_not_found() {
        let (app, _) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let err = app
            .add_characteristic(uuid16(0x180F), uuid16(0x2A19), None, &[CharacteristicFlag::Read])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::NotFound);
    }

    #[test]
    fn first_matching_service_wins() {
        let (app, _) = demo();
        let first = app.add_service(uuid16(0x180D)).unwrap();
        let second = app.add_service(uuid16(0x180D)).unwrap();
        app.add_characteristic(uuid16(0x180D), uuid16(0x2A37), None, &[])
            .unwrap();
        assert_eq!(first.characteristics().len(), 1);
        assert!(second.characteristics().is_empty());
    }

    #[test]
    fn callbacks_are_copied_on_create() {
        let (app, _) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        app.set_read_callback(|_, _| Ok(vec![1]));
        let early = app
            .add_characteristic(uuid16(0x180D), uuid16(0x2A37), None, &[CharacteristicFlag::Read])
            .unwrap();

        app.set_read_callback(|_, _| Ok(vec![2]));
        let late = app
            .add_characteristic(uuid16(0x180D), uuid16(0x2A38), None, &[CharacteristicFlag::Read])
            .unwrap();

        assert_eq!(early.read_value(&PropMap::new()).unwrap(), vec![1]);
        assert_eq!(late.read_value(&PropMap::new()).unwrap(), vec![2]);
    }

    #[test]
    fn not_connected_until_a_subscription() {
        let (app, _) = demo();
        assert!(!app.is_connected());
        app.add_service(uuid16(0x180D)).unwrap();
        app.set_start_notify_callback(|_| Ok(()));
        let c = app
            .add_characteristic(uuid16(0x180D), uuid16(0x2A37), None, &[CharacteristicFlag::Notify])
            .unwrap();
        assert!(!app.is_connected());
        c.start_notify().unwrap();
        assert!(app.is_connected());
    }

    #[test]
    fn demo_scenario() {
        let (app, _) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        app.set_read_callback(|_, _| Ok(vec![0x02]));
        app.set_start_notify_callback(|_| Ok(()));
        app.set_stop_notify_callback(|_| Ok(()));
        let measurement = app
            .add_characteristic(
                uuid16(0x180D),
                uuid16(0x2A37),
                Some(vec![0x01]),
                &[CharacteristicFlag::Read, CharacteristicFlag::Notify],
            )
            .unwrap();

        assert_eq!(measurement.value(), vec![0x01]);
        assert_eq!(measurement.read_value(&PropMap::new()).unwrap(), vec![0x02]);
        measurement.start_notify().unwrap();
        assert!(app.is_connected());
        assert_eq!(app.subscriptions().uuids(), vec![uuid16(0x2A37)]);
        measurement.stop_notify().unwrap();
        assert!(!app.is_connected());
    }

    #[tokio::test]
    async fn register_and_unregister_use_the_base_path() {
        let (app, _) = demo();
        let adapter = MockAdapter::new();
        app.register(&adapter).await.unwrap();
        app.register(&adapter).await.unwrap();
        app.unregister(&adapter).await.unwrap();
        assert_eq!(
            adapter.calls(),
            vec![
                AdapterCall::RegisterApplication("/Demo".into()),
                AdapterCall::RegisterApplication("/Demo".into()),
                AdapterCall::UnregisterApplication("/Demo".into()),
            ]
        );
    }

    #[tokio::test]
    async fn registration_failure_propagates() {
        let (app, _) = demo();
        let adapter = MockAdapter::new();
        adapter.fail("register_application");
        let err = app.register(&adapter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::Transport);
    }

    #[tokio::test]
    async fn advertisement_carries_name_and_first_service() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        app.add_service(uuid16(0x180F)).unwrap();
        let adapter = MockAdapter::new();

        let advertisement = app.start_advertising(&adapter).await.unwrap();

        assert_eq!(advertisement.path(), "/Demo/advertisement1");
        assert!(server.is_exported("/Demo/advertisement1"));
        assert_eq!(
            advertisement.property("ServiceUUIDs"),
            Some(PropertyValue::StrList(vec![uuid16(0x180D).to_string()]))
        );
        assert_eq!(
            advertisement.property("LocalName"),
            Some(PropertyValue::Str("Demo".into()))
        );
        assert_eq!(adapter.alias(), Some("Demo".to_string()));
        assert_eq!(
            adapter.calls().last(),
            Some(&AdapterCall::RegisterAdvertisement("/Demo/advertisement1".into()))
        );
        assert!(app.is_advertising(&adapter).await.unwrap());
        assert_eq!(app.advertisements().len(), 1);
    }

    #[tokio::test]
    async fn advertising_without_services_is_not_found() {
        let (app, _) = demo();
        let adapter = MockAdapter::new();
        let err = app.start_advertising(&adapter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::NotFound);
        assert!(adapter.calls().is_empty());
    }

    #[tokio::test]
    async fn configured_advertisement_is_validated_before_export() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();

        let err = app
            .start_advertising_with(&adapter, |data| data.set_tx_power(30))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::InvalidArguments);
        assert!(!server.paths().iter().any(|p| p.contains("advertisement")));
        assert_eq!(adapter.alias(), None);
        assert!(adapter.calls().is_empty());

        let advertisement = app
            .start_advertising_with(&adapter, |data| {
                data.set_min_interval(200)?;
                data.set_max_interval(400)?;
                data.manufacturer_data.insert(0xFFFF, vec![0x01]);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(advertisement.data().min_interval(), 200);
        assert_eq!(advertisement.data().max_interval(), 400);
    }

    #[tokio::test]
    async fn inverted_interval_range_is_rejected_before_touching_the_adapter() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();

        let err = app
            .start_advertising_with(&adapter, |data| {
                data.set_min_interval(400)?;
                data.set_max_interval(200)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorType::InvalidArguments);
        assert!(adapter.calls().is_empty());
        assert!(!server.paths().iter().any(|p| p.contains("advertisement")));

        let advertisement = app.start_advertising(&adapter).await.unwrap();
        assert_eq!(advertisement.path(), "/Demo/advertisement1");
    }

    #[tokio::test]
    async fn exhausted_advertisement_indices_are_an_error() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        lock(&app.advertisements).last_index = u32::MAX;
        let adapter = MockAdapter::new();

        let err = app.start_advertising(&adapter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::InvalidArguments);
        assert!(!server.paths().iter().any(|p| p.contains("advertisement")));
        assert!(app.advertisements().is_empty());
    }

    #[tokio::test]
    async fn failed_registration_unexports_and_does_not_track() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();
        adapter.fail("register_advertisement");

        let err = app.start_advertising(&adapter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::Transport);
        assert!(!server.is_exported("/Demo/advertisement1"));
        assert!(app.advertisements().is_empty());

        adapter.recover("register_advertisement");
        let advertisement = app.start_advertising(&adapter).await.unwrap();
        assert_eq!(advertisement.path(), "/Demo/advertisement2");
    }

    #[tokio::test]
    async fn stop_all_advertising_clears_the_list() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();
        app.start_advertising(&adapter).await.unwrap();
        app.start_advertising(&adapter).await.unwrap();

        app.stop_all_advertising(&adapter).await.unwrap();

        assert!(app.advertisements().is_empty());
        assert!(!server.is_exported("/Demo/advertisement1"));
        assert!(!server.is_exported("/Demo/advertisement2"));
        assert_eq!(adapter.alias(), Some(String::new()));
        assert!(!app.is_advertising(&adapter).await.unwrap());

        let again = app.start_advertising(&adapter).await.unwrap();
        assert_eq!(again.path(), "/Demo/advertisement3");
    }

    #[tokio::test]
    async fn stop_all_advertising_keeps_what_it_could_not_stop() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();
        app.start_advertising(&adapter).await.unwrap();
        adapter.fail("unregister_advertisement");

        let err = app.stop_all_advertising(&adapter).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::Transport);
        assert_eq!(app.advertisements().len(), 1);
        assert!(server.is_exported("/Demo/advertisement1"));
    }

    #[tokio::test]
    async fn stop_single_advertisement() {
        let (app, server) = demo();
        app.add_service(uuid16(0x180D)).unwrap();
        let adapter = MockAdapter::new();
        let first = app.start_advertising(&adapter).await.unwrap();
        let second = app.start_advertising(&adapter).await.unwrap();

        app.stop_advertising(&adapter, &first).await.unwrap();
        let remaining = app.advertisements();
        assert_eq!(remaining.len(), 1);
        assert!(Arc::ptr_eq(&remaining[0], &second));
        assert!(!server.is_exported(first.path()));

        let err = app.stop_advertising(&adapter, &first).await.unwrap_err();
        assert_eq!(err.kind(), ErrorType::NotFound);
    }

    #[tokio::test]
    async fn supported_features_are_forwarded() {
        let (app, _) = demo();
        let adapter = MockAdapter::new();
        assert_eq!(
            app.supported_advertising_features(&adapter).await.unwrap(),
            vec!["CanSetTxPower".to_string(), "HardwareOffload".to_string()]
        );
    }
}
