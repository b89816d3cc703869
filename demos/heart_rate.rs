use std::time::Duration;
use uuid::Uuid;

use ble_gatt_peripheral::{
    AdapterGateway, Application, BluezSession, CharacteristicFlag, DescriptorFlag, GattObject,
    SdpShortUuid,
};

const ADVERTISING_NAME: &str = "Demo";
const DISCOVERABLE_TIMEOUT: u32 = 180;
const UPDATE_INTERVAL: Duration = Duration::from_secs(1);

const HEART_RATE_SERVICE: u16 = 0x180D;
const HEART_RATE_MEASUREMENT: u16 = 0x2A37;
const USER_DESCRIPTION: u16 = 0x2901;

#[tokio::main]
async fn main() -> ble_gatt_peripheral::Result<()> {
    if let Err(err) = pretty_env_logger::try_init() {
        eprintln!("WARNING: failed to initialize logging framework: {}", err);
    }

    if !ble_gatt_peripheral::is_bluez_available().await {
        eprintln!("BlueZ is not running");
        return Ok(());
    }

    let session = BluezSession::new().await?;
    let adapter = session.select_adapter(None).await?;
    adapter.power_on().await?;
    adapter.discoverable_on(DISCOVERABLE_TIMEOUT).await?;
    println!(
        "Using adapter {} with address {}",
        adapter.name(),
        adapter.address().await?
    );

    let app = Application::new(ADVERTISING_NAME, session.object_server())?;

    app.set_read_callback(|characteristic, options| {
        println!("Read {} at offset {}", characteristic.uuid(), options.offset);
        Ok(characteristic.value())
    });
    app.set_start_notify_callback(|characteristic| {
        println!("Central subscribed to {}", characteristic.uuid());
        Ok(())
    });
    app.set_stop_notify_callback(|characteristic| {
        println!("Central unsubscribed from {}", characteristic.uuid());
        Ok(())
    });

    let service_uuid = Uuid::from_sdp_short_uuid(HEART_RATE_SERVICE);
    app.add_service(service_uuid)?;
    let measurement = app.add_characteristic(
        service_uuid,
        Uuid::from_sdp_short_uuid(HEART_RATE_MEASUREMENT),
        Some(vec![0x00, 60]),
        &[CharacteristicFlag::Read, CharacteristicFlag::Notify],
    )?;
    measurement.add_descriptor(
        Uuid::from_sdp_short_uuid(USER_DESCRIPTION),
        &[DescriptorFlag::Read],
        b"Heart rate in bpm".to_vec(),
    )?;

    app.register(&adapter).await?;
    let advertisement = app.start_advertising(&adapter).await?;
    println!("Advertising at {}", advertisement.path());

    let mut ticker = tokio::time::interval(UPDATE_INTERVAL);
    let mut bpm: u8 = 60;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if app.is_connected() {
                    bpm = if bpm >= 100 { 60 } else { bpm + 1 };
                    measurement.set_value(vec![0x00, bpm]);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.stop_all_advertising(&adapter).await?;
    app.unregister(&adapter).await?;
    println!("Stopped");
    Ok(())
}
