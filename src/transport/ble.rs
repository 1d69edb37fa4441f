//! Bluetooth LE transport (btleplug)
//!
//! Talks to a real beacon through the platform BLE stack. The device is
//! located once, before any script runs; `connect` then opens the GATT
//! session and checks that the configuration service is present. The run
//! loop bounds the whole connect, discovery included.
//!
//! The platform stacks report ATT error responses as errors rather than as
//! statuses, so they are mapped back to the status the device sent. Nothing
//! here retries.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use uuid::Uuid;

use super::{ReadResponse, Transport, TransportError, TransportResult};
use crate::common::config::Timeouts;
use crate::common::{Error, Result};
use crate::gatt::{config_service, GattStatus};

/// GATT session with one physical device
pub struct BleTransport {
    peripheral: Peripheral,
    label: String,
    characteristics: HashMap<Uuid, Characteristic>,
}

/// A device seen while scanning
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    /// Advertises the configuration service
    pub configurable: bool,
}

async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await.map_err(|e| Error::Internal(e.to_string()))?;
    let adapters = manager
        .adapters()
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;
    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

async fn scan_adapter(adapter: &Adapter, duration: Duration) -> Result<Vec<(Peripheral, DiscoveredDevice)>> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| Error::Internal(format!("Failed to start scan: {}", e)))?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter
        .peripherals()
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    let mut found = Vec::new();
    for peripheral in peripherals {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let device = DiscoveredDevice {
            name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
            address: peripheral.address().to_string(),
            rssi: props.rssi,
            configurable: props.services.contains(&config_service::CONFIG_SERVICE),
        };
        found.push((peripheral, device));
    }

    if let Err(e) = adapter.stop_scan().await {
        tracing::debug!(error = %e, "stop_scan failed");
    }
    Ok(found)
}

/// Scan for nearby devices
pub async fn scan(duration: Duration) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    let found = scan_adapter(&adapter, duration).await?;
    Ok(found.into_iter().map(|(_, device)| device).collect())
}

fn matches(device: &DiscoveredDevice, filter: Option<&str>) -> bool {
    match filter {
        Some(f) => device.name.contains(f) || device.address.eq_ignore_ascii_case(f),
        None => device.configurable,
    }
}

impl BleTransport {
    /// Locate the device to test
    ///
    /// With a `filter`, the first device whose name contains it or whose
    /// address equals it is chosen; without one, the first device advertising
    /// the configuration service (beacons only do so in configuration mode).
    pub async fn discover(filter: Option<&str>, timeouts: &Timeouts) -> Result<Self> {
        let adapter = get_adapter().await?;
        tracing::info!(filter = ?filter, scan = ?timeouts.scan(), "scanning for device");

        let found = scan_adapter(&adapter, timeouts.scan()).await?;
        let Some((peripheral, device)) = found.into_iter().find(|(_, d)| matches(d, filter)) else {
            return Err(Error::DeviceNotFound(
                filter.unwrap_or("configuration service").to_string(),
            ));
        };

        tracing::info!(name = %device.name, address = %device.address, rssi = ?device.rssi, "device found");
        Ok(Self {
            peripheral,
            label: format!("{} ({})", device.name, device.address),
            characteristics: HashMap::new(),
        })
    }

    /// Human-readable name and address of the device
    pub fn label(&self) -> &str {
        &self.label
    }

    fn characteristic(&self, target: Uuid) -> TransportResult<&Characteristic> {
        self.characteristics
            .get(&target)
            .ok_or(TransportError::NotFound(target))
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self, service: Uuid) -> TransportResult<()> {
        tracing::debug!(device = %self.label, "connecting");

        self.peripheral
            .connect()
            .await
            .map_err(|e| transport_error(&e))?;
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| transport_error(&e))?;

        let services = self.peripheral.services();
        let Some(bound) = services.iter().find(|s| s.uuid == service) else {
            return Err(TransportError::NotFound(service));
        };

        self.characteristics = bound
            .characteristics
            .iter()
            .map(|c| (c.uuid, c.clone()))
            .collect();
        tracing::debug!(characteristics = self.characteristics.len(), "service discovered");
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.characteristics.clear();
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| transport_error(&e))
    }

    async fn write_attribute(&mut self, target: Uuid, payload: &[u8]) -> TransportResult<GattStatus> {
        let characteristic = self.characteristic(target)?.clone();
        match self
            .peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await
        {
            Ok(()) => Ok(GattStatus::SUCCESS),
            Err(e) => rejected(&e, GattStatus::WRITE_NOT_PERMITTED),
        }
    }

    async fn read_attribute(&mut self, target: Uuid) -> TransportResult<ReadResponse> {
        let characteristic = self.characteristic(target)?.clone();
        match self.peripheral.read(&characteristic).await {
            Ok(value) => Ok(ReadResponse {
                status: GattStatus::SUCCESS,
                value,
            }),
            Err(e) => rejected(&e, GattStatus::READ_NOT_PERMITTED).map(|status| ReadResponse {
                status,
                value: Vec::new(),
            }),
        }
    }
}

/// An error the device answered with, or a transport failure
fn rejected(error: &btleplug::Error, not_permitted: GattStatus) -> TransportResult<GattStatus> {
    match att_status(&error.to_string(), not_permitted) {
        Some(status) => {
            tracing::debug!(%status, error = %error, "device rejected request");
            Ok(status)
        }
        None => Err(transport_error(error)),
    }
}

fn transport_error(error: &btleplug::Error) -> TransportError {
    match error {
        btleplug::Error::NotConnected => TransportError::Disconnected,
        btleplug::Error::TimedOut(d) => TransportError::Timeout(*d),
        btleplug::Error::DeviceNotFound => TransportError::Disconnected,
        other => TransportError::Backend(other.to_string()),
    }
}

/// Recover the ATT status from a platform error message
///
/// Handles the explicit form (`ATT error: 0x0d`) and the BlueZ D-Bus error
/// names; `not_permitted` is the direction-specific status for BlueZ's
/// `NotPermitted`.
fn att_status(message: &str, not_permitted: GattStatus) -> Option<GattStatus> {
    let lower = message.to_ascii_lowercase();
    if let Some(pos) = lower.find("att error") {
        let rest = &lower[pos..];
        let hex = rest.split("0x").nth(1)?;
        let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        return u16::from_str_radix(&digits, 16).ok().map(GattStatus);
    }

    const BLUEZ: &[(&str, GattStatus)] = &[
        ("invalidvaluelength", GattStatus::INVALID_ATTRIBUTE_LENGTH),
        ("invalid length", GattStatus::INVALID_ATTRIBUTE_LENGTH),
        ("notauthorized", GattStatus::INSUFFICIENT_AUTHORIZATION),
        ("not authorized", GattStatus::INSUFFICIENT_AUTHORIZATION),
        ("notsupported", GattStatus::REQUEST_NOT_SUPPORTED),
    ];
    if lower.contains("notpermitted") || lower.contains("not permitted") {
        return Some(not_permitted);
    }
    BLUEZ
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, status)| *status)
}
