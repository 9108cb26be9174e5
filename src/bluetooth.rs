//! Bluetooth LE links through btleplug.
//!
//! The first connect starts a scan on the configured adapter. Devices are
//! then looked up by hardware address among the peripherals the adapter has
//! seen, connected, and their GATT characteristics written without response.

use std::collections::BTreeSet;
use std::time::Duration;

use btleplug::api::{
    BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info};
use uuid::Uuid;

use crate::config::BluetoothConfig;
use crate::errors::Error;
use crate::runtime::{self, BoxFuture, Mutex};
use crate::transport::{Connector, Link};

type Result<T> = std::result::Result<T, Error>;

/// Opens links to Playbulb and Milight bulbs over the local Bluetooth adapter.
pub struct BleConnector {
    config: BluetoothConfig,
    adapter: Mutex<Option<Adapter>>,
}

impl BleConnector {
    const POLL_INTERVAL: Duration = Duration::from_millis(200);

    /// No Bluetooth call is made until the first [`Connector::connect`].
    pub fn new(config: BluetoothConfig) -> Self {
        BleConnector {
            config,
            adapter: Mutex::new(None),
        }
    }

    async fn adapter(&self) -> Result<Adapter> {
        let mut slot = self.adapter.lock().await;
        if let Some(adapter) = slot.as_ref() {
            return Ok(adapter.clone());
        }

        let manager = Manager::new().await.map_err(Error::bluetooth)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(Error::bluetooth)?
            .into_iter()
            .nth(self.config.adapter)
            .ok_or_else(|| {
                Error::bluetooth(format!("no bluetooth adapter #{}", self.config.adapter))
            })?;
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::bluetooth)?;
        if let Ok(name) = adapter.adapter_info().await {
            info!("Scanning with bluetooth adapter {}", name);
        }

        *slot = Some(adapter.clone());
        Ok(adapter)
    }

    async fn lookup(adapter: &Adapter, address: &str, target: BDAddr) -> Result<Peripheral> {
        loop {
            let peripherals = adapter
                .peripherals()
                .await
                .map_err(|e| Error::connection(address, e))?;
            if let Some(found) = peripherals.into_iter().find(|p| p.address() == target) {
                return Ok(found);
            }
            runtime::sleep(Self::POLL_INTERVAL).await;
        }
    }
}

impl Connector for BleConnector {
    fn connect<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Box<dyn Link>>> {
        Box::pin(async move {
            let target: BDAddr = address
                .parse()
                .map_err(|e| Error::connection(address, e))?;
            let adapter = self.adapter().await?;

            let peripheral = runtime::timeout(
                self.config.discovery_timeout(),
                Self::lookup(&adapter, address, target),
            )
            .await
            .map_err(|_| Error::connection(address, "not seen by the adapter"))??;

            if !peripheral.is_connected().await.unwrap_or(false) {
                peripheral
                    .connect()
                    .await
                    .map_err(|e| Error::connection(address, e))?;
            }
            peripheral
                .discover_services()
                .await
                .map_err(|e| Error::connection(address, e))?;
            debug!("Connected to {}", address);

            Ok(Box::new(BleLink {
                address: address.to_string(),
                characteristics: peripheral.characteristics(),
                peripheral,
            }) as Box<dyn Link>)
        })
    }
}

struct BleLink {
    address: String,
    peripheral: Peripheral,
    characteristics: BTreeSet<Characteristic>,
}

impl Link for BleLink {
    fn write<'a>(&'a mut self, characteristic: Uuid, value: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let target = self
                .characteristics
                .iter()
                .find(|c| c.uuid == characteristic)
                .ok_or_else(|| {
                    Error::connection(&self.address, format!("no characteristic {characteristic}"))
                })?;
            self.peripheral
                .write(target, value, WriteType::WithoutResponse)
                .await
                .map_err(|e| Error::connection(&self.address, e))
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.peripheral
                .disconnect()
                .await
                .map_err(|e| Error::connection(&self.address, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_address_fails_before_scanning() {
        let connector = BleConnector::new(BluetoothConfig::default());
        let result = connector.connect("desk-lamp").await;
        assert!(matches!(result, Err(Error::Connection { address, .. }) if address == "desk-lamp"));
        assert!(connector.adapter.lock().await.is_none());
    }
}
