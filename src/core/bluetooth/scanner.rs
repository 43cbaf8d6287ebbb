use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::sleep;

use crate::core::bluetooth::constants::{MANUFACTURER_DATA_TAG, VEHICLE_LOCAL_NAME_HEX};
use crate::core::bluetooth::radio::{Advertisement, RadioAdapter};
use crate::core::bluetooth::types::{normalize_address, DeviceRecord};

/// Runs time-bounded discovery passes for vehicles, one at a time
pub struct VehicleScanner<R: RadioAdapter> {
    radio: Arc<R>,
    scan_timeout: Duration,
    name_filter: String,
    /// Held for the whole pass; the radio has a single scan to start and stop
    pass: AsyncMutex<()>,
}

impl<R: RadioAdapter> VehicleScanner<R> {
    pub fn new(radio: Arc<R>, scan_timeout: Duration, name_filter: String) -> Self {
        Self {
            radio,
            scan_timeout,
            name_filter,
            pass: AsyncMutex::new(()),
        }
    }

    /// Scans until the radio finishes or the timeout elapses, whichever comes first,
    /// and returns the vehicles seen in discovery order. A pass requested while another
    /// is running waits for it and then runs its own full window.
    pub async fn discover(&self) -> Vec<DeviceRecord<R::Peripheral>> {
        let _pass = self.pass.lock().await;
        let found: Arc<Mutex<Vec<DeviceRecord<R::Peripheral>>>> = Arc::new(Mutex::new(Vec::new()));

        let devices_for_task = found.clone();
        let name_filter = self.name_filter.clone();
        let radio_for_task = self.radio.clone();

        let mut scan_task = tokio::spawn(async move {
            radio_for_task
                .scan(Box::new(move |advertisement: Advertisement<R::Peripheral>| {
                    let Some(record) = vehicle_record(&name_filter, advertisement) else {
                        return;
                    };
                    let mut devices = devices_for_task.lock().unwrap_or_else(PoisonError::into_inner);
                    if devices.iter().all(|d| d.address != record.address) {
                        info!("Found {}", record.address);
                        devices.push(record);
                    }
                }))
                .await
        });

        tokio::select! {
            result = &mut scan_task => {
                match result {
                    Ok(Ok(())) => info!("Scan finished before the timeout."),
                    Ok(Err(e)) => error!("Scan failed: {}", e),
                    Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
                }
            }
            _ = sleep(self.scan_timeout) => {
                info!("Scan window of {:?} elapsed.", self.scan_timeout);
            }
        }

        // The timeout only ends our wait; the radio must still be told to stop.
        if let Err(e) = self.radio.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let devices = found.lock().unwrap_or_else(PoisonError::into_inner).clone();
        devices
    }
}

/// Builds the record for an advertisement whose name passes the filter
pub fn vehicle_record<P>(name_filter: &str, advertisement: Advertisement<P>) -> Option<DeviceRecord<P>> {
    let is_vehicle = advertisement
        .name
        .as_deref()
        .map(|name| name.contains(name_filter))
        .unwrap_or(false);
    if !is_vehicle {
        debug!("Ignoring {} ({:?})", advertisement.address, advertisement.name);
        return None;
    }

    Some(DeviceRecord {
        address: normalize_address(&advertisement.address),
        manufacturer_data: encode_manufacturer_data(advertisement.manufacturer_data.as_deref()),
        local_name: VEHICLE_LOCAL_NAME_HEX.to_string(),
        address_handle: advertisement.peripheral,
    })
}

/// Hex of the tag followed by the vendor payload; empty when nothing was advertised
pub fn encode_manufacturer_data(data: Option<&[u8]>) -> String {
    match data {
        Some(data) => {
            let mut tagged = MANUFACTURER_DATA_TAG.to_vec();
            tagged.extend_from_slice(data);
            hex::encode(tagged)
        }
        None => String::new(),
    }
}
