// SPDX-License-Identifier: Apache-2.0

use crate::engine::{Delegate, Interpreter};
use derive_more::Display;
use log::{debug, warn};
use std::{fmt, str::FromStr, sync::Arc};

/// How an EdgeTPU is attached to the host.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    #[display("pci")]
    Pci,
    #[display("usb")]
    Usb,
}

impl FromStr for DeviceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pci" => Ok(DeviceType::Pci),
            "usb" => Ok(DeviceType::Usb),
            other => Err(crate::Error::InvalidArgument(format!(
                "Unknown EdgeTPU device type: {}",
                other
            ))),
        }
    }
}

/// An enumerated EdgeTPU device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTpuDevice {
    pub device_type: DeviceType,
    pub path: String,
}

/// Access to the EdgeTPU driver library.
pub trait EdgeTpuDriver: Send + Sync {
    /// Enumerates the physical devices attached to the host.
    fn list_devices(&self) -> Vec<EdgeTpuDevice>;

    /// Creates a delegate for `device`, or `None` if the driver refuses.
    fn create_delegate(&self, device: &EdgeTpuDevice) -> Option<Delegate>;
}

/// Accelerates inference on a dedicated EdgeTPU neural processor.
pub struct EdgeTpuBackend {
    driver: Arc<dyn EdgeTpuDriver>,
    devices: Vec<EdgeTpuDevice>,
    preference: Option<DeviceType>,
    delegate: Option<Delegate>,
}

impl EdgeTpuBackend {
    /// Creates a backend, enumerating the available devices.
    pub fn new(driver: Arc<dyn EdgeTpuDriver>, preference: Option<DeviceType>) -> Self {
        let devices = driver.list_devices();
        debug!("Found {} EdgeTPU device(s)", devices.len());

        EdgeTpuBackend {
            driver,
            devices,
            preference,
            delegate: None,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.devices.is_empty()
    }

    /// The device a delegate is created for: the first one of the preferred
    /// type, otherwise the first one enumerated.
    pub fn selected_device(&self) -> Option<&EdgeTpuDevice> {
        self.preference
            .and_then(|preferred| {
                self.devices
                    .iter()
                    .find(|device| device.device_type == preferred)
            })
            .or_else(|| self.devices.first())
    }

    pub fn bind(&mut self, interpreter: &mut dyn Interpreter) -> bool {
        let device = match self.selected_device() {
            Some(device) => device.clone(),
            None => return false,
        };

        debug!(
            "Creating EdgeTPU delegate for {} device {}",
            device.device_type, device.path
        );
        let delegate = match self.driver.create_delegate(&device) {
            Some(delegate) => delegate,
            None => {
                warn!("Could not create EdgeTPU delegate for {}", device.path);
                return false;
            }
        };

        // Keep the delegate even if applying it fails, it is released with
        // the backend
        let status = unsafe { interpreter.modify_graph_with_delegate(delegate.as_ptr()) };
        self.delegate = Some(delegate);

        if !status.is_ok() {
            warn!("Applying the EdgeTPU delegate failed: {}", status);
            return false;
        }

        true
    }
}

impl fmt::Debug for EdgeTpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeTpuBackend")
            .field("devices", &self.devices)
            .field("preference", &self.preference)
            .field("delegate", &self.delegate)
            .finish()
    }
}
