//! Address-keyed catalog of discovered devices.
//!
//! Discovery reports the same peripheral over and over with a changing
//! RSSI. The catalog keeps one entry per address, in first-seen order, and
//! replaces that entry in place on every repeat sighting.

use std::collections::HashMap;

use crate::core::bluetooth::types::DiscoveredDevice;

/// Outcome of folding one sighting into the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    /// First sighting of this address, appended at the index
    New(usize),
    /// Repeat sighting, replaced at the index
    Updated(usize),
}

#[derive(Debug, Default, Clone)]
pub struct DeviceCatalog {
    devices: Vec<DiscoveredDevice>,
    /// Always consistent with the positions in `devices`
    address_to_index: HashMap<String, usize>,
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, device: DiscoveredDevice) -> Sighting {
        if let Some(&index) = self.address_to_index.get(&device.address) {
            self.devices[index] = device;
            return Sighting::Updated(index);
        }

        let index = self.devices.len();
        self.address_to_index.insert(device.address.clone(), index);
        self.devices.push(device);
        Sighting::New(index)
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.address_to_index.clear();
    }

    pub fn get(&self, address: &str) -> Option<&DiscoveredDevice> {
        self.address_to_index
            .get(address)
            .map(|&index| &self.devices[index])
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
