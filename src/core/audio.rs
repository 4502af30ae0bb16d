use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::table::Timestamp;

/// One device's displacement stream as 16-bit samples in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChannel {
    pub device_id: String,
    pub start_time: Timestamp,
    pub samples: Vec<i16>,
}

impl AudioChannel {
    pub fn new(device_id: impl Into<String>, start_time: Timestamp) -> Self {
        Self {
            device_id: device_id.into(),
            start_time,
            samples: Vec::new(),
        }
    }

    pub fn append(&mut self, samples: &[i16]) {
        self.samples.extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Per-channel sample buffers for one capture session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffers {
    start_time: Timestamp,
    channels: Vec<AudioChannel>,
    index: HashMap<String, usize>,
}

impl AudioBuffers {
    /// One empty channel per device, in the given order
    pub fn new(devices: &[String], start_time: Timestamp) -> Self {
        let mut buffers = Self {
            start_time,
            channels: Vec::with_capacity(devices.len()),
            index: HashMap::new(),
        };
        for device in devices {
            buffers.channel_mut(device);
        }
        buffers
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    /// Channel for `device`, created on first use
    pub fn channel_mut(&mut self, device: &str) -> &mut AudioChannel {
        let index = match self.index.get(device) {
            Some(&i) => i,
            None => {
                self.channels.push(AudioChannel::new(device, self.start_time));
                self.index.insert(device.to_string(), self.channels.len() - 1);
                self.channels.len() - 1
            }
        };
        &mut self.channels[index]
    }

    pub fn channel(&self, device: &str) -> Option<&AudioChannel> {
        self.index.get(device).map(|&i| &self.channels[i])
    }

    pub fn channels(&self) -> &[AudioChannel] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<AudioChannel> {
        self.channels
    }
}
