//! Audio device enumeration and lookup

use cpal::traits::{DeviceTrait, HostTrait};

use crate::error::AudioError;

/// Device listing entry for display
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default: bool,
}

/// Wrapper around cpal device
pub struct AudioDevice {
    inner: cpal::Device,
    pub name: String,
}

impl AudioDevice {
    pub fn from_cpal(device: cpal::Device) -> Self {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        Self {
            inner: device,
            name,
        }
    }

    pub fn inner(&self) -> &cpal::Device {
        &self.inner
    }

    pub fn into_inner(self) -> cpal::Device {
        self.inner
    }

    /// Get default input config
    pub fn default_input_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        self.inner
            .default_input_config()
            .map_err(|e| AudioError::DeviceUnavailable(format!("{}: {}", self.name, e)))
    }

    /// Get default output config
    pub fn default_output_config(&self) -> Result<cpal::SupportedStreamConfig, AudioError> {
        self.inner
            .default_output_config()
            .map_err(|e| AudioError::PlaybackUnavailable(format!("{}: {}", self.name, e)))
    }
}

/// List all available audio devices
pub fn list_devices() -> Vec<DeviceInfo> {
    let host = cpal::default_host();
    let mut devices: Vec<DeviceInfo> = Vec::new();

    let default_input_name = host.default_input_device().and_then(|d| d.name().ok());
    let default_output_name = host.default_output_device().and_then(|d| d.name().ok());

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                let is_default = default_input_name.as_ref() == Some(&name);
                devices.push(DeviceInfo {
                    name,
                    is_input: true,
                    is_output: false,
                    is_default,
                });
            }
        }
    }

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let is_default = default_output_name.as_ref() == Some(&name);

                // Duplex devices show up once
                if let Some(existing) = devices.iter_mut().find(|d| d.name == name) {
                    existing.is_output = true;
                    existing.is_default |= is_default;
                } else {
                    devices.push(DeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                        is_default,
                    });
                }
            }
        }
    }

    devices
}

/// Find an input device by name, or the default input device when `name` is `None`
pub fn find_input_device(name: Option<&str>) -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_input_device()
            .map(AudioDevice::from_cpal)
            .ok_or_else(|| AudioError::DeviceUnavailable("no default input device".to_string())),
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .map(AudioDevice::from_cpal)
            .ok_or_else(|| AudioError::DeviceUnavailable(format!("input device not found: {}", name))),
    }
}

/// Find an output device by name, or the default output device when `name` is `None`
pub fn find_output_device(name: Option<&str>) -> Result<AudioDevice, AudioError> {
    let host = cpal::default_host();
    match name {
        None => host
            .default_output_device()
            .map(AudioDevice::from_cpal)
            .ok_or_else(|| AudioError::PlaybackUnavailable("no default output device".to_string())),
        Some(name) => host
            .output_devices()
            .map_err(|e| AudioError::PlaybackUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .map(AudioDevice::from_cpal)
            .ok_or_else(|| {
                AudioError::PlaybackUnavailable(format!("output device not found: {}", name))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_device_is_unavailable() {
        // Holds on machines with or without audio hardware
        let err = find_input_device(Some("no-such-device-7f3a")).err();
        assert!(matches!(err, Some(AudioError::DeviceUnavailable(_))));

        let err = find_output_device(Some("no-such-device-7f3a")).err();
        assert!(matches!(err, Some(AudioError::PlaybackUnavailable(_))));
    }

    #[test]
    fn test_list_devices_has_no_duplicates() {
        let devices = list_devices();
        for (i, device) in devices.iter().enumerate() {
            assert!(devices[i + 1..].iter().all(|d| d.name != device.name));
        }
    }
}
