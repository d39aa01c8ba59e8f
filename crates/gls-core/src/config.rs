//! Profile Configuration
//!
//! Configuration structures shared by the profile components and the session
//! runtime.

use serde::{Deserialize, Serialize};

use crate::codec::GlucoseFeatures;
use crate::registry::RetentionPolicy;
use crate::server::LocalHandles;
use crate::{GlsError, Result};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the session task channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Operator commands into the session task
    pub command_buffer_size: usize,
    /// Transport events into the session task
    pub event_buffer_size: usize,
    /// Application events out of the session task
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,
            event_buffer_size: 128,
            app_event_buffer_size: 64,
        }
    }
}

impl ChannelConfig {
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 8,
            event_buffer_size: 16,
            app_event_buffer_size: 16,
        }
    }
}

// ----------------------------------------------------------------------------
// Profile Configuration
// ----------------------------------------------------------------------------

/// Top-level GLS profile configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlsConfig {
    /// What happens to a device record when its link goes down
    pub retention_policy: RetentionPolicy,
    /// Glucose Feature bitmask exposed by the local server
    pub supported_features: u16,
    /// Upper bound on registry size, 0 for unbounded
    pub max_devices: usize,
    /// Confirm incoming indications automatically
    pub auto_confirm_indications: bool,
    /// Attribute handles of the local Glucose Service
    #[serde(default)]
    pub local_handles: LocalHandles,
    pub channels: ChannelConfig,
}

impl Default for GlsConfig {
    fn default() -> Self {
        Self {
            retention_policy: RetentionPolicy::default(),
            supported_features: GlucoseFeatures::LOW_BATTERY_DETECTION.as_u16()
                | GlucoseFeatures::SENSOR_MALFUNCTION_DETECTION.as_u16()
                | GlucoseFeatures::SENSOR_SAMPLE_SIZE.as_u16(),
            max_devices: 16,
            auto_confirm_indications: true,
            local_handles: LocalHandles::default(),
            channels: ChannelConfig::default(),
        }
    }
}

impl GlsConfig {
    /// Small, permissive configuration for tests
    pub fn testing() -> Self {
        Self {
            retention_policy: RetentionPolicy::KeepAll,
            supported_features: GlucoseFeatures::ALL.as_u16(),
            max_devices: 0,
            auto_confirm_indications: true,
            local_handles: LocalHandles::default(),
            channels: ChannelConfig::testing(),
        }
    }

    pub fn features(&self) -> GlucoseFeatures {
        GlucoseFeatures::new(self.supported_features)
    }

    pub fn validate(&self) -> Result<()> {
        if self.supported_features & !GlucoseFeatures::ALL.as_u16() != 0 {
            return Err(GlsError::config_error(format!(
                "supported_features 0x{:04X} sets reserved bits",
                self.supported_features
            )));
        }

        let h = &self.local_handles;
        let handles = [h.measurement, h.measurement_context, h.feature, h.racp];
        if handles.contains(&0) {
            return Err(GlsError::config_error("local attribute handles must be non-zero"));
        }
        for (i, handle) in handles.iter().enumerate() {
            if handles[i + 1..].contains(handle) {
                return Err(GlsError::config_error(format!(
                    "local attribute handle 0x{:04X} is used twice",
                    handle
                )));
            }
        }

        let channels = &self.channels;
        if channels.command_buffer_size == 0
            || channels.event_buffer_size == 0
            || channels.app_event_buffer_size == 0
        {
            return Err(GlsError::config_error(
                "channel buffer sizes must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GlsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_policy, RetentionPolicy::KeepEncrypted);
        assert!(GlsConfig::testing().validate().is_ok());
    }

    #[test]
    fn reserved_feature_bits_are_rejected() {
        let config = GlsConfig {
            supported_features: 0x8000,
            ..GlsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(GlsError::Configuration { .. })
        ));
    }

    #[test]
    fn duplicate_local_handles_are_rejected() {
        let mut config = GlsConfig::default();
        config.local_handles.racp = config.local_handles.feature;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_channel_buffer_is_rejected() {
        let mut config = GlsConfig::default();
        config.channels.event_buffer_size = 0;
        assert!(config.validate().is_err());
    }
}
