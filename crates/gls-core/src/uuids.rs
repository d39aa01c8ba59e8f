//! Bluetooth SIG assigned numbers used by the GLS profile

use crate::types::Uuid16;

// ----------------------------------------------------------------------------
// Services
// ----------------------------------------------------------------------------

pub const GENERIC_ACCESS_SERVICE: Uuid16 = Uuid16(0x1800);
pub const GLUCOSE_SERVICE: Uuid16 = Uuid16(0x1808);
pub const DEVICE_INFORMATION_SERVICE: Uuid16 = Uuid16(0x180A);

// ----------------------------------------------------------------------------
// Descriptors
// ----------------------------------------------------------------------------

/// Client Characteristic Configuration Descriptor
pub const CLIENT_CHARACTERISTIC_CONFIGURATION: Uuid16 = Uuid16(0x2902);

// ----------------------------------------------------------------------------
// Glucose Service characteristics
// ----------------------------------------------------------------------------

pub const GLUCOSE_MEASUREMENT: Uuid16 = Uuid16(0x2A18);
pub const GLUCOSE_MEASUREMENT_CONTEXT: Uuid16 = Uuid16(0x2A34);
pub const GLUCOSE_FEATURE: Uuid16 = Uuid16(0x2A51);
pub const RECORD_ACCESS_CONTROL_POINT: Uuid16 = Uuid16(0x2A52);

// ----------------------------------------------------------------------------
// Device Information Service characteristics
// ----------------------------------------------------------------------------

pub const SYSTEM_ID: Uuid16 = Uuid16(0x2A23);
pub const MODEL_NUMBER_STRING: Uuid16 = Uuid16(0x2A24);
pub const SERIAL_NUMBER_STRING: Uuid16 = Uuid16(0x2A25);
pub const FIRMWARE_REVISION_STRING: Uuid16 = Uuid16(0x2A26);
pub const HARDWARE_REVISION_STRING: Uuid16 = Uuid16(0x2A27);
pub const SOFTWARE_REVISION_STRING: Uuid16 = Uuid16(0x2A28);
pub const MANUFACTURER_NAME_STRING: Uuid16 = Uuid16(0x2A29);
pub const IEEE_REGULATORY_CERTIFICATION: Uuid16 = Uuid16(0x2A2A);
pub const PNP_ID: Uuid16 = Uuid16(0x2A50);

// ----------------------------------------------------------------------------
// Generic Access Profile Service characteristics
// ----------------------------------------------------------------------------

pub const DEVICE_NAME: Uuid16 = Uuid16(0x2A00);
pub const APPEARANCE: Uuid16 = Uuid16(0x2A01);

// ----------------------------------------------------------------------------
// Characteristic properties
// ----------------------------------------------------------------------------

/// Characteristic property bits from the characteristic declaration
pub mod properties {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_WITHOUT_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
    pub const AUTHENTICATED_SIGNED_WRITES: u8 = 0x40;
    pub const EXTENDED_PROPERTIES: u8 = 0x80;
}
