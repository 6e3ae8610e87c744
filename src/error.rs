use core::fmt;
use core::fmt::Formatter;

/// Fatal generation-time failures. Every variant aborts the build; the
/// binaries print the rendering and exit non-zero.
#[derive(Clone, Eq, PartialEq)]
pub enum BuildError {
    MissingSection { section: String },
    MissingProperty { section: String, property: String },
    InvalidNumber { section: String, text: String },
    UnsupportedDataType { index: u32 },
    InvalidObjectName { name: String },
    DuplicateName { name: String },
    MissingMandatoryObject { mux: u32 },
    UnsupportedAccess { name: String, access: String },
    NodeIdOffsetNegative { name: String },
    NodeIdOffsetTooWide { name: String, bit_length: u32 },
    UnsupportedDefault { name: String, text: String },
    LimitOrder { name: String },
    PdoMappingMissing { tpdo: u8, slot: u8, mux: u32 },
    PdoMappingLength { tpdo: u8, slot: u8, mux: u32 },
    PdoMappingNotMappable { tpdo: u8, slot: u8, mux: u32 },
    PdoMappingWriteOnly { tpdo: u8, slot: u8, mux: u32 },
    PdoTooWide { tpdo: u8, bits: u32 },
    HeartbeatConsumerDuplicate { node_id: u8 },
}

impl fmt::Debug for BuildError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::MissingSection { section } =>
                write!(f, "Missing section [{}]", section),
            BuildError::MissingProperty { section, property } =>
                write!(f, "No '{}' in section [{}]", property, section),
            BuildError::InvalidNumber { section, text } =>
                write!(f, "Invalid number '{}' in section [{}]", text, section),
            BuildError::UnsupportedDataType { index } =>
                write!(f, "Unsupported data type with index 0x{:04X}", index),
            BuildError::InvalidObjectName { name } =>
                write!(f, "Invalid object name '{}'. Must start with a letter.", name),
            BuildError::DuplicateName { name } =>
                write!(f, "Parameter names must be unique, '{}' is not", name),
            BuildError::MissingMandatoryObject { mux } =>
                write!(f, "Mandatory object 0x{:04X} sub {} is required",
                       mux >> 8, mux & 0xFF),
            BuildError::UnsupportedAccess { name, access } =>
                write!(f, "Access type '{}' is not supported for '{}'", access, name),
            BuildError::NodeIdOffsetNegative { name } =>
                write!(f, "Default value for '{}' subtracts from $NODEID", name),
            BuildError::NodeIdOffsetTooWide { name, bit_length } =>
                write!(f, "$NODEID default for '{}' overflows {} bits", name, bit_length),
            BuildError::UnsupportedDefault { name, text } =>
                write!(f, "Default value '{}' for '{}' is not supported", text, name),
            BuildError::LimitOrder { name } =>
                write!(f, "LowLimit exceeds HighLimit for '{}'", name),
            BuildError::PdoMappingMissing { tpdo, slot, mux } =>
                write!(f, "TPDO{} mapping {} (0x{:06X}) does not exist in object dictionary",
                       tpdo, slot, mux),
            BuildError::PdoMappingLength { tpdo, slot, mux } =>
                write!(f, "TPDO{} mapping {} (0x{:06X}) length mismatch", tpdo, slot, mux),
            BuildError::PdoMappingNotMappable { tpdo, slot, mux } =>
                write!(f, "TPDO{} mapping {} (0x{:06X}) is not mappable", tpdo, slot, mux),
            BuildError::PdoMappingWriteOnly { tpdo, slot, mux } =>
                write!(f, "TPDO{} mapping {} (0x{:06X}) is write-only", tpdo, slot, mux),
            BuildError::PdoTooWide { tpdo, bits } =>
                write!(f, "TPDO{} mapping is greater than 64 bits ({})", tpdo, bits),
            BuildError::HeartbeatConsumerDuplicate { node_id } =>
                write!(f, "Consumer heartbeat time entries duplicate node-ID {}", node_id),
        }
    }
}

/// SDO abort codes emitted by the generated server, per CiA 301.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum SdoAbort {
    ToggleBitNotAlternated,
    CommandSpecifierNotValid,
    InvalidBlockSize,
    InvalidSequenceNumber,
    AttemptToReadWriteOnlyObject,
    AttemptToWriteReadOnlyObject,
    ObjectDoesNotExist,
    ParameterLengthMismatch,
    ValueRangeExceeded,
    GeneralIncompatibility,
    NoDataAvailable,
}

impl SdoAbort {
    pub fn code(&self) -> u32 {
        match *self {
            SdoAbort::ToggleBitNotAlternated => 0x0503_0000,
            SdoAbort::CommandSpecifierNotValid => 0x0504_0001,
            SdoAbort::InvalidBlockSize => 0x0504_0002,
            SdoAbort::InvalidSequenceNumber => 0x0504_0003,
            SdoAbort::AttemptToReadWriteOnlyObject => 0x0601_0001,
            SdoAbort::AttemptToWriteReadOnlyObject => 0x0601_0002,
            SdoAbort::ObjectDoesNotExist => 0x0602_0000,
            SdoAbort::ParameterLengthMismatch => 0x0607_0010,
            SdoAbort::ValueRangeExceeded => 0x0609_0030,
            SdoAbort::GeneralIncompatibility => 0x0604_0047,
            SdoAbort::NoDataAvailable => 0x0800_0024,
        }
    }

    /// The 32-bit VHDL literal the SDO emitter loads into the abort field.
    pub fn literal(&self) -> String {
        format!("x\"{:08X}\"", self.code())
    }

    pub fn description(&self) -> &'static str {
        match *self {
            SdoAbort::ToggleBitNotAlternated => "Toggle bit not alternated",
            SdoAbort::CommandSpecifierNotValid => "Client/server command specifier not valid or unknown",
            SdoAbort::InvalidBlockSize => "Invalid block size (block mode only)",
            SdoAbort::InvalidSequenceNumber => "Invalid sequence number (block mode only)",
            SdoAbort::AttemptToReadWriteOnlyObject => "Attempt to read a write only object",
            SdoAbort::AttemptToWriteReadOnlyObject => "Attempt to write a read only object",
            SdoAbort::ObjectDoesNotExist => "Object does not exist in the object dictionary",
            SdoAbort::ParameterLengthMismatch => "Data type does not match; length of service parameter does not match",
            SdoAbort::ValueRangeExceeded => "Value range of parameter exceeded (only for write access)",
            SdoAbort::GeneralIncompatibility => "General internal incompatibility in the device",
            SdoAbort::NoDataAvailable => "No data available",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_error_debug() {
        assert_eq!(
            format!("{:?}", BuildError::MissingMandatoryObject { mux: 0x101801 }),
            "Mandatory object 0x1018 sub 1 is required"
        );
        assert_eq!(
            format!("{:?}", BuildError::UnsupportedDataType { index: 0x9 }),
            "Unsupported data type with index 0x0009"
        );
        assert_eq!(
            format!("{:?}", BuildError::PdoMappingWriteOnly { tpdo: 2, slot: 1, mux: 0x200001 }),
            "TPDO2 mapping 1 (0x200001) is write-only"
        );
    }

    #[test]
    fn test_abort_codes() {
        assert_eq!(SdoAbort::ToggleBitNotAlternated.code(), 0x0503_0000);
        assert_eq!(SdoAbort::CommandSpecifierNotValid.code(), 0x0504_0001);
        assert_eq!(SdoAbort::InvalidBlockSize.code(), 0x0504_0002);
        assert_eq!(SdoAbort::InvalidSequenceNumber.code(), 0x0504_0003);
        assert_eq!(SdoAbort::AttemptToReadWriteOnlyObject.code(), 0x0601_0001);
        assert_eq!(SdoAbort::AttemptToWriteReadOnlyObject.code(), 0x0601_0002);
        assert_eq!(SdoAbort::ObjectDoesNotExist.code(), 0x0602_0000);
        assert_eq!(SdoAbort::ParameterLengthMismatch.code(), 0x0607_0010);
        assert_eq!(SdoAbort::ValueRangeExceeded.code(), 0x0609_0030);
        assert_eq!(SdoAbort::GeneralIncompatibility.code(), 0x0604_0047);
        assert_eq!(SdoAbort::NoDataAvailable.code(), 0x0800_0024);
    }

    #[test]
    fn test_abort_literal() {
        assert_eq!(SdoAbort::ObjectDoesNotExist.literal(), "x\"06020000\"");
        assert_eq!(SdoAbort::ToggleBitNotAlternated.literal(), "x\"05030000\"");
    }
}
