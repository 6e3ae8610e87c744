//! Well-known object dictionary addresses, as 24-bit multiplexers where a
//! specific sub-entry matters and as 16-bit indices where the whole object
//! does.

pub const MUX_DEVICE_TYPE: u32 = 0x1000_00;
pub const MUX_ERROR_REGISTER: u32 = 0x1001_00;
pub const MUX_COB_ID_SYNC: u32 = 0x1005_00;
pub const MUX_CYCLE_PERIOD: u32 = 0x1006_00;
pub const MUX_SYNC_WINDOW: u32 = 0x1007_00;
pub const MUX_COB_ID_TIME: u32 = 0x1012_00;
pub const MUX_COB_ID_EMCY: u32 = 0x1014_00;
pub const MUX_HEARTBEAT_PRODUCER: u32 = 0x1017_00;
pub const MUX_IDENTITY_VENDOR: u32 = 0x1018_01;
pub const MUX_SYNC_OVERFLOW: u32 = 0x1019_00;
pub const MUX_ERROR_BEHAVIOR_COMM: u32 = 0x1029_01;
pub const MUX_ERROR_BEHAVIOR_GENERIC: u32 = 0x1029_02;
pub const MUX_SDO_RX_COB_ID: u32 = 0x1200_01;
pub const MUX_SDO_TX_COB_ID: u32 = 0x1200_02;
pub const MUX_NMT_STARTUP: u32 = 0x1F80_00;

pub const IDX_HEARTBEAT_CONSUMER: u16 = 0x1016;
pub const IDX_RPDO_COMM: u16 = 0x1400;
pub const IDX_TPDO_COMM: u16 = 0x1800;
pub const IDX_TPDO_MAPPING: u16 = 0x1A00;

/// First manufacturer-specific profile index; objects at or above it become
/// top-level ports.
pub const MANUFACTURER_PROFILE_START: u16 = 0x2000;

pub const PDO_COUNT: usize = 4;
pub const MAX_TPDO_BITS: u32 = 64;
pub const BROADCAST_NODE_ID: u8 = 0x7F;
