//! Typed views of the packed 32-bit records the communication profile keeps
//! in single `Unsigned32` entries. The generator decodes these at build time
//! to plan trigger logic and validate mappings; the generated entity slices
//! the same bits in hardware.

use bitfield_struct::bitfield;

/// COB-ID entry layout shared by the PDO communication parameters, 0x1005,
/// 0x1012 and 0x1014.
#[bitfield(u32)]
pub struct CobIdEntry {
    /// 11- or 29-bit CAN identifier.
    #[bits(29)]
    pub id: u32,

    /// Frame format: set for a 29-bit identifier.
    #[bits(1)]
    pub extended: bool,

    /// For PDOs: RTR is not allowed on this PDO. For 0x1005: this node
    /// produces the SYNC. For 0x1012: this node consumes the TIME message.
    #[bits(1)]
    pub flag30: bool,

    /// Entry is not valid; the communication object is unused.
    #[bits(1)]
    pub invalid: bool,
}

/// PDO mapping entry: which object, and how many of its bits, occupy one
/// slot of the PDO payload.
#[bitfield(u32)]
pub struct PdoMappingEntry {
    #[bits(8)]
    pub bit_count: u8,

    #[bits(8)]
    pub sub_index: u8,

    #[bits(16)]
    pub index: u16,
}

impl PdoMappingEntry {
    /// The 24-bit multiplexer of the mapped object.
    pub fn mux(&self) -> u32 {
        ((self.index() as u32) << 8) | self.sub_index() as u32
    }
}

/// Consumer heartbeat time entry (0x1016 sub 1..n).
#[bitfield(u32)]
pub struct HeartbeatConsumerEntry {
    /// Expected heartbeat period in milliseconds; zero disables the consumer.
    #[bits(16)]
    pub time_ms: u16,

    /// Node-ID under supervision; zero or >127 disables the consumer.
    #[bits(7)]
    pub node_id: u8,

    #[bits(9)]
    _reserved: u16,
}

impl HeartbeatConsumerEntry {
    pub fn is_active(&self) -> bool {
        self.node_id() != 0 && self.time_ms() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cob_id_entry() {
        let e = CobIdEntry::from(0x4000_0191);
        assert_eq!(e.id(), 0x191);
        assert!(!e.extended());
        assert!(e.flag30());
        assert!(!e.invalid());

        let invalid = CobIdEntry::from(0x8000_0280);
        assert!(invalid.invalid());
        assert_eq!(invalid.id(), 0x280);
    }

    #[test]
    fn test_pdo_mapping_entry() {
        let e = PdoMappingEntry::from(0x2000_0110);
        assert_eq!(e.index(), 0x2000);
        assert_eq!(e.sub_index(), 0x01);
        assert_eq!(e.bit_count(), 0x10);
        assert_eq!(e.mux(), 0x200001);
    }

    #[test]
    fn test_heartbeat_consumer_entry() {
        let e = HeartbeatConsumerEntry::from(0x0005_03E8);
        assert_eq!(e.node_id(), 5);
        assert_eq!(e.time_ms(), 1000);
        assert!(e.is_active());

        assert!(!HeartbeatConsumerEntry::from(0x0005_0000).is_active());
        assert!(!HeartbeatConsumerEntry::from(0x0000_03E8).is_active());
    }
}
