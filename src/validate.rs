//! Build-time enforcement of the dictionary invariants. Everything here is
//! fatal: the generated node would misbehave on the bus, so the generator
//! refuses to emit it.

use std::collections::HashSet;

use log::warn;

use crate::constant::{
    IDX_HEARTBEAT_CONSUMER, IDX_TPDO_COMM, IDX_TPDO_MAPPING, MAX_TPDO_BITS, MUX_DEVICE_TYPE,
    MUX_ERROR_REGISTER, MUX_IDENTITY_VENDOR, MUX_SDO_RX_COB_ID, PDO_COUNT,
};
use crate::data_type::DataType;
use crate::error::BuildError;
use crate::object_directory::{AccessType, ObjectDescriptor, ObjectDirectory};
use crate::records::{CobIdEntry, HeartbeatConsumerEntry, PdoMappingEntry};
use crate::value::{limit_le, DefaultExpr};

pub fn validate(od: &ObjectDirectory) -> Result<(), BuildError> {
    check_mandatory(od)?;
    check_names(od)?;
    check_entries(od)?;
    check_tpdo_mappings(od)?;
    check_tpdo_cob_ids(od);
    check_heartbeat_consumers(od)?;

    let has_domain = od.objects().values().any(|d| d.data_type() == DataType::Domain);
    if has_domain && !od.contains(MUX_SDO_RX_COB_ID) {
        warn!("Domain objects present but no SDO server parameter (0x1200 sub 1); segmented SDO disabled");
    }
    Ok(())
}

fn check_mandatory(od: &ObjectDirectory) -> Result<(), BuildError> {
    for mux in [MUX_DEVICE_TYPE, MUX_ERROR_REGISTER, MUX_IDENTITY_VENDOR] {
        if !od.contains(mux) {
            return Err(BuildError::MissingMandatoryObject { mux });
        }
    }
    Ok(())
}

fn check_names(od: &ObjectDirectory) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for desc in od.objects().values() {
        if !seen.insert(desc.canonical()) {
            return Err(BuildError::DuplicateName { name: desc.parameter_name().to_string() });
        }
    }
    Ok(())
}

fn check_entries(od: &ObjectDirectory) -> Result<(), BuildError> {
    for desc in od.objects().values() {
        // Containers wider than the expedited SDO payload cannot be written.
        let wide = desc.bit_length() == 0 || desc.bit_length() > 32;
        if wide && desc.access_type().is_writable() {
            return Err(BuildError::UnsupportedAccess {
                name: desc.parameter_name().to_string(),
                access: "rw/wo".to_string(),
            });
        }
        // A constant cannot depend on the latched node-ID.
        if desc.access_type() == AccessType::Const {
            if let Some(DefaultExpr::NodeIdOffset(k)) = desc.default() {
                return Err(BuildError::UnsupportedDefault {
                    name: desc.parameter_name().to_string(),
                    text: format!("$NODEID+{}", k),
                });
            }
        }
        if let (Some(lo), Some(hi)) = (desc.low_limit(), desc.high_limit()) {
            if !limit_le(lo, hi, desc.data_type()) {
                return Err(BuildError::LimitOrder { name: desc.parameter_name().to_string() });
            }
        }
    }
    Ok(())
}

/// Number of valid mapping slots a PDO mapping object announces in sub 0.
pub fn mapping_count(od: &ObjectDirectory, index: u16) -> u8 {
    od.get((index as u32) << 8).map(|d| d.default_literal() as u8).unwrap_or(0)
}

/// Resolves the mapping records of TPDO `i` (0-based) to their target
/// descriptors, in sub-index order, enforcing every mapping invariant.
pub fn tpdo_mappings(od: &ObjectDirectory, i: usize) -> Result<Vec<&ObjectDescriptor>, BuildError> {
    let tpdo = (i + 1) as u8;
    let index = IDX_TPDO_MAPPING + i as u16;
    let count = mapping_count(od, index);
    let mut targets = Vec::new();
    let mut total_bits = 0u32;
    for slot in 1..=count {
        let mux = ((index as u32) << 8) | slot as u32;
        let Some(entry) = od.get(mux) else {
            return Err(BuildError::PdoMappingMissing { tpdo, slot, mux });
        };
        let record = PdoMappingEntry::from(entry.default_literal() as u32);
        let target_mux = record.mux();
        let Some(target) = od.get(target_mux) else {
            return Err(BuildError::PdoMappingMissing { tpdo, slot, mux: target_mux });
        };
        if target.access_type() == AccessType::Wo {
            return Err(BuildError::PdoMappingWriteOnly { tpdo, slot, mux: target_mux });
        }
        if !target.pdo_mapping() {
            return Err(BuildError::PdoMappingNotMappable { tpdo, slot, mux: target_mux });
        }
        if record.bit_count() as u32 != target.bit_length() {
            return Err(BuildError::PdoMappingLength { tpdo, slot, mux: target_mux });
        }
        total_bits += target.bit_length();
        targets.push(target);
    }
    if total_bits > MAX_TPDO_BITS {
        return Err(BuildError::PdoTooWide { tpdo, bits: total_bits });
    }
    Ok(targets)
}

fn check_tpdo_mappings(od: &ObjectDirectory) -> Result<(), BuildError> {
    for i in 0..PDO_COUNT {
        if od.contains(((IDX_TPDO_MAPPING + i as u16) as u32) << 8) {
            tpdo_mappings(od, i)?;
        }
    }
    Ok(())
}

/// A TPDO whose COB-ID entry cannot change at runtime and carries the
/// invalid bit will never transmit; almost certainly a dictionary mistake.
fn check_tpdo_cob_ids(od: &ObjectDirectory) {
    for i in 0..PDO_COUNT {
        let mux = (((IDX_TPDO_COMM + i as u16) as u32) << 8) | 1;
        let Some(desc) = od.get(mux) else { continue };
        if desc.access_type().is_writable() {
            continue;
        }
        if let Some(DefaultExpr::Literal(v)) = desc.default() {
            if CobIdEntry::from(*v as u32).invalid() {
                warn!("TPDO{} COB-ID is permanently flagged invalid", i + 1);
            }
        }
    }
}

fn check_heartbeat_consumers(od: &ObjectDirectory) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for desc in od.sub_entries(IDX_HEARTBEAT_CONSUMER) {
        let entry = HeartbeatConsumerEntry::from(desc.default_literal() as u32);
        if entry.node_id() != 0 && !seen.insert(entry.node_id()) {
            return Err(BuildError::HeartbeatConsumerDuplicate { node_id: entry.node_id() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_directory::ObjectDirectory;

    fn base_eds(extra_lists: &str, extra_sections: &str) -> String {
        format!(
            "[DeviceInfo]\nProductName=T\n\
             [MandatoryObjects]\nSupportedObjects=3\n1=0x1000\n2=0x1001\n3=0x1018\n\
             [1000]\nParameterName=Device type\nDataType=0x0007\nAccessType=const\nDefaultValue=0x191\n\
             [1001]\nParameterName=Error register\nDataType=0x0005\nAccessType=ro\nDefaultValue=0\n\
             [1018]\nParameterName=Identity Object\nSubNumber=2\n\
             [1018sub0]\nParameterName=n\nDataType=0x0005\nAccessType=ro\nDefaultValue=1\n\
             [1018sub1]\nParameterName=Vendor-ID\nDataType=0x0007\nAccessType=ro\nDefaultValue=1\n\
             {}{}",
            extra_lists, extra_sections
        )
    }

    #[test]
    fn test_minimal_dictionary_passes() {
        let od = ObjectDirectory::from_eds(&base_eds("", "")).unwrap();
        assert!(validate(&od).is_ok());
    }

    #[test]
    fn test_missing_mandatory() {
        let eds = "[DeviceInfo]\nProductName=T\n\
                   [MandatoryObjects]\nSupportedObjects=1\n1=0x1000\n\
                   [1000]\nParameterName=Device type\nDataType=0x0007\nAccessType=const\nDefaultValue=0\n";
        let od = ObjectDirectory::from_eds(eds).unwrap();
        assert!(matches!(
            validate(&od),
            Err(BuildError::MissingMandatoryObject { mux: 0x1001_00 })
        ));
    }

    #[test]
    fn test_duplicate_names() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=1\n1=0x2000\n",
            "[2000]\nParameterName=Device Type\nDataType=0x0006\nAccessType=rw\nDefaultValue=0\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        assert!(matches!(validate(&od), Err(BuildError::DuplicateName { .. })));
    }

    #[test]
    fn test_limit_order() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=1\n1=0x2000\n",
            "[2000]\nParameterName=Gain\nDataType=0x0003\nAccessType=rw\nDefaultValue=0\n\
             LowLimit=10\nHighLimit=-10\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        assert!(matches!(validate(&od), Err(BuildError::LimitOrder { .. })));
    }

    #[test]
    fn test_writable_domain_rejected() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=1\n1=0x2001\n",
            "[2001]\nParameterName=Image\nDataType=0x000F\nAccessType=rw\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        assert!(matches!(validate(&od), Err(BuildError::UnsupportedAccess { .. })));
    }

    #[test]
    fn test_tpdo_mapping_length_mismatch() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=2\n1=0x1A00\n2=0x2002\n",
            "[1A00]\nParameterName=TPDO1 mapping parameter\nSubNumber=2\n\
             [1A00sub0]\nParameterName=n\nDataType=0x0005\nAccessType=ro\nDefaultValue=1\n\
             [1A00sub1]\nParameterName=Mapping 1\nDataType=0x0007\nAccessType=ro\nDefaultValue=0x20020008\n\
             [2002]\nParameterName=Speed\nDataType=0x0006\nAccessType=ro\nPDOMapping=1\nDefaultValue=0\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        // Mapping claims 8 bits of a 16-bit object (sub 0 of 0x2002).
        assert!(matches!(validate(&od), Err(BuildError::PdoMappingLength { .. })));
    }

    #[test]
    fn test_tpdo_mapping_resolves() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=2\n1=0x1A00\n2=0x2002\n",
            "[1A00]\nParameterName=TPDO1 mapping parameter\nSubNumber=2\n\
             [1A00sub0]\nParameterName=n\nDataType=0x0005\nAccessType=ro\nDefaultValue=1\n\
             [1A00sub1]\nParameterName=Mapping 1\nDataType=0x0007\nAccessType=ro\nDefaultValue=0x20020010\n\
             [2002]\nParameterName=Speed\nDataType=0x0006\nAccessType=ro\nPDOMapping=1\nDefaultValue=0\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        validate(&od).unwrap();
        let targets = tpdo_mappings(&od, 0).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].mux(), 0x2002_00);
    }

    #[test]
    fn test_heartbeat_consumer_duplicates() {
        let eds = base_eds(
            "[OptionalObjects]\nSupportedObjects=1\n1=0x1016\n",
            "[1016]\nParameterName=Consumer heartbeat time\nSubNumber=3\n\
             [1016sub0]\nParameterName=n\nDataType=0x0005\nAccessType=ro\nDefaultValue=2\n\
             [1016sub1]\nParameterName=Consumer heartbeat time 1\nDataType=0x0007\nAccessType=rw\nDefaultValue=0x000503E8\n\
             [1016sub2]\nParameterName=Consumer heartbeat time 2\nDataType=0x0007\nAccessType=rw\nDefaultValue=0x00050064\n",
        );
        let od = ObjectDirectory::from_eds(&eds).unwrap();
        assert!(matches!(
            validate(&od),
            Err(BuildError::HeartbeatConsumerDuplicate { node_id: 5 })
        ));
    }
}
