//! Decides the storage class of every dictionary entry (compile-time
//! constant, internal signal, or top-level port) and lays out the entity's
//! port list in declaration order.

use std::collections::BTreeSet;

use log::warn;

use crate::constant::{IDX_TPDO_COMM, MANUFACTURER_PROFILE_START, MUX_SDO_RX_COB_ID, PDO_COUNT};
use crate::data_type::DataType;
use crate::error::BuildError;
use crate::object_directory::{AccessType, Mux, ObjectDescriptor, ObjectDirectory};

#[derive(Clone, Debug, Default)]
pub struct GeneratorOptions {
    /// Expose a single-clock pulse output asserted when SYNC is consumed.
    pub sync: bool,
    /// Expose a single-clock pulse output asserted when GFC is received.
    pub gfc: bool,
    /// Expose the TIME-stamp register as an output port.
    pub timestamp: bool,
    /// Additional multiplexers to surface as ports even inside the
    /// communication profile.
    pub extra_ports: Vec<Mux>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PortSignal {
    pub name: String,
    pub direction: Direction,
    pub vhdl_type: String,
}

impl PortSignal {
    fn new(name: impl Into<String>, direction: Direction, vhdl_type: impl Into<String>) -> Self {
        PortSignal { name: name.into(), direction, vhdl_type: vhdl_type.into() }
    }
}

/// Where an object's value lives in the generated entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Storage {
    /// `const`: folded into a VHDL constant.
    Constant,
    /// Internal signal, SDO-visible only.
    Internal,
    /// `ro` port: driven by the application, read by the SDO server.
    InputPort,
    /// `rw` port: out port driven from an internal `_q` buffer.
    BufferedPort,
    /// `wo` port: out port with a one-cycle `_strb` companion.
    StrobedPort,
}

pub struct EntityPlan {
    od: ObjectDirectory,
    options: GeneratorOptions,
    segmented_sdo: bool,
    ports: Vec<PortSignal>,
    port_muxes: BTreeSet<Mux>,
}

impl EntityPlan {
    pub fn new(od: ObjectDirectory, options: GeneratorOptions) -> Result<Self, BuildError> {
        let has_domain = od.objects().values().any(|d| d.data_type() == DataType::Domain);
        let segmented_sdo = has_domain && od.contains(MUX_SDO_RX_COB_ID);

        let mut plan = EntityPlan {
            od,
            options,
            segmented_sdo,
            ports: Vec::new(),
            port_muxes: BTreeSet::new(),
        };
        plan.build_ports();
        Ok(plan)
    }

    fn build_ports(&mut self) {
        if self.options.sync {
            self.ports.push(PortSignal::new("Sync", Direction::Out, "std_logic"));
        }
        if self.options.gfc {
            self.ports.push(PortSignal::new("Gfc", Direction::Out, "std_logic"));
        }
        if self.options.timestamp {
            self.ports.push(PortSignal::new("Timestamp", Direction::Out, "CanOpen.TimeOfDay"));
        }
        if self.segmented_sdo {
            self.ports.push(PortSignal::new(
                "SegmentedSdoMux",
                Direction::Out,
                "std_logic_vector(23 downto 0)",
            ));
            self.ports.push(PortSignal::new("SegmentedSdoReadEnable", Direction::Out, "std_logic"));
            self.ports
                .push(PortSignal::new("SegmentedSdoReadDataEnable", Direction::Out, "std_logic"));
            self.ports.push(PortSignal::new(
                "SegmentedSdoData",
                Direction::In,
                "std_logic_vector(55 downto 0)",
            ));
            self.ports.push(PortSignal::new("SegmentedSdoDataValid", Direction::In, "std_logic"));
        }
        for i in 0..PDO_COUNT {
            if self.tpdo_event_port(i) {
                self.ports.push(PortSignal::new(
                    format!("Tpdo{}Event", i + 1),
                    Direction::In,
                    "std_logic",
                ));
            }
        }

        let mut object_ports = Vec::new();
        let mut port_muxes = BTreeSet::new();
        for desc in self.od.objects().values() {
            if desc.bit_length() == 0 {
                continue; // Domain: served over segmented SDO, never a port
            }
            let surfaced = desc.index() >= MANUFACTURER_PROFILE_START
                || self.options.extra_ports.contains(&desc.mux());
            if !surfaced {
                continue;
            }
            match desc.access_type() {
                AccessType::Const => {
                    if self.options.extra_ports.contains(&desc.mux()) {
                        warn!("--port 0x{:06X} ignored: object is const", desc.mux());
                    }
                }
                AccessType::Ro => {
                    object_ports.push(PortSignal::new(
                        desc.name(),
                        Direction::In,
                        desc.data_type().vhdl_type(),
                    ));
                    port_muxes.insert(desc.mux());
                }
                AccessType::Rw => {
                    object_ports.push(PortSignal::new(
                        desc.name(),
                        Direction::Out,
                        desc.data_type().vhdl_type(),
                    ));
                    port_muxes.insert(desc.mux());
                }
                AccessType::Wo => {
                    object_ports.push(PortSignal::new(
                        desc.name(),
                        Direction::Out,
                        desc.data_type().vhdl_type(),
                    ));
                    object_ports.push(PortSignal::new(
                        desc.strobe_name(),
                        Direction::Out,
                        "std_logic",
                    ));
                    port_muxes.insert(desc.mux());
                }
            }
        }
        self.ports.extend(object_ports);
        self.port_muxes = port_muxes;
    }

    pub fn od(&self) -> &ObjectDirectory {
        &self.od
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn entity_name(&self) -> &str {
        self.od.entity_name()
    }

    pub fn segmented_sdo(&self) -> bool {
        self.segmented_sdo
    }

    pub fn ports(&self) -> &[PortSignal] {
        &self.ports
    }

    pub fn is_port(&self, mux: Mux) -> bool {
        self.port_muxes.contains(&mux)
    }

    pub fn storage(&self, desc: &ObjectDescriptor) -> Storage {
        if desc.access_type() == AccessType::Const {
            return Storage::Constant;
        }
        if !self.port_muxes.contains(&desc.mux()) {
            return Storage::Internal;
        }
        match desc.access_type() {
            AccessType::Ro => Storage::InputPort,
            AccessType::Rw => Storage::BufferedPort,
            AccessType::Wo => Storage::StrobedPort,
            AccessType::Const => Storage::Constant,
        }
    }

    /// The expression the entity reads an object's current value through.
    pub fn value_expr(&self, desc: &ObjectDescriptor) -> String {
        match self.storage(desc) {
            Storage::BufferedPort => desc.buffer_name(),
            _ => desc.name(),
        }
    }

    /// Same, converted to `std_logic_vector`.
    pub fn slv_value_expr(&self, desc: &ObjectDescriptor) -> String {
        desc.data_type().to_slv(&self.value_expr(desc))
    }

    pub fn tpdo_present(&self, i: usize) -> bool {
        self.od.contains((((IDX_TPDO_COMM + i as u16) as u32) << 8) | 1)
    }

    /// Whether TPDO `i` (0-based) needs an external event input. Statically
    /// cyclic or RTR-driven TPDOs whose communication record cannot change at
    /// runtime do without one.
    pub fn tpdo_event_port(&self, i: usize) -> bool {
        if !self.tpdo_present(i) {
            return false;
        }
        let mux = (((IDX_TPDO_COMM + i as u16) as u32) << 8) | 2;
        match self.od.get(mux) {
            None => true, // no transmission type entry: treat as event-driven
            Some(desc) => {
                if desc.access_type().is_writable() {
                    return true;
                }
                let tt = desc.default_literal() as u8;
                matches!(tt, 0x00 | 0xFE | 0xFF)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_directory::ObjectDirectory;

    const EDS: &str = "\
[DeviceInfo]\nProductName=Io Box\n\
[MandatoryObjects]\nSupportedObjects=3\n1=0x1000\n2=0x1001\n3=0x1018\n\
[1000]\nParameterName=Device type\nDataType=0x0007\nAccessType=const\nDefaultValue=0x191\n\
[1001]\nParameterName=Error register\nDataType=0x0005\nAccessType=ro\nDefaultValue=0\n\
[1018]\nParameterName=Identity Object\nSubNumber=2\n\
[1018sub0]\nParameterName=n\nDataType=0x0005\nAccessType=ro\nDefaultValue=1\n\
[1018sub1]\nParameterName=Vendor-ID\nDataType=0x0007\nAccessType=ro\nDefaultValue=1\n\
[ManufacturerObjects]\nSupportedObjects=3\n1=0x2000\n2=0x2001\n3=0x2002\n\
[2000]\nParameterName=Digital Inputs\nDataType=0x0005\nAccessType=ro\nPDOMapping=1\nDefaultValue=0\n\
[2001]\nParameterName=Digital Outputs\nDataType=0x0005\nAccessType=rw\nDefaultValue=0\n\
[2002]\nParameterName=Command\nDataType=0x0006\nAccessType=wo\nDefaultValue=0\n";

    fn plan(options: GeneratorOptions) -> EntityPlan {
        let od = ObjectDirectory::from_eds(EDS).unwrap();
        EntityPlan::new(od, options).unwrap()
    }

    #[test]
    fn test_manufacturer_ports() {
        let p = plan(GeneratorOptions::default());
        let names: Vec<&str> = p.ports().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["\\DigitalInputs\\", "\\DigitalOutputs\\", "\\Command\\", "\\Command_strb\\"]
        );
        assert_eq!(p.ports()[0].direction, Direction::In);
        assert_eq!(p.ports()[1].direction, Direction::Out);
        assert!(!p.segmented_sdo());
    }

    #[test]
    fn test_storage_classes() {
        let p = plan(GeneratorOptions::default());
        let od = p.od();
        assert_eq!(p.storage(od.get(0x1000_00).unwrap()), Storage::Constant);
        assert_eq!(p.storage(od.get(0x1001_00).unwrap()), Storage::Internal);
        assert_eq!(p.storage(od.get(0x2000_00).unwrap()), Storage::InputPort);
        assert_eq!(p.storage(od.get(0x2001_00).unwrap()), Storage::BufferedPort);
        assert_eq!(p.storage(od.get(0x2002_00).unwrap()), Storage::StrobedPort);
    }

    #[test]
    fn test_value_expr_uses_buffer_for_rw_ports() {
        let p = plan(GeneratorOptions::default());
        let od = p.od();
        assert_eq!(p.value_expr(od.get(0x2001_00).unwrap()), "\\DigitalOutputs_q\\");
        assert_eq!(p.value_expr(od.get(0x2000_00).unwrap()), "\\DigitalInputs\\");
        assert_eq!(p.value_expr(od.get(0x1000_00).unwrap()), "\\DEVICE_TYPE\\");
    }

    #[test]
    fn test_flag_ports_precede_object_ports() {
        let p = plan(GeneratorOptions { sync: true, gfc: true, ..Default::default() });
        let names: Vec<&str> = p.ports().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names[0], "Sync");
        assert_eq!(names[1], "Gfc");
    }

    #[test]
    fn test_forced_comm_port() {
        let p = plan(GeneratorOptions { extra_ports: vec![0x1001_00], ..Default::default() });
        assert!(p.is_port(0x1001_00));
        assert_eq!(
            p.storage(p.od().get(0x1001_00).unwrap()),
            Storage::InputPort
        );
    }
}
