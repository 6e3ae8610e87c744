use canopen_hdl::data_type::DataType;
use canopen_hdl::object_directory::AccessType;
use canopen_hdl::validate;
use canopen_hdl::value::DefaultExpr;
use canopen_hdl::ObjectDirectory;
use lazy_static::lazy_static;

const EDS_PATH: &str = "tests/fixtures/sample.eds";

lazy_static! {
    static ref OD: ObjectDirectory = {
        let content = std::fs::read_to_string(EDS_PATH).expect("Failed to read EDS file");
        let od = ObjectDirectory::from_eds(&content).expect("Failed to load EDS content");
        validate::validate(&od).expect("Fixture dictionary must validate");
        od
    };
}

#[test]
fn test_entity_name() {
    assert_eq!(OD.entity_name(), "IoModuleCanOpen");
}

#[test]
fn test_device_type_is_const() {
    let var = OD.get(0x1000_00).expect("Device type not found");
    assert_eq!(var.parameter_name(), "Device type");
    assert_eq!(var.access_type(), AccessType::Const);
    assert_eq!(var.data_type(), DataType::Unsigned32);
    assert_eq!(var.default_literal(), 0x191);
    assert_eq!(var.name(), "\\DEVICE_TYPE\\");
}

#[test]
fn test_complex_object_flattening() {
    let length = OD.get(0x1018_00).expect("Identity length not found");
    assert_eq!(length.parameter_name(), "Identity Object Length");
    assert_eq!(length.data_type(), DataType::Unsigned8);

    let vendor = OD.get(0x1018_01).expect("Vendor-ID not found");
    assert_eq!(vendor.parameter_name(), "Vendor-ID");
    assert_eq!(vendor.default_literal(), 0x123);

    let subs: Vec<u8> = OD.sub_entries(0x1018).map(|d| d.sub_index()).collect();
    assert_eq!(subs, vec![1, 2]);
}

#[test]
fn test_node_id_defaults_stay_symbolic() {
    let sdo_rx = OD.get(0x1200_01).expect("SDO RX COB-ID not found");
    assert_eq!(sdo_rx.default(), Some(&DefaultExpr::NodeIdOffset(0x600)));
    assert_eq!(sdo_rx.default().unwrap().resolve(5), 0x605);

    let tpdo1 = OD.get(0x1800_01).expect("TPDO1 COB-ID not found");
    assert_eq!(tpdo1.default(), Some(&DefaultExpr::NodeIdOffset(0x180)));
}

#[test]
fn test_heartbeat_producer_entry() {
    let var = OD.get(0x1017_00).expect("Producer heartbeat time not found");
    assert_eq!(var.data_type(), DataType::Unsigned16);
    assert_eq!(var.access_type(), AccessType::Rw);
    assert_eq!(var.default_literal(), 1000);
    assert_eq!(var.name(), "\\ProducerHeartbeatTime\\");
}

#[test]
fn test_domain_object() {
    let var = OD.get(0x1021_00).expect("Store EDS not found");
    assert_eq!(var.data_type(), DataType::Domain);
    assert_eq!(var.bit_length(), 0);
    assert!(var.default().is_none());
}

#[test]
fn test_limits() {
    let setpoint = OD.get(0x2400_00).expect("Setpoint not found");
    assert_eq!(setpoint.data_type(), DataType::Integer16);
    assert_eq!(setpoint.low_limit(), Some(0xFC18)); // -1000 as a 16-bit pattern
    assert_eq!(setpoint.high_limit(), Some(1000));

    let motor = OD.get(0x2300_00).expect("Motor Command not found");
    assert_eq!(motor.access_type(), AccessType::Wo);
    assert_eq!(motor.high_limit(), Some(0x3E8));
}

#[test]
fn test_tpdo_mappings_resolve() {
    let targets = validate::tpdo_mappings(&OD, 0).expect("TPDO1 mapping must resolve");
    let muxes: Vec<u32> = targets.iter().map(|d| d.mux()).collect();
    assert_eq!(muxes, vec![0x2000_00, 0x2100_00]);
    let total: u32 = targets.iter().map(|d| d.bit_length()).sum();
    assert_eq!(total, 24);

    let targets = validate::tpdo_mappings(&OD, 1).expect("TPDO2 mapping must resolve");
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].mux(), 0x2100_00);
}

#[test]
fn test_canonical_names_are_unique() {
    let mut names: Vec<&str> = OD.objects().values().map(|d| d.canonical()).collect();
    let before = names.len();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), before);
}

#[test]
fn test_ordering_is_by_mux() {
    let muxes: Vec<u32> = OD.objects().keys().copied().collect();
    let mut sorted = muxes.clone();
    sorted.sort_unstable();
    assert_eq!(muxes, sorted);
    assert_eq!(muxes.first(), Some(&0x1000_00));
}
