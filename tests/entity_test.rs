use canopen_hdl::plan::Direction;
use canopen_hdl::{entity, validate, EntityPlan, GeneratorOptions, ObjectDirectory};
use lazy_static::lazy_static;

const EDS_PATH: &str = "tests/fixtures/sample.eds";

fn load_plan(options: GeneratorOptions) -> EntityPlan {
    let content = std::fs::read_to_string(EDS_PATH).expect("Failed to read EDS file");
    let od = ObjectDirectory::from_eds(&content).expect("Failed to load EDS content");
    validate::validate(&od).expect("Fixture dictionary must validate");
    EntityPlan::new(od, options).expect("Plan must build")
}

lazy_static! {
    static ref VHDL: String = {
        let plan = load_plan(GeneratorOptions::default());
        entity::generate(&plan, "eds2vhdl sample.eds").expect("Generation must succeed")
    };
}

#[test]
fn test_generation_is_deterministic() {
    let plan = load_plan(GeneratorOptions::default());
    let second = entity::generate(&plan, "eds2vhdl sample.eds").unwrap();
    assert_eq!(*VHDL, second);
}

#[test]
fn test_entity_declaration() {
    assert!(VHDL.starts_with("--! Generated with eds2vhdl sample.eds\n"));
    assert!(VHDL.contains("entity IoModuleCanOpen is"));
    assert!(VHDL.contains("architecture Behavioral of IoModuleCanOpen is"));
    assert!(VHDL.contains("Status          : out CanOpen.Status"));
    assert!(VHDL.contains("component CanLite is"));
}

#[test]
fn test_port_surface() {
    let plan = load_plan(GeneratorOptions::default());
    let names: Vec<&str> = plan.ports().iter().map(|p| p.name.as_str()).collect();
    // Domain object + SDO server parameter enable the segmented surface.
    assert!(plan.segmented_sdo());
    assert_eq!(
        names,
        vec![
            "SegmentedSdoMux",
            "SegmentedSdoReadEnable",
            "SegmentedSdoReadDataEnable",
            "SegmentedSdoData",
            "SegmentedSdoDataValid",
            "Tpdo2Event",
            "\\DigitalInputs\\",
            "\\AnalogInput\\",
            "\\DigitalOutputs\\",
            "\\MotorCommand\\",
            "\\MotorCommand_strb\\",
            "\\Setpoint\\",
        ]
    );
    // TPDO1 is statically cyclic (const/ro, type 1): no event input.
    assert!(!plan.tpdo_event_port(0));
    assert!(plan.tpdo_event_port(1));
    assert_eq!(plan.ports()[6].direction, Direction::In);
    assert_eq!(plan.ports()[8].direction, Direction::Out);
}

#[test]
fn test_optional_flag_ports_are_prepended() {
    let plan = load_plan(GeneratorOptions {
        sync: true,
        gfc: true,
        timestamp: true,
        ..Default::default()
    });
    let names: Vec<&str> = plan.ports().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(&names[..4], &["Sync", "Gfc", "Timestamp", "SegmentedSdoMux"]);
    let text = entity::generate(&plan, "eds2vhdl --sync --gfc --timestamp sample.eds").unwrap();
    assert!(text.contains("Sync <= Sync_ob;"));
    assert!(text.contains("CanOpen.NMT_GFC"));
    assert!(text.contains("Timestamp <= Timestamp_ob;"));
}

#[test]
fn test_forced_port_uses_buffer() {
    let plan = load_plan(GeneratorOptions { extra_ports: vec![0x1017_00], ..Default::default() });
    assert!(plan.is_port(0x1017_00));
    let text = entity::generate(&plan, "eds2vhdl --port 0x101700 sample.eds").unwrap();
    assert!(text.contains("\\ProducerHeartbeatTime\\ : out unsigned(15 downto 0)"));
    assert!(text.contains("\\ProducerHeartbeatTime\\ <= \\ProducerHeartbeatTime_q\\;"));
    // The heartbeat timer now reads the buffer.
    assert!(text.contains("HeartbeatProducerCounter = \\ProducerHeartbeatTime_q\\ - 1"));
}

#[test]
fn test_object_dictionary_declarations() {
    assert!(VHDL.contains("constant \\ODI_DEVICE_TYPE\\"));
    assert!(VHDL.contains(":= x\"100000\";"));
    assert!(VHDL.contains("constant \\DEVICE_TYPE\\"));
    assert!(VHDL.contains(":= x\"00000191\";"));
    assert!(VHDL.contains("signal \\DigitalOutputs_q\\"));
    // Write-only ports have no internal declaration, input ports neither.
    assert!(!VHDL.contains("signal \\MotorCommand\\"));
    assert!(!VHDL.contains("signal \\DigitalInputs\\"));
}

#[test]
fn test_node_id_expressions() {
    assert!(VHDL.contains("resize(unsigned(NodeId_q), 32) + unsigned'(x\"00000600\")"));
    assert!(VHDL.contains("resize(unsigned(NodeId_q), 32) + unsigned'(x\"00000180\")"));
}

#[test]
fn test_state_machine_states() {
    for state in [
        "STATE_RESET,",
        "STATE_RESET_APP,",
        "STATE_RESET_COMM,",
        "STATE_BOOTUP,",
        "STATE_BOOTUP_WAIT,",
        "STATE_IDLE,",
        "STATE_SYNC,",
        "STATE_EMCY,",
        "STATE_TPDO1,",
        "STATE_SDO_RX,",
        "STATE_HEARTBEAT",
    ] {
        assert!(VHDL.contains(state), "state list should contain {}", state);
    }
    // RX outranks transmit interrupts in IDLE.
    let rx = VHDL.find("elsif RxFifoEmpty = '0' then").unwrap();
    let sync = VHDL.find("NextState <= STATE_SYNC;").unwrap();
    assert!(rx < sync);
}

#[test]
fn test_bootup_and_heartbeat_frames() {
    assert!(VHDL.contains("if CurrentState = STATE_BOOTUP then"));
    assert!(VHDL
        .contains("TxFrame.Id(10 downto 0) <= CanOpen.FUNCTION_CODE_NMT_ERROR_CONTROL & NodeId_q;"));
    assert!(VHDL.contains("TxFrame.Data <= (0 => '0' & NmtState_ob, others => (others => '0'));"));
}

#[test]
fn test_tpdo_payloads() {
    // TPDO1 maps 8-bit inputs then a 16-bit analog value: 24 bits, DLC 3,
    // sub 1 in the lowest bits.
    assert!(VHDL.contains(
        "Tpdo1Data <= x\"0000000000\" & std_logic_vector(\\AnalogInput\\) & std_logic_vector(\\DigitalInputs\\);"
    ));
    assert!(VHDL.contains("TxFrame.Dlc <= b\"0011\";"));
    assert!(VHDL.contains("Tpdo2Data <= x\"000000000000\" & std_logic_vector(\\AnalogInput\\);"));
    assert!(VHDL.contains("Tpdo3Data <= (others => '0');"));
    assert!(VHDL.contains("Tpdo4Data <= (others => '0');"));
}

#[test]
fn test_tpdo_trigger_specialisation() {
    // TPDO1: static cyclic, counts SYNC pulses.
    assert!(VHDL.contains("TpdoSyncCycles"));
    // TPDO2: run-time transmission type, full matrix with the event input.
    assert!(VHDL.contains("TpdoEvent := Tpdo2Event;"));
    assert!(VHDL.contains("TpdoInhibitCounter"));
}

#[test]
fn test_rpdo_timeout() {
    assert!(VHDL.contains("RPDO1 event timer"));
    assert!(VHDL.contains("RpdoTimeout_ob <= Rpdo1Timeout;"));
}

#[test]
fn test_heartbeat_consumer() {
    assert!(VHDL.contains("Heartbeat consumer timer 1"));
    assert!(VHDL.contains("TxSdoInitiateMuxIndex = x\"1016\""));
    assert!(VHDL.contains("HeartbeatConsumerError <= HeartbeatConsumer1Error;"));
}

#[test]
fn test_sync_producer() {
    assert!(VHDL.contains("elsif CurrentState = STATE_SYNC then"));
    assert!(VHDL.contains("SyncProducerInterrupt <= '1';"));
    assert!(VHDL.contains("SyncError_ob <= '1';"));
    assert!(VHDL.contains("SyncCounterValue"));
}

#[test]
fn test_sdo_abort_codes_are_literal() {
    for code in [
        "x\"05030000\"",
        "x\"05040001\"",
        "x\"05040002\"",
        "x\"05040003\"",
        "x\"06010001\"",
        "x\"06010002\"",
        "x\"06020000\"",
        "x\"06070010\"",
        "x\"06090030\"",
        "x\"06040047\"",
        "x\"08000024\"",
    ] {
        assert!(VHDL.contains(code), "abort code {} should be emitted", code);
    }
}

#[test]
fn test_sdo_case_arms() {
    // Every dictionary entry appears as a download and an upload arm.
    let plan = load_plan(GeneratorOptions::default());
    for desc in plan.od().objects().values() {
        assert!(
            VHDL.contains(&format!("when {} =>", desc.odi_name())),
            "missing SDO case arm for {}",
            desc.parameter_name()
        );
    }
    // Block upload dispatches on the raw mux.
    assert!(VHDL.contains("when x\"102100\" =>"));
    // The write-only command aborts reads and accepts writes.
    assert!(VHDL.contains("when \\ODI_MOTOR_COMMAND\\ =>"));
}

#[test]
fn test_sdo_limit_predicates() {
    // Setpoint: signed range -1000..=1000.
    assert!(VHDL.contains("signed(RxSdoDownloadInitiateData(15 downto 0)) >= signed'(x\"FC18\")"));
    assert!(VHDL.contains("signed(RxSdoDownloadInitiateData(15 downto 0)) <= signed'(x\"03E8\")"));
    // Motor Command: unsigned 0..=1000.
    assert!(
        VHDL.contains("unsigned(RxSdoDownloadInitiateData(15 downto 0)) <= unsigned'(x\"03E8\")")
    );
}

#[test]
fn test_sdo_block_upload_crc() {
    assert!(VHDL.contains("CanOpen.Crc16(SdoSegData, SdoBlockCrc, 7)"));
    assert!(VHDL.contains("TxSdoBlockUploadEndCrc <= SdoBlockCrc;"));
    assert!(VHDL.contains("RxSdoBlockUploadInitiatePst"));
}

#[test]
fn test_wo_strobe_process() {
    assert!(VHDL.contains("\\MotorCommand_strb\\ <= '1';"));
    assert!(VHDL.contains("\\MotorCommand_strb\\ <= '0';"));
}

#[test]
fn test_error_register_wiring() {
    assert!(VHDL.contains("\\ErrorRegister\\(4) <= CommunicationError_ob;"));
    assert!(VHDL.contains("\\ErrorRegister\\(6) <= '0';"));
}

#[test]
fn test_trailing_templates() {
    assert!(VHDL.contains("--! Component declaration template"));
    assert!(VHDL.contains("--    component IoModuleCanOpen is"));
    assert!(VHDL.contains("--! Component instantiation template"));
    assert!(VHDL.contains("--    CanOpenController : IoModuleCanOpen"));
}
