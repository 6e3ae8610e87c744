//! Top-level emission of the node entity. The output order is fixed:
//! header, entity declaration, architecture declarations, the behavioural
//! processes (one per concern), the object dictionary assignments, then the
//! component/instantiation templates as trailing comments. Two runs over the
//! same dictionary produce byte-identical text.

use log::info;

use crate::constant::{MUX_COB_ID_EMCY, MUX_ERROR_REGISTER, MUX_SDO_TX_COB_ID, PDO_COUNT};
use crate::data_type::DataType;
use crate::error::BuildError;
use crate::object_directory::{AccessType, ObjectDescriptor};
use crate::plan::{EntityPlan, Storage};
use crate::{pdo, sdo, state_machine};

pub fn generate(plan: &EntityPlan, invocation: &str) -> Result<String, BuildError> {
    let tpdo_bits = pdo::tpdo_bit_lengths(plan)?;

    let mut out = String::with_capacity(256 * 1024);
    out.push_str(&format!("--! Generated with {}\n", invocation));
    out.push_str(
        "library ieee;\n    use ieee.std_logic_1164.all;\n    use ieee.std_logic_misc.all;\n    use ieee.numeric_std.all;\n\nuse work.CanBus;\nuse work.CanOpen;\n\n",
    );
    out.push_str(&declaration(plan, "entity"));
    out.push_str("\n\n");
    out.push_str(&format!("architecture Behavioral of {} is\n", plan.entity_name()));
    state_machine::emit_state_type(&mut out);
    emit_can_controller_component(&mut out);
    emit_internal_signals(plan, &mut out);
    emit_aliases(&mut out);
    emit_odi_constants(plan, &mut out);
    emit_od_declarations(plan, &mut out);
    out.push_str("\nbegin\n\n");
    emit_can_controller_instance(&mut out);
    emit_output_assignments(plan, &mut out);
    emit_fifo_shim(&mut out);
    state_machine::emit_state_register(&mut out);
    state_machine::emit_next_state(plan, &mut out);
    state_machine::emit_nmt(plan, &mut out);
    state_machine::emit_node_id_latch(&mut out);
    state_machine::emit_time(plan, &mut out);
    state_machine::emit_emcy(plan, &mut out);
    state_machine::emit_timers(&mut out);
    state_machine::emit_heartbeat_consumers(plan, &mut out);
    state_machine::emit_heartbeat_producer(plan, &mut out);
    state_machine::emit_sync(plan, &mut out);
    pdo::emit_tpdo_interrupts(plan, &mut out);
    pdo::emit_tpdo_data(plan, &mut out)?;
    pdo::emit_rpdo_timeouts(plan, &mut out);
    emit_frame_loader(plan, &tpdo_bits, &mut out);
    sdo::emit_rx_sdo_latch(plan, &mut out);
    sdo::emit_sdo_server(plan, &mut out);
    emit_od_assignments(plan, &mut out);
    out.push_str("\nend Behavioral;\n");
    emit_trailing_templates(plan, &mut out);

    info!("{}: {} ports, {} dictionary entries", plan.entity_name(), plan.ports().len(),
          plan.od().objects().len());
    Ok(out)
}

/// Entity or component declaration; the same text serves both, per the
/// trailing instantiation template.
fn declaration(plan: &EntityPlan, kind: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!("{} {} is\n", kind, plan.entity_name()));
    s.push_str("    generic (\n        CLOCK_FREQUENCY : positive --! Frequency of Clock in Hz\n    );\n");
    s.push_str("    port (\n");
    s.push_str("        --! Common signals\n");
    s.push_str("        Clock       : in  std_logic;\n");
    s.push_str("        Reset_n     : in  std_logic;\n\n");
    s.push_str("        CanRx       : in  std_logic;\n");
    s.push_str("        CanTx       : out std_logic;\n\n");
    s.push_str("        NodeId          : in  std_logic_vector(6 downto 0);\n");
    s.push_str("        ErrorRegister   : in  unsigned(7 downto 0);\n");
    s.push_str("        Status          : out CanOpen.Status");
    if plan.ports().is_empty() {
        s.push('\n');
    } else {
        s.push_str(";\n\n        --! Profile-specific signals\n");
        let rendered: Vec<String> = plan
            .ports()
            .iter()
            .map(|p| {
                format!(
                    "        {} : {} {}",
                    pad(&p.name, 19),
                    p.direction.as_str(),
                    p.vhdl_type
                )
            })
            .collect();
        s.push_str(&rendered.join(";\n"));
        s.push('\n');
    }
    s.push_str("    );\n");
    s.push_str(&format!("end {} {};", kind, plan.entity_name()));
    s
}

fn pad(s: &str, width: usize) -> String {
    if s.len() >= width {
        s.to_string()
    } else {
        format!("{}{}", s, " ".repeat(width - s.len()))
    }
}

fn emit_can_controller_component(out: &mut String) {
    out.push_str(
        r#"
    component CanLite is
        generic (
            BAUD_RATE_PRESCALAR         : positive range 1 to 64 := 1;
            SYNCHRONIZATION_JUMP_WIDTH  : positive range 1 to 4 := 3;
            TIME_SEGMENT_1              : positive range 1 to 16 := 8;
            TIME_SEGMENT_2              : positive range 1 to 8 := 3;
            TRIPLE_SAMPLING             : boolean := true
        );
        port (
            Clock               : in  std_logic; --! Base clock for CAN timing
            Reset_n             : in  std_logic; --! Active-low reset

            CanRx               : in  std_logic; --! RX input from CAN transceiver
            CanTx               : out std_logic; --! TX output to CAN transceiver

            RxFrame             : out CanBus.Frame; --! To RX FIFO
            RxFifoWriteEnable   : out std_logic; --! To RX FIFO
            RxFifoFull          : in  std_logic; --! From RX FIFO

            TxFrame             : in  CanBus.Frame; --! From TX FIFO
            TxFifoReadEnable    : out std_logic; --! To TX FIFO
            TxFifoEmpty         : in  std_logic; --! From TX FIFO
            TxAck               : out std_logic; --! High pulse on successful transmission

            Status              : out CanBus.Status
        );
    end component CanLite;
"#,
    );
}

fn emit_internal_signals(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"
    --! Internal signals
    signal CurrentState,
           NextState        : State; --! Primary state machine variables
    signal NodeId_q         : std_logic_vector(6 downto 0); --! Latched node-ID
    signal NmtState_ob       : std_logic_vector(6 downto 0); --! NMT state output buffer
    signal RxFrame,
           RxFrame_q,
           TxFrame,
           TxFrame_ob,
           TxFrame_q        : CanBus.Frame; --! CanLite frame interfacing
    signal RxFifoReadEnable,
           RxFifoWriteEnable,
           RxFifoEmpty,
           RxFifoFull,
           TxFifoReadEnable,
           TxFifoWriteEnable,
           TxFifoEmpty      : std_logic; --! CanLite FIFO interface
    signal TxAck            : std_logic; --! CanLite successful transmission
    signal CanStatus_ob     : CanBus.Status; --! CanLite status
    signal MicrosecondEnable,
           HundredMicrosecondEnable,
           MillisecondEnable    : std_logic; --! Single-clock pulses
    signal CommunicationError_ob    : std_logic; --! Bit 4 of Error register
    signal InvalidConfiguration_ob  : std_logic; --! Node-ID was the broadcast ID at reset-comm
    signal Sync_ob                  : std_logic; --! Sync pulse output buffer
    signal SyncProducerInterrupt    : std_logic;
    signal SyncError_ob             : std_logic;
    signal SyncCounterValue         : unsigned(7 downto 0);
    signal SyncWindowExpired        : std_logic;
    signal HeartbeatConsumerError   : std_logic; --! Heartbeat timeout event has occurred
    signal BusOffRecovery           : std_logic; --! Previous bus-off, not yet reported
    signal RpdoTimeout_ob           : std_logic;
    signal EmcyEec          : std_logic_vector(15 downto 0); --! Emergency error code
    signal EmcyMsef         : std_logic_vector(39 downto 0); --! Manufacturer-specific error code
    signal Timestamp_ob     : CanOpen.TimeOfDay;

    --! Internal SDO signals
    signal RxSdo,
           TxSdo            : std_logic_vector(63 downto 0);
    signal RxSdoInitiateMux : std_logic_vector(23 downto 0);
    signal Tpdo1Data,
           Tpdo2Data,
           Tpdo3Data,
           Tpdo4Data        : std_logic_vector(63 downto 0);
"#,
    );
    for i in 0..PDO_COUNT {
        if pdo::rpdo_has_timeout(plan, i) {
            out.push_str(&format!("    signal Rpdo{}Timeout     : std_logic;\n", i + 1));
        }
    }
    for (j, _) in state_machine::heartbeat_consumer_entries(plan).iter().enumerate() {
        out.push_str(&format!("    signal HeartbeatConsumer{}Error : std_logic;\n", j + 1));
    }
    if !plan.segmented_sdo() {
        out.push_str(
            r#"    signal SegmentedSdoMux         : std_logic_vector(23 downto 0);
    signal SegmentedSdoReadEnable  : std_logic;
    signal SegmentedSdoReadDataEnable  : std_logic;
    signal SegmentedSdoData        : std_logic_vector(55 downto 0);
    signal SegmentedSdoDataValid   : std_logic;
"#,
        );
    }
}

fn emit_aliases(out: &mut String) {
    out.push_str(
        r#"
    --! Aliases for readability
    alias  RxCobIdFunctionCode              : std_logic_vector(3 downto 0) is RxFrame_q.Id(10 downto 7);
    alias  RxCobIdNodeId                    : std_logic_vector(6 downto 0) is RxFrame_q.Id(6 downto 0);
    alias  RxNmtNodeControlCommand          : std_logic_vector(7 downto 0) is RxFrame_q.Data(0);
    alias  RxNmtNodeControlNodeId           : std_logic_vector(6 downto 0) is RxFrame_q.Data(1)(6 downto 0);
    alias  RxSdoCs                          : std_logic_vector(2 downto 0) is RxSdo(7 downto 5);
    alias  RxSdoInitiateMuxIndex            : std_logic_vector(15 downto 0) is RxSdo(23 downto 8);
    alias  RxSdoInitiateMuxSubIndex         : std_logic_vector(7 downto 0) is RxSdo(31 downto 24);
    alias  RxSdoDownloadInitiateN           : std_logic_vector(1 downto 0) is RxSdo(3 downto 2);
    alias  RxSdoDownloadInitiateE           : std_logic is RxSdo(1);
    alias  RxSdoDownloadInitiateS           : std_logic is RxSdo(0);
    alias  RxSdoDownloadInitiateData        : std_logic_vector(31 downto 0) is RxSdo(63 downto 32);
    alias  RxSdoUploadSegmentT              : std_logic is RxSdo(4);
    alias  RxSdoBlockUploadCs               : std_logic_vector(1 downto 0) is RxSdo(1 downto 0);
    alias  RxSdoBlockUploadInitiateCc       : std_logic is RxSdo(2);
    alias  RxSdoBlockUploadInitiateBlksize  : std_logic_vector(7 downto 0) is RxSdo(39 downto 32);
    alias  RxSdoBlockUploadInitiatePst      : std_logic_vector(7 downto 0) is RxSdo(47 downto 40);
    alias  RxSdoBlockUploadSubBlockAckseq   : std_logic_vector(7 downto 0) is RxSdo(15 downto 8);
    alias  RxSdoBlockUploadSubBlockBlksize  : std_logic_vector(7 downto 0) is RxSdo(23 downto 16);
    alias  TxSdoCs                          : std_logic_vector(2 downto 0) is TxSdo(7 downto 5);
    alias  TxSdoInitiateMuxIndex            : std_logic_vector(15 downto 0) is TxSdo(23 downto 8);
    alias  TxSdoInitiateMuxSubIndex         : std_logic_vector(7 downto 0) is TxSdo(31 downto 24);
    alias  TxSdoAbortCode                   : std_logic_vector(31 downto 0) is TxSdo(63 downto 32);
    alias  TxSdoUploadInitiateN             : std_logic_vector(1 downto 0) is TxSdo(3 downto 2);
    alias  TxSdoUploadInitiateE             : std_logic is TxSdo(1);
    alias  TxSdoUploadInitiateS             : std_logic is TxSdo(0);
    alias  TxSdoUploadInitiateD             : std_logic_vector(31 downto 0) is TxSdo(63 downto 32);
    alias  TxSdoUploadSegmentT              : std_logic is TxSdo(4);
    alias  TxSdoUploadSegmentN              : std_logic_vector(2 downto 0) is TxSdo(3 downto 1);
    alias  TxSdoUploadSegmentC              : std_logic is TxSdo(0);
    alias  TxSdoUploadSegmentSegData        : std_logic_vector(55 downto 0) is TxSdo(63 downto 8);
    alias  TxSdoBlockUploadSs               : std_logic is TxSdo(0);
    alias  TxSdoBlockUploadInitiateSc       : std_logic is TxSdo(2);
    alias  TxSdoBlockUploadInitiateS        : std_logic is TxSdo(1);
    alias  TxSdoBlockUploadInitiateSize     : std_logic_vector(31 downto 0) is TxSdo(63 downto 32);
    alias  TxSdoBlockUploadSubBlockC        : std_logic is TxSdo(7);
    alias  TxSdoBlockUploadSubBlockSeqno    : std_logic_vector(6 downto 0) is TxSdo(6 downto 0);
    alias  TxSdoBlockUploadSubBlockSegData  : std_logic_vector(55 downto 0) is TxSdo(63 downto 8);
    alias  TxSdoBlockUploadEndN             : std_logic_vector(2 downto 0) is TxSdo(4 downto 2);
    alias  TxSdoBlockUploadEndCrc           : std_logic_vector(15 downto 0) is TxSdo(23 downto 8);

    --! Interrupts
    signal EmcyInterrupt,
           HeartbeatProducerInterrupt,
           SdoInterrupt,
           Tpdo1Interrupt,
           Tpdo2Interrupt,
           Tpdo3Interrupt,
           Tpdo4Interrupt   : std_logic;
"#,
    );
}

fn emit_odi_constants(plan: &EntityPlan, out: &mut String) {
    out.push_str("\n    --! Object dictionary multiplexers\n");
    for desc in plan.od().objects().values() {
        out.push_str(&format!(
            "    constant {} : std_logic_vector(23 downto 0) := x\"{:04X}{:02X}\";\n",
            pad(&desc.odi_name(), 26),
            desc.index(),
            desc.sub_index()
        ));
    }
}

fn emit_od_declarations(plan: &EntityPlan, out: &mut String) {
    out.push_str("\n    --! Object dictionary entries\n");
    for desc in plan.od().objects().values() {
        if desc.bit_length() == 0 {
            continue; // Domain entries have no storage in the entity
        }
        match plan.storage(desc) {
            Storage::Constant => out.push_str(&format!(
                "    constant {} : {} := {};\n",
                pad(&desc.name(), 26),
                desc.data_type().vhdl_type(),
                desc.default_expr()
            )),
            Storage::Internal => out.push_str(&format!(
                "    signal {} : {};\n",
                pad(&desc.name(), 28),
                desc.data_type().vhdl_type()
            )),
            Storage::BufferedPort => out.push_str(&format!(
                "    signal {} : {};\n",
                pad(&desc.buffer_name(), 28),
                desc.data_type().vhdl_type()
            )),
            Storage::InputPort | Storage::StrobedPort => {}
        }
    }
}

fn emit_can_controller_instance(out: &mut String) {
    out.push_str(
        r#"    CanController : CanLite
        port map (
            Clock => Clock,
            Reset_n => Reset_n,
            CanRx => CanRx,
            CanTx => CanTx,
            RxFrame => RxFrame,
            RxFifoWriteEnable => RxFifoWriteEnable,
            RxFifoFull => RxFifoFull,
            TxFrame => TxFrame_q,
            TxFifoReadEnable => TxFifoReadEnable,
            TxFifoEmpty => TxFifoEmpty,
            TxAck => TxAck,
            Status => CanStatus_ob
        );
"#,
    );
}

fn emit_output_assignments(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"
    --! Node status
    Status <= (
        NmtState => NmtState_ob,
        CanStatus => CanStatus_ob,
        AutoBitrateOrLss => '0',
        InvalidConfiguration => InvalidConfiguration_ob,
        ErrorControlEvent => HeartbeatConsumerError,
        SyncError => SyncError_ob,
        EventTimerError => RpdoTimeout_ob,
        ProgramDownload => '0'
    );
"#,
    );
    if plan.options().sync {
        out.push_str("    Sync <= Sync_ob; --! Buffered\n");
    }
    if plan.options().gfc {
        out.push_str("    Gfc <= '1' when CurrentState = STATE_CAN_RX_READ and RxCobIdFunctionCode = CanOpen.FUNCTION_CODE_NMT and RxCobIdNodeId = CanOpen.NMT_GFC else '0';\n");
    }
    if plan.options().timestamp {
        out.push_str("    Timestamp <= Timestamp_ob; --! Buffered\n");
    }
}

fn emit_fifo_shim(out: &mut String) {
    out.push_str(
        r#"
    --! Single depth FIFO emulator for CanLite interface
    RxFifoReadEnable <= '1' when CurrentState = STATE_CAN_RX_STROBE else '0';
    RxFifoFull <= '0';
    TxFifoWriteEnable <= '1' when CurrentState = STATE_CAN_TX_STROBE else '0';
    process (Reset_n, Clock)
    begin
        if Reset_n = '0' then
            RxFrame_q <= (
                Id => (others => '0'),
                Rtr => '0',
                Ide => '0',
                Dlc => (others => '0'),
                Data => (others => (others => '0'))
            );
            RxFifoEmpty <= '1';
            TxFrame_ob <= (
                Id => (others => '0'),
                Rtr => '0',
                Ide => '0',
                Dlc => (others => '0'),
                Data => (others => (others => '0'))
            );
            TxFrame_q <= (
                Id => (others => '0'),
                Rtr => '0',
                Ide => '0',
                Dlc => (others => '0'),
                Data => (others => (others => '0'))
            );
            TxFifoEmpty <= '1';
        elsif rising_edge(Clock) then
            if RxFifoWriteEnable = '1' then
                RxFrame_q <= RxFrame;
            end if;
            if CanBus."="(CanStatus_ob.State, CanBus.STATE_RESET) or CanBus."="(CanStatus_ob.State, CanBus.STATE_BUS_OFF) then
                RxFifoEmpty <= '1';
            elsif RxFifoWriteEnable = '1' then
                RxFifoEmpty <= '0';
            elsif RxFifoReadEnable = '1' then
                RxFifoEmpty <= '1';
            end if;
            if TxFifoReadEnable = '1' then
                TxFrame_q <= TxFrame_ob;
            end if;
            if TxFifoWriteEnable = '1' then
                TxFrame_ob <= TxFrame;
            end if;
            if CanBus."="(CanStatus_ob.State, CanBus.STATE_RESET) or CanBus."="(CanStatus_ob.State, CanBus.STATE_BUS_OFF) then
                TxFifoEmpty <= '1';
            elsif TxFifoWriteEnable = '1' then
                TxFifoEmpty <= '0';
            elsif TxFifoReadEnable = '1' then
                TxFifoEmpty <= '1';
            end if;
        end if;
    end process;
"#,
    );
}

/// CAN TX frame assembly, one arm per emitting state.
fn emit_frame_loader(plan: &EntityPlan, tpdo_bits: &[u32; PDO_COUNT], out: &mut String) {
    let od = plan.od();
    out.push_str(
        r#"
    --! Load CAN TX frame
    process (Clock, Reset_n)
    begin
        if Reset_n = '0' then
            TxFrame <= (
                Id => (others => '0'),
                Rtr => '0',
                Ide => '0',
                Dlc => (others => '0'),
                Data => (others => (others => '0'))
            );
        elsif rising_edge(Clock) then
            TxFrame.Id(28 downto 11) <= (others => '0');
            TxFrame.Rtr <= '0';
            TxFrame.Ide <= '0';
            if CurrentState = STATE_BOOTUP then
                TxFrame.Id(10 downto 0) <= CanOpen.FUNCTION_CODE_NMT_ERROR_CONTROL & NodeId_q;
                TxFrame.Dlc <= b"0001";
                TxFrame.Data <= (others => (others => '0'));
"#,
    );
    // SYNC production
    if let Some(sync_cob) = od.get(crate::constant::MUX_COB_ID_SYNC) {
        let cob = plan.value_expr(sync_cob);
        out.push_str(&format!(
            "            elsif CurrentState = STATE_SYNC then\n                TxFrame.Id(10 downto 0) <= std_logic_vector({}(10 downto 0));\n",
            cob
        ));
        if let Some(overflow) = od.get(crate::constant::MUX_SYNC_OVERFLOW) {
            let ov = plan.value_expr(overflow);
            out.push_str(&format!(
                "                if {ov} >= 2 and {ov} <= 240 then\n                    TxFrame.Dlc <= b\"0001\";\n                else\n                    TxFrame.Dlc <= b\"0000\";\n                end if;\n",
                ov = ov
            ));
            out.push_str("                TxFrame.Data <= (others => (others => '0'));\n");
            out.push_str("                TxFrame.Data(0) <= std_logic_vector(SyncCounterValue);\n");
        } else {
            out.push_str("                TxFrame.Dlc <= b\"0000\";\n");
            out.push_str("                TxFrame.Data <= (others => (others => '0'));\n");
        }
    }
    // EMCY
    {
        let error_register = od
            .get(MUX_ERROR_REGISTER)
            .map(|d| plan.value_expr(d))
            .unwrap_or_else(|| "ErrorRegister".to_string());
        let id_expr = match od.get(MUX_COB_ID_EMCY) {
            Some(desc) => format!("std_logic_vector({}(10 downto 0))", plan.value_expr(desc)),
            None => "CanOpen.FUNCTION_CODE_EMCY & NodeId_q".to_string(),
        };
        out.push_str(&format!(
            r#"            elsif CurrentState = STATE_EMCY then
                TxFrame.Id(10 downto 0) <= {};
                TxFrame.Dlc <= b"1000";
                TxFrame.Data(0) <= EmcyEec(7 downto 0);
                TxFrame.Data(1) <= EmcyEec(15 downto 8);
                TxFrame.Data(2) <= std_logic_vector({});
                TxFrame.Data(3) <= EmcyMsef(7 downto 0);
                TxFrame.Data(4) <= EmcyMsef(15 downto 8);
                TxFrame.Data(5) <= EmcyMsef(23 downto 16);
                TxFrame.Data(6) <= EmcyMsef(31 downto 24);
                TxFrame.Data(7) <= EmcyMsef(39 downto 32);
"#,
            id_expr, error_register
        ));
    }
    // TPDOs
    for i in 0..PDO_COUNT {
        let cob_mux = (((crate::constant::IDX_TPDO_COMM + i as u16) as u32) << 8) | 1;
        let Some(cob) = od.get(cob_mux) else { continue };
        let dlc = tpdo_bits[i].div_ceil(8);
        out.push_str(&format!(
            r#"            elsif CurrentState = STATE_TPDO{n} then
                TxFrame.Id(10 downto 0) <= std_logic_vector({cob}(10 downto 0));
                TxFrame.Dlc <= b"{dlc:04b}";
                TxFrame.Data(0) <= Tpdo{n}Data(7 downto 0);
                TxFrame.Data(1) <= Tpdo{n}Data(15 downto 8);
                TxFrame.Data(2) <= Tpdo{n}Data(23 downto 16);
                TxFrame.Data(3) <= Tpdo{n}Data(31 downto 24);
                TxFrame.Data(4) <= Tpdo{n}Data(39 downto 32);
                TxFrame.Data(5) <= Tpdo{n}Data(47 downto 40);
                TxFrame.Data(6) <= Tpdo{n}Data(55 downto 48);
                TxFrame.Data(7) <= Tpdo{n}Data(63 downto 56);
"#,
            n = i + 1,
            cob = plan.value_expr(cob),
            dlc = dlc
        ));
    }
    // SDO response
    if let Some(desc) = od.get(MUX_SDO_TX_COB_ID) {
        out.push_str(&format!(
            r#"            elsif CurrentState = STATE_SDO_TX then
                TxFrame.Id(10 downto 0) <= std_logic_vector({}(10 downto 0));
                TxFrame.Dlc <= b"1000";
                TxFrame.Data(0) <= TxSdo(7 downto 0);
                TxFrame.Data(1) <= TxSdo(15 downto 8);
                TxFrame.Data(2) <= TxSdo(23 downto 16);
                TxFrame.Data(3) <= TxSdo(31 downto 24);
                TxFrame.Data(4) <= TxSdo(39 downto 32);
                TxFrame.Data(5) <= TxSdo(47 downto 40);
                TxFrame.Data(6) <= TxSdo(55 downto 48);
                TxFrame.Data(7) <= TxSdo(63 downto 56);
"#,
            plan.value_expr(desc)
        ));
    }
    out.push_str(
        r#"            elsif CurrentState = STATE_HEARTBEAT then
                TxFrame.Id(10 downto 0) <= CanOpen.FUNCTION_CODE_NMT_ERROR_CONTROL & NodeId_q;
                TxFrame.Dlc <= b"0001";
                TxFrame.Data <= (0 => '0' & NmtState_ob, others => (others => '0'));
            end if;
        end if;
    end process;
"#,
    );
}

/// Per-object storage behaviour: reset defaults, SDO write capture, strobes,
/// and port buffers.
fn emit_od_assignments(plan: &EntityPlan, out: &mut String) {
    let od = plan.od();
    out.push_str("\n    --! Object dictionary communication profile area assignments\n");
    match od.get(crate::constant::MUX_COB_ID_SYNC) {
        Some(desc) => {
            let cob = plan.value_expr(desc);
            out.push_str(&format!(
                "    Sync_ob <= '1' when (CurrentState = STATE_CAN_RX_READ and RxFrame_q.Ide = {cob}(29) and unsigned(RxFrame_q.Id(10 downto 0)) = {cob}(10 downto 0)) or CurrentState = STATE_SYNC else '0';\n",
                cob = cob
            ));
        }
        None => out.push_str("    Sync_ob <= '0';\n"),
    }
    out.push_str("    CommunicationError_ob <= '1' when CanBus.\"=\"(CanStatus_ob.State, CanBus.STATE_BUS_OFF) or CanStatus_ob.Overflow = '1' or HeartbeatConsumerError = '1' else '0';\n");

    for desc in od.objects().values() {
        if desc.bit_length() == 0 {
            continue;
        }
        let storage = plan.storage(desc);
        if desc.mux() == MUX_ERROR_REGISTER && storage == Storage::Internal {
            let name = desc.name();
            out.push_str(&format!(
                r#"    {0}(0) <= ErrorRegister(0);
    {0}(1) <= ErrorRegister(1);
    {0}(2) <= ErrorRegister(2);
    {0}(3) <= ErrorRegister(3);
    {0}(4) <= CommunicationError_ob;
    {0}(5) <= ErrorRegister(5);
    {0}(6) <= '0'; --! reserved (always 0)
    {0}(7) <= ErrorRegister(7);
"#,
                name
            ));
            continue;
        }
        match storage {
            Storage::Constant | Storage::InputPort => {}
            Storage::Internal => match desc.access_type() {
                AccessType::Ro => out.push_str(&format!(
                    "    {} <= {};\n",
                    desc.name(),
                    desc.default_expr()
                )),
                AccessType::Rw | AccessType::Wo => emit_rw_process(desc, &desc.name(), out),
                AccessType::Const => {}
            },
            Storage::BufferedPort => emit_rw_process(desc, &desc.buffer_name(), out),
            Storage::StrobedPort => emit_wo_process(desc, out),
        }
    }

    out.push_str("\n    --! Output port assignments from buffers\n");
    for desc in od.objects().values() {
        if plan.storage(desc) == Storage::BufferedPort {
            out.push_str(&format!("    {} <= {};\n", desc.name(), desc.buffer_name()));
        }
    }
}

/// Storage process for a read-write entry: communication profile entries
/// reload their defaults on reset-communication, manufacturer entries on
/// reset-application.
fn emit_rw_process(desc: &ObjectDescriptor, target: &str, out: &mut String) {
    let reset_state = if desc.index() < crate::constant::MANUFACTURER_PROFILE_START {
        "STATE_RESET_COMM"
    } else {
        "STATE_RESET_APP"
    };
    out.push_str(&format!(
        r#"    process (Clock, Reset_n)
    begin
        if Reset_n = '0' then
            {target} <= {default};
        elsif rising_edge(Clock) then
            if CurrentState = {reset_state} then
                {target} <= {default};
            elsif CurrentState = STATE_SDO_TX and TxSdoCs = CanOpen.SDO_SCS_IDR and TxSdoInitiateMuxIndex = x"{index:04X}" and TxSdoInitiateMuxSubIndex = x"{sub:02X}" then
                {target} <= {data};
            end if;
        end if;
    end process;
"#,
        target = target,
        default = desc.default_expr(),
        reset_state = reset_state,
        index = desc.index(),
        sub = desc.sub_index(),
        data = download_data_expr(desc.data_type())
    ));
}

/// Storage process for a write-only port: holds the default, presents the
/// written value for exactly the emitting cycle with its strobe raised.
fn emit_wo_process(desc: &ObjectDescriptor, out: &mut String) {
    out.push_str(&format!(
        r#"    process (Clock, Reset_n)
    begin
        if Reset_n = '0' then
            {name} <= {default};
            {strobe} <= '0';
        elsif rising_edge(Clock) then
            if CurrentState = STATE_SDO_TX and TxSdoCs = CanOpen.SDO_SCS_IDR and TxSdoInitiateMuxIndex = x"{index:04X}" and TxSdoInitiateMuxSubIndex = x"{sub:02X}" then
                {name} <= {data};
                {strobe} <= '1';
            else
                {name} <= {default};
                {strobe} <= '0';
            end if;
        end if;
    end process;
"#,
        name = desc.name(),
        strobe = desc.strobe_name(),
        default = desc.default_expr(),
        index = desc.index(),
        sub = desc.sub_index(),
        data = download_data_expr(desc.data_type())
    ));
}

/// The expedited download payload, converted to the object's declared type.
pub fn download_data_expr(data_type: DataType) -> String {
    match data_type {
        DataType::Boolean => "RxSdoDownloadInitiateData(0)".to_string(),
        _ => {
            let bits = data_type.bit_length();
            let kind = if data_type.is_signed() { "signed" } else { "unsigned" };
            format!("{}(RxSdoDownloadInitiateData({} downto 0))", kind, bits - 1)
        }
    }
}

fn emit_trailing_templates(plan: &EntityPlan, out: &mut String) {
    let component = declaration(plan, "component");
    out.push_str("\n--! Component declaration template\n--    ");
    out.push_str(&component.replace('\n', "\n--    "));
    out.push_str("\n\n--! Component instantiation template\n");
    out.push_str(&format!(
        "--    CanOpenController : {}\n--        generic map (\n--            CLOCK_FREQUENCY => CLOCK_FREQUENCY\n--        )\n--        port map (\n--            Clock => Clock,\n--            Reset_n => Reset_n,\n--            CanRx => CanRx,\n--            CanTx => CanTx,\n--            NodeId => NodeId,\n--            ErrorRegister => ErrorRegister, --! Bit 4 is overridden by communication errors\n--            Status => Status",
        plan.entity_name()
    ));
    for port in plan.ports() {
        out.push_str(&format!(",\n--            {0} => {0}", port.name));
    }
    out.push_str("\n--        );\n");
}
