//! Emission of the node's control plane: the primary state machine, NMT
//! state determination, node-ID latching, the timer cascade, TIME handling,
//! EMCY dispatch, heartbeat production and consumption, and the SYNC cycle.

use crate::constant::{
    IDX_HEARTBEAT_CONSUMER, MUX_COB_ID_SYNC, MUX_COB_ID_TIME, MUX_CYCLE_PERIOD,
    MUX_ERROR_BEHAVIOR_COMM, MUX_ERROR_BEHAVIOR_GENERIC, MUX_ERROR_REGISTER,
    MUX_HEARTBEAT_PRODUCER, MUX_NMT_STARTUP, MUX_SYNC_OVERFLOW, MUX_SYNC_WINDOW,
};
use crate::object_directory::ObjectDescriptor;
use crate::plan::EntityPlan;
use crate::sdo;

pub fn emit_state_type(out: &mut String) {
    out.push_str(
        r#"    type State is (
        STATE_RESET,
        STATE_RESET_APP,
        STATE_RESET_COMM,
        STATE_BOOTUP,
        STATE_BOOTUP_WAIT,
        STATE_IDLE,
        STATE_CAN_RX_STROBE,
        STATE_CAN_RX_READ,
        STATE_CAN_TX_STROBE,
        STATE_CAN_TX_WAIT,
        STATE_SYNC,
        STATE_EMCY,
        STATE_TPDO1,
        STATE_TPDO2,
        STATE_TPDO3,
        STATE_TPDO4,
        STATE_SDO_RX,
        STATE_SDO_TX,
        STATE_HEARTBEAT
    );
"#,
    );
}

pub fn emit_state_register(out: &mut String) {
    out.push_str(
        r#"
    --! Primary state machine
    process (Reset_n, Clock)
    begin
        if Reset_n = '0' then
            CurrentState <= STATE_RESET;
        elsif rising_edge(Clock) then
            CurrentState <= NextState;
        end if;
    end process;
"#,
    );
}

pub fn emit_next_state(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"
    --! Next state in state machine
    process (
        CurrentState,
        TxAck,
        CanStatus_ob,
        NodeId,
        EmcyInterrupt,
        SyncProducerInterrupt,
        HeartbeatProducerInterrupt,
        SdoInterrupt,
        Tpdo1Interrupt,
        Tpdo2Interrupt,
        Tpdo3Interrupt,
        Tpdo4Interrupt,
        RxFifoEmpty,
        NmtState_ob,
        TxFifoReadEnable,
        RxCobIdFunctionCode,
        RxCobIdNodeId,
        RxFrame_q,
        RxNmtNodeControlNodeId,
        NodeId_q,
        RxNmtNodeControlCommand
    )
    begin
        case CurrentState is
            when STATE_RESET => --! Power-on reset
                NextState <= STATE_RESET_APP;
            when STATE_RESET_APP => --! Service reset node
                NextState <= STATE_RESET_COMM;
            when STATE_RESET_COMM => --! Service reset communication
                if CanBus."/="(CanStatus_ob.State, CanBus.STATE_RESET) and CanBus."/="(CanStatus_ob.State, CanBus.STATE_BUS_OFF) and NodeId /= CanOpen.BROADCAST_NODE_ID then --! Only boot if CAN bus is up and node-ID is valid
                    NextState <= STATE_BOOTUP;
                else
                    NextState <= STATE_RESET_COMM;
                end if;
            when STATE_BOOTUP => --! Service boot-up event
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_BOOTUP_WAIT =>
                if TxAck = '1' then --! Wait until boot-up message has been sent
                    NextState <= STATE_IDLE;
                else
                    NextState <= STATE_BOOTUP_WAIT;
                end if;
            when STATE_IDLE => --! Wait for interrupt or reception of message from CanLite
                if CanBus."="(CanStatus_ob.State, CanBus.STATE_RESET) or CanBus."="(CanStatus_ob.State, CanBus.STATE_BUS_OFF) then
                    NextState <= STATE_IDLE;
                --! Pending reception outranks the transmit interrupts
                elsif RxFifoEmpty = '0' then
                    NextState <= STATE_CAN_RX_STROBE;
                --! Transmit interrupt priority based on CiA 301 function codes
                elsif SyncProducerInterrupt = '1' and (NmtState_ob = CanOpen.NMT_STATE_PREOPERATIONAL or NmtState_ob = CanOpen.NMT_STATE_OPERATIONAL) then
                    NextState <= STATE_SYNC;
                elsif EmcyInterrupt = '1' and (NmtState_ob = CanOpen.NMT_STATE_PREOPERATIONAL or NmtState_ob = CanOpen.NMT_STATE_OPERATIONAL) then
                    NextState <= STATE_EMCY;
                elsif Tpdo1Interrupt = '1' then
                    NextState <= STATE_TPDO1;
                elsif Tpdo2Interrupt = '1' then
                    NextState <= STATE_TPDO2;
                elsif Tpdo3Interrupt = '1' then
                    NextState <= STATE_TPDO3;
                elsif Tpdo4Interrupt = '1' then
                    NextState <= STATE_TPDO4;
                elsif SdoInterrupt = '1' then
                    NextState <= STATE_SDO_TX;
                elsif HeartbeatProducerInterrupt = '1' then
                    NextState <= STATE_HEARTBEAT;
                else
                    NextState <= STATE_IDLE;
                end if;
            when STATE_SYNC =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_EMCY =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_TPDO1 =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_TPDO2 =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_TPDO3 =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_TPDO4 =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_SDO_TX =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_HEARTBEAT =>
                NextState <= STATE_CAN_TX_STROBE;
            when STATE_CAN_TX_STROBE =>
                NextState <= STATE_CAN_TX_WAIT;
            when STATE_CAN_TX_WAIT => --! Wait until message has been loaded into CanLite
                if NmtState_ob = CanOpen.NMT_STATE_INITIALISATION then
                    NextState <= STATE_BOOTUP_WAIT;
                elsif TxFifoReadEnable = '1' then
                    NextState <= STATE_IDLE;
                else
                    NextState <= STATE_CAN_TX_WAIT;
                end if;
            when STATE_CAN_RX_STROBE => --! Load message from CanLite
                NextState <= STATE_CAN_RX_READ;
            when STATE_CAN_RX_READ => --! Process message
                if RxCobIdFunctionCode = CanOpen.FUNCTION_CODE_NMT and RxCobIdNodeId = CanOpen.NMT_NODE_CONTROL and (RxNmtNodeControlNodeId = CanOpen.BROADCAST_NODE_ID or RxNmtNodeControlNodeId = NodeId_q) then
                    if RxNmtNodeControlCommand = CanOpen.NMT_NODE_CONTROL_RESET_APP then
                        NextState <= STATE_RESET_APP;
                    elsif RxNmtNodeControlCommand = CanOpen.NMT_NODE_CONTROL_RESET_COMM then
                        NextState <= STATE_RESET_COMM;
                    else
                        NextState <= STATE_IDLE;
                    end if;
"#,
    );
    if let Some(condition) = sdo::rx_match_condition(plan) {
        out.push_str(&format!(
            "                elsif {} then --! SDO request, ignore if not 8 data bytes\n                    NextState <= STATE_SDO_RX;\n",
            condition
        ));
    }
    out.push_str(
        r#"                else
                    NextState <= STATE_IDLE;
                end if;
            when STATE_SDO_RX =>
                NextState <= STATE_IDLE;
            when others =>
                NextState <= STATE_RESET;
        end case;
    end process;
"#,
    );
}

pub fn emit_nmt(plan: &EntityPlan, out: &mut String) {
    let od = plan.od();
    out.push_str(
        r#"
    --! NMT State determination
    process (Clock, Reset_n)
    begin
        if Reset_n = '0' then
            NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
        elsif rising_edge(Clock) then
"#,
    );
    if let Some(behavior) = od.get(MUX_ERROR_BEHAVIOR_COMM) {
        let eb = plan.value_expr(behavior);
        out.push_str(&format!(
            r#"            if CommunicationError_ob = '1' and NmtState_ob = CanOpen.NMT_STATE_OPERATIONAL and std_logic_vector({eb}) = x"00" then
                NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL;
            elsif CommunicationError_ob = '1' and std_logic_vector({eb}) = x"02" then
                NmtState_ob <= CanOpen.NMT_STATE_STOPPED;
"#,
            eb = eb
        ));
        if let (Some(generic), Some(error_register)) =
            (od.get(MUX_ERROR_BEHAVIOR_GENERIC), od.get(MUX_ERROR_REGISTER))
        {
            let eb = plan.value_expr(generic);
            let er = plan.value_expr(error_register);
            out.push_str(&format!(
                r#"            elsif {er}(0) = '1' and NmtState_ob = CanOpen.NMT_STATE_OPERATIONAL and std_logic_vector({eb}) = x"00" then
                NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL;
            elsif {er}(0) = '1' and std_logic_vector({eb}) = x"02" then
                NmtState_ob <= CanOpen.NMT_STATE_STOPPED;
"#,
                er = er,
                eb = eb
            ));
        }
    } else {
        out.push_str(
            r#"            if CommunicationError_ob = '1' and NmtState_ob = CanOpen.NMT_STATE_OPERATIONAL then
                NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL; --! Default behavior if the Communication error entry (0x01) of the Error behavior object (0x1029) not supported, per CiA 301
"#,
        );
    }
    out.push_str(
        r#"            else
                case CurrentState is
                    when STATE_RESET =>
                        NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
                    when STATE_RESET_APP =>
                        NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
                    when STATE_RESET_COMM =>
                        NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
                    when STATE_BOOTUP =>
                        NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
                    when STATE_BOOTUP_WAIT =>
                        if TxAck = '1' then
"#,
    );
    if let Some(startup) = od.get(MUX_NMT_STARTUP) {
        out.push_str(&format!(
            r#"                            if {0}(3) = '1' then --! Self-starting
                                NmtState_ob <= CanOpen.NMT_STATE_OPERATIONAL;
                            else
                                NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL;
                            end if;
"#,
            plan.value_expr(startup)
        ));
    } else {
        out.push_str(
            "                            NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL;\n",
        );
    }
    out.push_str(
        r#"                        else
                            NmtState_ob <= CanOpen.NMT_STATE_INITIALISATION;
                        end if;
                    when STATE_CAN_RX_READ =>
                        if RxCobIdFunctionCode = CanOpen.FUNCTION_CODE_NMT and RxCobIdNodeId = CanOpen.NMT_NODE_CONTROL and (RxNmtNodeControlNodeId = NodeId_q or RxNmtNodeControlNodeId = CanOpen.BROADCAST_NODE_ID) then
                            case RxNmtNodeControlCommand is
                                when CanOpen.NMT_NODE_CONTROL_OPERATIONAL =>
                                    NmtState_ob <= CanOpen.NMT_STATE_OPERATIONAL;
                                when CanOpen.NMT_NODE_CONTROL_PREOPERATIONAL =>
                                    NmtState_ob <= CanOpen.NMT_STATE_PREOPERATIONAL;
                                when CanOpen.NMT_NODE_CONTROL_STOPPED =>
                                    NmtState_ob <= CanOpen.NMT_STATE_STOPPED;
                                when others =>
                                    NmtState_ob <= NmtState_ob;
                            end case;
                        end if;
                    when others =>
                        NmtState_ob <= NmtState_ob;
                end case;
            end if;
        end if;
    end process;
"#,
    );
}

pub fn emit_node_id_latch(out: &mut String) {
    out.push_str(
        r#"
    --! Latch node-ID; flag the broadcast ID as an invalid configuration
    process (Reset_n, Clock)
    begin
        if Reset_n = '0' then
            NodeId_q <= CanOpen.BROADCAST_NODE_ID;
            InvalidConfiguration_ob <= '0';
        elsif rising_edge(Clock) then
            if CurrentState = STATE_RESET_COMM then
                NodeId_q <= NodeId;
                if NodeId = CanOpen.BROADCAST_NODE_ID then
                    InvalidConfiguration_ob <= '1';
                else
                    InvalidConfiguration_ob <= '0';
                end if;
            end if;
        end if;
    end process;
"#,
    );
}

pub fn emit_time(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"
    --! TIME handling
    process (Reset_n, Clock)
    begin
        if Reset_n = '0' then
            Timestamp_ob <= (
                Milliseconds => (others => '0'),
                Days => (others => '0')
            );
        elsif rising_edge(Clock) then
            "#,
    );
    if let Some(time_cob) = plan.od().get(MUX_COB_ID_TIME) {
        let cob = plan.value_expr(time_cob);
        out.push_str(&format!(
            r#"if CurrentState = STATE_CAN_RX_READ and {cob}(31) = '1' and unsigned(RxFrame_q.Id(10 downto 0)) = {cob}(10 downto 0) and RxFrame_q.Dlc = b"0110" then
                Timestamp_ob <= (
                    Milliseconds => unsigned(RxFrame_q.Data(3)(3 downto 0) & RxFrame_q.Data(2) & RxFrame_q.Data(1) & RxFrame_q.Data(0)),
                    Days => unsigned(RxFrame_q.Data(5) & RxFrame_q.Data(4))
                );
            els"#,
            cob = cob
        ));
    }
    out.push_str(
        r#"if MillisecondEnable = '1' then
                if Timestamp_ob.Milliseconds = 1000*60*60*24 - 1 then
                    Timestamp_ob.Milliseconds <= (others => '0');
                    Timestamp_ob.Days <= Timestamp_ob.Days + 1;
                else
                    Timestamp_ob.Milliseconds <= Timestamp_ob.Milliseconds + 1;
                end if;
            end if;
        end if;
    end process;
"#,
    );
}

pub fn emit_emcy(plan: &EntityPlan, out: &mut String) {
    let error_register = plan
        .od()
        .get(MUX_ERROR_REGISTER)
        .map(|d| plan.value_expr(d))
        .unwrap_or_else(|| "ErrorRegister".to_string());
    out.push_str(
        r#"
    --! EMCY interrupt handling
    process (Reset_n, Clock)
        variable ErrorRegisterInterrupts    : std_logic_vector(7 downto 0);
        variable ErrorRegister_q            : unsigned(7 downto 0);
    begin
        if Reset_n = '0' then
            EmcyInterrupt <= '0';
            EmcyEec <= (others => '0');
            BusOffRecovery <= '0';
            ErrorRegisterInterrupts := (others => '0');
            ErrorRegister_q := (others => '0');
        elsif rising_edge(Clock) then
            if CanBus."="(CanStatus_ob.State, CanBus.STATE_BUS_OFF) then
                BusOffRecovery <= '1';
            elsif CurrentState = STATE_EMCY then
                BusOffRecovery <= '0';
            end if;
"#,
    );
    for i in 0..8 {
        if i == 6 {
            continue; // reserved bit
        }
        out.push_str(&format!(
            r#"            if {0}({1}) = '1' and ErrorRegister_q({1}) = '0' then
                ErrorRegisterInterrupts({1}) := '1';
            end if;
"#,
            error_register, i
        ));
    }
    out.push_str(&format!(
        r#"            if EmcyInterrupt = '0' and (or_reduce(ErrorRegisterInterrupts) = '1' or (std_logic_vector({0}) = x"00" and ErrorRegister_q /= x"00")) then
                EmcyInterrupt <= '1';
                if ErrorRegisterInterrupts(0) = '1' then
                    EmcyEec <= x"1000"; --! Generic error
                    ErrorRegisterInterrupts(0) := '0';
                elsif ErrorRegisterInterrupts(1) = '1' then
                    EmcyEec <= x"2000"; --! Current
                    ErrorRegisterInterrupts(1) := '0';
                elsif ErrorRegisterInterrupts(2) = '1' then
                    EmcyEec <= x"3000"; --! Voltage
                    ErrorRegisterInterrupts(2) := '0';
                elsif ErrorRegisterInterrupts(3) = '1' then
                    EmcyEec <= x"4000"; --! Temperature
                    ErrorRegisterInterrupts(3) := '0';
                elsif ErrorRegisterInterrupts(4) = '1' then
                    --! Communication error, disambiguated by cause
                    if CanStatus_ob.Overflow = '1' then
                        EmcyEec <= x"8110"; --! CAN overrun
                    elsif CanBus."="(CanStatus_ob.State, CanBus.STATE_ERROR_PASSIVE) then
                        EmcyEec <= x"8120"; --! Error passive
                    elsif HeartbeatConsumerError = '1' then
                        EmcyEec <= x"8130"; --! Heartbeat error
                    elsif BusOffRecovery = '1' then
                        EmcyEec <= x"8140"; --! Recovered from bus-off
                    else
                        EmcyEec <= x"8100";
                    end if;
                    ErrorRegisterInterrupts(4) := '0';
                elsif ErrorRegisterInterrupts(5) = '1' then
                    EmcyEec <= x"FF00"; --! Device specific
                    ErrorRegisterInterrupts(5) := '0';
                elsif ErrorRegisterInterrupts(7) = '1' then
                    EmcyEec <= x"FF00"; --! Device specific
                    ErrorRegisterInterrupts(7) := '0';
                else
                    EmcyEec <= x"0000"; --! Error register cleared, "no error" EMCY
                end if;
            elsif CurrentState = STATE_EMCY then
                EmcyInterrupt <= '0';
            end if;
            ErrorRegister_q := {0};
        end if;
    end process;
    EmcyMsef <= (others => '0'); --! Manufacturer-specific error code not implemented
"#,
        error_register
    ));
}

pub fn emit_timers(out: &mut String) {
    out.push_str(
        r#"
    --! Timers
    process (Reset_n, Clock)
        variable MicrosecondCounter         : natural range 0 to (CLOCK_FREQUENCY / 1000000);
        variable HundredMicrosecondCounter  : natural range 0 to 100;
        variable MillisecondCounter         : natural range 0 to 10;
    begin
        if Reset_n = '0' then
            MicrosecondCounter := 0;
            MicrosecondEnable <= '0';
            HundredMicrosecondCounter := 0;
            HundredMicrosecondEnable <= '0';
            MillisecondCounter := 0;
            MillisecondEnable <= '0';
        elsif rising_edge(Clock) then
            if MicrosecondCounter = (CLOCK_FREQUENCY / 1000000) - 1 then
                MicrosecondCounter := 0;
                MicrosecondEnable <= '1';
            else
                MicrosecondCounter := MicrosecondCounter + 1;
                MicrosecondEnable <= '0';
            end if;
            if MicrosecondEnable = '1' then
                if HundredMicrosecondCounter = 99 then
                    HundredMicrosecondCounter := 0;
                    HundredMicrosecondEnable <= '1';
                else
                    HundredMicrosecondCounter := HundredMicrosecondCounter + 1;
                    HundredMicrosecondEnable <= '0';
                end if;
            else
                HundredMicrosecondEnable <= '0';
            end if;
            if HundredMicrosecondEnable = '1' then
                if MillisecondCounter = 9 then
                    MillisecondCounter := 0;
                    MillisecondEnable <= '1';
                else
                    MillisecondCounter := MillisecondCounter + 1;
                    MillisecondEnable <= '0';
                end if;
            else
                MillisecondEnable <= '0';
            end if;
        end if;
    end process;
"#,
    );
}

/// The populated consumer heartbeat entries (0x1016 sub 1..n), in sub order.
pub fn heartbeat_consumer_entries(plan: &EntityPlan) -> Vec<&ObjectDescriptor> {
    plan.od().sub_entries(IDX_HEARTBEAT_CONSUMER).collect()
}

pub fn emit_heartbeat_consumers(plan: &EntityPlan, out: &mut String) {
    let entries = heartbeat_consumer_entries(plan);
    if entries.is_empty() {
        out.push_str("\n    HeartbeatConsumerError <= '0';\n");
        return;
    }
    for (j, desc) in entries.iter().enumerate() {
        let entry = plan.value_expr(desc);
        out.push_str(&format!(
            r#"
    --! Heartbeat consumer timer {n}
    process (Reset_n, Clock)
        variable HeartbeatConsumerCounter   : natural range 0 to 65535;
        variable HeartbeatConsumerEnable    : std_logic;
        variable HeartbeatConsumerReset     : std_logic;
    begin
        if Reset_n = '0' then
            HeartbeatConsumerCounter := 0;
            HeartbeatConsumerEnable := '0';
            HeartbeatConsumer{n}Error <= '0';
        elsif rising_edge(Clock) then
            if CurrentState = STATE_CAN_RX_READ and RxCobIdFunctionCode = CanOpen.FUNCTION_CODE_NMT_ERROR_CONTROL and unsigned(RxCobIdNodeId) = {entry}(22 downto 16) then
                HeartbeatConsumerReset := '1';
            elsif CurrentState = STATE_SDO_TX and TxSdoCs = CanOpen.SDO_SCS_IDR and TxSdoInitiateMuxIndex = x"1016" and TxSdoInitiateMuxSubIndex = x"{sub:02X}" then
                HeartbeatConsumerReset := '1';
            else
                HeartbeatConsumerReset := '0';
            end if;
            if {entry}(23 downto 16) = 0 or {entry}(23 downto 16) > 127 or {entry}(15 downto 0) = 0 then --! Check if entry is valid
                HeartbeatConsumerEnable := '0';
            elsif HeartbeatConsumerReset = '1' then --! Enable heartbeat consumer after first heartbeat is received
                HeartbeatConsumerEnable := '1';
            end if;
            if HeartbeatConsumerEnable = '0' or HeartbeatConsumerReset = '1' then
                HeartbeatConsumerCounter := 0;
            elsif MillisecondEnable = '1' and HeartbeatConsumerCounter < {entry}(15 downto 0) then
                HeartbeatConsumerCounter := HeartbeatConsumerCounter + 1;
            end if;
            if HeartbeatConsumerEnable = '0' or HeartbeatConsumerReset = '1' then
                HeartbeatConsumer{n}Error <= '0';
            elsif HeartbeatConsumerCounter = {entry}(15 downto 0) then
                HeartbeatConsumer{n}Error <= '1';
            end if;
        end if;
    end process;
"#,
            n = j + 1,
            entry = entry,
            sub = desc.sub_index()
        ));
    }
    let terms: Vec<String> =
        (1..=entries.len()).map(|j| format!("HeartbeatConsumer{}Error", j)).collect();
    out.push_str(&format!("    HeartbeatConsumerError <= {};\n", terms.join(" or ")));
}

pub fn emit_heartbeat_producer(plan: &EntityPlan, out: &mut String) {
    let Some(desc) = plan.od().get(MUX_HEARTBEAT_PRODUCER) else {
        out.push_str("\n    HeartbeatProducerInterrupt <= '0';\n");
        return;
    };
    let period = plan.value_expr(desc);
    out.push_str(&format!(
        r#"
    --! Heartbeat producer timer
    process (Reset_n, Clock)
        variable HeartbeatProducerCounter   : natural range 0 to 65535;
    begin
        if Reset_n = '0' then
            HeartbeatProducerCounter := 0;
            HeartbeatProducerInterrupt <= '0';
        elsif rising_edge(Clock) then
            if (
                NmtState_ob = CanOpen.NMT_STATE_INITIALISATION
                or {period} = 0
                or CurrentState = STATE_RESET_COMM
                or (CurrentState = STATE_SDO_TX and TxSdoCs = CanOpen.SDO_SCS_IDR and TxSdoInitiateMuxIndex = x"1017" and TxSdoInitiateMuxSubIndex = x"00")
            ) then
                HeartbeatProducerCounter := 0;
            elsif MillisecondEnable = '1' then
                if HeartbeatProducerCounter = {period} - 1 then
                    HeartbeatProducerCounter := 0;
                else
                    HeartbeatProducerCounter := HeartbeatProducerCounter + 1;
                end if;
            end if;
            if MillisecondEnable = '1' and HeartbeatProducerCounter = {period} - 1 then
                HeartbeatProducerInterrupt <= '1';
            elsif CurrentState = STATE_HEARTBEAT then
                HeartbeatProducerInterrupt <= '0';
            end if;
        end if;
    end process;
"#,
        period = period
    ));
}

/// SYNC cycle timing: production when 0x1005 bit 30 is set, consumption
/// supervision otherwise, the counter value of 0x1019, and the synchronous
/// window of 0x1007.
pub fn emit_sync(plan: &EntityPlan, out: &mut String) {
    let od = plan.od();
    let sync_cob = od.get(MUX_COB_ID_SYNC);
    let cycle = od.get(MUX_CYCLE_PERIOD);

    match (sync_cob, cycle) {
        (Some(cob_desc), Some(cycle_desc)) => {
            let cob = plan.value_expr(cob_desc);
            let period = plan.value_expr(cycle_desc);
            out.push_str(&format!(
                r#"
    --! SYNC cycle timer: producer when COB-ID SYNC bit 30 is set, else
    --! supervision of the received SYNC cadence
    process (Reset_n, Clock)
        variable SyncCycleCounter : unsigned(31 downto 0);
    begin
        if Reset_n = '0' then
            SyncCycleCounter := (others => '0');
            SyncProducerInterrupt <= '0';
            SyncError_ob <= '0';
        elsif rising_edge(Clock) then
            if {period} = 0 or CurrentState = STATE_RESET_COMM then
                SyncCycleCounter := (others => '0');
                SyncError_ob <= '0';
            elsif CurrentState = STATE_CAN_RX_READ and RxFrame_q.Ide = {cob}(29) and unsigned(RxFrame_q.Id(10 downto 0)) = {cob}(10 downto 0) then
                SyncCycleCounter := (others => '0'); --! Received SYNC restarts the cycle
                SyncError_ob <= '0';
            elsif MicrosecondEnable = '1' then
                if SyncCycleCounter = {period} - 1 then
                    SyncCycleCounter := (others => '0');
                    if {cob}(30) = '1' then
                        SyncProducerInterrupt <= '1';
                    else
                        SyncError_ob <= '1'; --! Cycle elapsed without a SYNC from the producer
                    end if;
                else
                    SyncCycleCounter := SyncCycleCounter + 1;
                end if;
            end if;
            if CurrentState = STATE_SYNC then
                SyncProducerInterrupt <= '0';
            end if;
        end if;
    end process;
"#,
                period = period,
                cob = cob
            ));
        }
        _ => {
            out.push_str("\n    SyncProducerInterrupt <= '0';\n    SyncError_ob <= '0';\n");
        }
    }

    match od.get(MUX_SYNC_OVERFLOW) {
        Some(overflow_desc) => {
            let overflow = plan.value_expr(overflow_desc);
            out.push_str(&format!(
                r#"
    --! SYNC counter value
    process (Reset_n, Clock)
    begin
        if Reset_n = '0' then
            SyncCounterValue <= x"01";
        elsif rising_edge(Clock) then
            if NmtState_ob = CanOpen.NMT_STATE_INITIALISATION or NmtState_ob = CanOpen.NMT_STATE_STOPPED or CurrentState = STATE_RESET_COMM
                or (CurrentState = STATE_SDO_TX and TxSdoCs = CanOpen.SDO_SCS_IDR and TxSdoInitiateMuxIndex = x"1019" and TxSdoInitiateMuxSubIndex = x"00") then
                SyncCounterValue <= x"01";
            elsif Sync_ob = '1' and {overflow} >= 2 and {overflow} <= 240 then
                if SyncCounterValue >= {overflow} then
                    SyncCounterValue <= x"01";
                else
                    SyncCounterValue <= SyncCounterValue + 1;
                end if;
            end if;
        end if;
    end process;
"#,
                overflow = overflow
            ));
        }
        None => out.push_str("\n    SyncCounterValue <= x\"01\";\n"),
    }

    match od.get(MUX_SYNC_WINDOW) {
        Some(window_desc) => {
            let window = plan.value_expr(window_desc);
            out.push_str(&format!(
                r#"
    --! Synchronous window: once elapsed within a SYNC cycle, pending
    --! synchronous TPDO events are abandoned
    process (Reset_n, Clock)
        variable SyncWindowTimer : unsigned(31 downto 0);
    begin
        if Reset_n = '0' then
            SyncWindowTimer := (others => '0');
            SyncWindowExpired <= '0';
        elsif rising_edge(Clock) then
            if {window} = 0 then
                SyncWindowTimer := (others => '0');
                SyncWindowExpired <= '0';
            elsif Sync_ob = '1' then
                SyncWindowTimer := (others => '0');
                SyncWindowExpired <= '0';
            elsif MicrosecondEnable = '1' and SyncWindowTimer < {window} then
                SyncWindowTimer := SyncWindowTimer + 1;
                if SyncWindowTimer = {window} then
                    SyncWindowExpired <= '1';
                end if;
            end if;
        end if;
    end process;
"#,
                window = window
            ));
        }
        None => out.push_str("\n    SyncWindowExpired <= '0';\n"),
    }
}
