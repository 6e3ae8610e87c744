//! SDO server emission: one process multiplexed across every dictionary
//! entry. Downloads are expedited only; uploads carry the full expedited /
//! segmented / block matrix with CRC-16 accumulation over sub-blocks. The
//! case arms are specialised per object at generation time: access checks,
//! length checks and limit predicates are inlined as constants.

use crate::constant::MUX_SDO_RX_COB_ID;
use crate::entity::download_data_expr;
use crate::error::SdoAbort;
use crate::format::{format_value, zero_fill};
use crate::object_directory::ObjectDescriptor;
use crate::plan::EntityPlan;

/// Condition under which the latched RX frame is an SDO request for this
/// node: COB-ID matches the server's RX entry and the DLC is 8.
pub fn rx_match_condition(plan: &EntityPlan) -> Option<String> {
    let desc = plan.od().get(MUX_SDO_RX_COB_ID)?;
    let cob = plan.value_expr(desc);
    Some(format!(
        "{cob}(31) = '0' and RxFrame_q.Ide = {cob}(29) and unsigned(RxFrame_q.Id(10 downto 0)) = {cob}(10 downto 0) and RxFrame_q.Dlc(3) = '1'",
        cob = cob
    ))
}

pub fn emit_rx_sdo_latch(plan: &EntityPlan, out: &mut String) {
    out.push_str("\n    --! Save SDO request\n");
    match rx_match_condition(plan) {
        Some(condition) => out.push_str(&format!(
            r#"    process (Clock, Reset_n)
    begin
        if Reset_n = '0' then
            RxSdo <= (others => '0');
        elsif rising_edge(Clock) then
            if CurrentState = STATE_CAN_RX_READ and {} then --! SDO request, ignore if not 8 data bytes
                RxSdo <= RxFrame_q.Data(7) & RxFrame_q.Data(6) & RxFrame_q.Data(5) & RxFrame_q.Data(4) & RxFrame_q.Data(3) & RxFrame_q.Data(2) & RxFrame_q.Data(1) & RxFrame_q.Data(0);
            end if;
        end if;
    end process;
"#,
            condition
        )),
        None => out.push_str("    RxSdo <= (others => '0');\n"),
    }
}

/// Bytes not carrying data in an expedited transfer of `bits` bits.
fn expedited_n(bits: u32) -> u32 {
    4 - bits.div_ceil(8)
}

fn cleanup(indent: &str) -> String {
    format!(
        "{i}SdoActive := false;\n{i}SdoBlockMode := false;\n{i}SdoPending := false;\n{i}SdoExternal := false;\n{i}SegmentedSdoReadDataEnable <= '0';\n",
        i = indent
    )
}

fn abort(indent: &str, code: SdoAbort) -> String {
    format!(
        "{i}TxSdoCs <= CanOpen.SDO_CS_ABORT;\n{i}TxSdo(4 downto 0) <= (others => '0');\n{i}TxSdoAbortCode <= {code}; --! {desc}\n",
        i = indent,
        code = code.literal(),
        desc = code.description()
    )
}

/// Case arm body for an expedited download to one object.
fn download_arm(desc: &ObjectDescriptor, indent: &str) -> String {
    let mut s = String::new();
    if !desc.access_type().is_writable() {
        s.push_str(&abort(indent, SdoAbort::AttemptToWriteReadOnlyObject));
        return s;
    }
    let bits = desc.bit_length();
    let n = expedited_n(bits);
    s.push_str(&format!(
        "{i}if RxSdoDownloadInitiateN = b\"{n:02b}\" or RxSdoDownloadInitiateS = '0' then\n",
        i = indent,
        n = n
    ));
    let inner = format!("{}    ", indent);
    let limits = limit_predicate(desc);
    match limits {
        Some(predicate) => {
            s.push_str(&format!("{i}if {p} then\n", i = inner, p = predicate));
            s.push_str(&format!(
                "{i}    TxSdoCs <= CanOpen.SDO_SCS_IDR;\n{i}    TxSdo(63 downto 32) <= (others => '0');\n{i}else\n",
                i = inner
            ));
            s.push_str(&abort(&format!("{}    ", inner), SdoAbort::ValueRangeExceeded));
            s.push_str(&format!("{i}end if;\n", i = inner));
        }
        None => {
            s.push_str(&format!(
                "{i}TxSdoCs <= CanOpen.SDO_SCS_IDR;\n{i}TxSdo(63 downto 32) <= (others => '0');\n",
                i = inner
            ));
        }
    }
    s.push_str(&format!("{i}else\n", i = indent));
    s.push_str(&abort(&inner, SdoAbort::ParameterLengthMismatch));
    s.push_str(&format!("{i}end if;\n", i = indent));
    s
}

/// Inline range predicate over the download payload, folded from the
/// object's limits.
fn limit_predicate(desc: &ObjectDescriptor) -> Option<String> {
    if desc.data_type().is_scalar_logic() {
        return None;
    }
    let lhs = download_data_expr(desc.data_type());
    let kind = if desc.data_type().is_signed() { "signed" } else { "unsigned" };
    let bits = desc.bit_length();
    let mut conditionals = Vec::new();
    if let Some(lo) = desc.low_limit() {
        conditionals.push(format!("{} >= {}'({})", lhs, kind, format_value(lo, bits)));
    }
    if let Some(hi) = desc.high_limit() {
        conditionals.push(format!("{} <= {}'({})", lhs, kind, format_value(hi, bits)));
    }
    if conditionals.is_empty() {
        None
    } else {
        Some(conditionals.join(" and "))
    }
}

/// Case arm body for an upload-initiate of one object: expedited for values
/// up to 32 bits, segmented prelude otherwise.
fn upload_arm(plan: &EntityPlan, desc: &ObjectDescriptor, indent: &str) -> String {
    let mut s = String::new();
    if !desc.access_type().is_readable() {
        s.push_str(&abort(indent, SdoAbort::AttemptToReadWriteOnlyObject));
        s.push_str(&cleanup(indent));
        return s;
    }
    let bits = desc.bit_length();
    if bits == 0 || bits > 32 {
        // Served beat-by-beat by the segmented data path; the first beat
        // carries the byte count.
        s.push_str(&format!(
            "{i}TxSdoCs <= CanOpen.SDO_SCS_IUR;\n{i}TxSdoUploadInitiateN <= b\"00\";\n{i}TxSdoUploadInitiateE <= '0';\n{i}TxSdoUploadInitiateS <= '1';\n{i}TxSdoUploadInitiateD <= SegmentedSdoData(31 downto 0);\n{i}SdoActive := true;\n{i}SegmentedSdoReadBytes := unsigned(SegmentedSdoData(31 downto 0));\n",
            i = indent
        ));
    } else {
        let n = expedited_n(bits);
        let data = format!("{}{}", zero_fill(32 - bits), plan.slv_value_expr(desc));
        s.push_str(&format!(
            "{i}TxSdoCs <= CanOpen.SDO_SCS_IUR;\n{i}TxSdoUploadInitiateN <= b\"{n:02b}\";\n{i}TxSdoUploadInitiateE <= '1';\n{i}TxSdoUploadInitiateS <= '1';\n{i}TxSdoUploadInitiateD <= {data};\n{i}SdoActive := false;\n{i}SdoExternal := false;\n",
            i = indent,
            n = n,
            data = data
        ));
    }
    s
}

/// Case arm body for a block-upload-initiate of one object, including the
/// protocol-switch fallback to expedited for small objects.
fn block_upload_arm(plan: &EntityPlan, desc: &ObjectDescriptor, indent: &str) -> String {
    let mut s = String::new();
    if !desc.access_type().is_readable() {
        s.push_str(&abort(indent, SdoAbort::AttemptToReadWriteOnlyObject));
        s.push_str(&format!(
            "{i}TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;\n{i}TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;\n",
            i = indent
        ));
        s.push_str(&cleanup(indent));
        return s;
    }
    let bits = desc.bit_length();
    if bits == 0 || bits > 32 {
        s.push_str(&format!(
            r#"{i}if SegmentedSdoData(31 downto 0) = x"00000000" then
"#,
            i = indent
        ));
        let inner = format!("{}    ", indent);
        s.push_str(&abort(&inner, SdoAbort::NoDataAvailable));
        s.push_str(&format!(
            "{i}TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;\n{i}TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;\n",
            i = inner
        ));
        s.push_str(&cleanup(&inner));
        s.push_str(&format!(
            r#"{i}else
{i}    TxSdoCs <= CanOpen.SDO_SCS_BUR;
{i}    TxSdo(4 downto 3) <= (others => '0');
{i}    TxSdoBlockUploadInitiateSc <= '1'; --! Server CRC support
{i}    TxSdoBlockUploadInitiateS <= '1'; --! Size indicator
{i}    TxSdoBlockUploadSs <= CanOpen.SDO_BLOCK_SUBCOMMAND_INITIATE(0);
{i}    TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
{i}    TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
{i}    TxSdoBlockUploadInitiateSize <= SegmentedSdoData(31 downto 0);
{i}    SegmentedSdoReadBytes := unsigned(SegmentedSdoData(31 downto 0));
{i}    SdoActive := true;
{i}    SdoBlockSize := unsigned(RxSdoBlockUploadInitiateBlksize(6 downto 0));
{i}    SdoSequenceNumber := (others => '0');
{i}end if;
"#,
            i = indent
        ));
    } else {
        let n = expedited_n(bits);
        let byte_count = bits.div_ceil(8);
        let expedited = format!("{}{}", zero_fill(32 - bits), plan.slv_value_expr(desc));
        let seg_data = format!("{}{}", zero_fill(56 - bits), plan.slv_value_expr(desc));
        s.push_str(&format!(
            r#"{i}TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
{i}TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
{i}if RxSdoBlockUploadInitiatePst /= x"00" and unsigned(RxSdoBlockUploadInitiatePst) <= 4 then
{i}    --! Protocol switch: fall back to expedited upload
{i}    TxSdoCs <= CanOpen.SDO_SCS_IUR;
{i}    TxSdoUploadInitiateN <= b"{n:02b}";
{i}    TxSdoUploadInitiateE <= '1';
{i}    TxSdoUploadInitiateS <= '1';
{i}    TxSdoUploadInitiateD <= {expedited};
{i}    SdoActive := false;
{i}    SdoExternal := false;
{i}else
{i}    TxSdoCs <= CanOpen.SDO_SCS_BUR;
{i}    TxSdo(4 downto 3) <= (others => '0');
{i}    TxSdoBlockUploadInitiateSc <= '1'; --! Server CRC support
{i}    TxSdoBlockUploadInitiateS <= '1'; --! Size indicator
{i}    TxSdoBlockUploadSs <= CanOpen.SDO_BLOCK_SUBCOMMAND_INITIATE(0);
{i}    TxSdoBlockUploadInitiateSize <= x"{size:08X}";
{i}    SegmentedSdoReadBytes := x"{size:08X}";
{i}    SdoActive := true;
{i}    SdoBlockSize := unsigned(RxSdoBlockUploadInitiateBlksize(6 downto 0));
{i}    SdoExternal := false;
{i}    SdoSegDataInternal := {seg_data};
{i}    SdoSequenceNumber := (others => '0');
{i}end if;
"#,
            i = indent,
            n = n,
            expedited = expedited,
            size = byte_count,
            seg_data = seg_data
        ));
    }
    s
}

pub fn emit_sdo_server(plan: &EntityPlan, out: &mut String) {
    let Some(rx_condition) = rx_match_condition(plan) else {
        out.push_str("\n    SdoInterrupt <= '0';\n    TxSdo <= (others => '0');\n");
        out.push_str(
            "    SegmentedSdoMux <= (others => '0');\n    SegmentedSdoReadEnable <= '0';\n    SegmentedSdoReadDataEnable <= '0';\n",
        );
        if !plan.segmented_sdo() {
            out.push_str(
                "    SegmentedSdoData <= (others => '0');\n    SegmentedSdoDataValid <= '0';\n",
            );
        }
        return;
    };

    out.push_str(
        r#"
    --! SDO server
    RxSdoInitiateMux <= RxSdoInitiateMuxIndex & RxSdoInitiateMuxSubIndex;
    process (Clock, Reset_n, SegmentedSdoData, SegmentedSdoDataValid)
        variable SegmentedSdoReadBytes : unsigned(31 downto 0);
        variable SdoActive          : boolean; --! In non-expedited transaction
        variable SdoBlockCrc        : std_logic_vector(15 downto 0);
        variable SdoBlockMode       : boolean; --! Sending sub-blocks
        variable SdoBlockSize       : unsigned(6 downto 0); --! From client
        variable SdoExternal        : boolean;
        variable SdoMux             : std_logic_vector(23 downto 0); --! Upload request mux
        variable SdoPending         : boolean; --! Waiting for SegmentedSdoDataValid
        variable SdoSegData         : std_logic_vector(55 downto 0);
        variable SdoSegDataInternal : std_logic_vector(55 downto 0);
        variable SdoSegDataValid    : std_logic;
        variable SdoSequenceNumber  : unsigned(6 downto 0);
        variable SdoToggle          : std_logic; --! Toggle bit for segmented transfer
    begin
        if SdoExternal then
            SdoSegData := SegmentedSdoData;
            SdoSegDataValid := SegmentedSdoDataValid;
        else
            SdoSegData := SdoSegDataInternal;
            SdoSegDataValid := '1';
        end if;
        if Reset_n = '0' then
            TxSdo <= (others => '0');
            SdoInterrupt <= '0';
            SegmentedSdoReadBytes := (others => '0');
            SegmentedSdoReadDataEnable <= '0';
            SdoActive := false;
            SdoBlockMode := false;
            SdoBlockSize := (others => '0');
            SdoBlockCrc := (others => '0');
            SdoExternal := false;
            SdoMux := (others => '0');
            SdoPending := false;
            SdoSegDataInternal := (others => '0');
            SdoSequenceNumber := (others => '0');
            SdoToggle := '0';
        elsif rising_edge(Clock) then
            if CurrentState = STATE_CAN_RX_READ then
"#,
    );
    out.push_str(&format!(
        r#"                if {} then --! Next state is STATE_SDO_RX
                    if RxFrame_q.Data(0)(7 downto 5) = CanOpen.SDO_CCS_IUR or (RxFrame_q.Data(0)(7 downto 5) = CanOpen.SDO_CCS_BUR and RxFrame_q.Data(0)(1 downto 0) = CanOpen.SDO_BLOCK_SUBCOMMAND_INITIATE) then
                        SdoMux := RxFrame_q.Data(2) & RxFrame_q.Data(1) & RxFrame_q.Data(3);
                        SdoExternal := true; --! Deasserted in STATE_SDO_RX when an internal mux is decoded
                    end if;
                end if;
            elsif CurrentState = STATE_SDO_RX then
                if RxSdoCs = CanOpen.SDO_CS_ABORT then
                    SegmentedSdoReadBytes := (others => '0');
                    SdoActive := false;
                    SdoBlockMode := false;
                    SdoPending := false;
                    SdoExternal := false;
                    SegmentedSdoReadDataEnable <= '0';
"#,
        rx_condition
    ));

    emit_download_dispatch(plan, out);
    emit_upload_dispatch(plan, out);
    emit_upload_segment_dispatch(out);
    emit_block_upload_dispatch(plan, out);

    // Unknown client command specifier.
    out.push_str("                else\n");
    out.push_str(&abort("                    ", SdoAbort::CommandSpecifierNotValid));
    out.push_str(
        r#"                    TxSdoInitiateMuxIndex <= (others => '0');
                    TxSdoInitiateMuxSubIndex <= (others => '0');
"#,
    );
    out.push_str(&cleanup("                    "));
    out.push_str(
        r#"                    SdoInterrupt <= '1';
                end if;
            elsif CurrentState = STATE_SDO_TX then
                SdoInterrupt <= '0';
            elsif SdoPending then
                if SdoSegDataValid = '1' then
                    SegmentedSdoReadDataEnable <= '0';
                elsif SdoInterrupt = '0' then
                    SegmentedSdoReadDataEnable <= '1';
                end if;
                if SdoSegDataValid = '1' and SdoInterrupt = '0' then
                    SdoPending := false;
                    if SdoBlockMode then
                        SdoSequenceNumber := SdoSequenceNumber + 1;
                        if SegmentedSdoReadBytes > 7 then
                            SdoBlockCrc := CanOpen.Crc16(SdoSegData, SdoBlockCrc, 7);
                            TxSdoBlockUploadSubBlockC <= '0';
                            SegmentedSdoReadBytes := SegmentedSdoReadBytes - 7;
                            if SdoSequenceNumber = SdoBlockSize then
                                SdoBlockMode := false;
                            else
                                SdoPending := true;
                            end if;
                        else
                            SdoBlockCrc := CanOpen.Crc16(SdoSegData, SdoBlockCrc, to_integer(SegmentedSdoReadBytes));
                            TxSdoBlockUploadSubBlockC <= '1';
                            SdoExternal := false;
                            SdoBlockMode := false;
                        end if;
                        TxSdoBlockUploadSubBlockSeqno <= std_logic_vector(SdoSequenceNumber);
                        TxSdoBlockUploadSubBlockSegData <= SdoSegData;
                    else
                        TxSdoUploadSegmentT <= SdoToggle;
                        if SegmentedSdoReadBytes > 7 then
                            TxSdoUploadSegmentN <= (others => '0');
                            TxSdoUploadSegmentC <= '0';
                            SegmentedSdoReadBytes := SegmentedSdoReadBytes - 7;
                            SdoToggle := not SdoToggle;
                        else
                            TxSdoUploadSegmentN <= std_logic_vector(resize(7 - SegmentedSdoReadBytes, TxSdoUploadSegmentN'length));
                            TxSdoUploadSegmentC <= '1';
                            SegmentedSdoReadBytes := (others => '0');
                            SdoExternal := false;
                            SdoActive := false;
                        end if;
                        TxSdoUploadSegmentSegData <= SdoSegData;
                    end if;
                    SdoInterrupt <= '1';
                end if;
            end if;
        end if;
        SegmentedSdoMux <= SdoMux;
        if SdoExternal then
            SegmentedSdoReadEnable <= '1';
        else
            SegmentedSdoReadEnable <= '0';
        end if;
    end process;
"#,
    );
    if !plan.segmented_sdo() {
        out.push_str(
            "    SegmentedSdoData <= (others => '0');\n    SegmentedSdoDataValid <= '0';\n",
        );
    }
}

fn emit_download_dispatch(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"                elsif RxSdoCs = CanOpen.SDO_CCS_IDR then
                    TxSdo(4 downto 0) <= (others => '0');
                    TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
                    TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
                    if RxSdoDownloadInitiateE = '0' then
"#,
    );
    out.push_str(&abort("                        ", SdoAbort::GeneralIncompatibility));
    out.push_str("                    else\n                        case RxSdoInitiateMux is\n");
    for desc in plan.od().objects().values() {
        out.push_str(&format!("                            when {} =>\n", desc.odi_name()));
        out.push_str(&download_arm(desc, "                                "));
    }
    out.push_str("                            when others =>\n");
    out.push_str(&abort("                                ", SdoAbort::ObjectDoesNotExist));
    out.push_str(
        r#"                        end case;
                    end if;
"#,
    );
    out.push_str(&cleanup("                    "));
    out.push_str("                    SdoInterrupt <= '1';\n");
}

fn emit_upload_dispatch(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"                elsif RxSdoCs = CanOpen.SDO_CCS_IUR then
                    TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
                    TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
                    SdoToggle := '0';
                    case RxSdoInitiateMux is
"#,
    );
    for desc in plan.od().objects().values() {
        out.push_str(&format!("                        when {} =>\n", desc.odi_name()));
        out.push_str(&upload_arm(plan, desc, "                            "));
    }
    out.push_str("                        when others =>\n");
    out.push_str(&abort("                            ", SdoAbort::ObjectDoesNotExist));
    out.push_str(&cleanup("                            "));
    out.push_str(
        r#"                    end case;
                    SdoInterrupt <= '1';
"#,
    );
}

fn emit_upload_segment_dispatch(out: &mut String) {
    out.push_str(
        r#"                elsif RxSdoCs = CanOpen.SDO_CCS_USR then
                    if RxSdoUploadSegmentT /= SdoToggle then
"#,
    );
    out.push_str(&abort("                        ", SdoAbort::ToggleBitNotAlternated));
    out.push_str(
        r#"                        TxSdoInitiateMuxIndex <= SdoMux(23 downto 8);
                        TxSdoInitiateMuxSubIndex <= SdoMux(7 downto 0);
"#,
    );
    out.push_str(&cleanup("                        "));
    out.push_str(
        r#"                        SdoInterrupt <= '1';
                    else
                        TxSdoCs <= CanOpen.SDO_SCS_USR;
                        TxSdoUploadSegmentC <= '0';
                        SdoPending := true;
                    end if;
"#,
    );
}

fn emit_block_upload_dispatch(plan: &EntityPlan, out: &mut String) {
    out.push_str(
        r#"                elsif RxSdoCs = CanOpen.SDO_CCS_BUR then
                    if RxSdoBlockUploadCs = CanOpen.SDO_BLOCK_SUBCOMMAND_INITIATE then
                        if SdoActive then
"#,
    );
    out.push_str(&abort("                            ", SdoAbort::CommandSpecifierNotValid));
    out.push_str(
        r#"                            TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
                            TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
"#,
    );
    out.push_str(&cleanup("                            "));
    out.push_str(
        r#"                        else
                            if RxSdoBlockUploadInitiateBlksize(7) = '1' or RxSdoBlockUploadInitiateBlksize(6 downto 0) = b"0000000" then
"#,
    );
    out.push_str(&abort("                                ", SdoAbort::InvalidBlockSize));
    out.push_str(
        r#"                                TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
                                TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
"#,
    );
    out.push_str(&cleanup("                                "));
    out.push_str("                            else\n                                case SdoMux is\n");
    for desc in plan.od().objects().values() {
        out.push_str(&format!(
            "                                    when x\"{:06X}\" =>\n",
            desc.mux()
        ));
        out.push_str(&block_upload_arm(plan, desc, "                                        "));
    }
    out.push_str("                                    when others =>\n");
    out.push_str(&abort("                                        ", SdoAbort::ObjectDoesNotExist));
    out.push_str(
        r#"                                        TxSdoInitiateMuxIndex <= RxSdoInitiateMuxIndex;
                                        TxSdoInitiateMuxSubIndex <= RxSdoInitiateMuxSubIndex;
"#,
    );
    out.push_str(&cleanup("                                        "));
    out.push_str(
        r#"                                end case;
                            end if;
                        end if;
                        SdoInterrupt <= '1';
                    elsif SdoActive then
                        if RxSdoBlockUploadCs = CanOpen.SDO_BLOCK_SUBCOMMAND_START then
                            SdoBlockCrc := (others => '0'); --! Initialize CRC
                            SdoBlockMode := true;
                            SdoPending := true;
                        elsif RxSdoBlockUploadCs = CanOpen.SDO_BLOCK_SUBCOMMAND_RESPONSE then
                            if unsigned(RxSdoBlockUploadSubBlockAckseq(6 downto 0)) /= SdoSequenceNumber then --! ackseq check
"#,
    );
    out.push_str(&abort("                                ", SdoAbort::InvalidSequenceNumber));
    out.push_str(
        r#"                                TxSdoInitiateMuxIndex <= SdoMux(23 downto 8);
                                TxSdoInitiateMuxSubIndex <= SdoMux(7 downto 0);
"#,
    );
    out.push_str(&cleanup("                                "));
    out.push_str(
        r#"                                SdoInterrupt <= '1';
                            elsif TxSdoBlockUploadSubBlockC = '1' then --! Complete
                                TxSdoCs <= CanOpen.SDO_SCS_BUR;
                                TxSdoBlockUploadEndN <= std_logic_vector(resize(7 - SegmentedSdoReadBytes, 3));
                                TxSdo(1) <= CanOpen.SDO_BLOCK_SUBCOMMAND_END(1);
                                TxSdoBlockUploadSs <= CanOpen.SDO_BLOCK_SUBCOMMAND_END(0);
                                TxSdoBlockUploadEndCrc <= SdoBlockCrc;
                                TxSdo(63 downto 24) <= (others => '0');
                                SdoInterrupt <= '1';
                                SdoActive := false;
                            elsif RxSdoBlockUploadSubBlockBlksize(7) = '1' or RxSdoBlockUploadSubBlockBlksize(6 downto 0) = b"0000000" then
"#,
    );
    out.push_str(&abort("                                ", SdoAbort::InvalidBlockSize));
    out.push_str(
        r#"                                TxSdoInitiateMuxIndex <= SdoMux(23 downto 8);
                                TxSdoInitiateMuxSubIndex <= SdoMux(7 downto 0);
"#,
    );
    out.push_str(&cleanup("                                "));
    out.push_str(
        r#"                                SdoInterrupt <= '1';
                            else
                                SdoBlockSize := unsigned(RxSdoBlockUploadSubBlockBlksize(6 downto 0));
                                SdoBlockMode := true;
                                SdoPending := true;
                                SdoSequenceNumber := (others => '0');
                            end if;
                        elsif RxSdoBlockUploadCs = CanOpen.SDO_BLOCK_SUBCOMMAND_END then
                            SdoActive := false;
                        end if;
                    else --! SDO block upload was not initialized
"#,
    );
    out.push_str(&abort("                        ", SdoAbort::CommandSpecifierNotValid));
    out.push_str(
        r#"                        TxSdoInitiateMuxIndex <= (others => '0');
                        TxSdoInitiateMuxSubIndex <= (others => '0');
"#,
    );
    out.push_str(&cleanup("                        "));
    out.push_str("                        SdoInterrupt <= '1';\n                    end if;\n");
}
