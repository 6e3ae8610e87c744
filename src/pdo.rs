//! PDO emission: per-TPDO trigger logic specialised to the transmission
//! type, payload concatenation from the mapping records, and the RPDO event
//! timers.

use crate::constant::{IDX_RPDO_COMM, IDX_TPDO_COMM, PDO_COUNT};
use crate::error::BuildError;
use crate::format::zero_fill;
use crate::plan::EntityPlan;
use crate::validate::tpdo_mappings;

fn indent_by(block: &str, extra: &str) -> String {
    block
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}{}", extra, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

struct TpdoContext {
    n: usize, // 1-based
    cob: String,
    tt: Option<String>,
    static_tt: Option<u8>,
    inhibit: Option<String>,
    event_timer: Option<String>,
    sync_start: Option<String>,
}

fn tpdo_context(plan: &EntityPlan, i: usize) -> Option<TpdoContext> {
    let od = plan.od();
    let base = (IDX_TPDO_COMM + i as u16) as u32;
    let cob_desc = od.get((base << 8) | 1)?;
    let tt_desc = od.get((base << 8) | 2);
    // No transmission-type entry: behave as asynchronous, event-driven.
    let static_tt = match tt_desc {
        None => Some(0xFF),
        Some(d) if d.access_type().is_writable() => None,
        Some(d) => Some(d.default_literal() as u8),
    };
    Some(TpdoContext {
        n: i + 1,
        cob: plan.value_expr(cob_desc),
        tt: tt_desc.map(|d| plan.value_expr(d)),
        static_tt,
        inhibit: od.get((base << 8) | 3).map(|d| plan.value_expr(d)),
        event_timer: od.get((base << 8) | 5).map(|d| plan.value_expr(d)),
        sync_start: od.get((base << 8) | 6).map(|d| plan.value_expr(d)),
    })
}

impl TpdoContext {
    fn rtr_match(&self) -> String {
        format!(
            "CurrentState = STATE_CAN_RX_READ and {cob}(30) = '0' and RxFrame_q.Ide = {cob}(29) and unsigned(RxFrame_q.Id) = {cob}(28 downto 0) and RxFrame_q.Rtr = '1'",
            cob = self.cob
        )
    }

    fn inhibit_guard(&self) -> &'static str {
        if self.inhibit.is_some() {
            " and TpdoInhibitCounter = 0"
        } else {
            ""
        }
    }

    fn inhibit_reload(&self, indent: &str) -> String {
        match &self.inhibit {
            Some(expr) => format!("{}TpdoInhibitCounter := {};\n", indent, expr),
            None => String::new(),
        }
    }

    /// Shared prologue: decay the inhibit timer, derive the effective event
    /// from the event input and (for asynchronous types) the event timer.
    fn prologue(&self, with_event: bool, with_timer: bool, dynamic: bool, with_inhibit: bool) -> String {
        let mut s = String::new();
        if with_inhibit && self.inhibit.is_some() {
            s.push_str(
                "            if HundredMicrosecondEnable = '1' and TpdoInhibitCounter /= 0 then\n                TpdoInhibitCounter := TpdoInhibitCounter - 1;\n            end if;\n",
            );
        }
        if with_event {
            s.push_str(&format!("            TpdoEvent := Tpdo{}Event;\n", self.n));
            if with_timer {
                if let Some(evt) = &self.event_timer {
                    let gate = if dynamic {
                        format!(" and {} >= 254", self.tt.as_deref().unwrap_or("x\"FF\""))
                    } else {
                        String::new()
                    };
                    s.push_str(&format!(
                        r#"            if MillisecondEnable = '1' and {evt} /= 0{gate} then
                if TpdoEventTimerCounter >= {evt} - 1 then
                    TpdoEventTimerCounter := (others => '0');
                    TpdoEvent := '1'; --! Event timer elapsed
                else
                    TpdoEventTimerCounter := TpdoEventTimerCounter + 1;
                end if;
            end if;
"#,
                        evt = evt,
                        gate = gate
                    ));
                }
            }
        }
        s
    }

    /// Latch-on-event then transmit-at-SYNC, for the synchronous acyclic
    /// type and the synchronous-RTR type.
    fn sync_pending_body(&self, trigger: &str, indent: &str, reload_inhibit: bool) -> String {
        let mut s = String::new();
        s.push_str(&format!("{}if {} then\n", indent, trigger));
        s.push_str(&format!("{}    TpdoEventPending := '1';\n", indent));
        if reload_inhibit {
            s.push_str(&self.inhibit_reload(&format!("{}    ", indent)));
        }
        s.push_str(&format!("{}end if;\n", indent));
        s.push_str(&format!(
            r#"{i}if Sync_ob = '1' and TpdoEventPending = '1' then
{i}    Tpdo{n}Interrupt <= '1';
{i}    TpdoEventPending := '0';
{i}elsif SyncWindowExpired = '1' then
{i}    TpdoEventPending := '0';
{i}    Tpdo{n}Interrupt <= '0'; --! Synchronous window closed
{i}elsif CurrentState = STATE_TPDO{n} then
{i}    Tpdo{n}Interrupt <= '0';
{i}end if;
"#,
            i = indent,
            n = self.n
        ));
        s
    }

    fn cyclic_body(&self, indent: &str) -> String {
        let tt = self.tt.as_deref().unwrap_or("x\"01\"");
        let counter = format!(
            "{i}    if TpdoSyncCycles >= {tt} - 1 then\n{i}        TpdoSyncCycles := (others => '0');\n{i}        Tpdo{n}Interrupt <= '1';\n{i}    else\n{i}        TpdoSyncCycles := TpdoSyncCycles + 1;\n{i}    end if;\n",
            i = indent,
            tt = tt,
            n = self.n
        );
        let counted = match &self.sync_start {
            Some(ss) => format!(
                "{i}    if SyncStarted = '1' or {ss} = 0 or SyncCounterValue = {ss} then\n{i}        SyncStarted := '1';\n{head}{i}    end if;\n",
                i = indent,
                ss = ss,
                head = indent_by(&counter, "    ")
            ),
            None => counter,
        };
        format!(
            r#"{i}if Sync_ob = '1' then
{counted}{i}elsif SyncWindowExpired = '1' then
{i}    Tpdo{n}Interrupt <= '0'; --! Synchronous window closed
{i}elsif CurrentState = STATE_TPDO{n} then
{i}    Tpdo{n}Interrupt <= '0';
{i}end if;
"#,
            i = indent,
            counted = counted,
            n = self.n
        )
    }

    fn async_rtr_body(&self, indent: &str) -> String {
        format!(
            r#"{i}if {rtr} then
{i}    Tpdo{n}Interrupt <= '1';
{i}elsif CurrentState = STATE_TPDO{n} then
{i}    Tpdo{n}Interrupt <= '0';
{i}end if;
"#,
            i = indent,
            rtr = self.rtr_match(),
            n = self.n
        )
    }

    fn async_event_body(&self, indent: &str) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "{i}if TpdoEvent = '1'{guard} then\n{i}    Tpdo{n}Interrupt <= '1';\n",
            i = indent,
            guard = self.inhibit_guard(),
            n = self.n
        ));
        s.push_str(&self.inhibit_reload(&format!("{}    ", indent)));
        s.push_str(&format!(
            "{i}elsif CurrentState = STATE_TPDO{n} then\n{i}    Tpdo{n}Interrupt <= '0';\n{i}end if;\n",
            i = indent,
            n = self.n
        ));
        s
    }
}

pub fn emit_tpdo_interrupts(plan: &EntityPlan, out: &mut String) {
    for i in 0..PDO_COUNT {
        out.push_str(&format!("\n    --! TPDO{} interrupt\n", i + 1));
        let Some(ctx) = tpdo_context(plan, i) else {
            out.push_str(&format!("    Tpdo{}Interrupt <= '0';\n", i + 1));
            continue;
        };
        emit_tpdo_interrupt(&ctx, out);
    }
}

fn emit_tpdo_interrupt(ctx: &TpdoContext, out: &mut String) {
    let mut vars = String::new();
    let mut body = String::new();
    // A valid COB-ID and the OPERATIONAL state gate every trigger source.
    let disabled_guard = format!(
        "NmtState_ob /= CanOpen.NMT_STATE_OPERATIONAL or {}(31) = '1'",
        ctx.cob
    );

    match ctx.static_tt {
        Some(0x00) => {
            vars.push_str("        variable TpdoEvent        : std_logic;\n");
            vars.push_str("        variable TpdoEventPending : std_logic;\n");
            body.push_str(&ctx.prologue(true, false, false, true));
            body.push_str(&format!(
                "            if {} then\n                TpdoEventPending := '0';\n                Tpdo{}Interrupt <= '0';\n            else\n",
                disabled_guard, ctx.n
            ));
            body.push_str(&ctx.sync_pending_body(
                &format!("TpdoEvent = '1'{}", ctx.inhibit_guard()),
                "                ",
                true,
            ));
            body.push_str("            end if;\n");
        }
        Some(tt) if (0x01..=0xF0).contains(&tt) => {
            vars.push_str("        variable TpdoSyncCycles   : unsigned(7 downto 0);\n");
            let start_reset = if ctx.sync_start.is_some() {
                vars.push_str("        variable SyncStarted      : std_logic;\n");
                "                SyncStarted := '0';\n"
            } else {
                ""
            };
            body.push_str(&format!(
                "            if {} then\n                TpdoSyncCycles := (others => '0');\n{}                Tpdo{}Interrupt <= '0';\n            else\n",
                disabled_guard, start_reset, ctx.n
            ));
            body.push_str(&ctx.cyclic_body("                "));
            body.push_str("            end if;\n");
        }
        Some(0xFC) => {
            vars.push_str("        variable TpdoEventPending : std_logic;\n");
            body.push_str(&format!(
                "            if {} then\n                TpdoEventPending := '0';\n                Tpdo{}Interrupt <= '0';\n            else\n",
                disabled_guard, ctx.n
            ));
            body.push_str(&ctx.sync_pending_body(&ctx.rtr_match(), "                ", false));
            body.push_str("            end if;\n");
        }
        Some(0xFD) => {
            body.push_str(&format!(
                "            if {} then\n                Tpdo{}Interrupt <= '0';\n            else\n",
                disabled_guard, ctx.n
            ));
            body.push_str(&ctx.async_rtr_body("                "));
            body.push_str("            end if;\n");
        }
        Some(_) => {
            // 0xFE/0xFF and the reserved band: asynchronous, event-driven
            vars.push_str("        variable TpdoEvent        : std_logic;\n");
            if ctx.event_timer.is_some() {
                vars.push_str("        variable TpdoEventTimerCounter : unsigned(15 downto 0);\n");
            }
            body.push_str(&ctx.prologue(true, true, false, true));
            body.push_str(&format!(
                "            if {} then\n                Tpdo{}Interrupt <= '0';\n            else\n",
                disabled_guard, ctx.n
            ));
            body.push_str(&ctx.async_event_body("                "));
            body.push_str("            end if;\n");
        }
        None => {
            // Transmission type is run-time writable (or absent): carry the
            // full trigger matrix and select by the current value.
            let tt = ctx.tt.clone().unwrap_or_else(|| "x\"FF\"".to_string());
            vars.push_str("        variable TpdoEvent        : std_logic;\n");
            vars.push_str("        variable TpdoEventPending : std_logic;\n");
            vars.push_str("        variable TpdoSyncCycles   : unsigned(7 downto 0);\n");
            vars.push_str("        variable SyncStarted      : std_logic;\n");
            if ctx.event_timer.is_some() {
                vars.push_str("        variable TpdoEventTimerCounter : unsigned(15 downto 0);\n");
            }
            body.push_str(&ctx.prologue(true, true, true, true));
            body.push_str(&format!(
                "            if {} then\n                TpdoEventPending := '0';\n                TpdoSyncCycles := (others => '0');\n                SyncStarted := '0';\n                Tpdo{}Interrupt <= '0';\n",
                disabled_guard, ctx.n
            ));
            body.push_str(&format!("            elsif {} = 0 then\n", tt));
            body.push_str(&ctx.sync_pending_body(
                &format!("TpdoEvent = '1'{}", ctx.inhibit_guard()),
                "                ",
                true,
            ));
            body.push_str(&format!("            elsif {} <= 240 then\n", tt));
            body.push_str(&ctx.cyclic_body("                "));
            body.push_str(&format!("            elsif {} = 252 then\n", tt));
            body.push_str(&ctx.sync_pending_body(&ctx.rtr_match(), "                ", false));
            body.push_str(&format!("            elsif {} = 253 then\n", tt));
            body.push_str(&ctx.async_rtr_body("                "));
            body.push_str("            else\n");
            body.push_str(&ctx.async_event_body("                "));
            body.push_str("            end if;\n");
        }
    }
    if ctx.inhibit.is_some() && uses_inhibit(ctx) {
        vars.push_str("        variable TpdoInhibitCounter : unsigned(15 downto 0);\n");
    }

    out.push_str("    process (Reset_n, Clock)\n");
    out.push_str(&vars);
    out.push_str("    begin\n        if Reset_n = '0' then\n");
    for line in reset_lines(&vars, ctx.n) {
        out.push_str(&line);
    }
    out.push_str("        elsif rising_edge(Clock) then\n");
    out.push_str(&body);
    out.push_str("        end if;\n    end process;\n");
}

fn uses_inhibit(ctx: &TpdoContext) -> bool {
    match ctx.static_tt {
        None | Some(0x00) => true,
        Some(0xFC) | Some(0xFD) => false,
        Some(tt) if (0x01..=0xF0).contains(&tt) => false,
        Some(_) => true,
    }
}

fn reset_lines(vars: &str, n: usize) -> Vec<String> {
    let mut lines = Vec::new();
    if vars.contains("TpdoEvent ") {
        lines.push("            TpdoEvent := '0';\n".to_string());
    }
    if vars.contains("TpdoEventPending") {
        lines.push("            TpdoEventPending := '0';\n".to_string());
    }
    if vars.contains("TpdoSyncCycles") {
        lines.push("            TpdoSyncCycles := (others => '0');\n".to_string());
    }
    if vars.contains("SyncStarted") {
        lines.push("            SyncStarted := '0';\n".to_string());
    }
    if vars.contains("TpdoEventTimerCounter") {
        lines.push("            TpdoEventTimerCounter := (others => '0');\n".to_string());
    }
    if vars.contains("TpdoInhibitCounter") {
        lines.push("            TpdoInhibitCounter := (others => '0');\n".to_string());
    }
    lines.push(format!("            Tpdo{}Interrupt <= '0';\n", n));
    lines
}

/// Total mapped bits per TPDO, after mapping validation.
pub fn tpdo_bit_lengths(plan: &EntityPlan) -> Result<[u32; PDO_COUNT], BuildError> {
    let mut lengths = [0u32; PDO_COUNT];
    for (i, length) in lengths.iter_mut().enumerate() {
        if plan.od().contains((((crate::constant::IDX_TPDO_MAPPING + i as u16) as u32) << 8)) {
            *length = tpdo_mappings(plan.od(), i)?.iter().map(|d| d.bit_length()).sum();
        }
    }
    Ok(lengths)
}

/// The TPDO payload words: mapped signals concatenated so that mapping sub 1
/// lands in the lowest frame bits, zero-padded to 64.
pub fn emit_tpdo_data(plan: &EntityPlan, out: &mut String) -> Result<(), BuildError> {
    out.push_str("\n    --! TPDO mappings\n");
    for i in 0..PDO_COUNT {
        out.push_str(&format!("    Tpdo{}Data <= ", i + 1));
        if plan.od().contains((((crate::constant::IDX_TPDO_MAPPING + i as u16) as u32) << 8)) {
            let targets = tpdo_mappings(plan.od(), i)?;
            let total: u32 = targets.iter().map(|d| d.bit_length()).sum();
            if targets.is_empty() {
                out.push_str("(others => '0')");
            } else {
                let mut parts: Vec<String> =
                    targets.iter().map(|d| plan.slv_value_expr(d)).collect();
                parts.reverse();
                out.push_str(&zero_fill(64 - total));
                out.push_str(&parts.join(" & "));
            }
        } else {
            out.push_str("(others => '0')");
        }
        out.push_str(";\n");
    }
    Ok(())
}

/// An RPDO participates in timeout supervision when its communication record
/// carries both a COB-ID and an event-timer entry.
pub fn rpdo_has_timeout(plan: &EntityPlan, i: usize) -> bool {
    let base = (IDX_RPDO_COMM + i as u16) as u32;
    plan.od().contains((base << 8) | 1) && plan.od().contains((base << 8) | 5)
}

pub fn emit_rpdo_timeouts(plan: &EntityPlan, out: &mut String) {
    let od = plan.od();
    let mut flags = Vec::new();
    for i in 0..PDO_COUNT {
        let base = (IDX_RPDO_COMM + i as u16) as u32;
        let (Some(cob_desc), Some(evt_desc)) = (od.get((base << 8) | 1), od.get((base << 8) | 5))
        else {
            continue;
        };
        let cob = plan.value_expr(cob_desc);
        let evt = plan.value_expr(evt_desc);
        let n = i + 1;
        flags.push(format!("Rpdo{}Timeout", n));
        out.push_str(&format!(
            r#"
    --! RPDO{n} event timer
    process (Reset_n, Clock)
        variable RpdoTimeoutCounter : unsigned(15 downto 0);
    begin
        if Reset_n = '0' then
            RpdoTimeoutCounter := (others => '0');
            Rpdo{n}Timeout <= '0';
        elsif rising_edge(Clock) then
            if {cob}(31) = '1' or {evt} = 0 then
                RpdoTimeoutCounter := (others => '0');
                Rpdo{n}Timeout <= '0';
            elsif CurrentState = STATE_CAN_RX_READ and RxFrame_q.Ide = {cob}(29) and unsigned(RxFrame_q.Id) = {cob}(28 downto 0) then
                RpdoTimeoutCounter := (others => '0');
                Rpdo{n}Timeout <= '0';
            elsif MillisecondEnable = '1' and RpdoTimeoutCounter < {evt} then
                RpdoTimeoutCounter := RpdoTimeoutCounter + 1;
                if RpdoTimeoutCounter = {evt} then
                    Rpdo{n}Timeout <= '1';
                end if;
            end if;
        end if;
    end process;
"#,
            n = n,
            cob = cob,
            evt = evt
        ));
    }
    if flags.is_empty() {
        out.push_str("\n    RpdoTimeout_ob <= '0';\n");
    } else {
        out.push_str(&format!(
            "\n    RpdoTimeout_ob <= {}; --! Reduced with \"and\" across RPDOs\n",
            flags.join(" and ")
        ));
    }
}
