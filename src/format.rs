//! Identifier canonicalisation and VHDL literal rendering.
//!
//! Object names from the EDS become VHDL extended identifiers: constants as
//! `\UPPER_SNAKE\`, signals as `\CamelCase\`. Both derive from the same
//! canonical form, so uniqueness of one implies uniqueness of the other.

use crate::error::BuildError;

/// Canonicalises a parameter name into an upper-snake identifier body:
/// uppercased, separators collapsed to single underscores, every other
/// non-identifier character stripped. Must start with a letter.
fn canonical_body(name: &str) -> Result<String, BuildError> {
    let upper = name.to_uppercase();
    let mut body = String::with_capacity(upper.len());
    let chars: Vec<char> = upper.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            'A'..='Z' | '0'..='9' => body.push(c),
            ' ' | '_' => body.push('_'),
            // A hyphen joining two words acts as a separator; a stray one is dropped.
            '-' => {
                let joined = i > 0
                    && i + 1 < chars.len()
                    && chars[i - 1].is_ascii_alphanumeric()
                    && chars[i + 1].is_ascii_alphanumeric();
                if joined {
                    body.push('_');
                }
            }
            _ => {}
        }
    }
    let mut collapsed = String::with_capacity(body.len());
    let mut last_underscore = false;
    for c in body.chars() {
        if c == '_' {
            if !last_underscore {
                collapsed.push(c);
            }
            last_underscore = true;
        } else {
            collapsed.push(c);
            last_underscore = false;
        }
    }
    let collapsed = collapsed.trim_matches('_').to_string();
    match collapsed.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => Ok(collapsed),
        _ => Err(BuildError::InvalidObjectName { name: name.to_string() }),
    }
}

/// `\UPPER_SNAKE\`-style constant identifier, with caller-chosen wrapping.
pub fn constant_name(name: &str, prefix: &str, suffix: &str) -> Result<String, BuildError> {
    Ok(format!("{}{}{}", prefix, canonical_body(name)?, suffix))
}

/// `\CamelCase\`-style signal identifier, with caller-chosen wrapping.
pub fn signal_name(name: &str, prefix: &str, suffix: &str) -> Result<String, BuildError> {
    let body = canonical_body(name)?;
    let camel: String = body
        .split('_')
        .map(|word| {
            let mut cs = word.chars();
            match cs.next() {
                Some(first) => first.to_string() + &cs.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect();
    Ok(format!("{}{}{}", prefix, camel, suffix))
}

/// Renders `value` as a VHDL bit-string literal of exactly `bit_length` bits:
/// a leading `b"..."` part for the bits that do not fill a nibble, then an
/// `x"..."` part, joined with `&`. A 1-bit value renders as `'0'`/`'1'`.
pub fn format_value(value: u64, bit_length: u32) -> String {
    if bit_length == 1 {
        return if value & 1 == 1 { "'1'".to_string() } else { "'0'".to_string() };
    }
    let nibbles = bit_length / 4;
    let bits = bit_length - nibbles * 4;
    let mut s = String::new();
    if bits > 0 {
        let head = (value >> (nibbles * 4)) & ((1 << bits) - 1);
        s.push_str(&format!("b\"{:0width$b}\"", head, width = bits as usize));
        if nibbles > 0 {
            s.push_str(" & ");
        }
    }
    if nibbles > 0 {
        let mask = if nibbles >= 16 { u64::MAX } else { (1u64 << (nibbles * 4)) - 1 };
        s.push_str(&format!("x\"{:0width$X}\"", value & mask, width = nibbles as usize));
    }
    s
}

/// Zero padding for concatenations: renders `l` zero bits followed by ` & `,
/// or nothing when `l` is zero.
pub fn zero_fill(l: u32) -> String {
    if l == 0 {
        return String::new();
    }
    let mut s = format_value(0, l);
    s.push_str(" & ");
    s
}

#[cfg(test)]
mod tests {
    use super::{constant_name, format_value, signal_name, zero_fill};

    #[test]
    fn test_constant_name() {
        assert_eq!(constant_name("Device type", "\\", "\\").unwrap(), "\\DEVICE_TYPE\\");
        assert_eq!(
            constant_name("Pre-defined error field", "\\ODI_", "\\").unwrap(),
            "\\ODI_PRE_DEFINED_ERROR_FIELD\\"
        );
        assert_eq!(
            constant_name("COB-ID SYNC message", "", "").unwrap(),
            "COB_ID_SYNC_MESSAGE"
        );
        assert_eq!(constant_name("Vendor-ID", "", "").unwrap(), "VENDOR_ID");
        assert_eq!(constant_name("Motor  speed (rpm)", "", "").unwrap(), "MOTOR_SPEED_RPM");
    }

    #[test]
    fn test_constant_name_rejects_leading_digit() {
        assert!(constant_name("4th axis", "\\", "\\").is_err());
        assert!(constant_name("_hidden", "\\", "\\").is_err());
        assert!(constant_name("%", "\\", "\\").is_err());
    }

    #[test]
    fn test_signal_name() {
        assert_eq!(signal_name("Device type", "\\", "\\").unwrap(), "\\DeviceType\\");
        assert_eq!(signal_name("Producer heartbeat time", "", "").unwrap(), "ProducerHeartbeatTime");
        assert_eq!(signal_name("COB-ID SYNC message", "", "").unwrap(), "CobIdSyncMessage");
        assert_eq!(signal_name("Motor control", "\\", "_strb\\").unwrap(), "\\MotorControl_strb\\");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0x191, 32), "x\"00000191\"");
        assert_eq!(format_value(0x05, 8), "x\"05\"");
        assert_eq!(format_value(1, 1), "'1'");
        assert_eq!(format_value(0, 1), "'0'");
        // 7 bits = 3 leading bits + 1 nibble
        assert_eq!(format_value(0x7F, 7), "b\"111\" & x\"F\"");
        assert_eq!(format_value(0x35ED_CBA9, 30), "b\"11\" & x\"5EDCBA9\"");
    }

    #[test]
    fn test_zero_fill() {
        assert_eq!(zero_fill(0), "");
        assert_eq!(zero_fill(8), "x\"00\" & ");
        assert_eq!(zero_fill(9), "b\"0\" & x\"00\" & ");
        assert_eq!(zero_fill(1), "'0' & ");
    }
}
