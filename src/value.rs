//! Object values as they appear in the EDS: plain literals and the symbolic
//! `$NODEID+k` form, which must survive into the emitted entity so it can be
//! re-evaluated against the node-ID latched at reset-communication.

use std::collections::HashMap;

use crate::data_type::DataType;
use crate::error::BuildError;
use crate::format::format_value;
use crate::util::{parse_int, parse_pattern};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefaultExpr {
    /// A literal bit pattern of the object's width.
    Literal(u64),
    /// `$NODEID+k`: the latched node-ID, zero-extended, plus `k`.
    NodeIdOffset(u32),
}

impl DefaultExpr {
    pub fn parse(raw: &str, data_type: DataType, name: &str) -> Result<Self, BuildError> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix("$NODEID").or_else(|| raw.strip_prefix("$NodeID")) {
            let rest = rest.trim();
            if rest.is_empty() {
                return Self::node_id_offset(0, data_type, name);
            }
            if let Some(k) = rest.strip_prefix('+') {
                let k: u32 = parse_int(k).ok_or_else(|| BuildError::UnsupportedDefault {
                    name: name.to_string(),
                    text: raw.to_string(),
                })?;
                return Self::node_id_offset(k, data_type, name);
            }
            if rest.starts_with('-') {
                return Err(BuildError::NodeIdOffsetNegative { name: name.to_string() });
            }
            return Err(BuildError::UnsupportedDefault {
                name: name.to_string(),
                text: raw.to_string(),
            });
        }
        let pattern = parse_raw(raw, data_type).ok_or_else(|| BuildError::UnsupportedDefault {
            name: name.to_string(),
            text: raw.to_string(),
        })?;
        Ok(DefaultExpr::Literal(pattern))
    }

    fn node_id_offset(k: u32, data_type: DataType, name: &str) -> Result<Self, BuildError> {
        let bits = data_type.bit_length();
        if data_type.is_signed() || data_type.is_scalar_logic() || bits == 0 || bits > 32 {
            return Err(BuildError::UnsupportedDefault {
                name: name.to_string(),
                text: format!("$NODEID+{}", k),
            });
        }
        // The sum must fit for every legal node-ID.
        let max_sum = k as u64 + crate::constant::BROADCAST_NODE_ID as u64;
        if bits < 64 && max_sum >= 1u64 << bits {
            return Err(BuildError::NodeIdOffsetTooWide { name: name.to_string(), bit_length: bits });
        }
        Ok(DefaultExpr::NodeIdOffset(k))
    }

    pub fn literal(&self) -> Option<u64> {
        match *self {
            DefaultExpr::Literal(v) => Some(v),
            DefaultExpr::NodeIdOffset(_) => None,
        }
    }

    /// The concrete value for a given node-ID. Used where the generator folds
    /// records at build time; the emitted hardware always re-evaluates.
    pub fn resolve(&self, node_id: u8) -> u64 {
        match *self {
            DefaultExpr::Literal(v) => v,
            DefaultExpr::NodeIdOffset(k) => k as u64 + node_id as u64,
        }
    }

    /// VHDL expression of the object's declared type.
    pub fn render(&self, data_type: DataType) -> String {
        let bits = data_type.bit_length();
        match *self {
            DefaultExpr::Literal(v) => match data_type {
                DataType::TimeOfDay | DataType::TimeDifference => {
                    // Only the zero timestamp is representable as a default.
                    "(Milliseconds => (others => '0'), Days => (others => '0'))".to_string()
                }
                _ => format_value(v, bits),
            },
            DefaultExpr::NodeIdOffset(k) => format!(
                "resize(unsigned(NodeId_q), {}) + unsigned'({})",
                bits,
                format_value(k as u64, bits)
            ),
        }
    }
}

/// Parses a plain literal into the raw bit pattern of `data_type`'s width.
fn parse_raw(raw: &str, data_type: DataType) -> Option<u64> {
    match data_type {
        DataType::Boolean => match raw.to_lowercase().as_str() {
            "1" | "true" => Some(1),
            "0" | "false" => Some(0),
            _ => None,
        },
        DataType::Domain => None,
        // Only the zero timestamp is representable in the EDS.
        DataType::TimeOfDay | DataType::TimeDifference => {
            parse_pattern(raw, 48, false).filter(|&v| v == 0)
        }
        _ => parse_pattern(raw, data_type.bit_length(), data_type.is_signed()),
    }
}

/// Pulls a named property and parses it as a default expression. An absent or
/// empty property is not an error; a malformed one is.
pub fn get_default(
    properties: &HashMap<String, String>,
    property: &str,
    data_type: DataType,
    name: &str,
) -> Result<Option<DefaultExpr>, BuildError> {
    match properties.get(property).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => DefaultExpr::parse(raw, data_type, name).map(Some),
    }
}

/// Pulls a limit property as a raw bit pattern of the object's width.
pub fn get_limit(
    properties: &HashMap<String, String>,
    property: &str,
    data_type: DataType,
    name: &str,
) -> Result<Option<u64>, BuildError> {
    match properties.get(property).map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(raw) => parse_raw(raw, data_type)
            .map(Some)
            .ok_or_else(|| BuildError::UnsupportedDefault {
                name: name.to_string(),
                text: raw.to_string(),
            }),
    }
}

/// Orders two raw bit patterns as the data type would in hardware.
pub fn limit_le(a: u64, b: u64, data_type: DataType) -> bool {
    if data_type.is_signed() {
        let bits = data_type.bit_length();
        let sign_extend = |v: u64| -> i64 {
            let shift = 64 - bits;
            ((v << shift) as i64) >> shift
        };
        sign_extend(a) <= sign_extend(b)
    } else {
        a <= b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_literal() {
        let e = DefaultExpr::parse("0x00000191", DataType::Unsigned32, "x").unwrap();
        assert_eq!(e.literal(), Some(0x191));
        let e = DefaultExpr::parse("-1", DataType::Integer16, "x").unwrap();
        assert_eq!(e.literal(), Some(0xFFFF));
        let e = DefaultExpr::parse("1", DataType::Boolean, "x").unwrap();
        assert_eq!(e.literal(), Some(1));
    }

    #[test]
    fn test_parse_node_id_offset() {
        let e = DefaultExpr::parse("$NODEID+0x180", DataType::Unsigned32, "x").unwrap();
        assert_eq!(e, DefaultExpr::NodeIdOffset(0x180));
        assert_eq!(e.resolve(5), 0x185);

        let e = DefaultExpr::parse("$NODEID", DataType::Unsigned8, "x").unwrap();
        assert_eq!(e, DefaultExpr::NodeIdOffset(0));

        assert!(matches!(
            DefaultExpr::parse("$NODEID-1", DataType::Unsigned32, "x"),
            Err(BuildError::NodeIdOffsetNegative { .. })
        ));
        // 0xFF0 + 127 does not fit in 8 bits
        assert!(matches!(
            DefaultExpr::parse("$NODEID+0xF0", DataType::Unsigned8, "x"),
            Err(BuildError::NodeIdOffsetTooWide { .. })
        ));
        assert!(matches!(
            DefaultExpr::parse("$NODEID+1", DataType::Integer16, "x"),
            Err(BuildError::UnsupportedDefault { .. })
        ));
    }

    #[test]
    fn test_render() {
        assert_eq!(
            DefaultExpr::Literal(0x191).render(DataType::Unsigned32),
            "x\"00000191\""
        );
        assert_eq!(
            DefaultExpr::NodeIdOffset(0x180).render(DataType::Unsigned32),
            "resize(unsigned(NodeId_q), 32) + unsigned'(x\"00000180\")"
        );
        assert_eq!(DefaultExpr::Literal(1).render(DataType::Boolean), "'1'");
    }

    #[test]
    fn test_limit_ordering() {
        assert!(limit_le(0xFFFF, 0x0001, DataType::Integer16)); // -1 <= 1
        assert!(!limit_le(0xFFFF, 0x0001, DataType::Unsigned16));
        assert!(limit_le(5, 5, DataType::Unsigned8));
    }
}
