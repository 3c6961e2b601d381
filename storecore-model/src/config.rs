//! Boundary configuration strings consumed by the transaction layer:
//! `key=value[,key=value]*`, with a `checkpoint=<name>[,debug=(...)]`
//! clause. This is ambient configuration plumbing for those strings, not
//! a general config-file format.

use crate::error::ModelError;
use crate::timestamp::Timestamp;

/// The `checkpoint=<name>[,debug=(checkpoint_read_timestamp=<hex>)]`
/// clause, parsed out of a config string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointOpen {
    pub name: Option<String>,
    pub debug_read_timestamp: Option<Timestamp>,
}

/// A fully parsed transaction/cursor configuration string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorConfig {
    pub read_timestamp: Option<Timestamp>,
    pub commit_timestamp: Option<Timestamp>,
    pub durable_timestamp: Option<Timestamp>,
    pub prepare_timestamp: Option<Timestamp>,
    pub stable_timestamp: Option<Timestamp>,
    pub checkpoint: Option<CheckpointOpen>,
}

/// Parse a `key=value[,key=value]*` configuration string. Commas
/// nested inside a parenthesized `debug=(...)` clause don't split the
/// top-level list.
pub fn parse_cursor_config(s: &str) -> Result<CursorConfig, ModelError> {
    let mut cfg = CursorConfig::default();
    for part in split_top_level(s) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ModelError::InvalidConfig(format!("missing '=' in {part:?}")))?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "read_timestamp" => cfg.read_timestamp = Some(parse_hex(value)?),
            "commit_timestamp" => cfg.commit_timestamp = Some(parse_hex(value)?),
            "durable_timestamp" => cfg.durable_timestamp = Some(parse_hex(value)?),
            "prepare_timestamp" => cfg.prepare_timestamp = Some(parse_hex(value)?),
            "stable_timestamp" => cfg.stable_timestamp = Some(parse_hex(value)?),
            "checkpoint" => {
                cfg.checkpoint.get_or_insert_with(CheckpointOpen::default).name = Some(value.to_string());
            }
            "debug" => parse_debug_clause(value, &mut cfg)?,
            other => return Err(ModelError::InvalidConfig(format!("unknown key {other:?}"))),
        }
    }
    Ok(cfg)
}

fn parse_debug_clause(value: &str, cfg: &mut CursorConfig) -> Result<(), ModelError> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| ModelError::InvalidConfig(format!("malformed debug clause {value:?}")))?;
    for sub in split_top_level(inner) {
        let sub = sub.trim();
        if sub.is_empty() {
            continue;
        }
        let (k, v) = sub
            .split_once('=')
            .ok_or_else(|| ModelError::InvalidConfig(format!("missing '=' in debug clause {sub:?}")))?;
        match k.trim() {
            "checkpoint_read_timestamp" => {
                cfg.checkpoint.get_or_insert_with(CheckpointOpen::default).debug_read_timestamp =
                    Some(parse_hex(v.trim())?);
            }
            other => return Err(ModelError::InvalidConfig(format!("unknown debug key {other:?}"))),
        }
    }
    Ok(())
}

fn parse_hex(value: &str) -> Result<u64, ModelError> {
    u64::from_str_radix(value, 16).map_err(|_| ModelError::InvalidConfig(format!("not a hex u64: {value:?}")))
}

/// Split `s` on commas that aren't nested inside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_timestamp_keys() {
        let cfg = parse_cursor_config("read_timestamp=a,stable_timestamp=1e").unwrap();
        assert_eq!(cfg.read_timestamp, Some(0xa));
        assert_eq!(cfg.stable_timestamp, Some(0x1e));
    }

    #[test]
    fn parses_checkpoint_open_with_debug_clause() {
        let cfg = parse_cursor_config("checkpoint=ckpt1,debug=(checkpoint_read_timestamp=f)").unwrap();
        let open = cfg.checkpoint.unwrap();
        assert_eq!(open.name.as_deref(), Some("ckpt1"));
        assert_eq!(open.debug_read_timestamp, Some(0xf));
    }

    #[test]
    fn checkpoint_without_debug_clause() {
        let cfg = parse_cursor_config("checkpoint=ckpt1").unwrap();
        let open = cfg.checkpoint.unwrap();
        assert_eq!(open.name.as_deref(), Some("ckpt1"));
        assert_eq!(open.debug_read_timestamp, None);
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(matches!(
            parse_cursor_config("bogus=1"),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_non_hex_value() {
        assert!(matches!(
            parse_cursor_config("read_timestamp=zz"),
            Err(ModelError::InvalidConfig(_))
        ));
    }
}
