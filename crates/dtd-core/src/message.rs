//! Protocol messages and their line-oriented wire form.
//!
//! ```text
//! POLL:<id>                coordinator → node(s)
//! ACK:<id>:<0|1>           node → coordinator
//! SETID:<id>               coordinator → node
//! ACKSETID:<id>:<OK|ERR>   node → coordinator
//! BOOT:<id>                node → coordinator, once at startup
//! ```
//!
//! Parsing never fails: anything that does not match one of the shapes
//! above becomes [`Message::Unrecognized`] with a best-effort reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node_id::NodeId;

pub const POLL_PREFIX: &str = "POLL:";
pub const SETID_PREFIX: &str = "SETID:";
pub const ACKSETID_PREFIX: &str = "ACKSETID:";
pub const ACK_PREFIX: &str = "ACK:";
pub const BOOT_PREFIX: &str = "BOOT:";

/// Line delimiter.
pub const DELIMITER: u8 = b'\n';

/// Shortest well-formed frame (`POLL:x`, `BOOT:x`).
pub const MIN_FRAME_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedReason {
    /// Nothing but a delimiter (and whitespace).
    Empty,
    /// Fewer characters than the shortest frame, no known keyword.
    TooShort,
    /// Long enough, but no known keyword.
    UnknownPrefix,
    /// Known keyword with an invalid payload, or undecodable bytes.
    Malformed,
}

impl UnrecognizedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::TooShort => "too_short",
            Self::UnknownPrefix => "unknown_prefix",
            Self::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Poll { target: NodeId },
    Ack { from: NodeId, present: bool },
    SetId { new_id: NodeId },
    AckSetId { id: NodeId, ok: bool },
    Boot { id: NodeId },
    Unrecognized(UnrecognizedReason),
}

impl Message {
    /// Parse one line (with or without its delimiter).
    ///
    /// Leading control/non-ASCII bytes are skipped: the radio modules emit
    /// such garbage when they key up, glued to the front of the next frame.
    pub fn parse(line: &[u8]) -> Message {
        let start = line
            .iter()
            .position(u8::is_ascii_graphic)
            .unwrap_or(line.len());
        let noisy = line[..start]
            .iter()
            .any(|b| !b.is_ascii_whitespace());
        let body = line[start..].trim_ascii_end();

        if body.is_empty() {
            let reason = if noisy {
                UnrecognizedReason::Malformed
            } else {
                UnrecognizedReason::Empty
            };
            return Message::Unrecognized(reason);
        }

        let Ok(text) = std::str::from_utf8(body) else {
            return Message::Unrecognized(UnrecognizedReason::Malformed);
        };

        parse_text(text)
    }

    /// Wire form, always delimiter-terminated. `Unrecognized` encodes as an
    /// empty line.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.to_string().into_bytes();
        out.push(DELIMITER);
        out
    }

    /// Replies and announcements a node emits. Seen as input they are
    /// echoes of shared-medium traffic.
    pub fn is_node_emitted(&self) -> bool {
        matches!(
            self,
            Message::Ack { .. } | Message::Boot { .. } | Message::AckSetId { .. }
        )
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Message::Unrecognized(_))
    }
}

fn parse_text(text: &str) -> Message {
    use UnrecognizedReason::{Malformed, TooShort, UnknownPrefix};

    let parsed = if let Some(rest) = text.strip_prefix(POLL_PREFIX) {
        NodeId::parse(rest)
            .ok()
            .map(|target| Message::Poll { target })
    } else if let Some(rest) = text.strip_prefix(SETID_PREFIX) {
        NodeId::parse(rest)
            .ok()
            .filter(|id| !id.is_wildcard())
            .map(|new_id| Message::SetId { new_id })
    } else if let Some(rest) = text.strip_prefix(ACKSETID_PREFIX) {
        id_and_flag(rest, "OK", "ERR").map(|(id, ok)| Message::AckSetId { id, ok })
    } else if let Some(rest) = text.strip_prefix(ACK_PREFIX) {
        id_and_flag(rest, "1", "0").map(|(from, present)| Message::Ack { from, present })
    } else if let Some(rest) = text.strip_prefix(BOOT_PREFIX) {
        NodeId::parse(rest).ok().map(|id| Message::Boot { id })
    } else if text.len() < MIN_FRAME_LEN {
        return Message::Unrecognized(TooShort);
    } else {
        return Message::Unrecognized(UnknownPrefix);
    };

    parsed.unwrap_or(Message::Unrecognized(Malformed))
}

/// `<id>:<yes|no>` payload shared by `ACK` and `ACKSETID`.
fn id_and_flag(rest: &str, yes: &str, no: &str) -> Option<(NodeId, bool)> {
    let (id, flag) = rest.split_once(':')?;
    let id = NodeId::parse(id).ok()?;
    let flag = if flag == yes {
        true
    } else if flag == no {
        false
    } else {
        return None;
    };
    Some((id, flag))
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Poll { target } => write!(f, "{POLL_PREFIX}{target}"),
            Message::Ack { from, present } => {
                write!(f, "{ACK_PREFIX}{from}:{}", u8::from(*present))
            }
            Message::SetId { new_id } => write!(f, "{SETID_PREFIX}{new_id}"),
            Message::AckSetId { id, ok } => {
                write!(f, "{ACKSETID_PREFIX}{id}:{}", if *ok { "OK" } else { "ERR" })
            }
            Message::Boot { id } => write!(f, "{BOOT_PREFIX}{id}"),
            Message::Unrecognized(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(s: &str) -> NodeId {
        NodeId::parse(s).expect("valid id")
    }

    #[test]
    fn parses_each_frame_kind() {
        assert_eq!(
            Message::parse(b"POLL:03\n"),
            Message::Poll { target: id("03") }
        );
        assert_eq!(
            Message::parse(b"ACK:03:1\n"),
            Message::Ack {
                from: id("03"),
                present: true
            }
        );
        assert_eq!(
            Message::parse(b"ACK:03:0"),
            Message::Ack {
                from: id("03"),
                present: false
            }
        );
        assert_eq!(
            Message::parse(b"SETID:05\n"),
            Message::SetId { new_id: id("05") }
        );
        assert_eq!(
            Message::parse(b"ACKSETID:05:ERR\n"),
            Message::AckSetId {
                id: id("05"),
                ok: false
            }
        );
        assert_eq!(Message::parse(b"BOOT:01\n"), Message::Boot { id: id("01") });
    }

    #[test]
    fn encodes_exact_wire_text() {
        assert_eq!(Message::Poll { target: id("03") }.encode(), b"POLL:03\n");
        assert_eq!(
            Message::Ack {
                from: id("03"),
                present: true
            }
            .encode(),
            b"ACK:03:1\n"
        );
        assert_eq!(
            Message::AckSetId {
                id: id("05"),
                ok: true
            }
            .encode(),
            b"ACKSETID:05:OK\n"
        );
        assert_eq!(
            Message::Unrecognized(UnrecognizedReason::Empty).encode(),
            b"\n"
        );
    }

    #[test]
    fn wildcard_poll_parses() {
        let msg = Message::parse(b"POLL:ALL\n");
        assert!(matches!(msg, Message::Poll { ref target } if target.is_wildcard()));
    }

    #[test]
    fn tolerates_crlf_and_trailing_spaces() {
        assert_eq!(
            Message::parse(b"POLL:03 \r\n"),
            Message::Poll { target: id("03") }
        );
    }

    #[test]
    fn skips_leading_radio_noise() {
        assert_eq!(
            Message::parse(b"\x00\xff\xfeACK:02:1\n"),
            Message::Ack {
                from: id("02"),
                present: true
            }
        );
    }

    #[test]
    fn empty_line_is_unrecognized_empty() {
        assert_eq!(
            Message::parse(b"\n"),
            Message::Unrecognized(UnrecognizedReason::Empty)
        );
        assert_eq!(
            Message::parse(b"  \r\n"),
            Message::Unrecognized(UnrecognizedReason::Empty)
        );
    }

    #[test]
    fn noise_only_is_malformed() {
        assert_eq!(
            Message::parse(b"\x00\xff\n"),
            Message::Unrecognized(UnrecognizedReason::Malformed)
        );
    }

    #[test]
    fn short_garbage_is_too_short() {
        assert_eq!(
            Message::parse(b"OK\n"),
            Message::Unrecognized(UnrecognizedReason::TooShort)
        );
    }

    #[test]
    fn unknown_keyword_is_unknown_prefix() {
        assert_eq!(
            Message::parse(b"HELLO:01\n"),
            Message::Unrecognized(UnrecognizedReason::UnknownPrefix)
        );
        // Printable junk ahead of a keyword is not skipped.
        assert_eq!(
            Message::parse(b"xACK:03:1\n"),
            Message::Unrecognized(UnrecognizedReason::UnknownPrefix)
        );
        // Keywords are case-sensitive.
        assert_eq!(
            Message::parse(b"poll:01\n"),
            Message::Unrecognized(UnrecognizedReason::UnknownPrefix)
        );
    }

    #[test]
    fn setid_remainder_must_be_one_to_eight_chars() {
        assert_eq!(
            Message::parse(b"SETID:\n"),
            Message::Unrecognized(UnrecognizedReason::Malformed)
        );
        assert_eq!(
            Message::parse(b"SETID:123456789\n"),
            Message::Unrecognized(UnrecognizedReason::Malformed)
        );
        assert_eq!(
            Message::parse(b"SETID:12345678\n"),
            Message::SetId {
                new_id: id("12345678")
            }
        );
    }

    #[test]
    fn setid_to_wildcard_is_rejected() {
        assert_eq!(
            Message::parse(b"SETID:all\n"),
            Message::Unrecognized(UnrecognizedReason::Malformed)
        );
    }

    #[test]
    fn malformed_payloads() {
        for line in [
            &b"ACK:03\n"[..],
            b"ACK:03:2\n",
            b"ACK:03:1:1\n",
            b"ACKSETID:05:MAYBE\n",
            b"POLL:\n",
            b"BOOT:a b\n",
            b"POLL:\xc3\x28\n",
        ] {
            assert_eq!(
                Message::parse(line),
                Message::Unrecognized(UnrecognizedReason::Malformed),
                "{}",
                String::from_utf8_lossy(line)
            );
        }
    }

    #[test]
    fn node_emitted_classification() {
        assert!(Message::parse(b"ACK:01:1").is_node_emitted());
        assert!(Message::parse(b"BOOT:01").is_node_emitted());
        assert!(Message::parse(b"ACKSETID:01:OK").is_node_emitted());
        assert!(!Message::parse(b"POLL:01").is_node_emitted());
        assert!(!Message::parse(b"SETID:01").is_node_emitted());
    }

    fn arb_id() -> impl Strategy<Value = NodeId> {
        "[!-9;-~]{1,8}".prop_map(|s| NodeId::parse(&s).expect("strategy yields valid ids"))
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            arb_id().prop_map(|target| Message::Poll { target }),
            (arb_id(), any::<bool>()).prop_map(|(from, present)| Message::Ack { from, present }),
            arb_id()
                .prop_filter("wildcard is not assignable", |id| !id.is_wildcard())
                .prop_map(|new_id| Message::SetId { new_id }),
            (arb_id(), any::<bool>()).prop_map(|(id, ok)| Message::AckSetId { id, ok }),
            arb_id().prop_map(|id| Message::Boot { id }),
        ]
    }

    proptest! {
        #[test]
        fn parse_inverts_encode(msg in arb_message()) {
            prop_assert_eq!(Message::parse(&msg.encode()), msg);
        }
    }
}
