//! Relay ("gossip") and local control API frames.
//!
//! Every frame starts with `size:u16 | type:u16`, big-endian, where `size`
//! counts the whole frame including this header.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::domain::Estimate;

/// Length of the common `size | type` header.
pub const FRAME_HEADER_LENGTH: usize = 4;

/// Wire message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    GossipAnnounce = 500,
    GossipNotify = 501,
    GossipNotification = 502,
    GossipValidation = 503,
    NseQuery = 520,
    NseEstimate = 521,
}

impl MessageType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            500 => Some(Self::GossipAnnounce),
            501 => Some(Self::GossipNotify),
            502 => Some(Self::GossipNotification),
            503 => Some(Self::GossipValidation),
            520 => Some(Self::NseQuery),
            521 => Some(Self::NseEstimate),
            _ => None,
        }
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Frame-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the frame needs.
    #[error("Frame truncated: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes required
        needed: usize,
        /// Bytes available
        actual: usize,
    },

    /// Declared size disagrees with the bytes received.
    #[error("Frame declares {declared} bytes but {actual} were received")]
    SizeMismatch {
        /// Size from the header
        declared: usize,
        /// Bytes received
        actual: usize,
    },

    /// Type not known to this node.
    #[error("Unknown message type {0}")]
    UnknownType(u16),

    /// Known type, but not acceptable here.
    #[error("Unexpected message type {0:?}")]
    UnexpectedType(MessageType),

    /// Payload does not fit a 16-bit size field.
    #[error("Payload of {0} bytes does not fit a frame")]
    TooLarge(usize),
}

/// Announce request sent to the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipAnnounce {
    pub ttl: u8,
    pub data_type: u16,
    pub payload: Bytes,
}

/// Message delivered by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipNotification {
    pub message_id: u16,
    pub data_type: u16,
    pub payload: Bytes,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    GossipAnnounce(GossipAnnounce),
    GossipNotify { data_type: u16 },
    GossipNotification(GossipNotification),
    GossipValidation { message_id: u16, valid: bool },
    NseQuery,
    NseEstimate(Estimate),
}

impl Frame {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::GossipAnnounce(_) => MessageType::GossipAnnounce,
            Self::GossipNotify { .. } => MessageType::GossipNotify,
            Self::GossipNotification(_) => MessageType::GossipNotification,
            Self::GossipValidation { .. } => MessageType::GossipValidation,
            Self::NseQuery => MessageType::NseQuery,
            Self::NseEstimate(_) => MessageType::NseEstimate,
        }
    }

    /// Encode into a complete frame.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let body_len = match self {
            Self::GossipAnnounce(a) => 4 + a.payload.len(),
            Self::GossipNotify { .. } | Self::GossipValidation { .. } => 4,
            Self::GossipNotification(n) => 4 + n.payload.len(),
            Self::NseQuery => 0,
            Self::NseEstimate(_) => 8,
        };
        let size = FRAME_HEADER_LENGTH + body_len;
        let size_field = u16::try_from(size).map_err(|_| FrameError::TooLarge(body_len))?;

        let mut buf = BytesMut::with_capacity(size);
        buf.put_u16(size_field);
        buf.put_u16(self.message_type().as_u16());
        match self {
            Self::GossipAnnounce(a) => {
                buf.put_u8(a.ttl);
                buf.put_u8(0);
                buf.put_u16(a.data_type);
                buf.put_slice(&a.payload);
            }
            Self::GossipNotify { data_type } => {
                buf.put_u16(0);
                buf.put_u16(*data_type);
            }
            Self::GossipNotification(n) => {
                buf.put_u16(n.message_id);
                buf.put_u16(n.data_type);
                buf.put_slice(&n.payload);
            }
            Self::GossipValidation { message_id, valid } => {
                buf.put_u16(*message_id);
                buf.put_u16(u16::from(*valid));
            }
            Self::NseQuery => {}
            Self::NseEstimate(e) => {
                buf.put_u32(e.peers);
                buf.put_u32(e.std_deviation);
            }
        }
        Ok(buf.freeze())
    }

    /// Decode one complete frame, accepting only the listed types.
    pub fn decode(frame: &[u8], accepted: &[MessageType]) -> Result<Self, FrameError> {
        let declared = frame_length(frame)?;
        if declared != frame.len() {
            return Err(FrameError::SizeMismatch {
                declared,
                actual: frame.len(),
            });
        }
        let raw_type = u16::from_be_bytes([frame[2], frame[3]]);
        let kind = MessageType::from_u16(raw_type).ok_or(FrameError::UnknownType(raw_type))?;
        if !accepted.contains(&kind) {
            return Err(FrameError::UnexpectedType(kind));
        }

        let mut body = &frame[FRAME_HEADER_LENGTH..];
        let (fixed, exact) = match kind {
            MessageType::NseQuery => (0, true),
            MessageType::NseEstimate => (8, true),
            MessageType::GossipNotify | MessageType::GossipValidation => (4, true),
            MessageType::GossipAnnounce | MessageType::GossipNotification => (4, false),
        };
        if body.len() < fixed {
            return Err(FrameError::Truncated {
                needed: FRAME_HEADER_LENGTH + fixed,
                actual: frame.len(),
            });
        }
        if exact && body.len() != fixed {
            return Err(FrameError::SizeMismatch {
                declared: FRAME_HEADER_LENGTH + fixed,
                actual: frame.len(),
            });
        }
        let decoded = match kind {
            MessageType::GossipAnnounce => {
                let ttl = body.get_u8();
                body.advance(1);
                let data_type = body.get_u16();
                Self::GossipAnnounce(GossipAnnounce {
                    ttl,
                    data_type,
                    payload: Bytes::copy_from_slice(body),
                })
            }
            MessageType::GossipNotify => {
                body.advance(2);
                Self::GossipNotify {
                    data_type: body.get_u16(),
                }
            }
            MessageType::GossipNotification => {
                let message_id = body.get_u16();
                let data_type = body.get_u16();
                Self::GossipNotification(GossipNotification {
                    message_id,
                    data_type,
                    payload: Bytes::copy_from_slice(body),
                })
            }
            MessageType::GossipValidation => {
                let message_id = body.get_u16();
                let valid = body.get_u16() & 1 == 1;
                Self::GossipValidation { message_id, valid }
            }
            MessageType::NseQuery => Self::NseQuery,
            MessageType::NseEstimate => Self::NseEstimate(Estimate {
                peers: body.get_u32(),
                std_deviation: body.get_u32(),
            }),
        };
        Ok(decoded)
    }
}

/// Read the declared size from the start of a frame.
pub fn frame_length(header: &[u8]) -> Result<usize, FrameError> {
    if header.len() < FRAME_HEADER_LENGTH {
        return Err(FrameError::Truncated {
            needed: FRAME_HEADER_LENGTH,
            actual: header.len(),
        });
    }
    let size = u16::from_be_bytes([header[0], header[1]]) as usize;
    if size < FRAME_HEADER_LENGTH {
        return Err(FrameError::SizeMismatch {
            declared: size,
            actual: header.len(),
        });
    }
    Ok(size)
}

/// `GOSSIP_ANNOUNCE` carrying a claim.
pub fn gossip_announce(ttl: u8, data_type: u16, payload: impl Into<Bytes>) -> Result<Bytes, FrameError> {
    Frame::GossipAnnounce(GossipAnnounce {
        ttl,
        data_type,
        payload: payload.into(),
    })
    .encode()
}

/// `GOSSIP_NOTIFY` subscribing to `data_type`.
pub fn gossip_notify(data_type: u16) -> Bytes {
    fixed_frame(MessageType::GossipNotify, 0, data_type)
}

/// `GOSSIP_VALIDATION` answering one notification.
pub fn gossip_validation(message_id: u16, valid: bool) -> Bytes {
    fixed_frame(MessageType::GossipValidation, message_id, u16::from(valid))
}

/// `NSE_QUERY`.
pub fn nse_query() -> Bytes {
    Bytes::from_static(&[0x00, 0x04, 0x02, 0x08])
}

/// `NSE_ESTIMATE`.
pub fn nse_estimate(estimate: Estimate) -> Bytes {
    let mut buf = BytesMut::with_capacity(12);
    buf.put_u16(12);
    buf.put_u16(MessageType::NseEstimate.as_u16());
    buf.put_u32(estimate.peers);
    buf.put_u32(estimate.std_deviation);
    buf.freeze()
}

fn fixed_frame(kind: MessageType, first: u16, second: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u16(8);
    buf.put_u16(kind.as_u16());
    buf.put_u16(first);
    buf.put_u16(second);
    buf.freeze()
}
