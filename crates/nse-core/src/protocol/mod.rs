//! Wire formats: proximity claims and the relay/control API frames.

pub mod api;
pub mod claim;
pub mod pow;

pub use api::{Frame, FrameError, GossipAnnounce, GossipNotification, MessageType};
pub use claim::{
    build_claim, unpack_claim, BuildOptions, KeyMaterial, UnpackOptions, HEADER_LENGTH,
    MIN_MESSAGE_LENGTH, REQUIRED_KEY_BITS, SIGNATURE_LENGTH,
};
pub use pow::DEFAULT_PROOF_OF_WORK_BITS;
