//! # Estimation Services
//!
//! The three services wire the domain rules to the ports:
//!
//! - `RoundScheduler` - one round's participation: delay, re-check, flood
//! - `GossipIngress` - validates relayed claims and records round bests
//! - `ControlResponder` - answers estimate queries from recorded rounds
//!
//! All of them share one injected `RoundLedger`.

mod ingress;
mod responder;
mod scheduler;

pub use ingress::GossipIngress;
pub use responder::ControlResponder;
pub use scheduler::{RoundFailure, RoundOutcome, RoundPlan, RoundScheduler};
