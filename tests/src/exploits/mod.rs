//! Attack simulations against claim validation.
//!
//! Each test plays a misbehaving peer and checks that the receiving side
//! refuses to let the claim influence the estimate.

pub mod claim_forgery;
