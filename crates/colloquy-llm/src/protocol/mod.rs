//! Wire format types for each provider API
//!
//! These mirror the JSON shapes exactly; conversion to and from the
//! provider-agnostic types lives in [`crate::convert`].

pub mod anthropic;
pub mod google;
pub mod openai;
