//! Invariant tests module
//!
//! - Same seed, same accounts
//! - One active keypair matching the selected index
