//! Script templates for standard spending patterns.

pub mod p2pkh;
