//! # MPC runtime
//!
//! A secure multi-party computation runtime: 1-4 mutually distrusting
//! parties jointly evaluate arithmetic and boolean expressions over
//! secret-shared integer vectors without revealing any party's private
//! input.
//!
//! [runtime] is the main entry point. [vector] and [evector] hold the share
//! containers; [random] supplies correlated randomness (PRGs, zero sharings,
//! Beaver triples, sharded permutations); [comm] carries shares between
//! parties; [protocol] implements the per-protocol-variant share/open/add/
//! multiply primitives; [worker] is the per-thread unit of execution that
//! [runtime] schedules.
#![warn(missing_docs)]

pub mod channel_utils;
pub mod comm;
pub mod config;
pub mod error;
pub mod evector;
pub mod protocol;
pub mod random;
pub mod runtime;
pub mod vector;
pub mod worker;
