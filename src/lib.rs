//! Crowdfund Gateway - campaign submission against a deployed Crowdfunding contract
//!
//! Converts user-entered amounts, encodes the contract call, resolves the nonce,
//! attaches gas, signs with the gateway key, broadcasts, and reports the outcome.

pub mod api;
pub mod chain;
pub mod config;
pub mod contract;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod tx;
