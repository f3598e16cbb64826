//! Terraform provider host and export tooling for the Prism identity and
//! access management API.
//!
//! `prism-provider` serves resource and data source operations for a
//! Terraform host over a JSON request/response protocol; `prism-export`
//! renders an existing customer as Terraform configuration.

pub mod assignment;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod models;
pub mod output;
pub mod provider;
pub mod traits;
pub mod wait;

#[cfg(test)]
mod test_helpers;
