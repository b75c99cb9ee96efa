//! `WebAuthn` plumbing for the device verification protocol.

pub mod models;
pub mod repo;
pub mod service;

pub use models::{DeviceKey, RejectReason, VerifyOutcome};
pub use repo::DeviceKeyRepo;
pub use service::{DeviceVerifier, VerificationStrength};
