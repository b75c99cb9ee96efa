//! # JOMS Gate (request gating for the JOMS ordering portal)
//!
//! `joms-gate` sits in front of every request to the uniform job-order
//! portal and decides who gets through. It owns the security pipeline only;
//! dashboards, orders and reporting live elsewhere.
//!
//! ## Flow Overview
//!
//! Every inbound request runs the same pipeline:
//!
//! 1. **Session Resolver**: read the access/refresh cookies, establish the
//!    session against the Identity Store, proactively refresh credentials
//!    close to expiry, and resolve the user's role into a [`gate::Principal`].
//! 2. **Step-Up Gate**: for `admin`/`superadmin` roles, check the step-up
//!    marker cookie against server-side state.
//! 3. **Access Control Evaluator**: a pure decision over (principal,
//!    step-up state, path) yielding allow, redirect, or revoke.
//!
//! Sign-in, sign-out and the device verification protocol are separate
//! endpoints that populate the state the pipeline consumes.
//!
//! ## Security boundaries
//!
//! - Identity (credentials, roles, admin route allow-lists) belongs to the
//!   external Identity Store; this service never stores passwords or tokens.
//! - The gate owns its own state: enrolled device keys, step-up markers
//!   (hashes only) and the audit trail, all in Postgres.
//! - Every ambiguous or failed validation degrades to anonymous. A failed
//!   step-up escalates to full sign-out rather than a plain denial.

pub mod api;
pub mod cli;
pub mod gate;
pub mod identity;
pub mod webauthn;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
