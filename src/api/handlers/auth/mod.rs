//! Sign-in/sign-out orchestration and step-up endpoints.

pub mod device_keys;
pub mod session;
pub mod signin;
pub mod signout;
pub mod stepup;
pub mod types;
pub(crate) mod utils;
