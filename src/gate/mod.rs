//! The request-gating pipeline: session resolution, access control and the
//! step-up verification gate.

pub mod access;
pub mod audit;
pub mod cookies;
pub mod middleware;
pub mod principal;
pub mod routes;
pub mod session;
pub mod state;
pub mod stepup;

pub use access::Access;
pub use principal::Principal;
pub use session::SessionResolver;
pub use state::{GateConfig, GateState};
pub use stepup::{MemoryStepUpStore, PgStepUpStore, StepUpStatus, StepUpStore};
