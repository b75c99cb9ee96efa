//! Audit trail for security-relevant events.
//!
//! Recording is best effort: a failed insert is logged and never fails the
//! request that produced the event.

use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

/// Events the gate records.
#[derive(Clone, Copy, Debug)]
pub enum AuditEvent {
    SignIn,
    SignOut,
    StepUpSuccess,
    StepUpFailure,
    StepUpSkip,
    StepUpSkipRefused,
    DeviceKeyEnrolled,
}

impl AuditEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SignIn => "sign_in",
            Self::SignOut => "sign_out",
            Self::StepUpSuccess => "step_up_success",
            Self::StepUpFailure => "step_up_failure",
            Self::StepUpSkip => "step_up_skip",
            Self::StepUpSkipRefused => "step_up_skip_refused",
            Self::DeviceKeyEnrolled => "device_key_enrolled",
        }
    }
}

/// Record an event, swallowing storage errors after logging them.
pub async fn record(
    pool: &PgPool,
    user_id: Uuid,
    event: AuditEvent,
    client_ip: Option<&str>,
    detail: Option<&str>,
) {
    let result = sqlx::query(
        r"
        INSERT INTO auth_audit (user_id, event, client_ip, detail)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(user_id)
    .bind(event.as_str())
    .bind(client_ip)
    .bind(detail)
    .execute(pool)
    .await;

    if let Err(err) = result {
        error!("failed to record audit event {}: {err}", event.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_stable() {
        assert_eq!(AuditEvent::SignIn.as_str(), "sign_in");
        assert_eq!(AuditEvent::StepUpSkip.as_str(), "step_up_skip");
        assert_eq!(AuditEvent::StepUpSkipRefused.as_str(), "step_up_skip_refused");
    }
}
