use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::webauthn::models::DeviceKey;

pub struct DeviceKeyRepo;

impl DeviceKeyRepo {
    /// Saves a newly enrolled device key.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn create_key(
        pool: &PgPool,
        user_id: Uuid,
        credential_id: &[u8],
        public_key: &[u8],
        label: &str,
        sign_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO device_keys (credential_id, user_id, label, public_key, sign_count)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(credential_id)
        .bind(user_id)
        .bind(label)
        .bind(public_key)
        .bind(sign_count)
        .execute(pool)
        .await
        .context("Failed to insert device key")?;

        Ok(())
    }

    /// Lists all keys for a user.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn list_user_keys(pool: &PgPool, user_id: Uuid) -> Result<Vec<DeviceKey>> {
        sqlx::query_as::<_, DeviceKey>(
            "SELECT * FROM device_keys WHERE user_id = $1 ORDER BY created_at_unix DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list device keys")
    }

    /// Updates the sign count and last-used timestamp after a successful
    /// assertion, to detect cloned authenticators.
    ///
    /// # Errors
    /// Returns error if the database query fails.
    pub async fn update_key_usage(
        pool: &PgPool,
        credential_id: &[u8],
        sign_count: i64,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE device_keys
            SET sign_count = $1, last_used_at_unix = extract(epoch from now())::bigint
            WHERE credential_id = $2
            ",
        )
        .bind(sign_count)
        .bind(credential_id)
        .execute(pool)
        .await
        .context("Failed to update device key usage")?;

        Ok(())
    }
}
