//! Gate configuration and shared request state.

use std::sync::Arc;
use url::Url;

use crate::gate::stepup::StepUpStore;
use crate::identity::IdentityStore;
use crate::webauthn::DeviceVerifier;

const DEFAULT_REFRESH_THRESHOLD_SECONDS: i64 = 5 * 60;
const DEFAULT_REFRESH_COOKIE_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_CHALLENGE_TTL_SECONDS: u64 = 60;
const DEFAULT_RP_NAME: &str = "JOMS Ordering Portal";

/// Static configuration for the gate.
#[derive(Clone, Debug)]
pub struct GateConfig {
    frontend_base_url: String,
    rp_id: String,
    rp_origin: String,
    rp_name: String,
    refresh_threshold_seconds: i64,
    refresh_cookie_ttl_seconds: i64,
    challenge_ttl_seconds: u64,
    allow_step_up_skip: bool,
    lenient_platforms: Vec<String>,
}

impl GateConfig {
    /// Derive relying-party identity from the frontend base URL so device
    /// verification is bound to the serving domain.
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        let rp_id = Url::parse(&frontend_base_url)
            .ok()
            .and_then(|u: Url| u.host_str().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_string());

        // Ensure origin does not have a trailing slash
        let rp_origin = frontend_base_url.trim_end_matches('/').to_string();

        Self {
            frontend_base_url,
            rp_id,
            rp_origin,
            rp_name: DEFAULT_RP_NAME.to_string(),
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECONDS,
            refresh_cookie_ttl_seconds: DEFAULT_REFRESH_COOKIE_TTL_SECONDS,
            challenge_ttl_seconds: DEFAULT_CHALLENGE_TTL_SECONDS,
            allow_step_up_skip: false,
            lenient_platforms: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_rp_id(mut self, rp_id: String) -> Self {
        self.rp_id = rp_id;
        self
    }

    #[must_use]
    pub fn with_refresh_threshold_seconds(mut self, seconds: i64) -> Self {
        self.refresh_threshold_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_cookie_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_cookie_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl_seconds(mut self, seconds: u64) -> Self {
        self.challenge_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_allow_step_up_skip(mut self, allow: bool) -> Self {
        self.allow_step_up_skip = allow;
        self
    }

    #[must_use]
    pub fn with_lenient_platforms(mut self, platforms: Vec<String>) -> Self {
        self.lenient_platforms = platforms;
        self
    }

    #[must_use]
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    #[must_use]
    pub fn rp_origin(&self) -> &str {
        &self.rp_origin
    }

    #[must_use]
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn refresh_threshold_seconds(&self) -> i64 {
        self.refresh_threshold_seconds
    }

    #[must_use]
    pub fn refresh_cookie_ttl_seconds(&self) -> i64 {
        self.refresh_cookie_ttl_seconds
    }

    #[must_use]
    pub fn challenge_ttl_seconds(&self) -> u64 {
        self.challenge_ttl_seconds
    }

    #[must_use]
    pub fn allow_step_up_skip(&self) -> bool {
        self.allow_step_up_skip
    }

    /// Whether a client-declared platform is on the operator-configured
    /// lenient list. Declared platform identity is advisory; only this
    /// allow-list decides whether the lenient ceremony is ever offered.
    #[must_use]
    pub fn platform_is_lenient(&self, platform: &str) -> bool {
        let platform = platform.trim().to_lowercase();
        self.lenient_platforms
            .iter()
            .any(|candidate| candidate.trim().to_lowercase() == platform)
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

/// Everything the per-request pipeline needs, shared via an `Extension`.
pub struct GateState {
    config: GateConfig,
    store: Arc<dyn IdentityStore>,
    step_up: Arc<dyn StepUpStore>,
    verifier: Arc<DeviceVerifier>,
}

impl GateState {
    pub fn new(
        config: GateConfig,
        store: Arc<dyn IdentityStore>,
        step_up: Arc<dyn StepUpStore>,
        verifier: Arc<DeviceVerifier>,
    ) -> Self {
        Self {
            config,
            store,
            step_up,
            verifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    #[must_use]
    pub fn step_up(&self) -> &Arc<dyn StepUpStore> {
        &self.step_up
    }

    #[must_use]
    pub fn verifier(&self) -> &Arc<DeviceVerifier> {
        &self.verifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_config_derives_relying_party() {
        let config = GateConfig::new("https://joms.scgdress.shop/".to_string());
        assert_eq!(config.rp_id(), "joms.scgdress.shop");
        assert_eq!(config.rp_origin(), "https://joms.scgdress.shop");
        assert!(config.cookie_secure());
    }

    #[test]
    fn gate_config_defaults_and_overrides() {
        let config = GateConfig::new("http://localhost:5173".to_string());
        assert_eq!(
            config.refresh_threshold_seconds(),
            DEFAULT_REFRESH_THRESHOLD_SECONDS
        );
        assert_eq!(config.challenge_ttl_seconds(), DEFAULT_CHALLENGE_TTL_SECONDS);
        assert!(!config.allow_step_up_skip());
        assert!(!config.cookie_secure());

        let config = config
            .with_refresh_threshold_seconds(60)
            .with_challenge_ttl_seconds(10)
            .with_allow_step_up_skip(true)
            .with_rp_id("joms.test".to_string());
        assert_eq!(config.refresh_threshold_seconds(), 60);
        assert_eq!(config.challenge_ttl_seconds(), 10);
        assert!(config.allow_step_up_skip());
        assert_eq!(config.rp_id(), "joms.test");
    }

    #[test]
    fn lenient_platform_matching_is_case_insensitive() {
        let config = GateConfig::new("http://localhost".to_string())
            .with_lenient_platforms(vec!["android".to_string()]);
        assert!(config.platform_is_lenient("Android"));
        assert!(config.platform_is_lenient(" android "));
        assert!(!config.platform_is_lenient("ios"));
        assert!(!config.platform_is_lenient(""));
    }
}
