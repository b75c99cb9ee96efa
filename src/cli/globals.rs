use secrecy::SecretString;

/// Settings shared across CLI actions.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub identity_url: String,
    pub identity_service_key: SecretString,
    pub frontend_url: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(identity_url: String, frontend_url: String) -> Self {
        Self {
            identity_url,
            identity_service_key: SecretString::default(),
            frontend_url,
        }
    }

    pub fn set_service_key(&mut self, key: SecretString) {
        self.identity_service_key = key;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "https://identity.tld".to_string(),
            "https://joms.tld".to_string(),
        );
        assert_eq!(args.identity_url, "https://identity.tld");
        assert_eq!(args.frontend_url, "https://joms.tld");
        assert_eq!(args.identity_service_key.expose_secret(), "");
    }
}
