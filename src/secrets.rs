// API key handed to the presentation layer through the `get-api-key` capability.

pub const MISSING_KEY: &str = "MISSING_KEY";

#[derive(Clone, Default)]
pub struct KeyStore {
    api_key: Option<String>,
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl KeyStore {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Reads `var` from the process environment (after `.env` was loaded).
    pub fn from_env(var: &str) -> Self {
        Self::new(std::env::var(var).ok())
    }

    pub fn is_present(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or(MISSING_KEY)
    }
}
