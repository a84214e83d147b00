// Service identity baked in at build time

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `name/version`, sent as the User-Agent on outbound requests.
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
