/// Authentication configuration. Session tokens are issued elsewhere; this
/// service only validates them against `jwt_secret`.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub public_url: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "guildhall-dev-secret-change-me".into(),
            public_url: "http://localhost:8080".into(),
        }
    }
}
