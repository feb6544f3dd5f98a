//! Per-session credentials

use crate::config::{IdentityConfig, IdentityMode};
use rand::Rng;

/// Credentials owned by one virtual user.
///
/// `email` and `password` never change after construction; only
/// `registered` flips, and only from `false` to `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    name: String,
    email: String,
    password: String,
    registered: bool,
}

impl SessionIdentity {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            registered: false,
        }
    }

    /// Build an identity according to the configured mode
    pub fn generate<R: Rng + ?Sized>(config: &IdentityConfig, rng: &mut R) -> Self {
        let email = match config.mode {
            IdentityMode::Fixed => config.fixed_email.clone(),
            IdentityMode::Unique => unique_email(rng.random_range(1..=config.email_id_max)),
        };
        Self::new(config.name.clone(), email, config.password.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub(crate) fn mark_registered(&mut self) {
        self.registered = true;
    }
}

pub fn unique_email(id: u32) -> String {
    format!("user_{}@example.com", id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_fixed_identity_uses_shared_email() {
        let config = IdentityConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let a = SessionIdentity::generate(&config, &mut rng);
        let b = SessionIdentity::generate(&config, &mut rng);
        assert_eq!(a.email(), "user_test@example.com");
        assert_eq!(a.email(), b.email());
        assert_eq!(a.password(), "password123");
        assert!(!a.is_registered());
    }

    #[test]
    fn test_unique_identity_shape_and_bound() {
        let config = IdentityConfig {
            mode: IdentityMode::Unique,
            email_id_max: 50,
            ..Default::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..500 {
            let identity = SessionIdentity::generate(&config, &mut rng);
            let id: u32 = identity
                .email()
                .strip_prefix("user_")
                .and_then(|rest| rest.strip_suffix("@example.com"))
                .and_then(|n| n.parse().ok())
                .expect("email should be user_<n>@example.com");
            assert!((1..=50).contains(&id));
        }
    }

    #[test]
    fn test_registered_is_sticky() {
        let mut identity = SessionIdentity::new("Test User", "a@x.com", "p");
        identity.mark_registered();
        identity.mark_registered();
        assert!(identity.is_registered());
    }
}
