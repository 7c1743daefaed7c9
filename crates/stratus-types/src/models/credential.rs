//! Upstream credential model.

/// One upstream API account. Immutable after startup.
///
/// The identifier is derived from configuration order (`key_1`, `key_2`,
/// ...) and doubles as the ledger key component. Priority equals the
/// configuration index; lower is preferred when usage counts tie.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    pub priority: usize,
}

impl Credential {
    /// Builds the ordered credential pool from configured secrets.
    pub fn pool_from_secrets<I, S>(secrets: I) -> Vec<Credential>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        secrets
            .into_iter()
            .enumerate()
            .map(|(idx, secret)| Credential {
                id: format!("key_{}", idx + 1),
                secret: secret.into(),
                priority: idx,
            })
            .collect()
    }
}

// The secret must never reach logs or error payloads.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .field("priority", &self.priority)
            .finish()
    }
}
