//! Bearer-token acquisition.
//!
//! The rest of the crate only ever sees an opaque token string. Tokens come from a chain of
//! credential sources tried in order (service principal from the environment, managed
//! identity, then the Azure CLI login), cached per scope until shortly before expiry.
//!
//! Inference and evaluation each own a separate chain wrapped in a distinct type, so a client
//! built for one scope cannot be handed the other's credential.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rai_core::error::{codes, AppError};
use tracing::debug;

pub mod providers;

pub use providers::{AzureCliCredential, ClientSecretCredential, ManagedIdentityCredential};

pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Refresh this long before the reported expiry.
const EXPIRY_MARGIN_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Unix seconds.
    pub expires_on: u64,
}

impl AccessToken {
    pub fn is_fresh(&self, now: u64) -> bool {
        self.expires_on > now + EXPIRY_MARGIN_SECS
    }
}

pub trait TokenCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, AppError>;
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// `https://x/.default` -> `https://x` (the v1 "resource" form some endpoints want).
pub(crate) fn scope_to_resource(scope: &str) -> &str {
    scope.trim_end_matches("/.default")
}

pub struct ChainedTokenCredential {
    sources: Vec<(&'static str, Box<dyn TokenCredential>)>,
    cache: Mutex<BTreeMap<String, AccessToken>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<(&'static str, Box<dyn TokenCredential>)>) -> Self {
        Self {
            sources,
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    /// Environment service principal (when configured), managed identity, Azure CLI.
    pub fn default_chain<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources: Vec<(&'static str, Box<dyn TokenCredential>)> = Vec::new();
        if let Some(sp) = ClientSecretCredential::from_lookup(&lookup) {
            sources.push(("environment", Box::new(sp)));
        }
        sources.push((
            "managed_identity",
            Box::new(ManagedIdentityCredential::from_lookup(&lookup)),
        ));
        sources.push(("azure_cli", Box::new(AzureCliCredential::new())));
        Self::new(sources)
    }
}

impl TokenCredential for ChainedTokenCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let now = unix_now();
        {
            let cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(t) = cache.get(scope) {
                if t.is_fresh(now) {
                    return Ok(t.clone());
                }
            }
        }

        let mut attempts: Vec<String> = Vec::new();
        for (name, source) in self.sources.iter() {
            match source.get_token(scope) {
                Ok(token) => {
                    debug!(credential = name, scope, "acquired token");
                    let mut cache = self.cache.lock().unwrap_or_else(|p| p.into_inner());
                    cache.insert(scope.to_string(), token.clone());
                    return Ok(token);
                }
                Err(e) => attempts.push(format!("{name}: {e}")),
            }
        }

        Err(AppError::new(
            codes::AUTH_TOKEN_FAILED,
            "Failed to acquire a token. Ensure you're authenticated via 'az login' or have valid Entra ID credentials",
        )
        .with_details(format!("scope={scope}; attempts=[{}]", attempts.join("; "))))
    }
}

/// Credential for the chat/inference resource.
pub struct InferenceCredential(Box<dyn TokenCredential>);

impl InferenceCredential {
    pub fn new(inner: impl TokenCredential + 'static) -> Self {
        Self(Box::new(inner))
    }

    pub fn bearer(&self) -> Result<String, AppError> {
        self.0.get_token(COGNITIVE_SERVICES_SCOPE).map(|t| t.token)
    }
}

/// Credential for the evaluation resource (judge model and safety service).
pub struct EvaluationCredential(Box<dyn TokenCredential>);

impl EvaluationCredential {
    pub fn new(inner: impl TokenCredential + 'static) -> Self {
        Self(Box::new(inner))
    }

    pub fn bearer(&self, scope: &str) -> Result<String, AppError> {
        self.0.get_token(scope).map(|t| t.token)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct Fixed {
        token: Option<&'static str>,
        calls: Rc<Cell<u32>>,
        expires_on: u64,
    }

    impl TokenCredential for Fixed {
        fn get_token(&self, _scope: &str) -> Result<AccessToken, AppError> {
            self.calls.set(self.calls.get() + 1);
            match self.token {
                Some(t) => Ok(AccessToken {
                    token: t.to_string(),
                    expires_on: self.expires_on,
                }),
                None => Err(AppError::new(codes::AUTH_TOKEN_FAILED, "unavailable")),
            }
        }
    }

    fn fixed(token: Option<&'static str>, expires_on: u64) -> (Box<dyn TokenCredential>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        (
            Box::new(Fixed {
                token,
                calls: calls.clone(),
                expires_on,
            }),
            calls,
        )
    }

    #[test]
    fn chain_falls_through_to_first_working_source() {
        let (a, a_calls) = fixed(None, 0);
        let (b, b_calls) = fixed(Some("tok-b"), unix_now() + 3600);
        let chain = ChainedTokenCredential::new(vec![("a", a), ("b", b)]);

        let tok = chain.get_token(COGNITIVE_SERVICES_SCOPE).expect("token");
        assert_eq!(tok.token, "tok-b");
        assert_eq!(a_calls.get(), 1);
        assert_eq!(b_calls.get(), 1);

        // Cached on the second call.
        chain.get_token(COGNITIVE_SERVICES_SCOPE).expect("token");
        assert_eq!(b_calls.get(), 1);
    }

    #[test]
    fn near_expiry_tokens_are_refreshed() {
        let (a, calls) = fixed(Some("short"), unix_now() + 10);
        let chain = ChainedTokenCredential::new(vec![("a", a)]);
        chain.get_token(MANAGEMENT_SCOPE).expect("token");
        chain.get_token(MANAGEMENT_SCOPE).expect("token");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn exhausted_chain_reports_every_attempt() {
        let (a, _) = fixed(None, 0);
        let (b, _) = fixed(None, 0);
        let chain = ChainedTokenCredential::new(vec![("first", a), ("second", b)]);
        let err = chain.get_token(COGNITIVE_SERVICES_SCOPE).expect_err("no token");
        assert_eq!(err.code, codes::AUTH_TOKEN_FAILED);
        assert!(err.message.contains("az login"));
        let details = err.details.unwrap_or_default();
        assert!(details.contains("first:"));
        assert!(details.contains("second:"));
    }

    #[test]
    fn scoped_wrappers_use_their_own_chain() {
        let (inf, inf_calls) = fixed(Some("inference"), unix_now() + 3600);
        let (ev, ev_calls) = fixed(Some("evaluation"), unix_now() + 3600);
        let inference = InferenceCredential(inf);
        let evaluation = EvaluationCredential(ev);

        assert_eq!(inference.bearer().expect("tok"), "inference");
        assert_eq!(evaluation.bearer(MANAGEMENT_SCOPE).expect("tok"), "evaluation");
        assert_eq!(inf_calls.get(), 1);
        assert_eq!(ev_calls.get(), 1);
    }

    #[test]
    fn resource_form_strips_default_suffix() {
        assert_eq!(
            scope_to_resource(COGNITIVE_SERVICES_SCOPE),
            "https://cognitiveservices.azure.com"
        );
    }
}
