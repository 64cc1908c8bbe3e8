use std::process::Command;
use std::time::Duration;

use rai_core::error::{codes, AppError};
use serde::Deserialize;

use super::{scope_to_resource, unix_now, AccessToken, TokenCredential};

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);
const IMDS_TIMEOUT: Duration = Duration::from_secs(2);
const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

fn token_error(message: &str, details: impl Into<String>) -> AppError {
    AppError::new(codes::AUTH_TOKEN_FAILED, message).with_details(details)
}

/// Some token endpoints send `expires_on` as a string, others as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Epoch {
    Num(u64),
    Text(String),
}

impl Epoch {
    fn seconds(&self) -> Option<u64> {
        match self {
            Epoch::Num(n) => Some(*n),
            Epoch::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Service principal from `AZURE_TENANT_ID` / `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET`.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
}

impl ClientSecretCredential {
    /// `None` unless all three variables are set.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());
        Some(Self {
            authority: get("AZURE_AUTHORITY_HOST").unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
            tenant_id: get("AZURE_TENANT_ID")?,
            client_id: get("AZURE_CLIENT_ID")?,
            client_secret: get("AZURE_CLIENT_SECRET")?,
        })
    }
}

impl TokenCredential for ClientSecretCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        );
        let resp = ureq::post(&url).timeout(TOKEN_TIMEOUT).send_form(&[
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ]);
        match resp {
            Ok(r) => {
                let v: OAuthTokenResponse = r.into_json().map_err(|e| {
                    token_error("Failed to decode token response", e.to_string())
                })?;
                Ok(AccessToken {
                    token: v.access_token,
                    expires_on: unix_now() + v.expires_in,
                })
            }
            Err(ureq::Error::Status(status, _)) => Err(token_error(
                "Service principal token request was rejected",
                format!("status={status}"),
            )),
            Err(e) => Err(token_error("Failed to reach the token endpoint", e.to_string())),
        }
    }
}

/// Managed identity via the App Service identity endpoint or the VM metadata service.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    identity_endpoint: Option<(String, String)>,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityResponse {
    access_token: String,
    expires_on: Epoch,
}

impl ManagedIdentityCredential {
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let identity_endpoint = match (lookup("IDENTITY_ENDPOINT"), lookup("IDENTITY_HEADER")) {
            (Some(e), Some(h)) if !e.is_empty() && !h.is_empty() => Some((e, h)),
            _ => None,
        };
        Self {
            identity_endpoint,
            client_id: lookup("AZURE_CLIENT_ID").filter(|v| !v.is_empty()),
        }
    }
}

impl TokenCredential for ManagedIdentityCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let resource = scope_to_resource(scope);
        let mut req = match &self.identity_endpoint {
            Some((endpoint, header)) => ureq::get(endpoint)
                .timeout(TOKEN_TIMEOUT)
                .set("X-IDENTITY-HEADER", header)
                .query("api-version", "2019-08-01"),
            None => ureq::get(IMDS_TOKEN_URL)
                .timeout(IMDS_TIMEOUT)
                .set("Metadata", "true")
                .query("api-version", "2018-02-01"),
        }
        .query("resource", resource);
        if let Some(id) = self.client_id.as_deref() {
            req = req.query("client_id", id);
        }

        match req.call() {
            Ok(r) => {
                let v: ManagedIdentityResponse = r.into_json().map_err(|e| {
                    token_error("Failed to decode managed identity response", e.to_string())
                })?;
                let expires_on = v.expires_on.seconds().ok_or_else(|| {
                    token_error("Managed identity response has no usable expiry", "")
                })?;
                Ok(AccessToken {
                    token: v.access_token,
                    expires_on,
                })
            }
            Err(ureq::Error::Status(status, _)) => Err(token_error(
                "Managed identity token request was rejected",
                format!("status={status}"),
            )),
            Err(e) => Err(token_error("Managed identity is not available", e.to_string())),
        }
    }
}

/// Token from the signed-in Azure CLI (`az login`).
#[derive(Debug, Clone, Default)]
pub struct AzureCliCredential;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    #[serde(default, rename = "expires_on")]
    expires_on: Option<Epoch>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self
    }
}

impl TokenCredential for AzureCliCredential {
    fn get_token(&self, scope: &str) -> Result<AccessToken, AppError> {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        let output = Command::new(program)
            .args([
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                scope_to_resource(scope),
            ])
            .output()
            .map_err(|e| token_error("Azure CLI is not installed or not on PATH", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(token_error(
                "Azure CLI could not provide a token; run 'az login'",
                stderr.trim().to_string(),
            ));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, AppError> {
    let v: CliTokenResponse = serde_json::from_slice(stdout)
        .map_err(|e| token_error("Failed to decode Azure CLI token output", e.to_string()))?;
    // Older CLI builds only print a local-time `expiresOn`; assume the usual one-hour lifetime.
    let expires_on = v
        .expires_on
        .as_ref()
        .and_then(Epoch::seconds)
        .unwrap_or_else(|| unix_now() + 3600);
    Ok(AccessToken {
        token: v.access_token,
        expires_on,
    })
}
