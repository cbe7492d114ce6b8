//! Fixed test identities and the files and shell commands produced for them.
//!
//! Each identity carries a pass-key that the authorization filter expects
//! alongside the bearer token. The pass-key is only reported next to the
//! token; it is not embedded in any claim.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{Claims, TokenError, TokenSigner};

/// A test user the authorization filter knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestIdentity {
    /// Short name used for the token file, `jwt_<name>.txt`.
    pub name: &'static str,
    pub pass_key: &'static str,
    /// Used for both `sub` and `username`.
    pub subject: &'static str,
    pub client_id: &'static str,
    pub scope: &'static str,
    pub roles: &'static str,
}

pub const TEST_IDENTITIES: [TestIdentity; 3] = [
    TestIdentity {
        name: "user2",
        pass_key: "test_api_key_456",
        subject: "user2",
        client_id: "client_002",
        scope: "read write",
        roles: "user",
    },
    TestIdentity {
        name: "admin",
        pass_key: "test_api_key_789",
        subject: "admin_user",
        client_id: "client_003",
        scope: "read write admin",
        roles: "admin,user",
    },
    TestIdentity {
        name: "user1",
        pass_key: "dEuX2RiyzqEpsun7QiKtsx8Gpdxxn9yvCDfBPaE8Gud2IZ2x",
        subject: "user1",
        client_id: "BYTYBnuQqM6H4Haijasxkaxgkgig1pPuI7BwDnB8nXNA6YTy6",
        scope: "read write transactions",
        roles: "user,premium",
    },
];

pub const DEFAULT_ISSUER: &str = "https://auth.oxymoney.com";
pub const DEFAULT_AUDIENCE: &str = "api.oxymoney.com";
pub const DEFAULT_TTL_SECS: i64 = 3600;

/// Claims shared by every issued token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimProfile {
    pub issuer: String,
    pub audience: Vec<String>,
    /// Seconds between `iat` and `exp`.
    pub ttl: i64,
}

impl Default for ClaimProfile {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_owned(),
            audience: vec![DEFAULT_AUDIENCE.to_owned()],
            ttl: DEFAULT_TTL_SECS,
        }
    }
}

impl ClaimProfile {
    /// Builds the claim set for `identity`, valid from `issued_at` (Unix
    /// seconds) for `ttl` seconds. Fails when `exp` would not fit in an i64.
    pub fn claims_for(
        &self,
        identity: &TestIdentity,
        issued_at: i64,
    ) -> Result<Claims, TokenError> {
        let expires_at = issued_at
            .checked_add(self.ttl)
            .ok_or(TokenError::ExpiryOverflow {
                issued_at,
                ttl: self.ttl,
            })?;
        Ok(Claims::new()
            .with("iss", self.issuer.as_str())
            .with("sub", identity.subject)
            .with("aud", self.audience.clone())
            .with("exp", expires_at)
            .with("nbf", issued_at)
            .with("iat", issued_at)
            .with("client_id", identity.client_id)
            .with("username", identity.subject)
            .with("scope", identity.scope)
            .with("roles", identity.roles))
    }
}

/// A signed token for one test identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub identity: TestIdentity,
    pub token: String,
}

impl IssuedToken {
    pub fn file_name(&self) -> String {
        token_file_name(&self.identity)
    }

    /// Writes the bare token to `dir/jwt_<name>.txt` and returns the path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> std::io::Result<PathBuf> {
        let path = dir.as_ref().join(self.file_name());
        fs::write(&path, &self.token)?;
        debug!(identity = self.identity.name, path = %path.display(), "Saved token.");
        Ok(path)
    }
}

fn token_file_name(identity: &TestIdentity) -> String {
    format!("jwt_{}.txt", identity.name)
}

/// Signs a token for every identity, stopping at the first failure.
pub fn issue_all(
    signer: &TokenSigner,
    profile: &ClaimProfile,
    identities: &[TestIdentity],
    issued_at: i64,
) -> Result<Vec<IssuedToken>, TokenError> {
    identities
        .iter()
        .map(|identity| -> Result<IssuedToken, TokenError> {
            let token = signer.sign(&profile.claims_for(identity, issued_at)?)?;
            info!(identity = identity.name, issued_at, "Issued token.");
            Ok(IssuedToken {
                identity: *identity,
                token,
            })
        })
        .collect()
}

/// Shortens a token for display, keeping its first and last 50 characters.
pub fn preview(token: &str) -> String {
    const EDGE: usize = 50;
    if token.len() <= EDGE * 2 + 3 {
        return token.to_owned();
    }
    format!("{}...{}", &token[..EDGE], &token[token.len() - EDGE..])
}

pub const DEFAULT_ENVOY_PORT: u16 = 10000;
pub const DEFAULT_PROTECTED_PATH: &str = "/api/protected";

/// Where the manual test requests are sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestPlan {
    pub envoy_port: u16,
    pub path: String,
}

impl Default for TestPlan {
    fn default() -> Self {
        Self {
            envoy_port: DEFAULT_ENVOY_PORT,
            path: DEFAULT_PROTECTED_PATH.to_owned(),
        }
    }
}

impl TestPlan {
    /// Renders the `kubectl`/`curl` commands that exercise the filter with
    /// each token file, run from the directory holding the files.
    pub fn render(&self, tokens: &[IssuedToken]) -> String {
        let mut out = String::new();
        out.push_str("# Get Envoy IP\n");
        out.push_str(
            "ENVOY_IP=$(kubectl get pod -n kube-system -l k8s-app=cilium-envoy \
             -o jsonpath='{.items[0].status.podIP}')\n",
        );
        for issued in tokens {
            out.push_str(&format!(
                "\n# Test with {name}\n\
                 kubectl exec test-client -- curl -v \\\n  \
                 -H 'pass_key: {pass_key}' \\\n  \
                 -H \"Authorization: Bearer $(cat {file})\" \\\n  \
                 http://$ENVOY_IP:{port}{path}\n",
                name = issued.identity.name,
                pass_key = issued.identity.pass_key,
                file = issued.file_name(),
                port = self.envoy_port,
                path = self.path,
            ));
        }
        out
    }
}
