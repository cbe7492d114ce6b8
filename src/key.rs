use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::{
    pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding},
    pkcs8::{DecodePrivateKey, EncodePublicKey},
    rand_core::OsRng,
    RsaPrivateKey,
};
use thiserror::Error;
use tracing::debug;

use crate::TokenError;

/// File name of the PEM-encoded private key inside a key directory.
pub const PRIVATE_KEY_FILE: &str = "jwt-private.pem";
/// File name of the PEM-encoded public key inside a key directory.
pub const PUBLIC_KEY_FILE: &str = "jwt-public.pem";

/// Smallest modulus accepted for generated keys.
pub const MIN_KEY_BITS: usize = 2048;

/// An RSA private key used to produce RS256 signatures.
#[derive(Clone)]
pub struct SigningKey {
    pub(crate) inner: EncodingKey,
}

impl SigningKey {
    /// Accepts a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let inner = EncodingKey::from_rsa_pem(pem).map_err(TokenError::Signing)?;
        Ok(Self { inner })
    }

    pub fn from_rsa(key: &RsaPrivateKey) -> Result<Self, KeyError> {
        let der = key.to_pkcs1_der()?;
        Ok(Self {
            inner: EncodingKey::from_rsa_der(der.as_bytes()),
        })
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey").finish_non_exhaustive()
    }
}

/// An RSA public key used to check RS256 signatures.
#[derive(Clone)]
pub struct VerifyingKey {
    pub(crate) inner: DecodingKey,
}

impl VerifyingKey {
    /// Accepts an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM.
    pub fn from_pem(pem: &[u8]) -> Result<Self, TokenError> {
        let inner = DecodingKey::from_rsa_pem(pem).map_err(TokenError::Verification)?;
        Ok(Self { inner })
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey").finish_non_exhaustive()
    }
}

/// A generated or loaded RSA key pair, stored on disk as
/// `jwt-private.pem` (PKCS#1) and `jwt-public.pem` (SPKI).
#[derive(Clone)]
pub struct KeyPair {
    private: RsaPrivateKey,
}

impl KeyPair {
    /// Generates a fresh key pair with public exponent 65537.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        if bits < MIN_KEY_BITS {
            return Err(KeyError::TooSmall { bits });
        }
        debug!(bits, "Generating RSA key pair.");
        let private = RsaPrivateKey::new(&mut OsRng, bits)?;
        Ok(Self { private })
    }

    /// Reads `jwt-private.pem` from `dir`.
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = dir.as_ref().join(PRIVATE_KEY_FILE);
        let pem = match fs::read_to_string(&path) {
            Ok(pem) => pem,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(KeyError::Missing { path })
            }
            Err(source) => return Err(KeyError::Io { path, source }),
        };
        debug!(path = %path.display(), "Loading RSA private key.");

        let private = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(&pem)?
        } else {
            RsaPrivateKey::from_pkcs8_pem(&pem)?
        };
        Ok(Self { private })
    }

    /// Writes both PEM files into `dir`, creating it when needed and
    /// overwriting existing files.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<(), KeyError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| KeyError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let private_pem = self.private.to_pkcs1_pem(LineEnding::LF)?;
        let public_pem = self
            .private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)?;

        for (name, contents) in [
            (PRIVATE_KEY_FILE, private_pem.as_str()),
            (PUBLIC_KEY_FILE, public_pem.as_str()),
        ] {
            let path = dir.join(name);
            fs::write(&path, contents).map_err(|source| KeyError::Io {
                path: path.clone(),
                source,
            })?;
            debug!(path = %path.display(), "Wrote key file.");
        }
        Ok(())
    }

    pub fn signing_key(&self) -> Result<SigningKey, KeyError> {
        SigningKey::from_rsa(&self.private)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        let der = self.private.to_public_key().to_pkcs1_der()?;
        Ok(VerifyingKey {
            inner: DecodingKey::from_rsa_der(der.as_bytes()),
        })
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair").finish_non_exhaustive()
    }
}

/// An error generating, loading or storing a key pair.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The requested modulus is below [`MIN_KEY_BITS`].
    #[error(
        "refusing to generate a {bits}-bit key, at least {min} bits are required",
        min = MIN_KEY_BITS
    )]
    TooSmall { bits: usize },

    /// Key generation failed.
    #[error("could not generate RSA key: {0}")]
    Generate(#[from] rsa::Error),

    /// A PKCS#1 key could not be encoded or decoded.
    #[error("invalid PKCS#1 key: {0}")]
    Pkcs1(#[from] rsa::pkcs1::Error),

    /// A PKCS#8 private key could not be decoded.
    #[error("invalid PKCS#8 key: {0}")]
    Pkcs8(#[from] rsa::pkcs8::Error),

    /// The public key could not be encoded as SPKI.
    #[error("could not encode public key: {0}")]
    Spki(#[from] rsa::pkcs8::spki::Error),

    /// No private key exists at the expected location.
    #[error("no private key found at {}", path.display())]
    Missing { path: PathBuf },

    #[error("could not access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
