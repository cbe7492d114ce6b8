//! Issues RS256 test tokens for the fixed test identities and prints the
//! commands that exercise the authorization filter with them.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use jwt_fixtures::{
    fixture::{self, ClaimProfile, TestPlan, TEST_IDENTITIES},
    key::{KeyPair, MIN_KEY_BITS},
    KeyError, TokenSigner,
};
use tracing::{info, warn, Level};

/// Generate signed JWTs for manually testing an authorization filter.
#[derive(Parser, Debug)]
#[command(name = "jwt-fixtures", version, about)]
struct Cli {
    /// Directory holding jwt-private.pem and jwt-public.pem
    #[arg(long, env = "JWT_FIXTURES_KEYS_DIR", default_value = "jwt-keys")]
    keys_dir: PathBuf,

    /// Directory the jwt_<name>.txt files are written to
    #[arg(long, env = "JWT_FIXTURES_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Generate a fresh key pair even if one already exists
    #[arg(long, env = "JWT_FIXTURES_GENERATE_KEYS")]
    generate_keys: bool,

    /// Modulus size for generated keys
    #[arg(long, env = "JWT_FIXTURES_KEY_BITS", default_value_t = MIN_KEY_BITS)]
    key_bits: usize,

    /// Issued-at time in Unix seconds, defaults to now
    #[arg(long, env = "JWT_FIXTURES_ISSUED_AT")]
    issued_at: Option<i64>,

    /// Token lifetime in seconds
    #[arg(long, env = "JWT_FIXTURES_TTL", default_value_t = fixture::DEFAULT_TTL_SECS)]
    ttl: i64,

    /// Value of the `iss` claim
    #[arg(long, env = "JWT_FIXTURES_ISSUER", default_value = fixture::DEFAULT_ISSUER)]
    issuer: String,

    /// Values of the `aud` claim, repeatable or comma-separated
    #[arg(
        long = "audience",
        env = "JWT_FIXTURES_AUDIENCE",
        value_delimiter = ',',
        default_value = fixture::DEFAULT_AUDIENCE
    )]
    audience: Vec<String>,

    /// Envoy listener port used in the printed commands
    #[arg(
        long,
        env = "JWT_FIXTURES_ENVOY_PORT",
        default_value_t = fixture::DEFAULT_ENVOY_PORT
    )]
    envoy_port: u16,

    /// Request path used in the printed commands
    #[arg(
        long,
        env = "JWT_FIXTURES_PATH",
        default_value = fixture::DEFAULT_PROTECTED_PATH
    )]
    path: String,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn init_tracing(&self) {
        let level = if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    fn key_pair(&self) -> Result<KeyPair> {
        if !self.generate_keys {
            match KeyPair::load_from(&self.keys_dir) {
                Ok(pair) => return Ok(pair),
                Err(KeyError::Missing { path }) => {
                    warn!(path = %path.display(), "No private key found, generating a new pair.");
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("could not load keys from {}", self.keys_dir.display())
                    })
                }
            }
        }

        let pair = KeyPair::generate(self.key_bits).context("could not generate key pair")?;
        pair.write_to(&self.keys_dir)
            .with_context(|| format!("could not save keys to {}", self.keys_dir.display()))?;
        info!(dir = %self.keys_dir.display(), "Saved new key pair.");
        Ok(pair)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();

    let pair = cli.key_pair()?;
    let signer = TokenSigner::new(pair.signing_key()?);
    let profile = ClaimProfile {
        issuer: cli.issuer.clone(),
        audience: cli.audience.clone(),
        ttl: cli.ttl,
    };
    let issued_at = cli
        .issued_at
        .unwrap_or_else(|| chrono::Utc::now().timestamp());

    let issued = fixture::issue_all(&signer, &profile, &TEST_IDENTITIES, issued_at)
        .context("could not sign test tokens")?;

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("could not create {}", cli.out_dir.display()))?;
    for token in &issued {
        let path = token
            .write_to(&cli.out_dir)
            .with_context(|| format!("could not save token for {}", token.identity.name))?;
        println!("{}", token.identity.name);
        println!("   File:     {}", path.display());
        println!("   Pass-key: {}", token.identity.pass_key);
        println!("   JWT:      {}", fixture::preview(&token.token));
        println!();
    }

    let plan = TestPlan {
        envoy_port: cli.envoy_port,
        path: cli.path.clone(),
    };
    println!("Test commands:");
    println!();
    print!("{}", plan.render(&issued));
    Ok(())
}
