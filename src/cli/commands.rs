//! CLI command definitions

use clap::{Parser, Subcommand};
use playtrace::auth::{ingest, DEFAULT_TTL_SECONDS};

#[derive(Parser)]
#[command(name = "playtrace")]
#[command(about = "Game telemetry backend", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Secret used to sign and verify ingest tokens
    #[arg(long, env = "PLAYTRACE_INGEST_SECRET", global = true, hide_env_values = true)]
    pub ingest_secret: Option<String>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "0.0.0.0:8080", env = "PLAYTRACE_BIND")]
        bind: String,

        /// Lifetime of issued ingest tokens, in seconds
        #[arg(long, env = "PLAYTRACE_INGEST_TTL", default_value_t = DEFAULT_TTL_SECONDS, value_parser = parse_ttl)]
        ttl: u64,

        /// Keep everything in memory instead of Postgres (data is lost on exit)
        #[arg(long)]
        memory: bool,
    },

    /// Issue, inspect or generate ingest token material
    ///
    /// Examples:
    ///   playtrace token secret
    ///   playtrace token issue 3f2a... --ttl 600
    ///   playtrace token verify eyJzaWQiOi...
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Initialize the database schema
    Init,

    /// Show database status and row counts
    Status,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue an ingest token for a session
    Issue {
        /// Session id the token authorizes
        session_id: String,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_TTL_SECONDS, value_parser = parse_ttl)]
        ttl: u64,
    },

    /// Verify an ingest token and print its claims
    Verify {
        /// Token to verify
        token: String,
    },

    /// Generate a random signing secret
    Secret,
}

/// Accept a ttl that yields a representable expiry from now
fn parse_ttl(s: &str) -> Result<u64, String> {
    match s.parse::<u64>() {
        Ok(0) => Err("ttl must be a positive number of seconds".to_string()),
        Ok(ttl) => i64::try_from(ttl)
            .ok()
            .and_then(|t| ingest::unix_now().checked_add(t))
            .map(|_| ttl)
            .ok_or_else(|| format!("ttl of {}s is too large", ttl)),
        Err(e) => Err(format!("Invalid ttl '{}': {}", s, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("600"), Ok(600));
        assert!(parse_ttl("0").is_err());
        assert!(parse_ttl("-5").is_err());
        assert!(parse_ttl("soon").is_err());
    }

    #[test]
    fn test_parse_ttl_rejects_overflowing_expiry() {
        assert!(parse_ttl(&u64::MAX.to_string()).is_err());
        assert!(parse_ttl(&i64::MAX.to_string()).is_err());
        assert!(parse_ttl(&(i64::MAX as u64 + 1).to_string()).is_err());
    }

    #[test]
    fn test_serve_rejects_huge_ttl() {
        let parsed = Cli::try_parse_from(["playtrace", "serve", "--memory", "--ttl", "18446744073709551615"]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["playtrace", "serve", "--memory", "--ttl", "120"]).unwrap();
        match cli.command {
            Commands::Serve { ttl, memory, .. } => {
                assert_eq!(ttl, 120);
                assert!(memory);
            }
            _ => panic!("expected serve"),
        }
    }
}
