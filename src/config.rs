use anyhow::{bail, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const REQUIRED: [&str; 4] = ["SUPABASE_URL", "SUPABASE_KEY", "OPENAI_API_KEY", "TARGET_URL"];

/// Everything the pipeline needs, resolved once at startup. Components take
/// values from here instead of reading the process environment themselves.
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_key: String,
    pub openai_api_key: String,
    pub target_url: String,
    pub openai_model: String,
}

impl Config {
    /// Read all required variables, reporting every missing or empty name in
    /// one error. Runs before any network or database activity.
    pub fn from_env() -> Result<Config> {
        let missing: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .filter(|name| {
                std::env::var(name)
                    .map(|v| v.trim().is_empty())
                    .unwrap_or(true)
            })
            .collect();
        if !missing.is_empty() {
            bail!("missing required environment variables: {}", missing.join(", "));
        }

        Ok(Config {
            supabase_url: std::env::var("SUPABASE_URL")?,
            supabase_key: std::env::var("SUPABASE_KEY")?,
            openai_api_key: std::env::var("OPENAI_API_KEY")?,
            target_url: std::env::var("TARGET_URL")?,
            openai_model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}
