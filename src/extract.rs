use anyhow::{Context, Result};
use serde::Deserialize;

use crate::ai::OpenAiClient;

/// Forecast numbers for one movie, in millions of USD. All three fields are
/// required; a response missing one is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Forecast {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl Forecast {
    /// The wire contract overloads all-zero as "movie not discussed in the
    /// article"; only a positive average is worth persisting.
    pub fn mentioned(&self) -> bool {
        self.avg > 0.0
    }
}

/// Instruction sent to the model for one movie. The model is told to reply
/// with the JSON object only; zeros mean the movie is not in the text.
pub fn forecast_prompt(title: &str, article: &str) -> String {
    format!(
        "Extract the first-weekend North American box office forecast for the movie \"{}\" from the text below.\n\
         Respond with ONLY a JSON object: {{\"min\": <number>, \"max\": <number>, \"avg\": <number>}}, values in millions of USD.\n\
         If the movie is not discussed in the text, return all zeros.\n\
         \n\
         Text: {}",
        title, article
    )
}

/// Decode a chat response into a [`Forecast`]. Markdown code fences around
/// the JSON are stripped first; anything that does not decode after that is
/// an error.
pub fn parse_forecast(raw: &str) -> Result<Forecast> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
        .with_context(|| format!("forecast response was not valid JSON: {:?}", raw))
}

/// One extraction round-trip: build the prompt, ask the model, decode.
pub async fn extract_forecast(
    ai: &OpenAiClient,
    article: &str,
    title: &str,
) -> Result<Forecast> {
    let raw = ai.chat(&forecast_prompt(title, article)).await?;
    parse_forecast(&raw)
}
