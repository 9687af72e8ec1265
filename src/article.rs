use std::time::Duration;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use tracing::{info, warn};

const USER_AGENT: &str = "Mozilla/5.0";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Character budget for article text used in prompts. Truncation may split a
/// sentence; that is accepted.
pub const MAX_ARTICLE_CHARS: usize = 8000;

/// Fetch the target article and return its paragraph text. Any transport or
/// parse failure is logged here and surfaces as `None`; so does a page with
/// no paragraph content. The caller treats `None` as "nothing to process".
pub async fn fetch_article(url: &str) -> Option<String> {
    match fetch_body(url).await {
        Ok(body) => {
            let text = paragraph_text(&body);
            if text.is_empty() {
                warn!(%url, "article has no paragraph text");
                None
            } else {
                info!(chars = text.chars().count(), %url, "fetched article");
                Some(text)
            }
        }
        Err(e) => {
            warn!(error = %e, %url, "article fetch failed");
            None
        }
    }
}

async fn fetch_body(url: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let body = client
        .get(url)
        .send()
        .await
        .context("request failed")?
        .text()
        .await
        .context("failed to read response body")?;
    Ok(body)
}

/// Text of every `<p>` element in document order, joined with newlines and
/// truncated to the first [`MAX_ARTICLE_CHARS`] characters.
pub fn paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let p = Selector::parse("p").unwrap();
    let joined = document
        .select(&p)
        .map(|el| el.text().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");
    joined.chars().take(MAX_ARTICLE_CHARS).collect()
}
