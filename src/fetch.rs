use std::sync::LazyLock;
use std::time::Duration;

use derive_builder::Builder;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, warn};

/// Performance page for a single candidate, keyed by encoded id-card number.
pub const PERFORMANCE_URL: &str =
    "https://www.time4education.com/moodle/aimcatresults/aimcat_performance.asp";

/// Pass-through CORS proxy; the percent-encoded target goes in `url`.
pub const PROXY_BASE: &str = "https://api.allorigins.win/raw?url=";

/// Pre-encoded query constants lifted from the site's own links.
pub const DEFAULT_TESTNO: &str = "5E5F5C5D5E5F5C595E5F5C5F5E5F5C5A5E5F5C";
pub const DEFAULT_FL: &str = "5956485E595648";

static NAME_IN_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Name\s*:\s*([A-Z0-9 .\-]+)&nbsp;").unwrap());
static NAME_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Name\s*:\s*([A-Za-z0-9 .\-]+)").unwrap());

/// Fetches a candidate's performance page and pulls the name out of it,
/// retrying transport failures with linear backoff.
#[derive(Debug, Clone, Builder)]
pub struct NameFetcher {
    #[builder(setter(into), default = "PERFORMANCE_URL.to_string()")]
    base_url: String,
    /// Proxy base the target URL is appended to, percent-encoded.
    /// `None` hits the site directly.
    #[builder(default = "Some(PROXY_BASE.to_string())")]
    proxy: Option<String>,
    #[builder(setter(into), default = "DEFAULT_TESTNO.to_string()")]
    testno: String,
    #[builder(setter(into), default = "DEFAULT_FL.to_string()")]
    fl: String,
    #[builder(default = "3")]
    max_attempts: u32,
    #[builder(default = "Duration::from_millis(500)")]
    initial_backoff: Duration,
    #[builder(default = "Duration::from_secs(15)")]
    timeout: Duration,
}

impl NameFetcher {
    /// Target URL for one encoded id, before any proxy wrapping.
    fn target_url(&self, encoded_id: &str) -> String {
        format!(
            "{}?testno={}&idcardno={}&fl={}",
            self.base_url, self.testno, encoded_id, self.fl
        )
    }

    /// URL the request actually goes to.
    fn request_url(&self, encoded_id: &str) -> String {
        let target = self.target_url(encoded_id);
        match &self.proxy {
            Some(base) => format!("{}{}", base, utf8_percent_encode(&target, NON_ALPHANUMERIC)),
            None => target,
        }
    }

    /// Delay inserted after a failed attempt `attempt` (1-based), so the
    /// wait grows linearly with the attempt index.
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * attempt
    }

    /// Fetch the performance page for `encoded_id` and extract the name.
    ///
    /// Non-200 statuses and transport errors are retried until the attempt
    /// budget runs out, then degrade to `None`. A clean 200 that simply
    /// lacks the name is a definitive miss and is never retried.
    pub async fn fetch_name(&self, client: &Client, encoded_id: &str) -> Option<String> {
        let url = self.request_url(encoded_id);
        for attempt in 1..=self.max_attempts {
            match self.attempt(client, &url).await {
                Ok(html) => return extract_name(&html),
                Err(e) => {
                    warn!("attempt {}/{} failed: {e:#}", attempt, self.max_attempts);
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }
        None
    }

    async fn attempt(&self, client: &Client, url: &str) -> anyhow::Result<String> {
        let resp = client.get(url).timeout(self.timeout).send().await?;
        if resp.status() != StatusCode::OK {
            anyhow::bail!("status {}", resp.status());
        }
        Ok(resp.text().await?)
    }
}

/// Two-strategy name extraction: a strict pattern over the marker cell's raw
/// inner HTML, then a looser one over its whitespace-normalized visible text.
/// `None` when the marker cell is missing or neither pattern matches.
pub fn extract_name(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let marker = doc.select(&Selector::parse("th.th-last").unwrap()).next()?;

    let inner = marker.inner_html();
    if let Some(caps) = NAME_IN_MARKUP.captures(&inner) {
        if let Some(name) = non_empty(&caps[1]) {
            return Some(name);
        }
    }

    debug!("marker cell lacks the &nbsp;-terminated field, trying visible text");
    let text = marker.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NAME_IN_TEXT
        .captures(&text)
        .and_then(|caps| non_empty(&caps[1]))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
