//! Rendered-page fetching.
//!
//! Result pages are JS-driven, so raw HTTP GETs return an empty shell. Pages
//! are rendered through a browserless-style service: `/content` returns the
//! DOM after initial render, `/function` runs a small script that keeps
//! pressing the "load more" button before dumping the DOM (used on an alert's
//! first scrape to capture existing inventory).

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("render request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("render service error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("render timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability interface the scrape runner depends on. One call, one rendered
/// page; the render session lives server-side and ends with the request, so
/// there is no handle to release on the client.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the fully-rendered HTML for `url`. When `exhaustive` is set the
    /// renderer paginates ("load more") until the result list is exhausted
    /// before returning.
    async fn render(&self, url: &str, exhaustive: bool) -> Result<String, FetchError>;
}

// Script run by the render service for exhaustive pagination. Clicks the
// "load more" control with a fixed pause until it disappears, then returns
// the DOM.
const LOAD_MORE_SCRIPT: &str = r#"
export default async function ({ page, context }) {
  await page.goto(context.url, { waitUntil: 'networkidle2' });
  const selector = 'button ::-p-text(Show more results)';
  for (;;) {
    const button = await page.$(selector).catch(() => null);
    if (!button) break;
    await button.click().catch(() => {});
    await new Promise((resolve) => setTimeout(resolve, 2500));
  }
  return { data: await page.content(), type: 'text/html' };
}
"#;

pub struct BrowserlessFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    async fn post_render(&self, path: &str, body: serde_json::Value) -> Result<String, FetchError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn render(&self, url: &str, exhaustive: bool) -> Result<String, FetchError> {
        let fut = if exhaustive {
            self.post_render(
                "function",
                json!({ "code": LOAD_MORE_SCRIPT, "context": { "url": url } }),
            )
        } else {
            self.post_render("content", json!({ "url": url }))
        };

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}
