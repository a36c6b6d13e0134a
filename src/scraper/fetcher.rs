use crate::model::{FetchRequest, ScraperError};
use crate::scraper::traits::PageFetcher;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ReleaseImpactBot/0.1";

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ScraperError::HttpError(e.to_string()))?;
        Ok(Self { client })
    }

    /// Chart pages live under `/charts/` of the app page.
    fn charts_url(req: &FetchRequest) -> String {
        let base = req.url.trim_end_matches('/');
        if base.ends_with("/charts") {
            format!("{}/", base)
        } else {
            format!("{}/charts/", base)
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<String, ScraperError> {
        let url = Self::charts_url(req);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScraperError::Timeout
            } else {
                ScraperError::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::InvalidResponse(status.to_string()));
        }

        response
            .text()
            .await
            .map_err(|e| ScraperError::HttpError(e.to_string()))
    }
}
