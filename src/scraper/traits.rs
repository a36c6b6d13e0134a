use crate::model::{FetchRequest, ScraperError};

#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<String, ScraperError>;
}
