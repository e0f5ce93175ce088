use async_trait::async_trait;
use reqwest::{Request, Response};

/// Anything that can send a request. Lets the paged fetch run against a
/// wrapped or stubbed client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
