//! Anime Service client

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use crate::error::ClientError;

/// Client configuration
#[derive(Clone)]
pub struct AnimeClientConfig {
    /// Base URL of the anime service, e.g. `http://localhost:8080`
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AnimeClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimeClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Anime record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anime {
    pub id: i64,
    pub name: String,
}

/// One page of results
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub number: i64,
    pub size: i64,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

/// Anime Service API client
pub struct AnimeClient {
    config: AnimeClientConfig,
    base_url: Url,
    client: Client,
}

impl AnimeClient {
    /// Create a new client
    pub fn new(config: AnimeClientConfig) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(&config.base_url)?;
        // Relative joins replace the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder().build()?;

        info!("Created anime client for {}", base_url);

        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.config.username, Some(&self.config.password))
    }

    /// Turn a non-success response into an error
    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            StatusCode::FORBIDDEN => Err(ClientError::Forbidden),
            status => {
                let text = response.text().await.unwrap_or_default();
                // Error bodies carry a "message" field; fall back to the raw text
                let message = serde_json::from_str::<Value>(&text)
                    .ok()
                    .and_then(|body| body.get("message")?.as_str().map(str::to_string))
                    .unwrap_or(text);

                if status == StatusCode::BAD_REQUEST {
                    Err(ClientError::BadRequest(message))
                } else {
                    Err(ClientError::Unexpected {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!("GET {}", url);
        let response = self.authorized(self.client.get(url)).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// GET /animes
    pub async fn list(&self, page: i64, size: i64) -> Result<Page<Anime>, ClientError> {
        let mut url = self.url("animes")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        self.get_json(url).await
    }

    /// GET /animes/all
    pub async fn list_all(&self) -> Result<Vec<Anime>, ClientError> {
        self.get_json(self.url("animes/all")?).await
    }

    /// GET /animes/{id}
    pub async fn get(&self, id: i64) -> Result<Anime, ClientError> {
        self.get_json(self.url(&format!("animes/{}", id))?).await
    }

    /// GET /animes/find?name=
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<Anime>, ClientError> {
        let mut url = self.url("animes/find")?;
        url.query_pairs_mut().append_pair("name", name);
        self.get_json(url).await
    }

    /// POST /animes
    pub async fn create(&self, name: &str) -> Result<Anime, ClientError> {
        let url = self.url("animes")?;
        debug!("POST {}", url);

        let response = self
            .authorized(self.client.post(url))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// PUT /animes
    pub async fn replace(&self, anime: &Anime) -> Result<(), ClientError> {
        let url = self.url("animes")?;
        debug!("PUT {}", url);

        let response = self
            .authorized(self.client.put(url))
            .json(anime)
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    /// DELETE /animes/{id}
    pub async fn delete(&self, id: i64) -> Result<(), ClientError> {
        let url = self.url(&format!("animes/{}", id))?;
        debug!("DELETE {}", url);

        let response = self.authorized(self.client.delete(url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Check if the service reports itself up
    pub async fn health(&self) -> Result<bool, ClientError> {
        let url = self.url("actuator/health")?;
        let response = self.client.get(url).send().await?;

        if response.status() == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(false);
        }

        let health: HealthResponse = Self::check(response).await?.json().await?;
        Ok(health.status == "UP")
    }
}
