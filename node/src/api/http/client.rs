use thiserror::Error;

use crate::api::types::{
    ApiBlock, ApiCommitted, ApiNodeStatus, ApiSubmitRequest, ApiSubmitResponse, Health,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Query failed")]
    Internal(#[from] reqwest::Error),
    #[error("Unexpected response: {status} {body}")]
    UnexpectedResponse {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the HTTP API of a single node.
pub struct PiChainHttpClient {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
}

impl PiChainHttpClient {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { client, url }
    }

    pub async fn health(&self) -> Result<Health> {
        self.query("pichain/node/health").await
    }

    pub async fn status(&self) -> Result<ApiNodeStatus> {
        self.query("pichain/node/status").await
    }

    pub async fn committed(&self) -> Result<ApiCommitted> {
        self.query("pichain/committed").await
    }

    pub async fn get_block(&self, id: &str) -> Result<Option<ApiBlock>> {
        let url = format!("pichain/block/{id}");
        self.query_optional(&url).await
    }

    pub async fn submit(&self, command: Vec<u8>) -> Result<ApiSubmitResponse> {
        let url = format!("{}/{}", self.url, "pichain/submit");
        let response = self
            .client
            .post(&url)
            .json(&ApiSubmitRequest::new(command))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json::<ApiSubmitResponse>().await?)
        } else {
            Err(Error::UnexpectedResponse {
                status: response.status(),
                body: response.text().await?,
            })
        }
    }

    async fn query_optional<T: for<'de> serde::Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<Option<T>> {
        let url = format!("{}/{}", self.url, path);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(Some(response.json::<T>().await?))
        } else if response.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(None)
        } else {
            Err(Error::UnexpectedResponse {
                status: response.status(),
                body: response.text().await?,
            })
        }
    }

    async fn query<T: for<'de> serde::Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.url, path);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Error::UnexpectedResponse {
                status: response.status(),
                body: response.text().await?,
            })
        }
    }
}
