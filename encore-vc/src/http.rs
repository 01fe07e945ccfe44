//! HTTP client for encore-ls
//!
//! Implements [`VoteLedger`] over the ledger service's JSON API and hands out
//! [`SseConnector`]s sharing the same connection pool.

use crate::error::LedgerError;
use crate::feed::SseConnector;
use crate::identity::VoterIdentity;
use crate::ledger::VoteLedger;
use async_trait::async_trait;
use encore_common::votes::{
    ApiErrorBody, SubmitVoteRequest, VoteCounts, VoteRejection, NAME_HEADER, USER_HEADER,
};
use encore_common::{UserVoteState, VoteReceipt};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const USER_AGENT: &str = concat!("encore-vc/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Ledger service client
#[derive(Clone)]
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> Result<Self, LedgerError> {
        // No overall request timeout: the same client carries long-lived SSE streams
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Feed connector for this service's per-setlist SSE endpoint
    pub fn feed_connector(&self) -> SseConnector {
        SseConnector::with_client(self.client.clone(), self.base_url.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_identity(builder: reqwest::RequestBuilder, voter: &VoterIdentity) -> reqwest::RequestBuilder {
        let builder = builder.header(USER_HEADER, &voter.user_id);
        match &voter.display_name {
            Some(name) => builder.header(NAME_HEADER, name),
            None => builder,
        }
    }
}

/// Decode a success body, or map the service's structured error body
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, LedgerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) else {
        return Err(LedgerError::Api(status.as_u16(), text));
    };

    debug!(status = status.as_u16(), code = %body.error.code, "Ledger request refused");
    Err(match body.error.code.as_str() {
        "unauthenticated" => LedgerError::Unauthenticated,
        "not_found" => LedgerError::NotFound(body.error.message),
        code => match VoteRejection::from_code(code) {
            Some(rejection) => LedgerError::Rejected(rejection),
            None => LedgerError::Api(status.as_u16(), body.error.message),
        },
    })
}

#[async_trait]
impl VoteLedger for HttpLedger {
    async fn vote_counts(&self, setlist_id: Uuid) -> Result<VoteCounts, LedgerError> {
        let response = self
            .client
            .get(self.url(&format!("/api/setlists/{}/counts", setlist_id)))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        decode(response).await
    }

    async fn user_vote_state(
        &self,
        voter: &VoterIdentity,
        show_id: Uuid,
    ) -> Result<UserVoteState, LedgerError> {
        let request = self
            .client
            .get(self.url(&format!("/api/shows/{}/votes/me", show_id)))
            .timeout(REQUEST_TIMEOUT);
        let response = Self::with_identity(request, voter).send().await?;
        decode(response).await
    }

    async fn submit_vote(
        &self,
        voter: &VoterIdentity,
        song_slot_id: Uuid,
    ) -> Result<VoteReceipt, LedgerError> {
        let request = self
            .client
            .post(self.url("/api/votes"))
            .timeout(REQUEST_TIMEOUT)
            .json(&SubmitVoteRequest { song_slot_id });
        let response = Self::with_identity(request, voter).send().await?;
        decode(response).await
    }
}
