use std::time;

use async_trait::async_trait;
use reqwest::header;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::identity::{ConsumerId, GeneratorId};
use crate::rpc::{
    ConsumerJoinRequest, ConsumerJoinResponse, DemandUpdate, Empty, GeneratorJoinRequest,
    GeneratorJoinResponse, RegisterGeneratorRequest, StateUpdate, TrackerHello,
};

pub const GENERATOR_JOIN_PATH: &str = "/generator/join";
pub const CONSUMER_JOIN_PATH: &str = "/consumer/join";
pub const REGISTER_GENERATOR_PATH: &str = "/generator/register";
pub const UPDATE_GENERATOR_STATE_PATH: &str = "/generator/state";
pub const RECEIVE_HELLO_PATH: &str = "/hello";
pub const SHUT_DOWN_PATH: &str = "/shutdown";

/// Errors raised while calling a peer.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("failed to build rpc client: {0}")]
    ClientError(reqwest::Error),
    #[error("peer {peer} could not be reached: {error}")]
    Unreachable { peer: String, error: reqwest::Error },
    #[error("peer {peer} answered with status {status}")]
    Status {
        peer: String,
        status: reqwest::StatusCode,
    },
    #[error("peer {peer} sent a response that could not be decoded: {error}")]
    Decode { peer: String, error: reqwest::Error },
}

/// Calls served by the bootstrap service.
#[async_trait]
pub trait BootstrapClient: Send + Sync {
    async fn generator_join(
        &self,
        bootstrap: &str,
        request: GeneratorJoinRequest,
    ) -> Result<GeneratorId, RpcError>;

    async fn consumer_join(
        &self,
        bootstrap: &str,
        request: ConsumerJoinRequest,
    ) -> Result<ConsumerId, RpcError>;
}

/// Calls served by a tracker shard.
#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn register_generator(
        &self,
        tracker: &str,
        request: RegisterGeneratorRequest,
    ) -> Result<(), RpcError>;

    async fn update_generator_state(
        &self,
        tracker: &str,
        update: StateUpdate,
    ) -> Result<DemandUpdate, RpcError>;
}

/// Calls served by a generator agent.
#[async_trait]
pub trait GeneratorClient: Send + Sync {
    async fn receive_hello(&self, generator: &str, hello: TrackerHello) -> Result<(), RpcError>;

    async fn shut_down(&self, generator: &str) -> Result<(), RpcError>;
}

/// JSON-over-HTTP implementation of every client contract.
///
/// Every call is bounded by the request timeout the client was built with.
#[derive(Clone)]
pub struct HttpRpcClient {
    client: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new(request_timeout: time::Duration) -> Result<Self, RpcError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("grid rpc client")
            .timeout(request_timeout)
            .build()
            .map_err(RpcError::ClientError)?;

        Ok(Self { client })
    }

    async fn call<B, R>(&self, peer: &str, path: &str, body: &B) -> Result<R, RpcError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = endpoint(peer, path);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|error| RpcError::Unreachable {
                peer: peer.to_owned(),
                error,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                peer: peer.to_owned(),
                status,
            });
        }

        response.json::<R>().await.map_err(|error| RpcError::Decode {
            peer: peer.to_owned(),
            error,
        })
    }
}

#[async_trait]
impl BootstrapClient for HttpRpcClient {
    async fn generator_join(
        &self,
        bootstrap: &str,
        request: GeneratorJoinRequest,
    ) -> Result<GeneratorId, RpcError> {
        let response: GeneratorJoinResponse =
            self.call(bootstrap, GENERATOR_JOIN_PATH, &request).await?;
        Ok(response.identity)
    }

    async fn consumer_join(
        &self,
        bootstrap: &str,
        request: ConsumerJoinRequest,
    ) -> Result<ConsumerId, RpcError> {
        let response: ConsumerJoinResponse =
            self.call(bootstrap, CONSUMER_JOIN_PATH, &request).await?;
        Ok(response.identity)
    }
}

#[async_trait]
impl TrackerClient for HttpRpcClient {
    async fn register_generator(
        &self,
        tracker: &str,
        request: RegisterGeneratorRequest,
    ) -> Result<(), RpcError> {
        let _: Empty = self
            .call(tracker, REGISTER_GENERATOR_PATH, &request)
            .await?;
        Ok(())
    }

    async fn update_generator_state(
        &self,
        tracker: &str,
        update: StateUpdate,
    ) -> Result<DemandUpdate, RpcError> {
        self.call(tracker, UPDATE_GENERATOR_STATE_PATH, &update)
            .await
    }
}

#[async_trait]
impl GeneratorClient for HttpRpcClient {
    async fn receive_hello(&self, generator: &str, hello: TrackerHello) -> Result<(), RpcError> {
        let _: Empty = self.call(generator, RECEIVE_HELLO_PATH, &hello).await?;
        Ok(())
    }

    async fn shut_down(&self, generator: &str) -> Result<(), RpcError> {
        let _: Empty = self.call(generator, SHUT_DOWN_PATH, &Empty {}).await?;
        Ok(())
    }
}

/// Builds the URL for `path` on a peer given either as `host:port` or as a full URL.
pub fn endpoint(peer: &str, path: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}{path}")
    } else {
        format!("http://{base}{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_accepts_bare_addresses_and_urls() {
        assert_eq!(
            endpoint("127.0.0.1:32000", REGISTER_GENERATOR_PATH),
            "http://127.0.0.1:32000/generator/register"
        );
        assert_eq!(
            endpoint("http://tracker-0:32000/", UPDATE_GENERATOR_STATE_PATH),
            "http://tracker-0:32000/generator/state"
        );
        assert_eq!(
            endpoint("https://bootstrap", GENERATOR_JOIN_PATH),
            "https://bootstrap/generator/join"
        );
    }

    #[tokio::test]
    async fn unreachable_peer_is_reported() {
        let client = HttpRpcClient::new(time::Duration::from_millis(500)).unwrap();
        // Port 9 (discard) is closed on test hosts; the connection is refused.
        let result = client
            .update_generator_state(
                "127.0.0.1:9",
                StateUpdate {
                    identity: 1,
                    timestamp: 0,
                    output: 10.0,
                    demand: 5.0,
                },
            )
            .await;

        assert!(matches!(result, Err(RpcError::Unreachable { .. })));
    }
}
