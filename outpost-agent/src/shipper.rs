//! The bounded worker pool that delivers metrics to the server.
//!
//! Each report tick creates a fresh channel of capacity 30 and spawns
//! `rate_limit` workers. Every drained metric is JSON-encoded, gzipped at
//! best compression, optionally RSA-encrypted, signed with the payload
//! hash, and POSTed to `/update`; transient failures rerun on the shared
//! retry schedule. With a gRPC address configured, metrics go through
//! `SendMetrics` instead, with the hash attached as call metadata.

use std::io::Write;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use prost::Message;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};

use outpost_config::Config;
use outpost_crypto::keys::{self, RsaPublicKey};
use outpost_crypto::{hash, HASH_HEADER, REAL_IP_HEADER};
use outpost_proto::metrics_service_client::MetricsServiceClient;
use outpost_proto::MetricsRequest;
use outpost_protocol::{Metric, WireMetric};
use outpost_storage::retry::{retry, Retriable};

/// Capacity of the per-tick shipment channel.
const CHANNEL_CAPACITY: usize = 30;

/// Deadline for a single gRPC call.
const GRPC_TIMEOUT: Duration = Duration::from_secs(5);

/// An error raised while shipping a metric.
#[derive(Debug, thiserror::Error)]
pub enum ShipError {
    /// The metric did not encode; terminal.
    #[error("failed to encode metric")]
    Encode(#[from] serde_json::Error),

    /// Compressing the payload failed; terminal.
    #[error("failed to compress metric")]
    Gzip(#[source] std::io::Error),

    /// Encrypting the payload failed; terminal.
    #[error("failed to encrypt payload")]
    Crypto(#[from] keys::KeyError),

    /// The server was unreachable; retriable.
    #[error("connection error")]
    Connection,

    /// The server answered with a retriable status code.
    #[error("server error: status {0}")]
    Server(u16),

    /// The gRPC call failed.
    #[error("grpc error: {0}")]
    Grpc(tonic::Status),
}

impl Retriable for ShipError {
    fn is_retriable(&self) -> bool {
        matches!(self, ShipError::Connection | ShipError::Server(_))
    }
}

/// Ships metrics to the server, over HTTP or gRPC.
#[derive(Clone)]
pub struct Shipper {
    config: Arc<Config>,
    client: reqwest::Client,
    grpc: Option<MetricsServiceClient<Channel>>,
    public_key: Option<Arc<RsaPublicKey>>,
    local_ip: Option<IpAddr>,
}

impl Shipper {
    /// Creates the shipper.
    ///
    /// The gRPC channel connects lazily, so a missing server only surfaces
    /// on the first shipment.
    pub fn new(config: Arc<Config>, public_key: Option<RsaPublicKey>) -> Self {
        let grpc = config.grpc_address().and_then(|addr| {
            match Endpoint::from_shared(format!("http://{addr}")) {
                Ok(endpoint) => Some(MetricsServiceClient::new(
                    endpoint.timeout(GRPC_TIMEOUT).connect_lazy(),
                )),
                Err(error) => {
                    outpost_log::error!(error = %error, "invalid grpc address");
                    None
                }
            }
        });

        Self {
            config,
            client: reqwest::Client::new(),
            grpc,
            public_key: public_key.map(Arc::new),
            local_ip: local_ip(),
        }
    }

    /// Ships one batch: all gauges, then the poll counter.
    ///
    /// Spawns `rate_limit` workers over a bounded channel, feeds them, and
    /// waits for the pool to drain.
    pub async fn ship(&self, gauges: Vec<(String, f64)>, poll_delta: i64) {
        let (tx, rx) = mpsc::channel::<Metric>(CHANNEL_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.config.rate_limit() {
            let rx = Arc::clone(&rx);
            let shipper = self.clone();
            workers.spawn(async move {
                loop {
                    // Hold the lock only while receiving; the send happens
                    // with the lock released so workers overlap.
                    let metric = { rx.lock().await.recv().await };
                    let Some(metric) = metric else { break };

                    if let Err(error) = shipper.send(metric).await {
                        outpost_log::error!(error = %error, "failed to send metric");
                    }
                }
            });
        }

        for (name, value) in gauges {
            if tx.send(Metric::gauge(name, value)).await.is_err() {
                break;
            }
        }
        let _ = tx.send(Metric::counter("PollCount", poll_delta)).await;
        drop(tx);

        while workers.join_next().await.is_some() {}
    }

    async fn send(&self, metric: Metric) -> Result<(), ShipError> {
        if self.grpc.is_some() {
            self.send_grpc(metric).await
        } else {
            self.send_http(metric).await
        }
    }

    async fn send_http(&self, metric: Metric) -> Result<(), ShipError> {
        let json = serde_json::to_vec(&WireMetric::from(metric))?;
        let gzipped = gzip(&json)?;

        let (payload, content_type) = match &self.public_key {
            Some(key) => (keys::encrypt(key, &gzipped)?, "application/octet-stream"),
            None => (gzipped, "application/json"),
        };

        // The hash covers the payload as sent on the wire, so the server
        // can verify before decrypting.
        let digest = self
            .config
            .hash_key()
            .map(|key| hash::calculate(key.as_bytes(), &payload));

        retry(|| self.post(&payload, content_type, digest.as_deref())).await
    }

    async fn post(
        &self,
        payload: &[u8],
        content_type: &str,
        digest: Option<&str>,
    ) -> Result<(), ShipError> {
        let url = format!("http://{}/update", self.config.address());

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_ENCODING, "gzip")
            .body(payload.to_vec());
        if let Some(ip) = self.local_ip {
            request = request.header(REAL_IP_HEADER, ip.to_string());
        }
        if let Some(digest) = digest {
            request = request.header(HASH_HEADER, digest);
        }

        let response = request.send().await.map_err(|error| {
            outpost_log::warn!(error = %error, "failed to reach server");
            ShipError::Connection
        })?;

        let status = response.status().as_u16();
        if (500..=504).contains(&status) {
            return Err(ShipError::Server(status));
        }

        Ok(())
    }

    async fn send_grpc(&self, metric: Metric) -> Result<(), ShipError> {
        let Some(client) = &self.grpc else {
            return Err(ShipError::Connection);
        };

        let plain = MetricsRequest {
            metrics: vec![outpost_proto::Metric::from(metric)],
            encrypted: Vec::new(),
        };
        let encoded = plain.encode_to_vec();

        let (request, wire) = match &self.public_key {
            Some(key) => {
                let encrypted = keys::encrypt(key, &encoded)?;
                let request = MetricsRequest {
                    metrics: Vec::new(),
                    encrypted: encrypted.clone(),
                };
                (request, encrypted)
            }
            None => (plain, encoded),
        };

        let mut request = tonic::Request::new(request);
        request.set_timeout(GRPC_TIMEOUT);

        if let Some(key) = self.config.hash_key() {
            let digest = hash::calculate(key.as_bytes(), &wire);
            if let Ok(value) = digest.parse::<MetadataValue<_>>() {
                request.metadata_mut().insert(HASH_HEADER, value);
            }
        }

        client
            .clone()
            .send_metrics(request)
            .await
            .map_err(ShipError::Grpc)?;

        Ok(())
    }
}

/// Compresses a payload with gzip at best compression.
fn gzip(data: &[u8]) -> Result<Vec<u8>, ShipError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).map_err(ShipError::Gzip)?;
    encoder.finish().map_err(ShipError::Gzip)
}

/// Determines the address the agent reports in `X-Real-IP`.
///
/// Connecting a UDP socket to a public address picks the interface the OS
/// would route through, without sending any packets; loopback is never
/// selected this way.
fn local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn gzip_round_trips() {
        let compressed = gzip(b"payload").unwrap();
        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        assert_eq!(out, "payload");
    }

    #[test]
    fn ship_errors_classify() {
        assert!(ShipError::Connection.is_retriable());
        assert!(ShipError::Server(502).is_retriable());
        assert!(!ShipError::Gzip(std::io::Error::other("boom")).is_retriable());
    }
}
