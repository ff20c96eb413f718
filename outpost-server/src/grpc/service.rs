use std::net::IpAddr;

use prost::Message;
use tonic::{Request, Response, Status};

use outpost_crypto::subnet::check_ip;
use outpost_crypto::{hash, keys, HASH_HEADER};
use outpost_proto::metrics_service_server::MetricsService;
use outpost_proto::{
    GetMetricsRequest, GetMetricsResponse, Metric, MetricsRequest, SendMetricsResponse,
};
use outpost_protocol::MetricValue;

use crate::service::ServiceState;

/// The gRPC metrics service.
#[derive(Debug, Clone)]
pub struct MetricsGrpc {
    state: ServiceState,
}

impl MetricsGrpc {
    /// Creates the service over the shared server state.
    pub fn new(state: ServiceState) -> Self {
        Self { state }
    }

    /// Verifies the payload hash and unwraps sealed requests.
    ///
    /// The hash metadata covers the bytes as sent: the ciphertext when the
    /// request is sealed, the plain prost encoding otherwise. Verification
    /// therefore happens before decryption, like on the HTTP side.
    fn unseal(
        &self,
        request: MetricsRequest,
        provided_hash: Option<&str>,
    ) -> Result<MetricsRequest, Status> {
        if let (Some(key), Some(provided)) = (self.state.hash_key(), provided_hash) {
            let wire = if request.encrypted.is_empty() {
                request.encode_to_vec()
            } else {
                request.encrypted.clone()
            };

            if !hash::verify(key, &wire, provided) {
                outpost_log::warn!("grpc payload hash verification failed");
                return Err(Status::invalid_argument("payload hash verification failed"));
            }
        }

        if request.encrypted.is_empty() {
            return Ok(request);
        }

        let Some(private_key) = self.state.private_key() else {
            return Err(Status::failed_precondition(
                "received encrypted request but no private key is configured",
            ));
        };

        let plaintext = keys::decrypt(private_key, &request.encrypted)
            .map_err(|_| Status::internal("failed to decrypt request"))?;

        MetricsRequest::decode(plaintext.as_slice())
            .map_err(|_| Status::invalid_argument("failed to decode decrypted request"))
    }

    /// Applies the trusted-subnet check to the peer address.
    fn check_subnet(&self, peer: Option<IpAddr>) -> Result<(), Status> {
        let Some(subnet) = self.state.config().trusted_subnet() else {
            return Ok(());
        };

        let allowed = peer.is_some_and(|ip| check_ip(Some(subnet), ip).is_allowed());
        if !allowed {
            outpost_log::warn!(?peer, "grpc peer outside trusted subnet");
            return Err(Status::permission_denied(
                "client IP is not in trusted subnet",
            ));
        }

        Ok(())
    }
}

#[tonic::async_trait]
impl MetricsService for MetricsGrpc {
    async fn send_metrics(
        &self,
        request: Request<MetricsRequest>,
    ) -> Result<Response<SendMetricsResponse>, Status> {
        let peer = request.remote_addr().map(|addr| addr.ip());
        let provided_hash = request
            .metadata()
            .get(HASH_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let request = self.unseal(request.into_inner(), provided_hash.as_deref())?;
        self.check_subnet(peer)?;

        // Validate the whole batch before applying anything; a bad metric
        // must not leave a partially applied request behind.
        let mut metrics = Vec::with_capacity(request.metrics.len());
        let mut errors = Vec::new();
        for proto in request.metrics {
            match outpost_protocol::Metric::try_from(proto.clone()) {
                Ok(metric) => metrics.push(metric),
                Err(error) => errors.push(format!("{error}: {}", proto.name)),
            }
        }

        if !errors.is_empty() {
            let mut message = String::from("errors while updating metrics");
            for error in &errors {
                message.push('\n');
                message.push_str(error);
            }
            return Err(Status::invalid_argument(message));
        }

        let mut updated = Vec::with_capacity(metrics.len());
        for metric in metrics {
            self.state.store().apply(&metric);
            updated.push(Metric::from(metric));
        }

        Ok(Response::new(SendMetricsResponse { metrics: updated }))
    }

    async fn get_metrics(
        &self,
        request: Request<GetMetricsRequest>,
    ) -> Result<Response<GetMetricsResponse>, Status> {
        let peer = request.remote_addr().map(|addr| addr.ip());
        self.check_subnet(peer)?;

        let filter = request.into_inner().filter;
        let store = self.state.store();

        let mut metrics = Vec::new();
        if filter.is_empty() {
            let snapshot = store.snapshot();
            for (name, value) in snapshot.gauges {
                metrics.push(Metric::from(outpost_protocol::Metric {
                    id: name,
                    value: MetricValue::Gauge(value),
                }));
            }
            for (name, delta) in snapshot.counters {
                metrics.push(Metric::from(outpost_protocol::Metric {
                    id: name,
                    value: MetricValue::Counter(delta),
                }));
            }
        } else {
            if let Some(value) = store.gauge(&filter) {
                metrics.push(Metric::from(outpost_protocol::Metric {
                    id: filter.clone(),
                    value: MetricValue::Gauge(value),
                }));
            }
            if let Some(delta) = store.counter(&filter) {
                metrics.push(Metric::from(outpost_protocol::Metric {
                    id: filter.clone(),
                    value: MetricValue::Counter(delta),
                }));
            }
        }

        Ok(Response::new(GetMetricsResponse { metrics }))
    }
}
