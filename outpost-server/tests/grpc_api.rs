//! Tests of the gRPC service, invoked directly through the service trait.

use std::sync::Arc;

use prost::Message;
use tonic::{Code, Request};

use outpost_config::{Config, OverridableConfig};
use outpost_crypto::keys::{self, RsaPrivateKey, RsaPublicKey};
use outpost_crypto::{hash, HASH_HEADER};
use outpost_proto::metrics_service_server::MetricsService;
use outpost_proto::{GetMetricsRequest, Metric, MetricsRequest};
use outpost_server::grpc::MetricsGrpc;
use outpost_server::ServiceState;
use outpost_storage::MetricsStore;

fn service_with(
    overrides: OverridableConfig,
    private_key: Option<RsaPrivateKey>,
) -> (MetricsGrpc, Arc<MetricsStore>) {
    let mut config = Config::default();
    config.apply_override(overrides).unwrap();

    let store = Arc::new(MetricsStore::new());
    let state = ServiceState::new(Arc::new(config), Arc::clone(&store), private_key);
    (MetricsGrpc::new(state), store)
}

fn service() -> (MetricsGrpc, Arc<MetricsStore>) {
    service_with(OverridableConfig::default(), None)
}

fn counter(name: &str, delta: i64) -> Metric {
    Metric {
        name: name.to_owned(),
        mtype: "counter".to_owned(),
        delta: Some(delta),
        value: None,
    }
}

fn gauge(name: &str, value: f64) -> Metric {
    Metric {
        name: name.to_owned(),
        mtype: "gauge".to_owned(),
        delta: None,
        value: Some(value),
    }
}

#[tokio::test]
async fn send_metrics_applies_and_echoes() {
    let (service, store) = service();

    let request = MetricsRequest {
        metrics: vec![counter("hits", 5), gauge("temp", 36.6)],
        encrypted: Vec::new(),
    };
    let response = service
        .send_metrics(Request::new(request))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(response.metrics.len(), 2);
    assert_eq!(store.counter("hits"), Some(5));
    assert_eq!(store.gauge("temp"), Some(36.6));
}

#[tokio::test]
async fn invalid_metric_fails_whole_request() {
    let (service, store) = service();

    let request = MetricsRequest {
        metrics: vec![
            counter("good", 1),
            Metric {
                name: "bad".to_owned(),
                mtype: "counter".to_owned(),
                delta: None,
                value: None,
            },
        ],
        encrypted: Vec::new(),
    };
    let status = service
        .send_metrics(Request::new(request))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("bad"));
    // No partial success: the valid metric was not applied either.
    assert_eq!(store.counter("good"), None);
}

#[tokio::test]
async fn encrypted_request_round_trips() {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let public_key = RsaPublicKey::from(&private_key);

    let (service, store) = service_with(OverridableConfig::default(), Some(private_key));

    let plain = MetricsRequest {
        metrics: vec![counter("sealed", 7)],
        encrypted: Vec::new(),
    };
    let sealed = MetricsRequest {
        metrics: Vec::new(),
        encrypted: keys::encrypt(&public_key, &plain.encode_to_vec()).unwrap(),
    };

    service.send_metrics(Request::new(sealed)).await.unwrap();
    assert_eq!(store.counter("sealed"), Some(7));
}

#[tokio::test]
async fn hash_metadata_is_verified() {
    let (service, store) = service_with(
        OverridableConfig {
            hash_key: Some("s".to_owned()),
            ..Default::default()
        },
        None,
    );

    let payload = MetricsRequest {
        metrics: vec![counter("hits", 2)],
        encrypted: Vec::new(),
    };

    // Correct digest over the wire encoding passes.
    let digest = hash::calculate(b"s", &payload.encode_to_vec());
    let mut request = Request::new(payload.clone());
    request
        .metadata_mut()
        .insert(HASH_HEADER, digest.parse().unwrap());
    service.send_metrics(request).await.unwrap();
    assert_eq!(store.counter("hits"), Some(2));

    // A digest over different bytes is rejected.
    let mut request = Request::new(payload);
    request
        .metadata_mut()
        .insert(HASH_HEADER, hash::calculate(b"s", b"other").parse().unwrap());
    let status = service.send_metrics(request).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(store.counter("hits"), Some(2));
}

#[tokio::test]
async fn get_metrics_returns_all_or_filtered() {
    let (service, store) = service();
    store.update_counter("hits", 4);
    store.update_gauge("temp", 1.25);

    let all = service
        .get_metrics(Request::new(GetMetricsRequest {
            filter: String::new(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(all.metrics.len(), 2);

    let filtered = service
        .get_metrics(Request::new(GetMetricsRequest {
            filter: "hits".to_owned(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(filtered.metrics.len(), 1);
    assert_eq!(filtered.metrics[0].delta, Some(4));
}

#[tokio::test]
async fn trusted_subnet_denies_unknown_peers() {
    let (service, _store) = service_with(
        OverridableConfig {
            trusted_subnet: Some("10.0.0.0/8".to_owned()),
            ..Default::default()
        },
        None,
    );

    // Requests built outside a transport have no peer address, which must
    // not pass an enabled filter.
    let status = service
        .send_metrics(Request::new(MetricsRequest {
            metrics: vec![counter("hits", 1)],
            encrypted: Vec::new(),
        }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);
}
