//! Message-size limits end to end: policy precedence, snapshot-at-
//! construction, and classification of both overflow directions.

use crate::*;

use ledgerlink_core::limits::{
    SizeLimit, CURRENT_RECEIVE_LIMIT, CURRENT_SEND_LIMIT, LEGACY_SEND_LIMIT,
};
use ledgerlink_core::TransportErrorKind;
use ledgerlink_services::{ProposalRequest, ProposalResponse};

const ONE_MIB: usize = 1024 * 1024;

fn proposal(net: &TestNetwork, target: Arc<Endpoint>, function: &str, args: Vec<Vec<u8>>) -> ProposalRequest {
    ProposalRequest::new(vec![target], CHAINCODE, function, args, net.ctx.new_transaction_id())
}

async fn send_one(channel: &Channel, request: ProposalRequest) -> ProposalResponse {
    let mut responses = channel.send_transaction_proposal(request).await.unwrap();
    assert_eq!(responses.len(), 1);
    responses.remove(0)
}

#[tokio::test]
async fn test_one_mib_argument_needs_a_larger_send_limit() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();
    let arg = vec![b'a'; ONE_MIB];

    let default_factory = EndpointFactory::default();
    let stale = net.endpoint(&default_factory, EndpointOptions::new()).unwrap();
    let response = send_one(&channel, proposal(&net, stale.clone(), "echo", vec![arg.clone()])).await;
    assert_eq!(response.error_kind(), Some(TransportErrorKind::SendLimitExceeded));

    let raised = factory_with(&[(CURRENT_SEND_LIMIT, 2 * ONE_MIB as i64)]).unwrap();
    let fresh = net.endpoint(&raised, EndpointOptions::new()).unwrap();
    let response = send_one(&channel, proposal(&net, fresh, "echo", vec![arg.clone()])).await;
    assert_eq!(response.status(), Some(200));
    assert_eq!(response.payload().map(<[u8]>::len), Some(ONE_MIB));

    // The endpoint built before the change keeps its old limit.
    let response = send_one(&channel, proposal(&net, stale, "echo", vec![arg])).await;
    assert_eq!(response.error_kind(), Some(TransportErrorKind::SendLimitExceeded));
    net.stop().await;
}

#[tokio::test]
async fn test_endpoint_override_beats_policy() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let factory = factory_with(&[(LEGACY_SEND_LIMIT, 1024), (CURRENT_SEND_LIMIT, 2048)]).unwrap();
    let endpoint = net
        .endpoint(&factory, EndpointOptions::new().send_limit_override(-1))
        .unwrap();
    assert_eq!(endpoint.limits().send, SizeLimit::Unlimited);

    let response = send_one(&channel, proposal(&net, endpoint, "echo", vec![vec![0u8; 64 * 1024]])).await;
    assert_eq!(response.status(), Some(200));
    net.stop().await;
}

#[tokio::test]
async fn test_legacy_zero_defers_to_current() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let factory = factory_with(&[(LEGACY_SEND_LIMIT, 0), (CURRENT_SEND_LIMIT, 4096)]).unwrap();
    let endpoint = net.endpoint(&factory, EndpointOptions::new()).unwrap();
    assert_eq!(endpoint.limits().send, SizeLimit::Bytes(4096));

    let response = send_one(&channel, proposal(&net, endpoint, "echo", vec![vec![0u8; 8192]])).await;
    assert_eq!(response.error_kind(), Some(TransportErrorKind::SendLimitExceeded));
    net.stop().await;
}

#[tokio::test]
async fn test_receive_limit_toggle_with_fresh_endpoints() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();
    let fill = || vec![b"20000".to_vec()];

    let tight = factory_with(&[(CURRENT_RECEIVE_LIMIT, 1024)]).unwrap();
    let endpoint = net.endpoint(&tight, EndpointOptions::new()).unwrap();
    let response = send_one(&channel, proposal(&net, endpoint, "fill", fill())).await;
    assert_eq!(response.error_kind(), Some(TransportErrorKind::ReceiveLimitExceeded));

    let open = factory_with(&[(CURRENT_RECEIVE_LIMIT, -1)]).unwrap();
    let endpoint = net.endpoint(&open, EndpointOptions::new()).unwrap();
    let response = send_one(&channel, proposal(&net, endpoint, "fill", fill())).await;
    assert_eq!(response.status(), Some(200));
    assert_eq!(response.payload().map(<[u8]>::len), Some(20000));
    net.stop().await;
}

#[tokio::test]
async fn test_node_receive_limit_is_classified_from_its_text() {
    let net = TestNetwork::start_with(devnode_config(64 * 1024)).await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let endpoint = net
        .endpoint(&EndpointFactory::default(), EndpointOptions::new())
        .unwrap();
    let response = send_one(&channel, proposal(&net, endpoint, "echo", vec![vec![0u8; 128 * 1024]])).await;
    match &response {
        ProposalResponse::TransportFailed { error, .. } => {
            assert_eq!(error.kind, TransportErrorKind::ReceiveLimitExceeded);
            assert!(error.detail.contains("Received message larger than max"));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    net.stop().await;
}
