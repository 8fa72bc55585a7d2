use crate::*;

use ledgerlink_core::TransportErrorKind;
use ledgerlink_services::{ChannelError, ProposalRequest};

#[tokio::test]
async fn test_responses_align_with_targets_despite_failures() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let factory = EndpointFactory::default();
    let first = net.default_endpoint().unwrap();
    let dead = factory
        .create_endpoint(
            &format!("grpcs://127.0.0.1:{}", closed_port().await.unwrap()),
            net.node.ca.root_pem().as_bytes(),
            net.tls.clone(),
            EndpointOptions::new().hostname_override(SERVER_NAME),
        )
        .map(Arc::new)
        .unwrap();
    let tiny = net
        .endpoint(&factory, EndpointOptions::new().send_limit_override(16))
        .unwrap();
    let last = net.default_endpoint().unwrap();

    let targets = vec![first.clone(), dead.clone(), tiny.clone(), last.clone()];
    let request = ProposalRequest::new(
        targets.clone(),
        CHAINCODE,
        "echo",
        vec![b"hello".to_vec()],
        net.ctx.new_transaction_id(),
    );
    let responses = channel.send_transaction_proposal(request).await.unwrap();

    assert_eq!(responses.len(), targets.len());
    for (response, target) in responses.iter().zip(&targets) {
        assert_eq!(response.endpoint().id(), target.id());
    }
    assert_eq!(responses[0].payload(), Some(&b"hello"[..]));
    assert_eq!(responses[1].error_kind(), Some(TransportErrorKind::Other));
    assert_eq!(responses[2].error_kind(), Some(TransportErrorKind::SendLimitExceeded));
    assert_eq!(responses[3].payload(), Some(&b"hello"[..]));
    net.stop().await;
}

#[tokio::test]
async fn test_malformed_proposal_sends_nothing() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let no_targets = ProposalRequest::new(
        Vec::new(),
        CHAINCODE,
        "echo",
        vec![b"x".to_vec()],
        net.ctx.new_transaction_id(),
    );
    let err = channel.send_transaction_proposal(no_targets).await.unwrap_err();
    assert!(matches!(err, ChannelError::MalformedProposal(_)), "{err:?}");

    let no_function = ProposalRequest::new(
        channel.peers().to_vec(),
        CHAINCODE,
        "",
        Vec::new(),
        net.ctx.new_transaction_id(),
    );
    let err = channel.send_transaction_proposal(no_function).await.unwrap_err();
    assert!(matches!(err, ChannelError::MalformedProposal(_)), "{err:?}");
    net.stop().await;
}

#[tokio::test]
async fn test_chaincode_errors_come_back_as_responses() {
    let net = TestNetwork::start().await.unwrap();
    let channel = net.joined_channel().await.unwrap();

    let request = ProposalRequest::new(
        channel.peers().to_vec(),
        CHAINCODE,
        "nosuchfn",
        Vec::new(),
        net.ctx.new_transaction_id(),
    );
    let responses = channel.send_transaction_proposal(request).await.unwrap();
    assert_eq!(responses[0].status(), Some(500));
    assert!(responses[0].transport_error().is_none());
    net.stop().await;
}
