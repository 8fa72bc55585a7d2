use crate::*;

use ledgerlink_core::wire::{STATUS_OK, STATUS_TIMEOUT, STATUS_UNAVAILABLE};
use ledgerlink_core::TransportErrorKind;
use ledgerlink_services::ChannelError;

#[tokio::test]
async fn test_genesis_fetch_over_mutual_tls() {
    let net = TestNetwork::start().await.unwrap();
    let mut channel = Channel::new(CHANNEL, net.ctx.clone());
    channel.add_orderer(net.default_endpoint().unwrap());

    let block = channel
        .get_genesis_block(&net.ctx.new_transaction_id())
        .await
        .unwrap();
    assert_eq!(Some(block), net.node.ledger.genesis(CHANNEL));
    net.stop().await;
}

#[tokio::test]
async fn test_genesis_unknown_channel() {
    let net = TestNetwork::start().await.unwrap();
    let mut channel = Channel::new("nochannel", net.ctx.clone());
    channel.add_orderer(net.default_endpoint().unwrap());

    let err = channel
        .get_genesis_block(&net.ctx.new_transaction_id())
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::Rejected { status: 404, .. }), "{err:?}");
    net.stop().await;
}

#[tokio::test]
async fn test_join_mixed_outcomes_stay_positional() {
    let net = TestNetwork::start().await.unwrap();
    let mut channel = Channel::new(CHANNEL, net.ctx.clone());
    channel.add_orderer(net.default_endpoint().unwrap());
    let block = channel
        .get_genesis_block(&net.ctx.new_transaction_id())
        .await
        .unwrap();

    let factory = EndpointFactory::default();
    let dead = factory
        .create_endpoint(
            &format!("grpcs://127.0.0.1:{}", closed_port().await.unwrap()),
            net.node.ca.root_pem().as_bytes(),
            net.tls.clone(),
            EndpointOptions::new().hostname_override(SERVER_NAME),
        )
        .map(Arc::new)
        .unwrap();
    let silent = factory
        .create_endpoint(
            &format!("grpcs://127.0.0.1:{}", silent_listener().await.unwrap()),
            net.node.ca.root_pem().as_bytes(),
            net.tls.clone(),
            EndpointOptions::new().hostname_override(SERVER_NAME),
        )
        .map(Arc::new)
        .unwrap();
    let live = net.default_endpoint().unwrap();

    let request = JoinRequest {
        targets: vec![dead.clone(), live.clone(), silent.clone()],
        block,
        tx_id: net.ctx.new_transaction_id(),
    };
    let results = channel
        .join_channel(request, Duration::from_millis(500))
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].endpoint.id(), dead.id());
    assert_eq!(results[0].status_code, STATUS_UNAVAILABLE);
    assert_eq!(
        results[0].error.as_ref().map(|e| e.kind),
        Some(TransportErrorKind::Other)
    );

    assert_eq!(results[1].endpoint.id(), live.id());
    assert_eq!(results[1].status_code, STATUS_OK);

    assert_eq!(results[2].endpoint.id(), silent.id());
    assert_eq!(results[2].status_code, STATUS_TIMEOUT);

    assert!(net.node.ledger.is_joined(CHANNEL));
    net.stop().await;
}

#[tokio::test]
async fn test_join_rejects_malformed_request() {
    let net = TestNetwork::start().await.unwrap();
    let channel = Channel::new(CHANNEL, net.ctx.clone());
    let err = channel
        .join_channel(
            JoinRequest {
                targets: vec![net.default_endpoint().unwrap()],
                block: Vec::new(),
                tx_id: net.ctx.new_transaction_id(),
            },
            JOIN_TIMEOUT,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ChannelError::ChannelJoin(_)));
    net.stop().await;
}

#[tokio::test]
async fn test_client_certificate_from_foreign_ca_is_refused() {
    let net = TestNetwork::start().await.unwrap();

    let foreign = ledgerlink_core::ca::DevAuthority::new("foreign-ca").unwrap();
    foreign.register(ORG, ADMIN, ADMIN_SECRET);
    let issued = foreign
        .enroll(ORG, ADMIN, ADMIN_SECRET, ledgerlink_core::Role::Tls)
        .unwrap();
    let endpoint = net
        .endpoint(
            &EndpointFactory::default(),
            EndpointOptions::new()
                .client_certificate(issued.certificate)
                .client_private_key(issued.private_key),
        )
        .unwrap();

    let mut channel = Channel::new(CHANNEL, net.ctx.clone());
    channel.add_orderer(endpoint);
    let err = channel
        .get_genesis_block(&net.ctx.new_transaction_id())
        .await
        .unwrap_err();
    match err {
        ChannelError::Transport(e) => assert_eq!(e.kind, TransportErrorKind::Other),
        other => panic!("expected transport error, got {other:?}"),
    }
    net.stop().await;
}
