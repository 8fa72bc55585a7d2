//! Transaction proposals: fan one signed proposal out to every target and
//! collect one response per target, in target order.
//!
//! All targets are contacted concurrently and every call is allowed to
//! settle. A failing target never cancels the others, and nothing is
//! retried.

use std::sync::Arc;

use futures::future::join_all;

use ledgerlink_core::wire::{Request, Response};
use ledgerlink_core::{TransactionId, TransportError, TransportErrorKind};

use crate::channel::{Channel, ChannelError};
use crate::endpoint::Endpoint;

#[derive(Debug, Clone)]
pub struct ProposalRequest {
    pub targets: Vec<Arc<Endpoint>>,
    pub chaincode_id: String,
    pub function: String,
    pub args: Vec<Vec<u8>>,
    pub tx_id: TransactionId,
}

impl ProposalRequest {
    pub fn new(
        targets: Vec<Arc<Endpoint>>,
        chaincode_id: impl Into<String>,
        function: impl Into<String>,
        args: Vec<Vec<u8>>,
        tx_id: TransactionId,
    ) -> Self {
        Self {
            targets,
            chaincode_id: chaincode_id.into(),
            function: function.into(),
            args,
            tx_id,
        }
    }

    fn validate(&self) -> Result<(), ChannelError> {
        if self.targets.is_empty() {
            return Err(ChannelError::MalformedProposal("no targets".to_string()));
        }
        if self.chaincode_id.is_empty() {
            return Err(ChannelError::MalformedProposal("empty chaincode id".to_string()));
        }
        if self.function.is_empty() {
            return Err(ChannelError::MalformedProposal("empty function name".to_string()));
        }
        Ok(())
    }
}

/// What one target made of a proposal.
#[derive(Debug, Clone)]
pub enum ProposalResponse {
    /// The peer answered. `status` may still be a failure code.
    Responded {
        endpoint: Arc<Endpoint>,
        status: i32,
        message: String,
        payload: Vec<u8>,
    },
    /// The call failed below the application layer.
    TransportFailed {
        endpoint: Arc<Endpoint>,
        error: TransportError,
    },
}

impl ProposalResponse {
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        match self {
            ProposalResponse::Responded { endpoint, .. }
            | ProposalResponse::TransportFailed { endpoint, .. } => endpoint,
        }
    }

    pub fn status(&self) -> Option<i32> {
        match self {
            ProposalResponse::Responded { status, .. } => Some(*status),
            ProposalResponse::TransportFailed { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            ProposalResponse::Responded { payload, .. } => Some(payload),
            ProposalResponse::TransportFailed { .. } => None,
        }
    }

    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            ProposalResponse::Responded { .. } => None,
            ProposalResponse::TransportFailed { error, .. } => Some(error),
        }
    }

    pub fn error_kind(&self) -> Option<TransportErrorKind> {
        self.transport_error().map(|e| e.kind)
    }
}

impl Channel {
    /// Send `request` to all of its targets and wait for every answer.
    ///
    /// Element `i` of the result belongs to `request.targets[i]`.
    pub async fn send_transaction_proposal(
        &self,
        request: ProposalRequest,
    ) -> Result<Vec<ProposalResponse>, ChannelError> {
        request.validate()?;
        if !self.context().claim(&request.tx_id) {
            return Err(ChannelError::MalformedProposal(format!(
                "transaction id {} is reused or was not issued by this client",
                request.tx_id
            )));
        }

        let ProposalRequest {
            targets,
            chaincode_id,
            function,
            args,
            tx_id,
        } = request;
        let envelope = self.context().sign_request(
            self.name(),
            &tx_id,
            Request::Proposal {
                chaincode_id: chaincode_id.clone(),
                function: function.clone(),
                args,
            },
        )?;
        tracing::debug!(
            channel = %self.name(),
            %tx_id,
            chaincode = %chaincode_id,
            function = %function,
            bytes = envelope.len(),
            targets = targets.len(),
            "sending proposal"
        );

        let envelope = &envelope;
        let responses = join_all(targets.into_iter().map(|endpoint| async move {
            let outcome = endpoint.rpc(envelope).await;
            into_response(endpoint, outcome)
        }))
        .await;

        let failed = responses
            .iter()
            .filter(|r| r.transport_error().is_some())
            .count();
        tracing::info!(
            channel = %self.name(),
            %tx_id,
            total = responses.len(),
            failed,
            "proposal settled"
        );
        Ok(responses)
    }
}

fn into_response(
    endpoint: Arc<Endpoint>,
    outcome: Result<Response, TransportError>,
) -> ProposalResponse {
    match outcome {
        Ok(Response::Status {
            status,
            message,
            payload,
        }) => ProposalResponse::Responded {
            endpoint,
            status,
            message,
            payload,
        },
        Ok(_) => {
            ProposalResponse::TransportFailed {
                error: TransportError::other(format!(
                    "unexpected response to proposal from {}",
                    endpoint.address()
                )),
                endpoint,
            }
        }
        Err(error) => {
            tracing::warn!(
                peer = %endpoint.address(),
                kind = %error.kind,
                error = %error,
                "proposal failed"
            );
            ProposalResponse::TransportFailed { endpoint, error }
        }
    }
}
