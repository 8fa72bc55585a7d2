//! ledgerlink-services: enrollment, credential storage, endpoints, and the
//! channel operations built on them.

pub mod channel;
pub mod context;
pub mod credential_store;
pub mod endpoint;
pub mod enrollment;
pub mod proposal;
pub mod transport;

#[cfg(test)]
mod testing;

pub use channel::{Channel, ChannelError, JoinRequest, JoinResult};
pub use context::ClientContext;
pub use credential_store::{
    CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError, StoredCredential,
};
pub use endpoint::{Endpoint, EndpointAddress, EndpointFactory, EndpointOptions};
pub use enrollment::{
    EnrollmentAuthority, EnrollmentClient, EnrollmentError, EnrollmentRequest, HttpAuthority,
    LocalAuthority,
};
pub use proposal::{ProposalRequest, ProposalResponse};
