//! Read-only connectors against external systems (CRM, mailbox, calendar,
//! chat). Each connector yields ephemeral [`Snippet`] records that live
//! only for the duration of one aggregation request — nothing is cached
//! or persisted.

pub mod error;
pub mod fixture;
pub mod graph;
pub mod model;
pub mod salesforce;
pub mod traits;

pub use error::ConnectorError;
pub use model::{Policy, Snippet};
pub use traits::{Connector, CrmConnector};
