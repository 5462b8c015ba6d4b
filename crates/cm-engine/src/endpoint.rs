//! Source and destination endpoints.
//!
//! An endpoint is one side of a migration: the site content is read from or
//! the site it is published to. The engine only needs to initialize it; the
//! transport behind it is the endpoint's own concern. Listing content is a
//! separate capability, see [`ContentPagerFactory`](crate::pager::ContentPagerFactory).

use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::result::ActionResult;

/// Which side of the migration an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointKind {
    /// The site content is read from.
    Source,
    /// The site content is published to.
    Destination,
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Destination => "destination",
        })
    }
}

/// A migration endpoint.
///
/// `initialize` is called once per run, before any content is paged. Source
/// and destination are initialized concurrently, and any failure aborts the
/// run before the pipeline starts.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Prepares the endpoint for a run (sign in, resolve the site, ...).
    ///
    /// Implementations report [`EngineError::Canceled`](crate::EngineError::Canceled)
    /// when they observe `cancel`.
    async fn initialize(&self, cancel: &CancellationToken) -> ActionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_kind_display() {
        assert_eq!(EndpointKind::Source.to_string(), "source");
        assert_eq!(EndpointKind::Destination.to_string(), "destination");
    }
}
