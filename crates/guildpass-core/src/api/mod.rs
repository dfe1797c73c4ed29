//! REST API access for the quest platform backend.
//!
//! This module provides the `ApiClient`, which wraps every request with the
//! stored bearer token and transparently refreshes and retries once on a 401,
//! plus the `HttpTransport` seam it sends through.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{ApiClient, RequestPhase};
pub use error::ApiError;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, TransportError};
