//! Fablecraft API
//!
//! HTTP surface over the request gate: gated project reads, streamed
//! listings of characters and world entities, AI generation with
//! progress streaming, statistics, and health endpoints.
//!
//! Persistence and the generation backend are collaborators behind the
//! [`catalog::EntityCatalog`] and `StoryGenerator` seams; this crate
//! owns request shaping, caching policy per route, the NDJSON
//! rendition, and the error surface.

pub mod catalog;
pub mod error;
pub mod routes;
pub mod state;
pub mod streaming;

pub use catalog::{EntityCatalog, FixtureCatalog, FixtureGenerator};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use state::AppState;
pub use streaming::ndjson_response;
