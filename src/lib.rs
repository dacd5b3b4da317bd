//! docean is a client core for the DigitalOcean v2 REST API: request
//! construction, JSON decoding, server-side rate-limit tracking and
//! error classification, with per-resource services layered on top.
//!
//! ```no_run
//! use docean::{Client, TagsService};
//!
//! # async fn run() -> Result<(), docean::Error> {
//! let client = Client::new();
//! let (tags, resp) = client.tags().list(None).await?;
//! println!(
//!     "{} tags, {} calls left this window",
//!     tags.len(),
//!     resp.rate.remaining
//! );
//! # Ok(())
//! # }
//! ```
//!
//! The client never retries. When the cached quota is exhausted it
//! refuses to send until the window resets and returns
//! [`Error::RateLimit`] without a round trip; callers own any waiting
//! or retry policy.

pub mod client;
pub mod error;
pub mod links;
pub mod rate;
pub mod tags;
pub mod timestamp;

pub use client::{Client, ClientBuilder, ListOptions, Response};
pub use error::{AcceptedError, Error, ErrorResponse, RateLimitError};
pub use links::{Links, Meta, Pages};
pub use rate::Rate;
pub use tags::{Resource, ResourceType, Tag, Tags, TagsService};
pub use timestamp::Timestamp;
