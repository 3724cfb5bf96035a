//! Utility modules shared by the tool servers.
//!
//! - [`HttpClient`]: HTTP client with shared defaults
//! - [`RateLimiter`]: minimum-interval limiter with an injectable [`Clock`]
//! - [`haversine`]: great-circle distance in meters
//!
//! # Rate limiting
//!
//! ```rust
//! use travel_agent::utils::RateLimiter;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let limiter = RateLimiter::per_second(1.0);
//! limiter.wait().await; // first call proceeds immediately
//! # }
//! ```

mod geo;
mod http;
mod rate_limit;

pub use geo::{haversine, EARTH_RADIUS_M};
pub use http::{default_user_agent, HttpClient};
pub use rate_limit::{Clock, ManualClock, RateLimiter, TokioClock};
