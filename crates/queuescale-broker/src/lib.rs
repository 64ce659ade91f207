//! queuescale-broker — task-queue broker access over HTTP.
//!
//! Talks to a Flower-compatible monitoring endpoint given as the broker
//! connection string (`http://host:port[/prefix]`):
//!
//! ```text
//! FlowerBroker
//!   ├── queue_depth(queue)  GET {prefix}/api/queues/length
//!   └── active_workers()    GET {prefix}/api/workers?refresh=1
//! ```
//!
//! Requests are plain HTTP/1.1 over a fresh connection per call, each
//! bounded by the configured request timeout. Any transport failure,
//! non-2xx status, or undecodable body is a `ScaleError::Broker`.

pub mod flower;
pub mod transport;

pub use flower::FlowerBroker;
pub use transport::Endpoint;
