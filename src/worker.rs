//! Background execution context and the protocol spoken over it.
//!
//! - [`host`] constructs background contexts (OS threads) from [`host::ContextOptions`]
//! - [`protocol`] defines the tagged request/reply messages
//! - [`runtime`] is the loop running inside the context
//! - [`channel`] is the coordinator's side: sends requests and demultiplexes replies

pub mod channel;
pub mod host;
pub mod protocol;
pub mod runtime;

pub use channel::{ChannelEvent, PendingRequest, WorkerChannel};
pub use host::{
    BackgroundContext, BackgroundHost, ClassicHost, ContextOptions, LoadingMode, ThreadHost,
    WorkerBody,
};
pub use protocol::{SuccessPayload, WorkerErrorKind, WorkerReply, WorkerRequest};
pub use runtime::worker_loop;
