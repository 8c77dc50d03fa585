#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod gateway;
pub mod progress;
pub mod store;
pub mod streaming;

pub use sitequiz_core::Clock;

pub use app_services::AppServices;
pub use error::{StreamError, SubmitError};
pub use gateway::{
    GatewayConfig, PreviewImageResponse, SubmissionApi, SubmissionGateway, SubmissionResponse,
};
pub use progress::ProgressDriver;
pub use store::SessionStore;
pub use streaming::{FrameStream, SseTransport, StreamController, StreamTransport};
