mod controller;
mod frame;
mod transport;

// Public API of the streaming subsystem.
pub use controller::StreamController;
pub use frame::{StreamFrame, decode_questions};
pub use transport::{FrameStream, SseTransport, StreamTransport};
