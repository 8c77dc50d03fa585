mod question;
mod session;

pub use question::{Question, UserAnswer};
pub use session::Session;
