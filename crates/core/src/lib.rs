#![forbid(unsafe_code)]

pub mod model;
pub mod progress;
pub mod time;
pub mod urlnorm;

pub use time::Clock;

pub use model::{Question, Session, UserAnswer};
pub use progress::{ProgressEstimator, ProgressPhase};
pub use urlnorm::UrlError;
