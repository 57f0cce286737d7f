//! Data models for the Tulen application.
//!
//! Request and response bodies are camelCase on the wire; rows map onto these types in `db`.

mod bubble;
mod notification;
mod rating;
mod study_match;
mod study_request;
mod user;

pub use bubble::*;
pub use notification::*;
pub use rating::*;
pub use study_match::*;
pub use study_request::*;
pub use user::*;
