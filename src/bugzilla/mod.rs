pub mod content;
pub mod dispatch;
pub mod fields;
pub mod identity;
pub mod model;
pub mod normalize;
pub mod request;
pub mod service;

pub use fields::BugField;
pub use identity::Suffix;
pub use model::{Attachment, Bug, BugUpdate, Comment, Event, FieldDelta, ReadMode};
pub use service::Service;
