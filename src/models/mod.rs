mod envelope;
mod user;
mod chat;
mod ai_chat;
mod document;
mod consultation;
mod credits;
mod payment;
mod notification;
mod events;

pub use envelope::*;
pub use user::*;
pub use chat::*;
pub use ai_chat::*;
pub use document::*;
pub use consultation::*;
pub use credits::*;
pub use payment::*;
pub use notification::*;
pub use events::*;
