pub mod identity;
pub mod token;
pub mod user;

pub use identity::SessionIdentity;
pub use token::{AuthToken, extract_token};
pub use user::{SessionSettings, VirtualUserSession};
