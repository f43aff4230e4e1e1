// Public API - what other modules can use
pub use generators::{NameSuggester, PetNameSuggester};
pub use handlers::create_session;
pub use token::{TokenConfig, DEFAULT_EXPIRATION_DAYS};
pub use types::{SessionClaims, SessionRequest, SessionResponse};

// Internal modules
mod generators;
mod handlers;
mod token;
mod types;
