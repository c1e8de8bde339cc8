//! Auth-domain credentials, token models, and the broker's owned token state.

pub mod credential;
pub mod grant;
pub mod secret;
pub mod state;
pub mod token;

pub use credential::*;
pub use grant::*;
pub use secret::*;
pub use state::*;
pub use token::*;
