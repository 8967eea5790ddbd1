/// Middleware module
///
/// The request gate guarding protected scopes and the extractor handing its
/// verdict to handlers.

mod current_user;
mod request_gate;

pub use current_user::CurrentUser;
pub use request_gate::{check_revocation, Admission, RequestGate};
