mod health_check;
mod submissions;

pub use health_check::check_health;
pub use submissions::{method_not_allowed, preflight, submit, FormData, SubmitError};
