mod contact_submission;
mod required_field;

pub use contact_submission::ContactSubmission;
pub use required_field::RequiredField;
