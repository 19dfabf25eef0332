use crate::domain::RequiredField;

pub struct ContactSubmission {
    pub name: RequiredField,
    pub email: RequiredField,
    pub service: RequiredField,
    pub message: RequiredField,
}

impl ContactSubmission {
    /// First whitespace-separated word of the name, used to greet the sender.
    pub fn first_name(&self) -> &str {
        let name = self.name.as_ref();
        name.split_whitespace().next().unwrap_or(name)
    }
}
