use std::fmt::Display;

/// A submitted form value that must be present and non-empty.
///
/// The value is kept exactly as submitted, whitespace included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredField(String);

impl RequiredField {
    pub fn parse(field: &str, s: Option<String>) -> Result<Self, String> {
        match s {
            Some(s) if !s.is_empty() => Ok(Self(s)),
            Some(_) => Err(format!("{} is empty", field)),
            None => Err(format!("{} is missing", field)),
        }
    }
}

impl Display for RequiredField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for RequiredField {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
