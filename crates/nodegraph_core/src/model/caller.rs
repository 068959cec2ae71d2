//! Caller identity supplied by the host's authentication layer.
//!
//! Passed explicitly to every mutation; core never keeps a "current user".

/// Who issued a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Caller {
    /// No authenticated identity was supplied.
    #[default]
    Anonymous,
    /// Authenticated user id as issued by the host.
    User(String),
}

impl Caller {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(id.as_str()),
        }
    }

    /// Label used in `actor=` log fields.
    pub(crate) fn log_label(&self) -> &str {
        self.user_id().unwrap_or("anonymous")
    }
}
