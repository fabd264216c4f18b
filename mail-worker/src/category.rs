//! Message category registry.
//!
//! Categories travel over the wire as their symbolic names
//! (`"EMAIL_CONFIRMATION"`), never as numeric codes. The set is closed:
//! adding a category means adding a variant here.

use std::fmt;

/// Closed set of notification categories accepted by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageCategory {
    /// Account email address confirmation
    EmailConfirmation,
    /// Password reset link
    PasswordReset,
}

impl MessageCategory {
    /// Every known category, in declaration order.
    pub const ALL: [MessageCategory; 2] = [
        MessageCategory::EmailConfirmation,
        MessageCategory::PasswordReset,
    ];

    /// Symbolic name used on the wire and forwarded to the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::EmailConfirmation => "EMAIL_CONFIRMATION",
            MessageCategory::PasswordReset => "PASSWORD_RESET",
        }
    }

    /// Look up a category by its exact symbolic name.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.as_str() == tag)
    }

    /// Check whether `tag` names a known category.
    ///
    /// Matching is exact and case-sensitive.
    pub fn is_valid(tag: &str) -> bool {
        Self::parse(tag).is_some()
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
