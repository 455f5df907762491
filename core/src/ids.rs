use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

pub const ID_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("id cannot be empty")]
    Empty,
    #[error("id must be at most {max} chars, got {found}")]
    TooLong { max: usize, found: usize },
    #[error("invalid character {ch:?} at position {index}")]
    InvalidCharacter { ch: char, index: usize },
}

fn validate(value: &str) -> Result<&str, IdError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(IdError::Empty);
    }
    if trimmed.len() > ID_MAX_LEN {
        return Err(IdError::TooLong {
            max: ID_MAX_LEN,
            found: trimmed.len(),
        });
    }
    for (idx, ch) in trimmed.chars().enumerate() {
        if ch.is_control() || ch.is_whitespace() {
            return Err(IdError::InvalidCharacter { ch, index: idx });
        }
    }
    Ok(trimmed)
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
            Archive,
            Serialize,
            Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: &str) -> Result<Self, IdError> {
                validate(value).map(|id| Self(id.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Re-checks an id that did not come through [`Self::parse`], such as one read out
            /// of a binary frame. Surrounding whitespace is an error here, not trimmed.
            pub fn check(&self) -> Result<(), IdError> {
                let whitespace = self.0.chars().enumerate().find(|(_, ch)| ch.is_whitespace());
                if let Some((index, ch)) = whitespace {
                    return Err(IdError::InvalidCharacter { ch, index });
                }
                validate(&self.0).map(|_| ())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

string_id!(
    /// One slot in the turn order.
    ParticipantId
);
string_id!(
    /// A placed entity on the scene (a token).
    EntityId
);
string_id!(
    /// A connected user; doubles as the proposer identity of a target set.
    UserId
);
