//! Command parser
//!
//! Turns a raw command string such as `AALRRA` into a validated
//! [`CommandSequence`]. Parsing is all-or-nothing: the first character
//! outside the alphabet rejects the whole input.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One primitive drone instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandToken {
    /// `A`: move one cell in the current heading
    Advance,
    /// `L`: rotate 90 degrees counter-clockwise
    TurnLeft,
    /// `R`: rotate 90 degrees clockwise
    TurnRight,
}

impl CommandToken {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'A' => Some(CommandToken::Advance),
            'L' => Some(CommandToken::TurnLeft),
            'R' => Some(CommandToken::TurnRight),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            CommandToken::Advance => 'A',
            CommandToken::TurnLeft => 'L',
            CommandToken::TurnRight => 'R',
        }
    }
}

/// Error raised when a command input contains something other than `A`, `L` or `R`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Invalid command {character:?} at index {index}")]
    InvalidToken { index: usize, character: char },

    #[error("Invalid command element {element:?} at index {index}: expected exactly one of A, L, R")]
    InvalidElement { index: usize, element: String },
}

impl CommandParseError {
    /// Index of the offending character (string form) or element (list form)
    pub fn index(&self) -> usize {
        match self {
            CommandParseError::InvalidToken { index, .. } => *index,
            CommandParseError::InvalidElement { index, .. } => *index,
        }
    }
}

/// Ordered list of command tokens. Order is execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSequence {
    tokens: Vec<CommandToken>,
}

impl CommandSequence {
    pub fn new(tokens: Vec<CommandToken>) -> Self {
        Self { tokens }
    }

    /// Parse a command string. Case-sensitive; whitespace is rejected.
    /// The empty string is a valid no-op sequence.
    pub fn parse(raw: &str) -> Result<Self, CommandParseError> {
        let tokens = raw
            .chars()
            .enumerate()
            .map(|(index, character)| {
                CommandToken::from_char(character)
                    .ok_or(CommandParseError::InvalidToken { index, character })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens })
    }

    /// Parse the list form, one single-character command per element
    pub fn from_elements<S: AsRef<str>>(elements: &[S]) -> Result<Self, CommandParseError> {
        let mut tokens = Vec::with_capacity(elements.len());

        for (index, element) in elements.iter().enumerate() {
            let element = element.as_ref();
            let mut chars = element.chars();
            let token = match (chars.next(), chars.next()) {
                (Some(c), None) => CommandToken::from_char(c),
                _ => None,
            };

            match token {
                Some(token) => tokens.push(token),
                None => {
                    return Err(CommandParseError::InvalidElement {
                        index,
                        element: element.to_string(),
                    })
                }
            }
        }

        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[CommandToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, CommandToken)> + '_ {
        self.tokens.iter().copied().enumerate()
    }
}

impl fmt::Display for CommandSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "{}", token.as_char())?;
        }
        Ok(())
    }
}

/// Commands as they arrive on the wire: either `"AALR"` or `["A", "A", "L", "R"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandInput {
    Text(String),
    Elements(Vec<String>),
}

impl CommandInput {
    pub fn parse(&self) -> Result<CommandSequence, CommandParseError> {
        match self {
            CommandInput::Text(raw) => CommandSequence::parse(raw),
            CommandInput::Elements(elements) => CommandSequence::from_elements(elements),
        }
    }
}

impl From<&str> for CommandInput {
    fn from(raw: &str) -> Self {
        CommandInput::Text(raw.to_string())
    }
}
