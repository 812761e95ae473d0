use thiserror::Error;

pub type SelectorResult<T> = Result<T, SelectorError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected character '{found}' at {pos} in selector \"{selector}\"")]
    UnexpectedChar {
        selector: String,
        pos: usize,
        found: char,
    },

    #[error("Unexpected end of selector \"{selector}\"")]
    UnexpectedEnd { selector: String },

    #[error("Unsupported pseudo-class ':{name}' in selector \"{selector}\"")]
    UnsupportedPseudo { selector: String, name: String },
}

impl SelectorError {
    pub fn unexpected_char(selector: &str, pos: usize, found: char) -> Self {
        Self::UnexpectedChar {
            selector: selector.to_string(),
            pos,
            found,
        }
    }

    pub fn unexpected_end(selector: &str) -> Self {
        Self::UnexpectedEnd {
            selector: selector.to_string(),
        }
    }

    pub fn unsupported_pseudo(selector: &str, name: impl Into<String>) -> Self {
        Self::UnsupportedPseudo {
            selector: selector.to_string(),
            name: name.into(),
        }
    }
}
