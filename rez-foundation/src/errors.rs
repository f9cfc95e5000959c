//! Error types for the whole pipeline.
//!
//! Every stage reports failures the same way: a message plus an optional
//! source position. All errors are fatal to the current parse; there is no
//! recovery, so the types stay deliberately small.

use std::fmt;

use thiserror::Error;

/// Points a diagnostic at the source being processed.
///
/// Both parts are optional because some failures have no position to report;
/// evaluation in particular runs over an already-built AST.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: Option<String>,
    /// 1-based line number.
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: Some(filename.into()),
            line: Some(line),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.filename, self.line) {
            (Some(filename), Some(line)) => write!(f, "{filename}:{line}"),
            (Some(filename), None) => write!(f, "{filename}"),
            (None, Some(line)) => write!(f, "line {line}"),
            (None, None) => write!(f, "<unknown location>"),
        }
    }
}

macro_rules! error_kinds {
    ($($(#[$doc:meta])* $Name:ident),* $(,)?) => {$(
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Error)]
        #[error("{location}: {message}")]
        pub struct $Name {
            pub message: String,
            pub location: SourceLocation,
        }

        impl $Name {
            pub fn new(message: impl Into<String>) -> Self {
                Self {
                    message: message.into(),
                    location: SourceLocation::default(),
                }
            }

            pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
                Self {
                    message: message.into(),
                    location,
                }
            }
        }
    )*};
}

error_kinds! {
    /// The lexer could not tokenize the input: unterminated string, unknown
    /// `$$` function, a character with no rule, and the like.
    LexError,
    /// The preprocessor rejected a directive: unbalanced `#endif`, macro
    /// expansion too deep, include file not found, nested `enum`, …
    PreprocessError,
    /// The parser hit an unexpected token or an invalid declaration.
    ParseError,
    /// The evaluator could not produce a value: unknown symbol, division by
    /// zero, an unimplemented host hook, …
    EvalError,
}

/// Any error the pipeline can produce.
///
/// The preprocessor pulls the parser and evaluator in to compute directive
/// operands, so a single token fetch can fail with any of the four kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RezError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl RezError {
    pub fn location(&self) -> &SourceLocation {
        match self {
            RezError::Lex(error) => &error.location,
            RezError::Preprocess(error) => &error.location,
            RezError::Parse(error) => &error.location,
            RezError::Eval(error) => &error.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_rendering() {
        assert_eq!(SourceLocation::new("menu.r", 12).to_string(), "menu.r:12");
        assert_eq!(SourceLocation::default().to_string(), "<unknown location>");
    }

    #[test]
    fn errors_carry_their_location_through_the_umbrella() {
        let error = RezError::from(LexError::at(
            "unterminated string literal",
            SourceLocation::new("menu.r", 3),
        ));
        assert_eq!(error.location().to_string(), "menu.r:3");
        assert_eq!(error.to_string(), "menu.r:3: unterminated string literal");
    }
}
