pub mod cursor;
pub mod diag;
pub mod phases;

pub use phases::resolve::{Label, LabelKind, LabelTable};
pub use phases::tokenize::{Token, TokenKind};

use diag::Diag;
use std::borrow::Cow;
use std::fmt::Display;

/// Which phase the front end gave up in. The messages themselves have
/// already gone to the run's diagnostics by the time this is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Tokenize,
    Resolve,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Tokenize => write!(f, "assembly failed while tokenizing the source"),
            Error::Resolve => write!(f, "assembly failed while resolving sections and labels"),
        }
    }
}

/// Everything the front end produces: the validated token stream and the
/// resolved label table. A downstream encoder re-walks the program
/// section's tokens against the table to emit opcode bytes.
#[derive(Debug)]
pub struct Analysis {
    pub tokens: Vec<Token>,
    pub labels: LabelTable,
}

// The scanner relies on every token being newline-terminated.
fn terminated(source: &str) -> Cow<'_, str> {
    if source.ends_with('\n') {
        Cow::Borrowed(source)
    } else {
        Cow::Owned(format!("{}\n", source))
    }
}

/// Runs just the lexing phase. A failed run's token stream is withheld;
/// partial output must not be mistaken for a usable one.
pub fn lex(source: &str, diag: &Diag) -> Result<Vec<Token>, Error> {
    let source = terminated(source);
    let tokens = phases::tokenize(&source, &diag.named("lexer"));
    if !diag.good() {
        return Err(Error::Tokenize);
    }

    log::debug!("tokenized {} tokens", tokens.len());
    Ok(tokens)
}

/// The whole front end: source text in, token stream and label table out.
///
/// The resolver only runs over a token sequence the lexer fully validated,
/// so a lexing failure aborts before resolution.
pub fn analyze(source: &str, diag: &Diag) -> Result<Analysis, Error> {
    let tokens = lex(source, diag)?;

    let labels = phases::resolve(&tokens, &diag.named("resolver"));
    if !diag.good() {
        return Err(Error::Resolve);
    }

    log::debug!("resolved {} labels", labels.len());
    Ok(Analysis { tokens, labels })
}
