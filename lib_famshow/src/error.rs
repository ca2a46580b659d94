use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed Newick tree at byte {offset}: {reason}")]
    MalformedTree { offset: usize, reason: String },

    #[error("Malformed residue heights on line {line}: {reason}")]
    MalformedHeights { line: usize, reason: String },

    #[error("A logo alphabet must contain at least one residue symbol.")]
    EmptyAlphabet,

    #[error("The residue symbol {0:?} appears twice in the logo alphabet.")]
    DuplicateSymbol(char),
}
