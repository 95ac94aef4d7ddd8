pub mod resolve;
pub mod tokenize;

pub use resolve::resolve;
pub use tokenize::tokenize;
