pub mod grammar;
pub mod peg;
pub mod analysis;

pub use analysis::{Analysis, Options};
pub use grammar::Grammar;
pub use peg::{ExprId, GrammarError, GrammarErrors};

pub fn analyze(grammar: &Grammar) -> Result<Analysis, GrammarErrors> {
  Analysis::new(grammar, &Options::default())
}

pub fn analyze_with(grammar: &Grammar, options: &Options) -> Result<Analysis, GrammarErrors> {
  Analysis::new(grammar, options)
}
