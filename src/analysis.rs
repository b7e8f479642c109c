use crate::grammar::Grammar;
use crate::peg::{ExprId, GrammarErrors, Node, Peg};
use self::attrs::Attrs;
use self::bitset::BitSet;
use self::conflicts::Conflict;
use self::diagnose::{Diagnosis, Note, StructuralError};
use self::relations::Relations;
use self::tail::Tail;

pub mod attrs;
pub mod bitset;
pub mod conflicts;
pub mod diagnose;
pub mod matrix;
pub mod relations;
pub mod tail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
  /// Let a start rule that does not end input be followed by anything.
  pub remaining_input_tail: bool,
  pub style_notes: bool,
  pub conflicts: bool,
}

impl Default for Options {
  fn default() -> Self {
    Options {
      remaining_input_tail: true,
      style_notes: true,
      conflicts: true,
    }
  }
}

/// Everything computed for one grammar.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
  peg: Peg,
  relations: Relations,
  diagnosis: Diagnosis,
  conflicts: Vec<Conflict>,
}

impl Analysis {
  pub fn new(grammar: &Grammar, options: &Options) -> Result<Analysis, GrammarErrors> {
    let mut peg = Peg::new(grammar)?;
    tracing::debug!(
      target: "pegcheck::analysis",
      rules = peg.rules().len(),
      exprs = peg.len(),
      terms = peg.num_terms(),
      "grammar lowered",
    );

    attrs::compute(&mut peg);
    let relations = Relations::compute(&peg);
    let diagnosis = diagnose::diagnose(&peg, &relations, options.style_notes);
    if !diagnosis.errors.is_empty() {
      tracing::warn!(
        target: "pegcheck::analysis",
        errors = diagnosis.errors.len(),
        "grammar is not well-formed, tails and conflicts skipped",
      );
      return Ok(Analysis {
        peg,
        relations,
        diagnosis,
        conflicts: vec![],
      });
    }

    for id in peg.ids() {
      let terms = relations.first_terms(&peg, id);
      peg.node_mut(id).first_terms = terms;
    }
    tail::build(&mut peg);
    if options.remaining_input_tail {
      tail::attach_remaining_input(&mut peg);
    }
    tail::compute_first_tail_terms(&mut peg);

    let conflicts = if options.conflicts {
      conflicts::find(&peg, &relations)
    } else {
      vec![]
    };

    Ok(Analysis {
      peg,
      relations,
      diagnosis,
      conflicts,
    })
  }

  pub fn peg(&self) -> &Peg {
    &self.peg
  }

  pub fn node(&self, id: ExprId) -> &Node {
    self.peg.node(id)
  }

  pub fn find(&self, name: &str) -> Option<ExprId> {
    self.peg.find(name)
  }

  pub fn attrs(&self, id: ExprId) -> Attrs {
    self.node(id).attrs
  }

  pub fn first_terms(&self, id: ExprId) -> &BitSet {
    &self.node(id).first_terms
  }

  pub fn first_tail_terms(&self, id: ExprId) -> &BitSet {
    &self.node(id).first_tail_terms
  }

  pub fn tail(&self, id: ExprId) -> &Tail {
    &self.node(id).tail
  }

  pub fn relations(&self) -> &Relations {
    &self.relations
  }

  pub fn is_well_formed(&self) -> bool {
    self.diagnosis.errors.is_empty()
  }

  pub fn errors(&self) -> &[StructuralError] {
    &self.diagnosis.errors
  }

  pub fn notes(&self) -> &[Note] {
    &self.diagnosis.notes
  }

  pub fn conflicts(&self) -> &[Conflict] {
    &self.conflicts
  }

  /// Errors, or notes and conflicts, one per line.
  pub fn report(&self) -> String {
    let mut lines = self.errors().iter()
      .map(ToString::to_string)
      .chain(self.notes().iter().map(ToString::to_string))
      .collect::<Vec<_>>();
    for conflict in &self.conflicts {
      lines.push(conflict.display(&self.peg).to_string());
      for pair in &conflict.term_pairs {
        lines.push(format!("  {}", pair.display(&self.peg)));
      }
    }
    lines.join("\n")
  }
}
