use std::fmt::{self, Display, Formatter};
use indexmap::IndexSet;
use thiserror::Error;
use crate::peg::{ExprId, Kind, Peg};
use super::relations::Relations;

/// A finding that makes the grammar unusable for a recursive-descent parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum StructuralError {
  #[error("'{rule}' is left-recursive{}", witnesses(.via))]
  LeftRecursion { rule: String, via: Vec<String> },
  #[error("'{arg}' in '{expr}' may consume empty string")]
  NullableIteration { arg: String, expr: String },
}

fn witnesses(via: &[String]) -> String {
  if via.is_empty() {
    return String::new();
  }
  let quoted = via.iter()
    .map(|name| format!("'{}'", name))
    .collect::<Vec<_>>();
  format!(" via {}", quoted.join(" and "))
}

/// Advisory finding; never stops the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Note {
  HidesAlternatives { alt: String, choice: String },
  EndsInput { elem: String, seq: String },
  AlwaysFails { expr: String },
  RedundantQuery { arg: String, expr: String },
}

impl Display for Note {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Note::HidesAlternatives { alt, choice } => {
        write!(f, "'{}' in '{}' never fails and hides other alternative(s)", alt, choice)
      }
      Note::EndsInput { elem, seq } => {
        write!(f, "'{}' in '{}' succeeds only on end of input", elem, seq)
      }
      Note::AlwaysFails { expr } => write!(f, "'{}' always fails", expr),
      Note::RedundantQuery { arg, expr } => {
        write!(f, "As '{}' in '{}' never fails, the '?' can be dropped", arg, expr)
      }
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnosis {
  pub errors: Vec<StructuralError>,
  pub notes: Vec<Note>,
}

/// Finds left recursion and nullable iterations. Style notes are collected
/// only when there are no errors.
pub(crate) fn diagnose(peg: &Peg, relations: &Relations, style_notes: bool) -> Diagnosis {
  let mut errors = IndexSet::new();

  for id in peg.nonterms() {
    let node = peg.node(id);
    if let &Kind::Plus(arg) | &Kind::Star(arg) = &node.kind {
      if peg.node(arg).attrs.nullable {
        errors.insert(StructuralError::NullableIteration {
          arg: peg.node(arg).simple().to_owned(),
          expr: node.source.clone(),
        });
      }
    }
  }

  let calls = &relations.calls;
  let closure = &relations.calls_closure;
  for &rule in peg.rules() {
    let i = rule.index();
    if closure.get(i, i) {
      let via = peg.ids()
        .filter(|j| calls.get(i, j.index()) && closure.get(j.index(), i))
        .map(|j| peg.node(j).simple().to_owned())
        .collect();
      errors.insert(StructuralError::LeftRecursion {
        rule: peg.node(rule).simple().to_owned(),
        via,
      });
    }
  }

  if !errors.is_empty() {
    for error in &errors {
      tracing::warn!(target: "pegcheck::diagnose", "{}", error);
    }
    return Diagnosis {
      errors: errors.into_iter().collect(),
      notes: vec![],
    };
  }

  let notes = if style_notes { notes(peg) } else { vec![] };
  tracing::debug!(target: "pegcheck::diagnose", notes = notes.len(), "grammar is well-formed");
  Diagnosis {
    errors: vec![],
    notes,
  }
}

fn notes(peg: &Peg) -> Vec<Note> {
  let mut choice = IndexSet::new();
  let mut ends = IndexSet::new();
  let mut fails = IndexSet::new();
  let mut query = IndexSet::new();
  let simple = |id: ExprId| peg.node(id).simple().to_owned();

  for id in peg.ids() {
    let node = peg.node(id);
    match &node.kind {
      Kind::Choice(args) => {
        for &alt in &args[..args.len() - 1] {
          if !peg.node(alt).attrs.can_fail {
            choice.insert(Note::HidesAlternatives {
              alt: simple(alt),
              choice: node.simple().to_owned(),
            });
          }
        }
      }
      Kind::Sequence(args) => {
        for &elem in &args[..args.len() - 1] {
          if peg.node(elem).attrs.ends_input {
            ends.insert(Note::EndsInput {
              elem: simple(elem),
              seq: node.source.clone(),
            });
          }
        }
      }
      &Kind::Query(arg) if !peg.node(arg).attrs.can_fail => {
        query.insert(Note::RedundantQuery {
          arg: simple(arg),
          expr: node.source.clone(),
        });
      }
      _ => {}
    }
    if node.attrs.always_fails() {
      fails.insert(Note::AlwaysFails { expr: node.simple().to_owned() });
    }
  }

  choice.into_iter()
    .chain(ends)
    .chain(fails)
    .chain(query)
    .collect()
}
