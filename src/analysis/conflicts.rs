use std::fmt::{self, Display, Formatter};
use crate::peg::{ExprId, Kind, Peg};
use super::matrix::BitMatrix;
use super::relations::Relations;

/// Two terminals that may start the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermPair {
  pub left: ExprId,
  pub right: ExprId,
}

/// A choice between `first` and `second` (or, when absent, the tail of
/// `expr`) that one symbol of lookahead cannot make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
  pub first: ExprId,
  pub second: Option<ExprId>,
  pub expr: ExprId,
  pub term_pairs: Vec<TermPair>,
}

impl Conflict {
  pub fn display<'a>(&'a self, peg: &'a Peg) -> impl Display + 'a {
    ConflictDisplay { conflict: self, peg }
  }
}

impl TermPair {
  pub fn display<'a>(&'a self, peg: &'a Peg) -> impl Display + 'a {
    TermPairDisplay { pair: self, peg }
  }
}

struct ConflictDisplay<'a> {
  conflict: &'a Conflict,
  peg: &'a Peg,
}

impl Display for ConflictDisplay<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let peg = self.peg;
    let c = self.conflict;
    write!(f, "{}  <==>  ", peg.node(c.first).simple())?;
    if let Some(second) = c.second {
      write!(f, "{} ", peg.node(second).simple())?;
    }
    write!(f, "Tail({})", peg.node(c.expr).name)
  }
}

struct TermPairDisplay<'a> {
  pair: &'a TermPair,
  peg: &'a Peg,
}

impl Display for TermPairDisplay<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(
      f,
      "{}  <==>  {}",
      self.peg.node(self.pair.left).source,
      self.peg.node(self.pair.right).source,
    )
  }
}

/// Checks every pair of alternatives and every iteration against its tail.
/// The result is ordered by the name of the enclosing expression.
pub(crate) fn find(peg: &Peg, relations: &Relations) -> Vec<Conflict> {
  let mut conflicts = vec![];
  for id in peg.nonterms() {
    match &peg.node(id).kind {
      Kind::Choice(args) => {
        for (i, &a1) in args.iter().enumerate() {
          for &a2 in &args[i + 1..] {
            conflicts.extend(check(peg, relations, a1, Some(a2), id));
          }
        }
      }
      &Kind::Plus(arg) | &Kind::Star(arg) | &Kind::Query(arg) => {
        conflicts.extend(check(peg, relations, arg, None, id));
      }
      _ => {}
    }
  }
  conflicts.sort_by(|x, y| peg.node(x.expr).name.cmp(&peg.node(y.expr).name));
  tracing::debug!(target: "pegcheck::conflicts", conflicts = conflicts.len(), "LL(1) check done");
  conflicts
}

fn check(
  peg: &Peg,
  relations: &Relations,
  e1: ExprId,
  e2: Option<ExprId>,
  e: ExprId,
) -> Option<Conflict> {
  let tail = &peg.node(e).first_tail_terms;
  let first1 = &peg.node(e1).first_terms;
  let first2 = match e2 {
    Some(e2) => {
      let node = peg.node(e2);
      let mut set = node.first_terms.clone();
      if node.attrs.is_transparent() {
        set.union_with(tail);
      }
      set
    }
    None => tail.clone(),
  };

  let collisions = BitMatrix::product(first1, &first2, peg.num_terms())
    .and(&relations.non_disjoint);
  if collisions.weight() == 0 {
    return None;
  }

  let conflict = Conflict {
    first: e1,
    second: e2,
    expr: e,
    term_pairs: collisions.pairs()
      .map(|(left, right)| TermPair { left: left.into(), right: right.into() })
      .collect(),
  };
  tracing::trace!(
    target: "pegcheck::conflicts",
    "{} ({} pair(s))",
    conflict.display(peg),
    conflict.term_pairs.len(),
  );
  Some(conflict)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analysis::{attrs, tail};
  use crate::grammar::*;
  use pretty_assertions::assert_eq;

  fn conflicts(g: &Grammar) -> (Peg, Vec<Conflict>) {
    let mut peg = Peg::new(g).unwrap();
    attrs::compute(&mut peg);
    let relations = Relations::compute(&peg);
    for id in peg.ids() {
      let terms = relations.first_terms(&peg, id);
      peg.node_mut(id).first_terms = terms;
    }
    tail::build(&mut peg);
    tail::attach_remaining_input(&mut peg);
    tail::compute_first_tail_terms(&mut peg);
    let found = find(&peg, &relations);
    (peg, found)
  }

  fn rendered(peg: &Peg, conflicts: &[Conflict]) -> Vec<String> {
    conflicts.iter()
      .map(|c| {
        let pairs = c.term_pairs.iter()
          .map(|p| p.display(peg).to_string())
          .collect::<Vec<_>>();
        format!("{}: {}", c.display(peg), pairs.join(", "))
      })
      .collect()
  }

  #[test]
  fn disjoint_alternatives() {
    let (_, found) = conflicts(&grammar(&[
      ("A", lit("ab") | lit("ac")),
    ]));

    assert!(found.is_empty());
  }

  #[test]
  fn prefix_alternatives() {
    let (peg, found) = conflicts(&grammar(&[
      ("A", lit("ab") | lit("a")),
    ]));

    assert_eq!(rendered(&peg, &found), vec![r#""ab"  <==>  "a" Tail(A): "ab"  <==>  "a""#]);
    assert_eq!(found[0].second, peg.find("A.2"));
  }

  #[test]
  fn iteration_against_its_tail() {
    let (peg, found) = conflicts(&grammar(&[
      ("S", seq([star(lit("a")), lit("a")])),
    ]));

    assert_eq!(rendered(&peg, &found), vec![r#""a"  <==>  Tail(S.1): "a"  <==>  "a""#]);
    assert_eq!(found[0].second, None);
  }

  #[test]
  fn transparent_alternative_sees_the_tail() {
    let (peg, found) = conflicts(&grammar(&[
      ("S", seq([rule("A"), lit("b")])),
      ("A", lit("b") | opt(lit("c"))),
    ]));

    assert_eq!(rendered(&peg, &found), vec![r#""b"  <==>  "c"? Tail(A): "b"  <==>  "b""#]);
  }

  #[test]
  fn conflicts_sorted_by_enclosing_name() {
    let (peg, found) = conflicts(&grammar(&[
      ("S", seq([rule("B"), rule("A")])),
      ("B", lit("x") | lit("xy")),
      ("A", lit("a") | class("ab")),
    ]));
    let names = found.iter()
      .map(|c| peg.node(c.expr).name.as_str())
      .collect::<Vec<_>>();

    assert_eq!(names, vec!["A", "B"]);
  }

  #[test]
  fn unconsumed_input_adds_no_conflict() {
    let (_, found) = conflicts(&grammar(&[
      ("S", plus(lit("a"))),
    ]));

    assert!(found.is_empty());
  }
}
