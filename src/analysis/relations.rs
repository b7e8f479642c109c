use crate::peg::{ExprId, Kind, Peg};
use super::bitset::BitSet;
use super::matrix::BitMatrix;

/// Relations between expressions (N x N) and between terminals (T x T).
#[derive(Debug, Clone, PartialEq)]
pub struct Relations {
  /// `i` may call `j` as its very next action.
  pub calls: BitMatrix,
  /// Transitive closure of `calls`.
  pub calls_closure: BitMatrix,
  /// `i` may call `j` as its very next action, and `j` may consume input.
  pub first: BitMatrix,
  /// Reflexive-transitive closure of `first`.
  pub first_closure: BitMatrix,
  pub disjoint: BitMatrix,
  pub non_disjoint: BitMatrix,
}

impl Relations {
  pub(crate) fn compute(peg: &Peg) -> Relations {
    let n = peg.len();
    let mut calls = BitMatrix::new(n);
    let mut first = BitMatrix::new(n);

    for id in peg.nonterms() {
      let i = id.index();
      let mut link = |arg: ExprId, advancing: bool| {
        calls.set(i, arg.index());
        if advancing {
          first.set(i, arg.index());
        }
      };
      let adv = |arg: ExprId| peg.node(arg).attrs.advances;

      match &peg.node(id).kind {
        Kind::Choice(args) => {
          for &arg in args {
            link(arg, adv(arg));
          }
        }
        Kind::Sequence(args) => {
          for &arg in args {
            link(arg, adv(arg));
            let attrs = peg.node(arg).attrs;
            if !attrs.nullable || attrs.ends_input {
              break;
            }
          }
        }
        &Kind::And(arg) | &Kind::Not(arg) => link(arg, false),
        &Kind::Plus(arg) | &Kind::Star(arg) | &Kind::Query(arg) => link(arg, adv(arg)),
        &Kind::Ref { rule, .. } => link(rule, true),
        _ => {}
      }
    }

    let calls_closure = calls.closure();
    let first_closure = first.star();
    let disjoint = disjoint(peg);
    let non_disjoint = disjoint.not();

    tracing::debug!(
      target: "pegcheck::relations",
      calls = calls.weight(),
      first = first.weight(),
      disjoint = disjoint.weight(),
      "relations built",
    );

    Relations {
      calls,
      calls_closure,
      first,
      first_closure,
      disjoint,
      non_disjoint,
    }
  }

  /// Terminals that may begin a match of `id`.
  pub fn first_terms(&self, peg: &Peg, id: ExprId) -> BitSet {
    let mut set = BitSet::new(peg.num_terms());
    for j in self.first_closure.row(id.index()).iter().take_while(|&j| j < peg.num_terms()) {
      set.insert(j);
    }
    set
  }
}

fn disjoint(peg: &Peg) -> BitMatrix {
  let t = peg.num_terms();
  let mut m = BitMatrix::new(t);
  for i in 0..t {
    for j in i..t {
      let x = &peg.node(ExprId::from(i)).kind;
      let y = &peg.node(ExprId::from(j)).kind;
      if are_disjoint(x, y) {
        m.set(i, j);
        m.set(j, i);
      }
    }
  }
  m
}

/// Whether no input can start a match of both terminals.
fn are_disjoint(x: &Kind, y: &Kind) -> bool {
  use Kind::*;

  match (x, y) {
    (EndOfInput, _) | (_, EndOfInput) => true,
    (Any, _) | (_, Any) | (AnyRemainingInput, _) | (_, AnyRemainingInput) => false,
    (StringLit(s), StringLit(t)) => !s.starts_with(t.as_str()) && !t.starts_with(s.as_str()),
    (StringLit(s), CharClass { chars, negated })
    | (CharClass { chars, negated }, StringLit(s)) => match s.chars().next() {
      Some(c) => chars.contains(c) == *negated,
      None => false,
    },
    (StringLit(s), &Range(low, high)) | (&Range(low, high), StringLit(s)) => {
      match s.chars().next() {
        Some(c) => c < low || c > high,
        None => false,
      }
    }
    (
      CharClass { chars: xs, negated: xn },
      CharClass { chars: ys, negated: yn },
    ) => match (xn, yn) {
      (false, false) => !ys.chars().any(|c| xs.contains(c)),
      (true, false) => ys.chars().all(|c| xs.contains(c)),
      (false, true) => xs.chars().all(|c| ys.contains(c)),
      (true, true) => false,
    },
    (CharClass { chars, negated }, &Range(low, high))
    | (&Range(low, high), CharClass { chars, negated }) => {
      if *negated {
        (low..=high).all(|c| chars.contains(c))
      } else {
        !chars.chars().any(|c| (low..=high).contains(&c))
      }
    }
    (&Range(xa, xz), &Range(ya, yz)) => xz < ya || yz < xa,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analysis::attrs;
  use crate::grammar::*;
  use pretty_assertions::assert_eq;

  fn relations(g: &Grammar) -> (Peg, Relations) {
    let mut peg = Peg::new(g).unwrap();
    attrs::compute(&mut peg);
    let rel = Relations::compute(&peg);
    (peg, rel)
  }

  fn id(peg: &Peg, name: &str) -> usize {
    peg.find(name).unwrap().index()
  }

  #[test]
  fn sequence_links_up_to_first_non_nullable() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([opt(lit("a")), and(lit("b")), lit("c"), lit("d")])),
    ]));
    let s = id(&peg, "S");

    assert!(rel.calls.get(s, id(&peg, "S.1")));
    assert!(rel.first.get(s, id(&peg, "S.1")));
    assert!(rel.calls.get(s, id(&peg, "S.2")));
    assert!(!rel.first.get(s, id(&peg, "S.2")));
    assert!(rel.first.get(s, id(&peg, "S.3")));
    assert!(!rel.calls.get(s, id(&peg, "S.4")));
  }

  #[test]
  fn sequence_stops_after_end_of_input() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([eoi(), lit("a")])),
    ]));

    assert!(rel.calls.get(id(&peg, "S"), id(&peg, "S.1")));
    assert!(!rel.calls.get(id(&peg, "S"), id(&peg, "S.2")));
  }

  #[test]
  fn first_terms_follow_references() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([rule("A"), lit("z")])),
      ("A", lit("x") | seq([opt(lit("y")), rule("B")])),
      ("B", lit("b")),
    ]));
    let names = |set: &BitSet| set.iter()
      .map(|t| peg.node(ExprId::from(t)).source.clone())
      .collect::<Vec<_>>();

    assert_eq!(
      names(&rel.first_terms(&peg, peg.start())),
      vec![r#""x""#, r#""y""#, r#""b""#],
    );
    assert_eq!(names(&rel.first_terms(&peg, peg.find("S.2").unwrap())), vec![r#""z""#]);
  }

  #[test]
  fn calls_closure_is_not_reflexive() {
    let (peg, rel) = relations(&grammar(&[
      ("A", seq([lit("x"), rule("A")]) | lit("y")),
    ]));
    let a = id(&peg, "A");

    assert!(!rel.calls_closure.get(a, a));
    assert!(rel.first_closure.get(a, a));
  }

  #[test]
  fn left_recursion_shows_on_the_diagonal() {
    let (peg, rel) = relations(&grammar(&[
      ("A", seq([rule("A"), lit("x")])),
    ]));
    let a = id(&peg, "A");

    assert!(rel.calls_closure.get(a, a));
  }

  #[test]
  fn terminal_disjointness() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([
        lit("ab"),
        lit("a"),
        lit("b"),
        class("ab"),
        not_class("ab"),
        range('a', 'c'),
        range('x', 'z'),
        any(),
        eoi(),
      ])),
    ]));
    let d = |x: &str, y: &str| rel.disjoint.get(id(&peg, x), id(&peg, y));

    // "ab" "a"
    assert!(!d("S.1", "S.2"));
    // "ab" "b"
    assert!(d("S.1", "S.3"));
    // "b" [ab]
    assert!(!d("S.3", "S.4"));
    // "b" ^[ab]
    assert!(d("S.3", "S.5"));
    // [ab] ^[ab]
    assert!(d("S.4", "S.5"));
    // [ab] [a-c]
    assert!(!d("S.4", "S.6"));
    // [ab] [x-z]
    assert!(d("S.4", "S.7"));
    // ^[ab] [x-z]
    assert!(!d("S.5", "S.7"));
    // [a-c] [x-z]
    assert!(d("S.6", "S.7"));
    // "ab" [x-z]
    assert!(d("S.1", "S.7"));
    assert!(!d("S.8", "S.1"));
    assert!(!d("S.8", "S.8"));
    assert!(d("S.9", "S.8"));
    assert!(d("S.9", "S.9"));
  }

  #[test]
  fn negated_class_against_covered_range() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([not_class("abc"), range('a', 'b'), range('a', 'z')])),
    ]));

    assert!(rel.disjoint.get(id(&peg, "S.1"), id(&peg, "S.2")));
    assert!(!rel.disjoint.get(id(&peg, "S.1"), id(&peg, "S.3")));
  }

  #[test]
  fn disjointness_is_symmetric() {
    let (peg, rel) = relations(&grammar(&[
      ("S", seq([
        lit("if"), lit("i"), class("fi"), not_class("x"), range('0', '9'),
        range('5', '7'), any(), eoi(), lit("9"), not_class("0123456789"),
      ])),
    ]));
    let t = peg.num_terms();

    for i in 0..t {
      for j in 0..t {
        assert_eq!(rel.disjoint.get(i, j), rel.disjoint.get(j, i), "{} {}", i, j);
        assert_eq!(rel.non_disjoint.get(i, j), !rel.disjoint.get(i, j));
      }
    }
  }
}
