use crate::peg::{Kind, Peg};

/// Ford's attributes, extended with `ends_input`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Attrs {
  /// may succeed consuming nothing
  pub nullable: bool,
  /// may succeed consuming something
  pub advances: bool,
  /// may fail
  pub can_fail: bool,
  /// success means end of input
  pub ends_input: bool,
}

impl Attrs {
  /// Fixed attributes of terminals; nonterminals start with all false.
  pub(crate) fn of_terminal(kind: &Kind) -> Attrs {
    match kind {
      Kind::StringLit(_) | Kind::Range(..) | Kind::CharClass { .. } | Kind::Any => Attrs {
        advances: true,
        can_fail: true,
        ..Attrs::default()
      },
      Kind::EndOfInput | Kind::AnyRemainingInput => Attrs {
        nullable: true,
        advances: true,
        can_fail: true,
        ends_input: true,
      },
      _ => Attrs::default(),
    }
  }

  /// Whatever follows may start consuming where this ended.
  pub fn is_transparent(&self) -> bool {
    self.nullable && !self.ends_input
  }

  /// Neither succeeds empty nor consumes: always fails.
  pub fn always_fails(&self) -> bool {
    !self.nullable && !self.advances
  }

  pub fn count(&self) -> usize {
    [self.nullable, self.advances, self.can_fail, self.ends_input]
      .iter()
      .filter(|&&x| x)
      .count()
  }

  /// Returns whether any attribute was switched on.
  pub(crate) fn union_with(&mut self, other: Attrs) -> bool {
    let old = *self;
    self.nullable |= other.nullable;
    self.advances |= other.advances;
    self.can_fail |= other.can_fail;
    self.ends_input |= other.ends_input;
    old != *self
  }
}

/// Iterates to the least fixpoint. Runs whether or not the grammar is
/// left-recursive, since left recursion is detected from the result.
pub(crate) fn compute(peg: &mut Peg) {
  let mut sweeps = 0;
  loop {
    sweeps += 1;
    if !sweep(peg) {
      break;
    }
  }
  tracing::debug!(
    target: "pegcheck::attrs",
    sweeps,
    true_attrs = peg.ids().map(|id| peg.node(id).attrs.count()).sum::<usize>(),
    "attributes reached fixpoint",
  );
}

/// One pass over all expressions. Attributes only ever go from false to
/// true. Returns whether anything changed.
pub(crate) fn sweep(peg: &mut Peg) -> bool {
  let mut changed = false;
  for id in peg.ids() {
    let attrs = eval(peg, &peg.node(id).kind);
    changed |= peg.node_mut(id).attrs.union_with(attrs);
  }
  changed
}

fn eval(peg: &Peg, kind: &Kind) -> Attrs {
  let attrs = |id| peg.node(id).attrs;
  match kind {
    Kind::Choice(args) => Attrs {
      nullable: args.iter().any(|&a| attrs(a).nullable),
      advances: args.iter().any(|&a| attrs(a).advances),
      can_fail: args.iter().all(|&a| attrs(a).can_fail),
      ends_input: args.iter().all(|&a| attrs(a).ends_input),
    },
    Kind::Sequence(args) => Attrs {
      nullable: args.iter().all(|&a| attrs(a).nullable),
      advances: args.iter().any(|&a| attrs(a).advances),
      can_fail: args.iter().any(|&a| attrs(a).can_fail),
      ends_input: args.iter().any(|&a| attrs(a).ends_input),
    },
    &Kind::And(a) => {
      let a = attrs(a);
      Attrs {
        nullable: a.nullable || a.advances,
        can_fail: a.can_fail,
        ..Attrs::default()
      }
    }
    &Kind::Not(a) => {
      let a = attrs(a);
      Attrs {
        nullable: a.can_fail,
        can_fail: a.nullable || a.advances,
        ..Attrs::default()
      }
    }
    // `a+` is `a a*`
    &Kind::Plus(a) => {
      let a = attrs(a);
      Attrs {
        nullable: a.nullable && (a.can_fail || a.nullable),
        advances: a.advances,
        can_fail: a.can_fail,
        ends_input: a.ends_input,
      }
    }
    &Kind::Star(a) | &Kind::Query(a) => {
      let a = attrs(a);
      Attrs {
        nullable: a.can_fail || a.nullable,
        advances: a.advances,
        ..Attrs::default()
      }
    }
    &Kind::Ref { rule, .. } => attrs(rule),
    terminal => Attrs::of_terminal(terminal),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::*;
  use crate::peg::Peg;
  use pretty_assertions::assert_eq;

  fn attrs_of(peg: &Peg, name: &str) -> Attrs {
    peg.node(peg.find(name).unwrap()).attrs
  }

  fn computed(g: &Grammar) -> Peg {
    let mut peg = Peg::new(g).unwrap();
    compute(&mut peg);
    peg
  }

  const NUL: Attrs = Attrs { nullable: true, advances: false, can_fail: false, ends_input: false };

  #[test]
  fn terminals_are_preset() {
    let peg = Peg::new(&grammar(&[
      ("S", seq([lit("a"), eoi()])),
    ])).unwrap();

    assert_eq!(attrs_of(&peg, "S.1"), Attrs {
      advances: true,
      can_fail: true,
      ..Attrs::default()
    });
    assert_eq!(attrs_of(&peg, "S.2").count(), 4);
    assert_eq!(attrs_of(&peg, "S"), Attrs::default());
  }

  #[test]
  fn composite_rules() {
    let peg = computed(&grammar(&[
      ("S", seq([
        star(lit("a")),
        opt(lit("b")),
        and(lit("c")),
        not(lit("d")),
        plus(lit("e")),
        lit("f") | eoi(),
      ])),
    ]));

    assert_eq!(attrs_of(&peg, "S.1"), Attrs { advances: true, ..NUL });
    assert_eq!(attrs_of(&peg, "S.2"), Attrs { advances: true, ..NUL });
    assert_eq!(attrs_of(&peg, "S.3"), Attrs { can_fail: true, ..NUL });
    assert_eq!(attrs_of(&peg, "S.4"), Attrs { can_fail: true, ..NUL });
    assert_eq!(attrs_of(&peg, "S.5"), Attrs {
      advances: true,
      can_fail: true,
      ..Attrs::default()
    });
    assert_eq!(attrs_of(&peg, "S.6"), Attrs {
      nullable: true,
      advances: true,
      can_fail: true,
      ends_input: false,
    });
    assert_eq!(attrs_of(&peg, "S"), Attrs {
      nullable: false,
      advances: true,
      can_fail: true,
      ends_input: false,
    });
  }

  #[test]
  fn not_of_nullable_always_fails() {
    let peg = computed(&grammar(&[
      ("S", seq([not(star(lit("a"))), lit("b")])),
    ]));
    let s1 = attrs_of(&peg, "S.1");

    assert!(s1.always_fails());
    assert!(s1.can_fail);
  }

  #[test]
  fn references_follow_rules() {
    let peg = computed(&grammar(&[
      ("S", seq([rule("A"), rule("B")])),
      ("A", opt(lit("a"))),
      ("B", seq([lit("b"), eoi()])),
    ]));

    assert_eq!(attrs_of(&peg, "S.1"), attrs_of(&peg, "A"));
    assert_eq!(attrs_of(&peg, "S.2"), attrs_of(&peg, "B"));
    assert!(attrs_of(&peg, "S").ends_input);
    assert!(!attrs_of(&peg, "S").nullable);
    assert!(attrs_of(&peg, "S.1").is_transparent());
  }

  #[test]
  fn left_recursive_rules_still_converge() {
    let peg = computed(&grammar(&[
      ("A", seq([rule("A"), lit("x")]) | opt(lit("y"))),
    ]));

    assert!(attrs_of(&peg, "A").nullable);
    assert!(attrs_of(&peg, "A.1.1").nullable);
    assert!(!attrs_of(&peg, "A").can_fail);
  }

  #[test]
  fn sweeps_are_monotone_and_bounded() {
    let mut peg = Peg::new(&grammar(&[
      ("S", seq([rule("A"), rule("B"), rule("C")])),
      ("A", rule("B") | lit("a")),
      ("B", opt(rule("C"))),
      ("C", plus(seq([not(lit("c")), any()]))),
    ])).unwrap();
    let bound = peg.len() * 4 + 1;

    let mut sweeps = 0;
    loop {
      let before = peg.ids().map(|id| peg.node(id).attrs).collect::<Vec<_>>();
      let changed = sweep(&mut peg);
      sweeps += 1;
      for (id, old) in peg.ids().zip(before) {
        let new = peg.node(id).attrs;
        assert!(!old.nullable || new.nullable);
        assert!(!old.advances || new.advances);
        assert!(!old.can_fail || new.can_fail);
        assert!(!old.ends_input || new.ends_input);
      }
      if !changed {
        break;
      }
    }
    assert!(sweeps <= bound);
    assert!(attrs_of(&peg, "B").nullable);
    assert!(attrs_of(&peg, "S.1").nullable);
  }
}
