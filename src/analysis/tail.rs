use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use indexmap::IndexMap;
use crate::peg::{ExprId, Kind, Peg};
use super::bitset::BitSet;

/// One way of reaching `called` from inside `outer`: after `called`
/// succeeds, `seq` runs, and then, if `has_tail`, whatever follows `outer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Strand {
  pub called: ExprId,
  pub outer: ExprId,
  pub seq: Vec<ExprId>,
  /// false iff this path ends input
  pub has_tail: bool,
  /// The strand this one was expanded from. Strands are never mutated after
  /// creation and only point at older ones, so the chain cannot form a cycle.
  pub parent: Option<Rc<Strand>>,
}

impl Strand {
  fn new(peg: &Peg, called: ExprId, outer: ExprId, seq: &[ExprId]) -> Strand {
    let ends = |id: ExprId| peg.node(id).attrs.ends_input;
    Strand {
      called,
      outer,
      seq: seq.to_vec(),
      has_tail: !ends(called) && !seq.iter().any(|&elem| ends(elem)),
      parent: None,
    }
  }

  fn derive(self: &Rc<Self>, outer: ExprId, seq: Vec<ExprId>, has_tail: bool) -> Rc<Strand> {
    Rc::new(Strand {
      called: self.called,
      outer,
      seq,
      has_tail,
      parent: Some(Rc::clone(self)),
    })
  }

  /// Replaces `Tail(outer)` by each strand of that tail.
  pub fn expand(self: &Rc<Self>, peg: &Peg) -> Vec<Rc<Strand>> {
    let tail = &peg.node(self.outer).tail;
    if !self.has_tail || tail.is_empty() {
      return vec![self.derive(self.outer, self.seq.clone(), false)];
    }
    tail.iter()
      .map(|strand| {
        let mut seq = self.seq.clone();
        seq.extend_from_slice(&strand.seq);
        self.derive(strand.outer, seq, strand.has_tail)
      })
      .collect()
  }

  /// Expands until every strand either ends input or continues with the
  /// tail of a rule.
  pub fn refine(self: &Rc<Self>, peg: &Peg) -> Vec<Rc<Strand>> {
    let mut pending = vec![Rc::clone(self)];
    loop {
      let mut refined = Vec::with_capacity(pending.len());
      let mut expanded = false;
      for strand in &pending {
        if strand.has_tail && !peg.node(strand.outer).is_rule {
          refined.extend(strand.expand(peg));
          expanded = true;
        } else {
          refined.push(Rc::clone(strand));
        }
      }
      if !expanded {
        return refined;
      }
      pending = refined;
    }
  }

  /// This strand followed by the strands it was expanded from.
  pub fn lineage(&self) -> impl Iterator<Item = &Strand> {
    std::iter::successors(Some(self), |strand| strand.parent.as_deref())
  }

  /// Terminals that may start what follows `called` along this strand.
  pub fn first_terms(&self, peg: &Peg) -> BitSet {
    let mut terms = BitSet::new(peg.num_terms());
    self.collect_first_terms(peg, &mut terms);
    terms
  }

  fn collect_first_terms(&self, peg: &Peg, terms: &mut BitSet) {
    for &elem in &self.seq {
      let node = peg.node(elem);
      terms.union_with(&node.first_terms);
      if !node.attrs.is_transparent() {
        return;
      }
    }
    if self.has_tail {
      terms.union_with(&peg.node(self.outer).first_tail_terms);
    }
  }

  pub fn display<'a>(&'a self, peg: &'a Peg) -> impl Display + 'a {
    StrandDisplay { strand: self, peg }
  }
}

struct StrandDisplay<'a> {
  strand: &'a Strand,
  peg: &'a Peg,
}

impl Display for StrandDisplay<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let peg = self.peg;
    if peg.node(self.strand.called).attrs.ends_input {
      return Ok(());
    }
    let mut sep = "";
    for &elem in &self.strand.seq {
      let node = peg.node(elem);
      if node.kind.bind() == 0 {
        write!(f, "{}({})", sep, node.source)?;
      } else {
        write!(f, "{}{}", sep, node.source)?;
      }
      if node.attrs.ends_input {
        return Ok(());
      }
      sep = " ";
    }
    write!(f, "{}Tail({})", sep, peg.node(self.strand.outer).name)
  }
}

/// What may follow a successful match of an expression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tail {
  strands: Vec<Rc<Strand>>,
}

impl Tail {
  pub fn iter(&self) -> std::slice::Iter<'_, Rc<Strand>> {
    self.strands.iter()
  }

  pub fn len(&self) -> usize {
    self.strands.len()
  }

  pub fn is_empty(&self) -> bool {
    self.strands.is_empty()
  }

  fn push(&mut self, strand: Strand) {
    self.strands.push(Rc::new(strand));
  }

  /// Refines every strand.
  pub fn expand(&self, peg: &Peg) -> Tail {
    Tail {
      strands: self.strands.iter()
        .flat_map(|strand| strand.refine(peg))
        .collect(),
    }
  }

  /// Like `expand`, keeping the first strand of each rendering.
  pub fn expand_unique(&self, peg: &Peg) -> Tail {
    let mut unique = IndexMap::new();
    for strand in self.expand(peg).strands {
      let key = strand.display(peg).to_string();
      unique.entry(key).or_insert(strand);
    }
    Tail {
      strands: unique.into_iter().map(|(_, strand)| strand).collect(),
    }
  }

  pub fn display<'a>(&'a self, peg: &'a Peg) -> impl Display + 'a {
    TailDisplay { tail: self, peg }
  }
}

impl<'a> IntoIterator for &'a Tail {
  type Item = &'a Rc<Strand>;
  type IntoIter = std::slice::Iter<'a, Rc<Strand>>;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

struct TailDisplay<'a> {
  tail: &'a Tail,
  peg: &'a Peg,
}

impl Display for TailDisplay<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let mut nl = "";
    for strand in self.tail {
      write!(f, "{}{}", nl, strand.display(self.peg))?;
      nl = "\n";
    }
    Ok(())
  }
}

/// Attaches to every called expression one strand per call site.
/// Expressions that end input get none.
pub(crate) fn build(peg: &mut Peg) {
  let strands = call_sites(peg);
  let count = strands.len();
  for strand in strands {
    peg.node_mut(strand.called).tail.push(strand);
  }
  tracing::debug!(target: "pegcheck::tail", strands = count, "tails built");
}

fn call_sites(peg: &Peg) -> Vec<Strand> {
  let mut strands = vec![];
  for id in peg.nonterms() {
    let mut add = |called: ExprId, seq: &[ExprId]| {
      if !peg.node(called).attrs.ends_input {
        strands.push(Strand::new(peg, called, id, seq));
      }
    };
    match &peg.node(id).kind {
      Kind::Choice(args) => {
        for &arg in args {
          add(arg, &[]);
        }
      }
      Kind::Sequence(args) => {
        for (i, &arg) in args.iter().enumerate() {
          add(arg, &args[i + 1..]);
        }
      }
      // `a+` as `a a+ / a`, `a*` as `a a* / ()`
      &Kind::Plus(arg) | &Kind::Star(arg) => {
        add(arg, &[id]);
        add(arg, &[]);
      }
      &Kind::Query(arg) | &Kind::And(arg) | &Kind::Not(arg) => add(arg, &[]),
      &Kind::Ref { rule, .. } => add(rule, &[]),
      _ => {}
    }
  }
  strands
}

/// Lets a start rule that does not end input be followed by anything.
pub(crate) fn attach_remaining_input(peg: &mut Peg) {
  let start = peg.start();
  if peg.node(start).attrs.ends_input {
    return;
  }
  let rest = peg.push_remaining_input();
  let strand = Strand::new(peg, start, start, &[rest]);
  peg.node_mut(start).tail.push(strand);
}

/// Least fixpoint of first terminals of tails.
pub(crate) fn compute_first_tail_terms(peg: &mut Peg) {
  let mut sweeps = 0;
  loop {
    sweeps += 1;
    if !sweep(peg) {
      break;
    }
  }
  tracing::debug!(target: "pegcheck::tail", sweeps, "first tail terminals reached fixpoint");
}

/// Returns whether any set grew.
fn sweep(peg: &mut Peg) -> bool {
  let mut changed = false;
  for id in peg.ids() {
    let mut terms = BitSet::new(peg.num_terms());
    for strand in &peg.node(id).tail {
      strand.collect_first_terms(peg, &mut terms);
    }
    changed |= peg.node_mut(id).first_tail_terms.union_with(&terms);
  }
  changed
}
