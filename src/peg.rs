use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use indexmap::map::{Entry, IndexMap};
use thiserror::Error;
use crate::analysis::attrs::Attrs;
use crate::analysis::bitset::BitSet;
use crate::analysis::tail::Tail;
use crate::grammar::{Expr, ExprVariant, Grammar};

/// Index of an expression. Terminals come first: `0..T` are terminals,
/// `T..N` nonterminals.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ExprId(pub(crate) usize);

impl ExprId {
  pub fn index(self) -> usize {
    self.0
  }
}

impl From<usize> for ExprId {
  fn from(index: usize) -> ExprId {
    ExprId(index)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
  /// two or more alternatives
  Choice(Vec<ExprId>),
  /// two or more elements
  Sequence(Vec<ExprId>),
  And(ExprId),
  Not(ExprId),
  Plus(ExprId),
  Star(ExprId),
  Query(ExprId),
  /// `rule` is the top expression of the referenced rule.
  Ref { target: String, rule: ExprId },
  StringLit(String),
  Range(char, char),
  CharClass { chars: String, negated: bool },
  Any,
  EndOfInput,
  /// Continuation of a start rule that does not consume all input.
  AnyRemainingInput,
}

impl Kind {
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      Kind::StringLit(_)
        | Kind::Range(..)
        | Kind::CharClass { .. }
        | Kind::Any
        | Kind::EndOfInput
        | Kind::AnyRemainingInput
    )
  }

  /// Sub-expressions owned by this node. A reference does not own its rule.
  pub fn children(&self) -> &[ExprId] {
    match self {
      Kind::Choice(args) | Kind::Sequence(args) => args.as_slice(),
      Kind::And(arg)
      | Kind::Not(arg)
      | Kind::Plus(arg)
      | Kind::Star(arg)
      | Kind::Query(arg) => std::slice::from_ref(arg),
      _ => &[],
    }
  }

  /// Binding strength, for parenthesizing rendered source.
  pub(crate) fn bind(&self) -> u8 {
    match self {
      Kind::Choice(_) => 0,
      Kind::Sequence(_) => 1,
      Kind::And(_) | Kind::Not(_) | Kind::EndOfInput | Kind::AnyRemainingInput => 3,
      Kind::Plus(_) | Kind::Star(_) | Kind::Query(_) => 4,
      _ => 5,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind: Kind,
  /// Rule name, or a dotted path such as `Rule.2.1` for sub-expressions.
  pub name: String,
  pub is_rule: bool,
  /// Enclosing rule.
  pub rule: ExprId,
  /// Surface syntax.
  pub source: String,
  pub attrs: Attrs,
  pub first_terms: BitSet,
  pub first_tail_terms: BitSet,
  pub tail: Tail,
}

impl Node {
  /// Name for a rule, source text otherwise.
  pub fn simple(&self) -> &str {
    if self.is_rule {
      &self.name
    } else {
      &self.source
    }
  }

  pub fn named(&self) -> String {
    format!("{} = {}", self.name, self.source)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
  #[error("grammar has no rules")]
  NoRules,
  #[error("duplicate name '{0}'")]
  DuplicateRule(String),
  #[error("undefined name '{target}' in '{name}'")]
  UndefinedRule { target: String, name: String },
  #[error("empty sequence or choice at '{0}'")]
  EmptyExpression(String),
  #[error("empty string literal at '{0}'")]
  EmptyLiteral(String),
  #[error("empty character class at '{0}'")]
  EmptyClass(String),
  #[error("range [{low}-{high}] at '{name}' is empty")]
  InvertedRange { name: String, low: char, high: char },
}

/// Every problem found while resolving a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} error(s) in grammar: {}", .0.len(), join(.0))]
pub struct GrammarErrors(pub Vec<GrammarError>);

impl GrammarErrors {
  pub fn iter(&self) -> impl Iterator<Item = &GrammarError> {
    self.0.iter()
  }
}

fn join(errors: &[GrammarError]) -> String {
  errors.iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join("; ")
}

/// The grammar lowered to an indexed arena of expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Peg {
  /// `0..num_exprs` are indexed; anything past that is synthetic.
  pub(crate) nodes: Vec<Node>,
  pub(crate) rules: Vec<ExprId>,
  pub(crate) num_terms: usize,
  pub(crate) num_exprs: usize,
  pub(crate) unused_rules: Vec<String>,
}

impl Peg {
  pub fn new(grammar: &Grammar) -> Result<Peg, GrammarErrors> {
    Lowering::run(grammar)
  }

  /// Number of indexed expressions (N).
  pub fn len(&self) -> usize {
    self.num_exprs
  }

  pub fn is_empty(&self) -> bool {
    self.num_exprs == 0
  }

  /// Number of terminals (T).
  pub fn num_terms(&self) -> usize {
    self.num_terms
  }

  pub fn node(&self, id: ExprId) -> &Node {
    &self.nodes[id.index()]
  }

  pub(crate) fn node_mut(&mut self, id: ExprId) -> &mut Node {
    &mut self.nodes[id.index()]
  }

  pub fn ids(&self) -> impl Iterator<Item = ExprId> {
    (0..self.num_exprs).map(ExprId::from)
  }

  pub fn terms(&self) -> impl Iterator<Item = ExprId> {
    (0..self.num_terms).map(ExprId::from)
  }

  pub fn nonterms(&self) -> impl Iterator<Item = ExprId> {
    (self.num_terms..self.num_exprs).map(ExprId::from)
  }

  pub fn rules(&self) -> &[ExprId] {
    &self.rules
  }

  pub fn start(&self) -> ExprId {
    self.rules[0]
  }

  pub fn find(&self, name: &str) -> Option<ExprId> {
    self.ids().find(|&id| self.node(id).name == name)
  }

  /// Rules other than the start rule that nothing refers to.
  pub fn unused_rules(&self) -> &[String] {
    &self.unused_rules
  }

  /// Terminal indices of `set` as expressions.
  pub fn term_ids<'a>(&'a self, set: &'a BitSet) -> impl Iterator<Item = ExprId> + 'a {
    set.iter().map(ExprId::from)
  }

  /// Appends the synthetic "any remaining input" expression outside the
  /// indexed range.
  pub(crate) fn push_remaining_input(&mut self) -> ExprId {
    let id = ExprId::from(self.nodes.len());
    let kind = Kind::AnyRemainingInput;
    self.nodes.push(Node {
      attrs: Attrs::of_terminal(&kind),
      source: render_terminal(&kind),
      kind,
      name: "Any string".to_owned(),
      is_rule: false,
      rule: self.start(),
      first_terms: BitSet::new(self.num_terms),
      first_tail_terms: BitSet::new(self.num_terms),
      tail: Tail::default(),
    });
    id
  }
}

/// Number of terminal and nonterminal nodes an expression lowers to.
fn count(expr: &Expr) -> (usize, usize) {
  let children: &[Expr] = match &expr.0 {
    ExprVariant::Choice(args) | ExprVariant::Seq(args) => args.as_slice(),
    ExprVariant::And(arg)
    | ExprVariant::Not(arg)
    | ExprVariant::Plus(arg)
    | ExprVariant::Star(arg)
    | ExprVariant::Opt(arg) => std::slice::from_ref(&**arg),
    variant if variant.is_terminal() => return (1, 0),
    _ => &[],
  };
  children.iter().fold((0, 1), |(t, n), child| {
    let (ct, cn) = count(child);
    (t + ct, n + cn)
  })
}

struct Lowering<'g> {
  nodes: Vec<Option<Node>>,
  num_terms: usize,
  next_term: usize,
  next_nonterm: usize,
  /// rule name -> top expression
  names: IndexMap<&'g str, ExprId>,
  referenced: HashSet<&'g str>,
  errors: Vec<GrammarError>,
}

impl<'g> Lowering<'g> {
  fn run(grammar: &'g Grammar) -> Result<Peg, GrammarErrors> {
    if grammar.rules.is_empty() {
      return Err(GrammarErrors(vec![GrammarError::NoRules]));
    }

    let counts = grammar.rules.iter()
      .map(|(_, expr)| count(expr))
      .collect::<Vec<_>>();
    let num_terms = counts.iter().map(|(t, _)| t).sum::<usize>();
    let num_exprs = num_terms + counts.iter().map(|(_, n)| n).sum::<usize>();

    let mut this = Lowering {
      nodes: vec![None; num_exprs],
      num_terms,
      next_term: 0,
      next_nonterm: num_terms,
      names: IndexMap::new(),
      referenced: HashSet::new(),
      errors: vec![],
    };

    // Top expressions are known before lowering so that forward
    // references resolve in one pass.
    let (mut term, mut nonterm) = (0, num_terms);
    let mut tops = Vec::with_capacity(grammar.rules.len());
    for ((name, expr), (t, n)) in grammar.rules.iter().zip(&counts) {
      let top = if expr.0.is_terminal() { term } else { nonterm };
      tops.push(ExprId::from(top));
      match this.names.entry(name.as_str()) {
        Entry::Occupied(_) => this.errors.push(GrammarError::DuplicateRule(name.clone())),
        Entry::Vacant(entry) => {
          entry.insert(ExprId::from(top));
        }
      }
      term += t;
      nonterm += n;
    }

    for ((name, expr), &top) in grammar.rules.iter().zip(&tops) {
      let id = this.lower(expr, name.clone(), top);
      debug_assert_eq!(id, top);
      if let Some(node) = this.nodes[id.index()].as_mut() {
        node.is_rule = true;
      }
    }

    if !this.errors.is_empty() {
      return Err(GrammarErrors(this.errors));
    }

    let unused_rules = grammar.rules.iter()
      .skip(1)
      .map(|(name, _)| name)
      .filter(|name| !this.referenced.contains(name.as_str()))
      .cloned()
      .collect::<Vec<_>>();
    for name in &unused_rules {
      tracing::warn!(target: "pegcheck::peg", "rule '{}' is not used", name);
    }

    Ok(Peg {
      nodes: this.nodes.into_iter().flatten().collect(),
      rules: tops,
      num_terms,
      num_exprs,
      unused_rules,
    })
  }

  fn alloc(&mut self, terminal: bool) -> ExprId {
    let slot = if terminal { &mut self.next_term } else { &mut self.next_nonterm };
    let id = ExprId::from(*slot);
    *slot += 1;
    id
  }

  fn lower(&mut self, expr: &'g Expr, name: String, rule: ExprId) -> ExprId {
    let id = self.alloc(expr.0.is_terminal());
    let kind = match &expr.0 {
      ExprVariant::Choice(args) => Kind::Choice(self.lower_args(args, &name, rule)),
      ExprVariant::Seq(args) => Kind::Sequence(self.lower_args(args, &name, rule)),
      ExprVariant::And(arg) => Kind::And(self.lower_arg(arg, &name, rule)),
      ExprVariant::Not(arg) => Kind::Not(self.lower_arg(arg, &name, rule)),
      ExprVariant::Plus(arg) => Kind::Plus(self.lower_arg(arg, &name, rule)),
      ExprVariant::Star(arg) => Kind::Star(self.lower_arg(arg, &name, rule)),
      ExprVariant::Opt(arg) => Kind::Query(self.lower_arg(arg, &name, rule)),
      ExprVariant::Rule(target) => {
        let resolved = match self.names.get(target.as_str()) {
          Some(&top) => {
            self.referenced.insert(target);
            top
          }
          None => {
            self.errors.push(GrammarError::UndefinedRule {
              target: target.clone(),
              name: name.clone(),
            });
            id
          }
        };
        Kind::Ref { target: target.clone(), rule: resolved }
      }
      ExprVariant::Lit(s) => {
        if s.is_empty() {
          self.errors.push(GrammarError::EmptyLiteral(name.clone()));
        }
        Kind::StringLit(s.clone())
      }
      &ExprVariant::Range(low, high) => {
        if low > high {
          self.errors.push(GrammarError::InvertedRange { name: name.clone(), low, high });
        }
        Kind::Range(low, high)
      }
      ExprVariant::Class(chars, negated) => {
        if chars.is_empty() {
          self.errors.push(GrammarError::EmptyClass(name.clone()));
        }
        Kind::CharClass { chars: chars.clone(), negated: *negated }
      }
      ExprVariant::Any => Kind::Any,
      ExprVariant::Eoi => Kind::EndOfInput,
    };

    if let Kind::Choice(args) | Kind::Sequence(args) = &kind {
      if args.len() < 2 {
        self.errors.push(GrammarError::EmptyExpression(name.clone()));
      }
    }

    let source = self.render(&kind);
    self.nodes[id.index()] = Some(Node {
      attrs: Attrs::of_terminal(&kind),
      kind,
      name,
      is_rule: false,
      rule,
      source,
      first_terms: BitSet::new(self.num_terms),
      first_tail_terms: BitSet::new(self.num_terms),
      tail: Tail::default(),
    });
    id
  }

  fn lower_args(&mut self, args: &'g [Expr], name: &str, rule: ExprId) -> Vec<ExprId> {
    args.iter()
      .enumerate()
      .map(|(i, arg)| self.lower(arg, format!("{}.{}", name, i + 1), rule))
      .collect()
  }

  fn lower_arg(&mut self, arg: &'g Expr, name: &str, rule: ExprId) -> ExprId {
    self.lower(arg, format!("{}.1", name), rule)
  }

  fn render(&self, kind: &Kind) -> String {
    let arg = |id: ExprId, context: u8| -> String {
      match &self.nodes[id.index()] {
        Some(node) if node.kind.bind() <= context => format!("({})", node.source),
        Some(node) => node.source.clone(),
        None => String::new(),
      }
    };
    match kind {
      Kind::Choice(args) => args.iter()
        .map(|&a| arg(a, 0))
        .collect::<Vec<_>>()
        .join(" / "),
      Kind::Sequence(args) => args.iter()
        .map(|&a| arg(a, 1))
        .collect::<Vec<_>>()
        .join(" "),
      &Kind::And(a) => format!("&{}", arg(a, 3)),
      &Kind::Not(a) => format!("!{}", arg(a, 3)),
      &Kind::Plus(a) => format!("{}+", arg(a, 4)),
      &Kind::Star(a) => format!("{}*", arg(a, 4)),
      &Kind::Query(a) => format!("{}?", arg(a, 4)),
      Kind::Ref { target, .. } => target.clone(),
      terminal => render_terminal(terminal),
    }
  }
}

fn render_terminal(kind: &Kind) -> String {
  match kind {
    Kind::StringLit(s) => format!("\"{}\"", Printable(s)),
    Kind::Range(low, high) => {
      format!("[{}-{}]", Printable(&low.to_string()), Printable(&high.to_string()))
    }
    Kind::CharClass { chars, negated } => {
      format!("{}[{}]", if *negated { "^" } else { "" }, Printable(chars))
    }
    Kind::Any => "_".to_owned(),
    Kind::EndOfInput => "!_".to_owned(),
    Kind::AnyRemainingInput => "_*".to_owned(),
    _ => String::new(),
  }
}

/// Escapes control characters.
struct Printable<'a>(&'a str);

impl Display for Printable<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for c in self.0.chars() {
      match c {
        '\n' => f.write_str("\\n")?,
        '\r' => f.write_str("\\r")?,
        '\t' => f.write_str("\\t")?,
        '\u{8}' => f.write_str("\\b")?,
        '\u{c}' => f.write_str("\\f")?,
        c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
        c => write!(f, "{}", c)?,
      }
    }
    Ok(())
  }
}
