use std::ops::BitOr;

/// An ordered list of named rules. The first rule is the start rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Grammar {
  pub(crate) rules: Vec<(String, Expr)>,
}

/// A parsing expression as written by the user, with rule references
/// still unresolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr(pub(crate) ExprVariant);

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExprVariant {
  Choice(Vec<Expr>),
  Seq(Vec<Expr>),
  And(Box<Expr>),
  Not(Box<Expr>),
  Plus(Box<Expr>),
  Star(Box<Expr>),
  Opt(Box<Expr>),
  Rule(String),
  Lit(String),
  Range(char, char),
  Class(String, bool),
  Any,
  Eoi,
}

impl ExprVariant {
  pub(crate) fn is_terminal(&self) -> bool {
    matches!(
      self,
      ExprVariant::Lit(_)
        | ExprVariant::Range(..)
        | ExprVariant::Class(..)
        | ExprVariant::Any
        | ExprVariant::Eoi
    )
  }
}

/// String literal `"s"`.
pub fn lit(
  s: impl Into<String>,
) -> Expr {
  Expr(ExprVariant::Lit(s.into()))
}

/// Character range `[a-z]`.
pub fn range(
  low: char,
  high: char,
) -> Expr {
  Expr(ExprVariant::Range(low, high))
}

/// Character class `[abc]`.
pub fn class(
  chars: impl Into<String>,
) -> Expr {
  Expr(ExprVariant::Class(chars.into(), false))
}

/// Negated character class `^[abc]`.
pub fn not_class(
  chars: impl Into<String>,
) -> Expr {
  Expr(ExprVariant::Class(chars.into(), true))
}

/// Any character `_`.
pub fn any() -> Expr {
  Expr(ExprVariant::Any)
}

/// End of input `!_`.
pub fn eoi() -> Expr {
  Expr(ExprVariant::Eoi)
}

/// Reference to the rule called `name`.
pub fn rule(
  name: impl Into<String>,
) -> Expr {
  Expr(ExprVariant::Rule(name.into()))
}

pub fn seq<const N: usize>(
  exprs: [Expr; N],
) -> Expr {
  collapse(exprs.into_iter().collect(), ExprVariant::Seq)
}

pub fn choice<const N: usize>(
  exprs: [Expr; N],
) -> Expr {
  collapse(exprs.into_iter().collect(), ExprVariant::Choice)
}

fn collapse(
  mut exprs: Vec<Expr>,
  variant: fn(Vec<Expr>) -> ExprVariant,
) -> Expr {
  if exprs.len() == 1 {
    if let Some(expr) = exprs.pop() {
      return expr;
    }
  }
  Expr(variant(exprs))
}

pub fn and(
  expr: Expr,
) -> Expr {
  Expr(ExprVariant::And(Box::new(expr)))
}

/// `!e`. The form `!_` is end of input rather than a predicate.
pub fn not(
  expr: Expr,
) -> Expr {
  match expr.0 {
    ExprVariant::Any => eoi(),
    variant => Expr(ExprVariant::Not(Box::new(Expr(variant)))),
  }
}

pub fn plus(
  expr: Expr,
) -> Expr {
  Expr(ExprVariant::Plus(Box::new(expr)))
}

pub fn star(
  expr: Expr,
) -> Expr {
  Expr(ExprVariant::Star(Box::new(expr)))
}

pub fn opt(
  expr: Expr,
) -> Expr {
  Expr(ExprVariant::Opt(Box::new(expr)))
}

/// `a *+ b`: repeat `a` until `b`, i.e. `(!b a)* b`.
pub fn star_until(
  a: Expr,
  b: Expr,
) -> Expr {
  seq([star(seq([not(b.clone()), a])), b])
}

/// `a ++ b`: at least one `a` until `b`, i.e. `(!b a)+ b`.
pub fn plus_until(
  a: Expr,
  b: Expr,
) -> Expr {
  seq([plus(seq([not(b.clone()), a])), b])
}

impl BitOr for Expr {
  type Output = Expr;

  fn bitor(self, rhs: Expr) -> Expr {
    match (self.0, rhs.0) {
      (ExprVariant::Choice(mut x), ExprVariant::Choice(mut y)) => {
        x.append(&mut y);
        Expr(ExprVariant::Choice(x))
      }
      (ExprVariant::Choice(mut x), y) => {
        x.push(Expr(y));
        Expr(ExprVariant::Choice(x))
      }
      (x, ExprVariant::Choice(mut y)) => {
        y.insert(0, Expr(x));
        Expr(ExprVariant::Choice(y))
      }
      (x, y) => {
        Expr(ExprVariant::Choice(vec![Expr(x), Expr(y)]))
      }
    }
  }
}

impl Grammar {
  pub fn rules(&self) -> impl Iterator<Item = (&str, &Expr)> {
    self.rules.iter().map(|(name, expr)| (name.as_str(), expr))
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }
}

pub fn grammar(
  rules: &[(&str, Expr)],
) -> Grammar {
  Grammar {
    rules: rules.iter()
      .map(|(name, expr)| ((*name).to_owned(), expr.clone()))
      .collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn bitor_flattens_choices() {
    let e = lit("a") | lit("b") | (lit("c") | lit("d"));

    assert_eq!(e, Expr(ExprVariant::Choice(vec![
      lit("a"), lit("b"), lit("c"), lit("d"),
    ])));
  }

  #[test]
  fn single_element_collapses() {
    assert_eq!(seq([lit("a")]), lit("a"));
    assert_eq!(choice([rule("A")]), rule("A"));
    assert_eq!(seq([]), Expr(ExprVariant::Seq(vec![])));
  }

  #[test]
  fn not_any_is_end_of_input() {
    assert_eq!(not(any()), eoi());
    assert_eq!(not(lit("x")), Expr(ExprVariant::Not(Box::new(lit("x")))));
  }

  #[test]
  fn until_sugar() {
    assert_eq!(
      star_until(any(), lit("*/")),
      seq([star(seq([not(lit("*/")), any()])), lit("*/")]),
    );
  }

  #[test]
  fn rule_order_is_kept() {
    let g = grammar(&[
      ("S", rule("A")),
      ("A", lit("a")),
    ]);
    let names = g.rules().map(|(name, _)| name).collect::<Vec<_>>();

    assert_eq!(names, vec!["S", "A"]);
  }
}
