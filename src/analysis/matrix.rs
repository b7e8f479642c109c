use std::fmt::{self, Debug, Formatter};
use super::bitset::BitSet;

/// Square boolean matrix; `m[i][j]` read as "i is related to j".
#[derive(Clone, PartialEq, Eq)]
pub struct BitMatrix {
  n: usize,
  rows: Vec<BitSet>,
}

impl BitMatrix {
  pub fn new(n: usize) -> Self {
    Self {
      n,
      rows: vec![BitSet::new(n); n],
    }
  }

  /// Identity relation.
  pub fn identity(n: usize) -> Self {
    let mut m = Self::new(n);
    for i in 0..n {
      m.set(i, i);
    }
    m
  }

  /// `m[i][j] = a[i] && b[j]`.
  pub fn product(a: &BitSet, b: &BitSet, n: usize) -> Self {
    let mut m = Self::new(n);
    for i in a.iter().filter(|&i| i < n) {
      for j in b.iter().filter(|&j| j < n) {
        m.set(i, j);
      }
    }
    m
  }

  pub fn set(&mut self, i: usize, j: usize) {
    self.rows[i].insert(j);
  }

  pub fn get(&self, i: usize, j: usize) -> bool {
    self.rows[i].contains(j)
  }

  pub fn row(&self, i: usize) -> &BitSet {
    &self.rows[i]
  }

  pub fn or(&self, other: &BitMatrix) -> BitMatrix {
    let mut m = self.clone();
    for (x, y) in m.rows.iter_mut().zip(other.rows.iter()) {
      x.union_with(y);
    }
    m
  }

  pub fn and(&self, other: &BitMatrix) -> BitMatrix {
    let mut m = self.clone();
    for (x, y) in m.rows.iter_mut().zip(other.rows.iter()) {
      x.intersect_with(y);
    }
    m
  }

  pub fn not(&self) -> BitMatrix {
    let mut m = Self::new(self.n);
    for i in 0..self.n {
      for j in 0..self.n {
        if !self.get(i, j) {
          m.set(i, j);
        }
      }
    }
    m
  }

  /// Transitive closure (Warshall).
  pub fn closure(&self) -> BitMatrix {
    let mut m = self.clone();
    for k in 0..self.n {
      let row_k = m.rows[k].clone();
      for i in 0..self.n {
        if m.rows[i].contains(k) {
          m.rows[i].union_with(&row_k);
        }
      }
    }
    m
  }

  /// Reflexive-transitive closure.
  pub fn star(&self) -> BitMatrix {
    self.closure().or(&Self::identity(self.n))
  }

  /// Number of related pairs.
  pub fn weight(&self) -> usize {
    self.rows.iter().map(BitSet::count).sum()
  }

  /// Related pairs in row-major order.
  pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
    self.rows
      .iter()
      .enumerate()
      .flat_map(|(i, row)| row.iter().map(move |j| (i, j)))
  }
}

impl Debug for BitMatrix {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.debug_map()
      .entries(self.rows.iter().enumerate().filter(|(_, row)| !row.is_empty()))
      .finish()
  }
}
