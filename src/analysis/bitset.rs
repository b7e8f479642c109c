use std::fmt::{self, Debug, Formatter};

type BitBlock = u64;

const BLOCK_NBITS: usize = std::mem::size_of::<BitBlock>() * 8;

/// Fixed-capacity set of small integers, used for expression and terminal
/// indices.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
  slice: Box<[BitBlock]>,
}

impl BitSet {
  pub fn new(num_bits: usize) -> Self {
    let len = (num_bits + BLOCK_NBITS - 1) / BLOCK_NBITS;
    Self {
      slice: vec![0; len].into_boxed_slice(),
    }
  }

  pub fn insert(&mut self, bit: usize) {
    self.slice[bit / BLOCK_NBITS] |= mask(bit);
  }

  pub fn contains(&self, bit: usize) -> bool {
    self.slice
      .get(bit / BLOCK_NBITS)
      .map_or(false, |block| block & mask(bit) != 0)
  }

  /// Returns whether the set has changed.
  pub fn union_with(&mut self, other: &BitSet) -> bool {
    let mut changed = false;
    for i in 0..self.slice.len() {
      let old = self.slice[i];
      self.slice[i] |= other.slice[i];
      changed |= old != self.slice[i];
    }
    changed
  }

  pub fn intersect_with(&mut self, other: &BitSet) {
    for (x, y) in self.slice.iter_mut().zip(other.slice.iter()) {
      *x &= y;
    }
  }

  pub fn intersects(&self, other: &BitSet) -> bool {
    self.slice.iter()
      .zip(other.slice.iter())
      .any(|(x, y)| x & y != 0)
  }

  /// Number of bits set.
  pub fn count(&self) -> usize {
    self.slice.iter().map(|x| x.count_ones() as usize).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.slice.iter().all(|&x| x == 0)
  }

  pub fn iter(&self) -> Iter<'_> {
    Iter {
      slice: &*self.slice,
      bit: 0,
      index: 0,
    }
  }
}

fn mask(bit: usize) -> BitBlock {
  1 << (bit as u64 % BLOCK_NBITS as u64)
}

pub struct Iter<'a> {
  slice: &'a [BitBlock],
  bit: usize,
  index: usize,
}

impl<'a> Iterator for Iter<'a> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    while self.index < self.slice.len() {
      if self.bit < BLOCK_NBITS {
        let bit = (self.slice[self.index] & !((1 << self.bit) - 1))
          .trailing_zeros() as usize;
        if bit < BLOCK_NBITS {
          self.bit = bit + 1;
          return Some(self.index * BLOCK_NBITS + bit);
        }
      }

      self.index += 1;
      self.bit = 0;
    }
    None
  }
}

impl<'a> IntoIterator for &'a BitSet {
  type Item = usize;
  type IntoIter = Iter<'a>;

  fn into_iter(self) -> Iter<'a> {
    self.iter()
  }
}

impl Debug for BitSet {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}
