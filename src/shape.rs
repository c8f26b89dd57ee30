use serde::{ Serialize, Deserialize };

use crate::internal::*;


/// The shape of a [Tensor](crate::Tensor).
///
/// Strides may be zero for broadcasted dimensions, which lets
/// a single stored value stand in for a whole row or column.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
  pub dims: Vec<usize>,
  pub(crate) strides: Vec<isize>,
}

impl Shape {
  pub fn new(dims: &[usize]) -> Self {
    Self {
      dims: dims.to_vec(),
      strides: Self::make_strides(dims),
    }
  }

  fn make_strides(dims: &[usize]) -> Vec<isize> {
    if dims.is_empty() { return vec![] }
    let mut strides = vec![0; dims.len()];
    strides[dims.len() - 1] = 1;
    for i in (1..dims.len()).rev() {
      strides[i - 1] = dims[i] as isize * strides[i];
    }
    strides
  }

  pub fn size(&self) -> usize {
    self.dims.iter().product()
  }

  pub fn rank(&self) -> usize {
    self.dims.len()
  }

  pub fn contiguous(&self) -> bool {
    self.strides == Self::make_strides(&self.dims)
  }

  /// Storage indices in row-major order.

  pub fn iter(&self) -> Box<dyn Iterator<Item=usize> + '_> {
    if self.contiguous() {
      Box::new(0..self.size())
    } else {
      Box::new(ShapeIterator::new(self))
    }
  }

  /// Stretch dimensions of size one (and missing leading dimensions)
  /// to match `other`, using zero strides.

  pub fn broadcast(&self, other: &Self) -> Self {
    let rank = self.rank().max(other.rank());
    let mut dims = vec![];
    let mut strides = vec![];
    self.dims.iter()
      .rev()
      .chain(std::iter::repeat(&1))
      .zip(other.dims.iter()
        .rev()
        .chain(std::iter::repeat(&1)))
      .take(rank)
      .inspect(|&(&a, &b)|
        assert!(a == b || a == 1 || b == 1, "Could not broadcast {} & {}", self, other) )
      .zip(self.strides.iter()
        .rev()
        .chain(std::iter::repeat(&0)))
      .for_each(|((&dl, &dr), &stride)| {
        dims.push(dl.max(dr));
        strides.push(if dl == 1 && dr != 1 { 0 } else { stride });
      });
    dims.reverse();
    strides.reverse();
    Self { dims, strides }
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    let dim1 = negative_index(dim1, self.rank(), false);
    let dim2 = negative_index(dim2, self.rank(), false);
    let mut shape = self.clone();
    shape.dims.swap(dim1, dim2);
    shape.strides.swap(dim1, dim2);
    shape
  }
}

impl std::ops::Index<isize> for Shape {
  type Output = usize;

  fn index(&self, i: isize) -> &usize {
    let idx = negative_index(i, self.rank(), false);
    &self.dims[idx]
  }
}

impl std::fmt::Display for Shape {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Shape{:?}", self.dims)
  }
}


/// Iterate through a strided [Shape]'s storage indices.

pub struct ShapeIterator<'a> {
  shape: &'a Shape,
  counter: Vec<usize>,
  idx: isize,
  remaining: usize,
}

impl<'a> ShapeIterator<'a> {
  fn new(shape: &'a Shape) -> Self {
    Self {
      counter: vec![0; shape.rank()],
      idx: 0,
      remaining: shape.size(),
      shape,
    }
  }
}

impl<'a> Iterator for ShapeIterator<'a> {
  type Item = usize;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 { return None }
    self.remaining -= 1;
    let out = self.idx as usize;
    // Walk backward through dimensions, carrying on full turns
    for d in (0..self.counter.len()).rev() {
      self.counter[d] += 1;
      self.idx += self.shape.strides[d];
      if self.counter[d] < self.shape.dims[d] { break }
      self.idx -= self.shape.strides[d] * self.shape.dims[d] as isize;
      self.counter[d] = 0;
    }
    Some(out)
  }
}
