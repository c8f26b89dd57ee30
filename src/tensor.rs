use std::rc::Rc;
use std::cell::{ Ref, RefCell };

use rand::Rng;
use serde::{ Serialize, Deserialize };

mod lops;

use crate::{
  internal::*,
  shape::Shape,
  variable::Variable,
  scalar::{ Inner, Real },
  ops::{ BaseOps, Hops },
};


/// Multidimensional array.
///
/// Tensors may contain any type that satisfies [Inner], but
/// arithmetic is only available for [Real] inner types.
///
/// Storage is reference counted. Cloning a tensor yields a handle
/// to the same memory, so writing through [assign](Tensor::assign)
/// is visible to every clone. This is how trained parameters get
/// shared between computation graphs.
///
/// [Real] tensor types can be wrapped in a [Variable] by
/// calling [tracked](Tensor::tracked) or [trained](Tensor::trained).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tensor<T: Inner> {
  shape: Shape,
  data: Rc<RefCell<Vec<T>>>,
}

impl<T: Real> Hops<T> for Tensor<T> {}

impl<T: Inner> PartialEq for Tensor<T> {
  fn eq(&self, rhs: &Self) -> bool {
    if self.shape.dims != rhs.shape.dims { return false }
    self.param_iter().zip(rhs.param_iter()).all(|(a, b)| a == b )
  }
}

impl<T: Inner> Tensor<T> {
  pub fn from_shape(shape: Shape, data: Vec<T>) -> Self {
    assert_eq!(shape.size(), data.len(),
      "{} doesn't match data length {}", shape, data.len());
    Self { shape, data: Rc::new(RefCell::new(data)) }
  }

  pub fn new(shape: &[usize], data: Vec<T>) -> Self {
    Self::from_shape(Shape::new(shape), data)
  }

  pub fn vec(vec: &[T]) -> Self {
    Self::new(&[vec.len()], vec.to_vec())
  }

  pub fn fill(shape: &[usize], filler: T) -> Self {
    Self::new(shape, vec![filler; shape.iter().product()])
  }

  /// Stack equally shaped tensors along a new leading dimension.

  pub fn rows(rows: &[Tensor<T>]) -> Self {
    assert!(!rows.is_empty(), "Cannot stack zero rows");
    let mut dims = rows[0].shape.dims.clone();
    dims.insert(0, rows.len());
    let data = rows.iter()
      .flat_map(|row| row.to_vec() )
      .collect();
    Self::new(&dims, data)
  }

  pub fn raw(&self) -> Ref<Vec<T>> {
    self.data.borrow()
  }

  pub fn to_vec(&self) -> Vec<T> {
    self.param_iter().collect()
  }

  pub fn into_raw(self) -> Vec<T> {
    if !self.shape.contiguous() { return self.to_vec() }
    match Rc::try_unwrap(self.data) {
      Ok(cell) => cell.into_inner(),
      Err(data) => {
        let copy = data.borrow().clone();
        copy
      },
    }
  }

  pub fn size(&self) -> usize {
    self.shape.size()
  }

  pub fn rank(&self) -> usize {
    self.shape.rank()
  }

  pub fn dims(&self) -> &[usize] {
    &self.shape.dims
  }

  pub fn shared_with(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }

  /// Overwrite this tensor's memory with values from `other`,
  /// which gets broadcasted to match.

  pub fn assign(&self, other: &Self) {
    self.op_assign(other, |a, b| *a = b );
  }

  pub fn op_assign(&self, other: &Self, cb: impl Fn(&mut T, T)) {
    assert!(self.shape.contiguous(), "Cannot assign to a strided view {}", self.shape);
    let other = if self.shared_with(other) { other.detach() } else { other.clone() };
    let other = other.broadcast(&self.shape);
    assert_eq!(other.shape.dims, self.shape.dims,
      "Could not assign {} tensor to {} tensor", other.shape, self.shape);
    let mut data = self.data.borrow_mut();
    for (i, value) in other.param_iter().enumerate() {
      cb(&mut data[i], value);
    }
  }

  pub fn refill(&self, filler: T) {
    self.data.borrow_mut().iter_mut().for_each(|a| *a = filler );
  }

  pub fn contiguous(&self) -> Self {
    if self.shape.contiguous() {
      self.clone()
    } else {
      self.detach()
    }
  }

  /// Copy into fresh, contiguous storage.

  pub fn detach(&self) -> Self {
    self.vectorize(|a| a )
  }

  pub fn zip<O,F>(&self, rhs: &Self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: Fn((T, T)) -> O,
  {
    let lhs = self.broadcast(&rhs.shape);
    let rhs = rhs.broadcast(&lhs.shape);
    let data: Vec<O> = lhs.param_iter()
      .zip(rhs.param_iter())
      .map(cb)
      .collect();
    Tensor::new(&lhs.shape.dims, data)
  }

  pub fn vectorize<O,F>(&self, cb: F) -> Tensor<O>
  where
    O: Inner,
    F: FnMut(T) -> O,
  {
    let data = self.param_iter().map(cb).collect();
    Tensor::new(&self.shape.dims, data)
  }

  pub fn param_iter(&self) -> TensorIterator<T> {
    TensorIterator::new(self)
  }

  pub fn item(&self) -> T {
    assert!(self.size() == 1,
      "Can't extract item from non-scalar {}", self.shape);
    self.param_iter().next().unwrap()
  }

  /// Copy out the rows at `indices` along the leading dimension.

  pub fn select_rows(&self, indices: &[usize]) -> Self {
    assert!(self.rank() >= 1, "Cannot select rows from scalar");
    let this = self.contiguous();
    let row_len: usize = this.shape.dims[1..].iter().product();
    let data = this.raw();
    let out = indices.iter()
      .flat_map(|&i| {
        assert!(i < this.shape.dims[0], "Row {} out of bounds for {}", i, this.shape);
        data[i * row_len .. (i + 1) * row_len].iter().copied()
      })
      .collect();
    let mut dims = this.shape.dims.clone();
    dims[0] = indices.len();
    Self::new(&dims, out)
  }

  pub fn row(&self, index: usize) -> Self {
    let row = self.select_rows(&[index]);
    let dims = self.shape.dims[1..].to_vec();
    Self::new(&dims, row.into_raw())
  }

  pub fn transpose(&self, dim1: isize, dim2: isize) -> Self {
    Self { shape: self.shape.transpose(dim1, dim2), data: self.data.clone() }
  }

  /// Split along `dim` into a part of length `size` and the remainder.

  pub fn split(&self, dim: isize, size: usize) -> (Self, Self) {
    let dim = negative_index(dim, self.rank(), false);
    let n = self.shape.dims[dim];
    assert!(size <= n, "Cannot split {} at {} along dim {}", self.shape, size, dim);
    let this = self.contiguous();
    let outer: usize = this.shape.dims[..dim].iter().product();
    let inner: usize = this.shape.dims[dim + 1..].iter().product();
    let data = this.raw();
    let mut left = Vec::with_capacity(outer * size * inner);
    let mut right = Vec::with_capacity(outer * (n - size) * inner);
    if n * inner > 0 {
      for chunk in data.chunks(n * inner).take(outer) {
        left.extend_from_slice(&chunk[..size * inner]);
        right.extend_from_slice(&chunk[size * inner..]);
      }
    }
    let mut dims_l = this.shape.dims.clone();
    dims_l[dim] = size;
    let mut dims_r = this.shape.dims.clone();
    dims_r[dim] = n - size;
    (Self::new(&dims_l, left), Self::new(&dims_r, right))
  }

  pub fn equal(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a == b )
  }
}

impl<T: Real> Tensor<T> {
  pub fn ones(shape: &[usize]) -> Self {
    Self::fill(shape, T::one())
  }

  pub fn zeros(shape: &[usize]) -> Self {
    Self::fill(shape, T::zero())
  }

  pub fn arrange(shape: &[usize], start: T, step: T) -> Self {
    Self::new(shape, (0..shape.iter().product::<usize>())
      .map(|i| T::from(i).unwrap() * step + start )
      .collect())
  }

  /// Uniformly distributed values in `[low, high)`.

  pub fn uniform(shape: &[usize], low: T, high: T, rng: &mut impl Rng) -> Self {
    let len: usize = shape.iter().product();
    Self::new(shape, (0..len).map(|_| rng.gen_range(low, high) ).collect())
  }

  /// Standard normally distributed values.

  pub fn randn(shape: &[usize], rng: &mut impl Rng) -> Self {
    let len: usize = shape.iter().product();
    let mut data = vec![T::zero(); len];
    for i in 0..(len + 1) / 2 {
      let j = i * 2;
      let (r1, r2): (T, T) = randn(rng);
      data[j] = r1;
      if j + 1 < len { data[j + 1] = r2 }
    }
    Self::new(shape, data)
  }

  /// Glorot (Xavier) uniform initialization for a `[fan_in, fan_out]` matrix.

  pub fn glorot_uniform(shape: &[usize], rng: &mut impl Rng) -> Self {
    assert_eq!(shape.len(), 2, "Glorot initialization expects a matrix shape");
    let limit = (T::from(6.0).unwrap() / T::from(shape[0] + shape[1]).unwrap()).sqrt();
    Self::uniform(shape, -limit, limit, rng)
  }

  /// One-hot rows for a list of class indices.

  pub fn one_hot(indices: &[usize], size: usize) -> Self {
    let mut data = vec![T::zero(); indices.len() * size];
    for (row, &i) in indices.iter().enumerate() {
      assert!(i < size, "Class {} out of range for {} classes", i, size);
      data[row * size + i] = T::one();
    }
    Self::new(&[indices.len(), size], data)
  }

  pub fn gt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a > b )
  }

  pub fn lt(&self, rhs: &Self) -> Tensor<bool> {
    self.zip(rhs, |(a, b)| a < b )
  }

  pub fn signum(&self) -> Self {
    self.vectorize(|a| a.signum() )
  }

  pub fn abs(&self) -> Self {
    self.vectorize(|a| a.abs() )
  }

  pub fn is_finite(&self) -> bool {
    self.param_iter().all(|a| a.is_finite() )
  }

  /// Largest absolute element-wise difference.

  pub fn max_difference(&self, rhs: &Self) -> T {
    self.zip(rhs, |(a, b)| (a - b).abs() )
      .param_iter()
      .fold(T::zero(), |acc, a| acc.max(a) )
  }

  pub fn trained(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), true)
  }

  pub fn tracked(&self) -> Variable<T> {
    Variable::from_tensor(self.clone(), false)
  }
}

impl Tensor<bool> {
  pub fn numeric<O: Real>(&self) -> Tensor<O> {
    self.vectorize(|a| if a { O::one() } else { O::zero() })
  }

  pub fn and(&self, rhs: &Self) -> Self {
    self.zip(rhs, |(a, b)| a && b )
  }

  pub fn all(&self) -> bool {
    self.param_iter().all(|a| a )
  }
}

impl<T: Inner> std::fmt::Display for Tensor<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "Tensor{:?} {:?}", self.shape.dims, self.to_vec())
  }
}


pub struct TensorIterator<'a, T: Inner> {
  data: Ref<'a, Vec<T>>,
  shape_iter: Box<dyn Iterator<Item=usize> + 'a>,
}

impl<'a, T: Inner> TensorIterator<'a, T> {
  fn new(tensor: &'a Tensor<T>) -> Self {
    Self {
      data: tensor.data.borrow(),
      shape_iter: tensor.shape.iter(),
    }
  }
}

impl<T: Inner> Iterator for TensorIterator<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<Self::Item> {
    self.shape_iter.next().map(|i| self.data[i] )
  }
}
