use crate::Shape;
use crate::internal::*;
use crate::scalar::{ Inner, Real };


/// Differentiable mid-level operations that are also implemented
/// for non-differentiable [Inner] types.

pub trait BaseOps<I: Inner>: Clone {
  fn scalar(item: I) -> Self;
  fn shape(&self) -> &Shape;
  fn broadcast(&self, shape: &Shape) -> Self;
  fn reshape(&self, dims: &[usize]) -> Self;
  fn concat(&self, rhs: &Self, dim: isize) -> Self;

  fn dim(&self, idx: isize) -> usize {
    self.shape()[idx]
  }
}


/// Differentiable reductions and products.

pub trait NumericOps<I: Real>: Sized {
  /// Sum all dimensions starting at `dim`, removing them.
  fn sum(&self, dim: isize) -> Self;
  /// Sum a single dimension, keeping it with size one.
  fn sum_over(&self, dim: isize) -> Self;
  fn mm(&self, rhs: &Self) -> Self;
  fn scale(&self, factor: I) -> Self;
}


/// Differentiable element-wise functions.

pub trait RealOps<I: Real> {
  fn exp(&self) -> Self;
  fn log(&self) -> Self;
  fn sqrt(&self) -> Self;
  fn sqr(&self) -> Self;
  fn relu(&self) -> Self;
  fn clamp(&self, min: I, max: I) -> Self;
}


/// High-level operations, implemented exclusively on top of
/// the lower level traits. As a result, these are all
/// differentiable when called on a [Variable](crate::Variable).

pub trait Hops<I: Real>: BaseOps<I> + NumericOps<I> + RealOps<I> {
  fn mean(&self, dim: isize) -> Self {
    let udim = negative_index(dim, self.shape().rank(), false);
    let n: usize = self.shape().dims[udim..].iter().product();
    self.sum(dim).scale(I::one() / I::from(n.max(1)).unwrap())
  }

  fn mean_over(&self, dim: isize) -> Self {
    let n = self.dim(dim).max(1);
    self.sum_over(dim).scale(I::one() / I::from(n).unwrap())
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::Tensor;

  #[test]
  fn mean() {
    let a = Tensor::new(&[3,2], vec![1., 2., 3., 4., 5., 6.]).trained();
    assert_eq!(a.mean(0).tensor(), &Tensor::scalar(3.5));
    assert_eq!(a.mean(-1).tensor(), &Tensor::vec(&[1.5, 3.5, 5.5]));
  }

  #[test]
  fn mean_over() {
    let a = Tensor::new(&[2,3], vec![1., 2., 3., 5., 6., 7.]);
    assert_eq!(a.mean_over(0), Tensor::new(&[1,3], vec![3., 4., 5.]));
  }
}
