use rand::distributions::uniform::SampleUniform;
use num_traits::{ Float, NumAssignOps };
use serde::Serialize;


/// All types that may be used in a [Tensor](crate::Tensor).
///
/// This trait gets implemented automatically for all types
/// that satisfy its dependent traits.

pub trait Inner: PartialEq + Clone + Copy + std::fmt::Debug {}
impl<T: PartialEq + Clone + Copy + std::fmt::Debug> Inner for T {}


/// Floating point types that can be differentiated and trained.
///
/// Implemented for [f32] and [f64]. Matrix products are delegated
/// to the [matrixmultiply] crate when the `unsafe` feature is enabled.

pub trait Real:
  Inner + Float + NumAssignOps + std::iter::Sum + SampleUniform
  + Serialize + std::fmt::Display + 'static
{
  /// Multiply row-major `[m, k]` and `[k, n]` matrices.
  fn matmul(m: usize, k: usize, n: usize, lhs: &[Self], rhs: &[Self]) -> Vec<Self>;
}

#[cfg(not(feature = "unsafe"))]
fn naive_matmul<T: Real>(m: usize, k: usize, n: usize, lhs: &[T], rhs: &[T]) -> Vec<T> {
  let mut data = vec![T::zero(); m * n];
  for i in 0..m {
    for p in 0..k {
      let a = lhs[i * k + p];
      for j in 0..n {
        data[i * n + j] += a * rhs[p * n + j];
      }
    }
  }
  data
}

macro_rules! impl_real {
  ($type:ty, $gemm:ident) => {
    impl Real for $type {
      #[cfg(feature = "unsafe")]
      fn matmul(m: usize, k: usize, n: usize, lhs: &[Self], rhs: &[Self]) -> Vec<Self> {
        assert!(lhs.len() >= m * k && rhs.len() >= k * n);
        let mut data = vec![0.0; m * n];
        if m == 0 || k == 0 || n == 0 { return data }
        unsafe {
          matrixmultiply::$gemm(
            m, k, n,
            1.0,
            lhs.as_ptr(), k as isize, 1,
            rhs.as_ptr(), n as isize, 1,
            0.0,
            data.as_mut_ptr(), n as isize, 1,
          );
        }
        data
      }

      #[cfg(not(feature = "unsafe"))]
      fn matmul(m: usize, k: usize, n: usize, lhs: &[Self], rhs: &[Self]) -> Vec<Self> {
        naive_matmul(m, k, n, lhs, rhs)
      }
    }
  };
}

impl_real!(f32, sgemm);
impl_real!(f64, dgemm);
