use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  scalar::{ Inner, Real },
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Inner> BaseOps<T> for Tensor<T> {
  fn scalar(item: T) -> Self {
    Self::new(&[], vec![item])
  }

  fn shape(&self) -> &Shape {
    &self.shape
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    Self {
      shape: self.shape.broadcast(shape),
      data: self.data.clone(),
    }
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    let this = self.contiguous();
    assert_eq!(this.size(), dims.iter().product::<usize>(),
      "Cannot reshape {} to {:?}", this.shape, dims);
    Self { shape: Shape::new(dims), data: this.data }
  }

  fn concat(&self, rhs: &Self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false);
    let mut dims_l = self.shape.dims.clone();
    dims_l[dim] += rhs.shape.dims[dim];
    let mut dims_r = rhs.shape.dims.clone();
    dims_r[dim] += self.shape.dims[dim];
    assert_eq!(dims_l, dims_r,
      "Cannot concat {} & {} tensors. Shapes may only differ in dim {}",
      self.shape, rhs.shape, dim);

    let outer: usize = self.shape.dims[..dim].iter().product();
    let chunk_l: usize = self.shape.dims[dim..].iter().product();
    let chunk_r: usize = rhs.shape.dims[dim..].iter().product();
    let data_l = self.to_vec();
    let data_r = rhs.to_vec();
    let mut data = Vec::with_capacity(data_l.len() + data_r.len());
    for o in 0..outer {
      data.extend_from_slice(&data_l[o * chunk_l .. (o + 1) * chunk_l]);
      data.extend_from_slice(&data_r[o * chunk_r .. (o + 1) * chunk_r]);
    }
    Self::new(&dims_l, data)
  }
}

impl<T: Real> NumericOps<T> for Tensor<T> {
  fn sum(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false);
    let outer: usize = self.shape.dims[..dim].iter().product();
    let inner: usize = self.shape.dims[dim..].iter().product();
    let data = self.to_vec();
    let sums = (0..outer)
      .map(|o| data[o * inner .. (o + 1) * inner].iter().copied().sum() )
      .collect();
    Self::new(&self.shape.dims[..dim], sums)
  }

  fn sum_over(&self, dim: isize) -> Self {
    let dim = negative_index(dim, self.rank(), false);
    let outer: usize = self.shape.dims[..dim].iter().product();
    let n = self.shape.dims[dim];
    let inner: usize = self.shape.dims[dim + 1..].iter().product();
    let data = self.to_vec();
    let mut sums = vec![T::zero(); outer * inner];
    for o in 0..outer {
      for k in 0..n {
        for i in 0..inner {
          sums[o * inner + i] += data[(o * n + k) * inner + i];
        }
      }
    }
    let mut dims = self.shape.dims.clone();
    dims[dim] = 1;
    Self::new(&dims, sums)
  }

  fn mm(&self, rhs: &Self) -> Self {
    assert!(self.rank() == 2 && rhs.rank() == 2,
      "Matrix product expects matrices, got {} & {}", self.shape, rhs.shape);
    let (m, k) = (self.shape.dims[0], self.shape.dims[1]);
    let n = rhs.shape.dims[1];
    assert_eq!(k, rhs.shape.dims[0],
      "Cannot multiply {} with {}", self.shape, rhs.shape);
    let lhs = self.contiguous();
    let rhs = rhs.contiguous();
    let data = T::matmul(m, k, n, &lhs.raw(), &rhs.raw());
    Self::new(&[m, n], data)
  }

  fn scale(&self, factor: T) -> Self {
    self.vectorize(|a| a * factor )
  }
}

impl<T: Real> RealOps<T> for Tensor<T> {
  fn exp(&self) -> Self {
    self.vectorize(|a| a.exp() )
  }

  fn log(&self) -> Self {
    self.vectorize(|a| a.ln() )
  }

  fn sqrt(&self) -> Self {
    self.vectorize(|a| a.sqrt() )
  }

  fn sqr(&self) -> Self {
    self.vectorize(|a| a * a )
  }

  fn relu(&self) -> Self {
    self.vectorize(|a| a.max(T::zero()) )
  }

  fn clamp(&self, min: T, max: T) -> Self {
    self.vectorize(|a| if a < min { min } else if a > max { max } else { a } )
  }
}

impl<T: Real> std::ops::Neg for &Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    self.vectorize(|a| -a )
  }
}

impl<T: Real> std::ops::Neg for Tensor<T> {
  type Output = Tensor<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($trait:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$trait for &Tensor<T> { // &tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        self.zip(rhs, |(a, b)| a $symbol b )
      }
    }

    impl<T: Real> std::ops::$trait for Tensor<T> { // tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Self) -> Tensor<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$trait<Tensor<T>> for &Tensor<T> { // &tensor * other
      type Output = Tensor<T>;

      fn $meth(self, rhs: Tensor<T>) -> Tensor<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$trait<&Tensor<T>> for Tensor<T> { // tensor * &other
      type Output = Tensor<T>;

      fn $meth(self, rhs: &Tensor<T>) -> Tensor<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$trait<T> for &Tensor<T> { // &tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        self.vectorize(|a| a $symbol rhs )
      }
    }

    impl<T: Real> std::ops::$trait<T> for Tensor<T> { // tensor * T
      type Output = Tensor<T>;

      fn $meth(self, rhs: T) -> Tensor<T> {
        &self $symbol rhs
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);
