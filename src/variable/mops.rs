
use crate::{
  internal::*,
  shape::Shape,
  tensor::Tensor,
  variable::{ Variable, BinaryOp, UnaryOp },
  scalar::Real,
  ops::{ BaseOps, NumericOps, RealOps },
};


impl<T: Real> BaseOps<T> for Variable<T> {
  fn scalar(item: T) -> Self {
    Self::from_tensor(Tensor::scalar(item), false)
  }

  fn shape(&self) -> &Shape {
    self.node.data.shape()
  }

  fn broadcast(&self, shape: &Shape) -> Self {
    let dims = self.shape().broadcast(shape).dims;
    if dims == self.shape().dims { return self.clone() }
    self.unary_op(Broadcast { dims })
  }

  fn reshape(&self, dims: &[usize]) -> Self {
    if dims == self.shape().dims.as_slice() { return self.clone() }
    self.unary_op(Reshape { dims: dims.to_vec() })
  }

  fn concat(&self, rhs: &Self, dim: isize) -> Self {
    self.binary_op(Concat { dim }, rhs)
  }
}

impl<T: Real> NumericOps<T> for Variable<T> {
  fn sum(&self, dim: isize) -> Self {
    self.unary_op(Sum { dim })
  }

  fn sum_over(&self, dim: isize) -> Self {
    self.unary_op(SumOver { dim })
  }

  fn mm(&self, rhs: &Self) -> Self {
    self.binary_op(MatMul, rhs)
  }

  fn scale(&self, factor: T) -> Self {
    self.unary_op(Scale { factor })
  }
}

impl<T: Real> RealOps<T> for Variable<T> {
  fn exp(&self) -> Self {
    self.unary_op(Exp)
  }

  fn log(&self) -> Self {
    self.unary_op(Log)
  }

  fn sqrt(&self) -> Self {
    self.unary_op(Sqrt)
  }

  fn sqr(&self) -> Self {
    self.unary_op(Sqr)
  }

  fn relu(&self) -> Self {
    self.unary_op(ReLU)
  }

  fn clamp(&self, min: T, max: T) -> Self {
    self.unary_op(Clamp { min, max })
  }
}

impl<T: Real> std::ops::Neg for &Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    self.scale(-T::one())
  }
}

impl<T: Real> std::ops::Neg for Variable<T> {
  type Output = Variable<T>;

  fn neg(self) -> Self::Output {
    -&self
  }
}

macro_rules! add_operator {
  ($op:ident, $meth:ident, $symbol:tt) => {
    impl<T: Real> std::ops::$op for &Variable<T> { // &tensor * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        let lhs = self.broadcast(rhs.shape());
        let rhs = rhs.broadcast(lhs.shape());
        lhs.binary_op($op, &rhs)
      }
    }

    impl<T: Real> std::ops::$op for Variable<T> { // tensor * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Self) -> Variable<T> {
        &self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<Variable<T>> for &Variable<T> { // &tensor * other
      type Output = Variable<T>;

      fn $meth(self, rhs: Variable<T>) -> Variable<T> {
        self $symbol &rhs
      }
    }

    impl<T: Real> std::ops::$op<&Variable<T>> for Variable<T> { // tensor * &other
      type Output = Variable<T>;

      fn $meth(self, rhs: &Variable<T>) -> Variable<T> {
        &self $symbol rhs
      }
    }

    impl<T: Real> std::ops::$op<T> for &Variable<T> { // &tensor * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        self $symbol &Variable::scalar(rhs)
      }
    }

    impl<T: Real> std::ops::$op<T> for Variable<T> { // tensor * T
      type Output = Variable<T>;

      fn $meth(self, rhs: T) -> Variable<T> {
        &self $symbol &Variable::scalar(rhs)
      }
    }
  };
}

add_operator!(Add, add, +);
add_operator!(Sub, sub, -);
add_operator!(Mul, mul, *);
add_operator!(Div, div, /);


#[derive(Debug, Clone)]
pub struct Add;

impl<T: Real> BinaryOp<T> for Add {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs + rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    grad.clone(),
  )}
}


#[derive(Debug, Clone)]
pub struct Sub;

impl<T: Real> BinaryOp<T> for Sub {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs - rhs
  }

  fn derive(&self, _lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.clone(),
    -grad
  )}
}


#[derive(Debug, Clone)]
pub struct Mul;

impl<T: Real> BinaryOp<T> for Mul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs * rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad * rhs,
    grad * lhs,
  )}
}


#[derive(Debug, Clone)]
pub struct Div;

impl<T: Real> BinaryOp<T> for Div {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs / rhs
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad / rhs,
    -(grad * lhs / rhs / rhs)
  )}
}


#[derive(Debug, Clone)]
pub struct MatMul;

impl<T: Real> BinaryOp<T> for MatMul {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.mm(rhs)
  }

  fn derive(&self, lhs: &Tensor<T>, rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>)
  {(
    grad.mm(&rhs.transpose(0, 1)),
    lhs.transpose(0, 1).mm(grad),
  )}
}


#[derive(Debug, Clone)]
pub struct Concat {
  dim: isize,
}

impl<T: Real> BinaryOp<T> for Concat {
  fn run(&self, lhs: &Tensor<T>, rhs: &Tensor<T>) -> Tensor<T> {
    lhs.concat(rhs, self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, _rhs: &Tensor<T>, grad: &Tensor<T>) -> (Tensor<T>, Tensor<T>) {
    grad.split(self.dim, lhs.dim(self.dim))
  }
}


#[derive(Debug, Clone)]
pub struct Broadcast {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Broadcast {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.broadcast(&Shape::new(&self.dims)).contiguous()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    // Sum over every dimension that got stretched
    let pad = self.dims.len() - lhs.rank();
    let mut grad = grad.clone();
    for (d, &n) in self.dims.iter().enumerate() {
      let original = if d < pad { 1 } else { lhs.dims()[d - pad] };
      if original == 1 && n != 1 {
        grad = grad.sum_over(d as isize);
      }
    }
    grad.reshape(lhs.dims())
  }
}


#[derive(Debug, Clone)]
pub struct Reshape {
  dims: Vec<usize>,
}

impl<T: Real> UnaryOp<T> for Reshape {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.reshape(&self.dims)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.reshape(lhs.dims())
  }
}


#[derive(Debug, Clone)]
pub struct Sum {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for Sum {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    // Restore collapsed dimensions as ones, then stretch
    let dim = negative_index(self.dim, lhs.rank(), false);
    let mut dims = lhs.dims()[..dim].to_vec();
    dims.resize(lhs.rank(), 1);
    grad.reshape(&dims).broadcast(lhs.shape()).contiguous()
  }
}


#[derive(Debug, Clone)]
pub struct SumOver {
  dim: isize,
}

impl<T: Real> UnaryOp<T> for SumOver {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sum_over(self.dim)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.broadcast(lhs.shape()).contiguous()
  }
}


#[derive(Debug, Clone)]
pub struct Scale<T> {
  factor: T,
}

impl<T: Real> UnaryOp<T> for Scale<T> {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.scale(self.factor)
  }

  fn derive(&self, _lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad.scale(self.factor)
  }
}


#[derive(Debug, Clone)]
pub struct Exp;

impl<T: Real> UnaryOp<T> for Exp {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.exp()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.exp()
  }
}


#[derive(Debug, Clone)]
pub struct Log;

impl<T: Real> UnaryOp<T> for Log {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.log()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad / lhs
  }
}


#[derive(Debug, Clone)]
pub struct Sqrt;

impl<T: Real> UnaryOp<T> for Sqrt {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sqrt()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad / lhs.sqrt().scale(T::from(2.0).unwrap())
  }
}


#[derive(Debug, Clone)]
pub struct Sqr;

impl<T: Real> UnaryOp<T> for Sqr {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.sqr()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.scale(T::from(2.0).unwrap())
  }
}


#[derive(Debug, Clone)]
pub struct ReLU;

impl<T: Real> UnaryOp<T> for ReLU {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.relu()
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    grad * lhs.gt(&Tensor::scalar(T::zero())).numeric::<T>()
  }
}


/// Gradients only pass where the input lies inside the clamped range.

#[derive(Debug, Clone)]
pub struct Clamp<T> {
  min: T,
  max: T,
}

impl<T: Real> UnaryOp<T> for Clamp<T> {
  fn run(&self, lhs: &Tensor<T>) -> Tensor<T> {
    lhs.clamp(self.min, self.max)
  }

  fn derive(&self, lhs: &Tensor<T>, grad: &Tensor<T>) -> Tensor<T> {
    let (min, max) = (self.min, self.max);
    grad * lhs.vectorize(|a| if a >= min && a <= max { T::one() } else { T::zero() })
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::ops::Hops;

  const TOLERANCE: f64 = 1e-4;

  #[test]
  fn broadcast_gradient() {
    let bias = Tensor::vec(&[1.0, 2.0, 3.0]).trained();
    let x = Tensor::new(&[2,3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).tracked();
    let y = (&x + &bias).sum(0);
    y.backward();
    assert_eq!(bias.grad(), Some(&Tensor::vec(&[2.0, 2.0, 2.0])));
  }

  #[test]
  fn matmul_gradient() {
    let mut rng = StdRng::seed_from_u64(0);
    let w = Tensor::<f64>::randn(&[3, 2], &mut rng).tracked();
    let diff = Variable::<f64>::check_gradients(&[4, 3], &mut rng, |x| x.mm(&w) );
    assert!(diff < TOLERANCE);
  }

  #[test]
  fn elementwise_gradients() {
    let mut rng = StdRng::seed_from_u64(1);
    assert!(Variable::<f64>::check_gradients(&[2, 3], &mut rng, |x| x.exp() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[2, 3], &mut rng, |x| x.sqr() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[2, 3], &mut rng, |x| (x.sqr() + 1.0).log() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[2, 3], &mut rng, |x| (x.sqr() + 1.0).sqrt() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[2, 3], &mut rng, |x| x / (x.sqr() + 2.0) ) < TOLERANCE);
  }

  #[test]
  fn reduction_gradients() {
    let mut rng = StdRng::seed_from_u64(2);
    assert!(Variable::<f64>::check_gradients(&[3, 4], &mut rng, |x| x.sum(-1).sqr() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[3, 4], &mut rng, |x| x.mean_over(0).sqr() ) < TOLERANCE);
    assert!(Variable::<f64>::check_gradients(&[3, 4], &mut rng, |x| {
      let centered = x - &x.mean_over(0);
      centered.sqr().mean_over(0)
    }) < TOLERANCE);
  }

  #[test]
  fn concat_gradient() {
    let a = Tensor::new(&[2,2], vec![1.0, 2.0, 3.0, 4.0]).trained();
    let b = Tensor::new(&[2,1], vec![5.0, 6.0]).trained();
    let weights = Tensor::new(&[2,3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).tracked();
    let y = (a.concat(&b, -1) * &weights).sum(0);
    y.backward();
    assert_eq!(a.grad(), Some(&Tensor::new(&[2,2], vec![1.0, 2.0, 4.0, 5.0])));
    assert_eq!(b.grad(), Some(&Tensor::new(&[2,1], vec![3.0, 6.0])));
  }

  #[test]
  fn clamp_blocks_gradient() {
    let x = Tensor::vec(&[-5.0, 0.5, 5.0]).trained();
    let y = x.clamp(-1.0, 1.0).sum(0);
    y.backward();
    assert_eq!(x.grad(), Some(&Tensor::vec(&[0.0, 1.0, 0.0])));
  }
}
