/**
* filename : size
* author : HAMA
* date: 2025. 6. 2.
* description: 캐시 값의 대략적인 메모리 비용
**/

use std::mem::size_of;

/// 캐시에 저장되는 값이 자신의 대략적인 크기(byte)를 보고하는 계약.
///
/// 힙을 쓰지 않는 값 타입은 빈 `impl` 만으로 충분하다.
pub trait CacheCost {
  fn approx_size(&self) -> usize {
    std::mem::size_of_val(self)
  }
}

impl CacheCost for f64 {}
impl CacheCost for i64 {}
impl CacheCost for u64 {}
impl CacheCost for bool {}

impl CacheCost for String {
  fn approx_size(&self) -> usize {
    size_of::<String>() + self.len()
  }
}

impl<T: CacheCost> CacheCost for Option<T> {
  fn approx_size(&self) -> usize {
    match self {
      Some(value) => value.approx_size().max(size_of::<Self>()),
      None => size_of::<Self>(),
    }
  }
}

impl<T: CacheCost> CacheCost for Vec<T> {
  fn approx_size(&self) -> usize {
    size_of::<Vec<T>>() + self.iter().map(|v| v.approx_size()).sum::<usize>()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_primitive_sizes() {
    assert_eq!(1.0_f64.approx_size(), 8);
    assert_eq!(true.approx_size(), 1);
  }

  #[test]
  fn test_string_counts_heap() {
    let s = "abcd".to_string();
    assert_eq!(s.approx_size(), size_of::<String>() + 4);
  }

  #[test]
  fn test_vec_sums_elements() {
    let values = vec![Some(1.0_f64), None, Some(3.0)];
    let expected = size_of::<Vec<Option<f64>>>() + 3 * size_of::<Option<f64>>();
    assert_eq!(values.approx_size(), expected);
  }
}
