/// Compute the magnitude (L2 norm) of a vector.
pub fn magnitude(v: &[f32]) -> f64 {
	let mut sum: f64 = 0.0;
	for &x in v {
		let xf = x as f64;
		sum += xf * xf;
	}
	sum.sqrt()
}

/// Scale `v` in place to unit length. Zero and non-finite vectors are left as-is.
pub fn normalize_l2(v: &mut [f32]) {
	let norm = magnitude(v);
	if norm == 0.0 || !norm.is_finite() {
		return;
	}
	for x in v.iter_mut() {
		*x = (*x as f64 / norm) as f32;
	}
}

/// Return a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
	let mut out = v.to_vec();
	normalize_l2(&mut out);
	out
}

/// Inner product of two equal-length vectors, accumulated in f64.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	debug_assert_eq!(a.len(), b.len());
	let mut sum: f64 = 0.0;
	for (x, y) in a.iter().zip(b) {
		sum += (*x as f64) * (*y as f64);
	}
	sum as f32
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn magnitude_basic() {
		assert!((magnitude(&[3.0, 4.0]) - 5.0).abs() < 1e-10);
		assert_eq!(magnitude(&[]), 0.0);
	}

	#[test]
	fn normalizes_to_unit_length() {
		let v = normalized(&[3.0, 4.0]);
		assert!((v[0] - 0.6).abs() < 1e-6);
		assert!((v[1] - 0.8).abs() < 1e-6);
		assert!((magnitude(&v) - 1.0).abs() < 1e-6);
	}

	#[test]
	fn zero_vector_stays_zero() {
		let mut v = vec![0.0f32; 4];
		normalize_l2(&mut v);
		assert_eq!(v, vec![0.0; 4]);
	}

	#[test]
	fn dot_of_unit_vectors_is_cosine() {
		let a = normalized(&[1.0, 2.0, 3.0]);
		let b = normalized(&[3.0, 2.0, 1.0]);
		// (3 + 4 + 3) / 14
		assert!((dot(&a, &b) - 10.0 / 14.0).abs() < 1e-6);
		assert!((dot(&a, &a) - 1.0).abs() < 1e-6);
	}

	#[test]
	fn opposite_unit_vectors_score_minus_one() {
		let a = normalized(&[1.0, 0.0]);
		let b = normalized(&[-2.0, 0.0]);
		assert!((dot(&a, &b) + 1.0).abs() < 1e-6);
	}
}
