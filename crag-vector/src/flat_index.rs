use crate::cosine::{dot, normalize_l2, normalized};
use crate::error::{Result, VectorError};

/// Exhaustive inner-product index over unit-length vectors.
///
/// Vectors are stored row-major in one contiguous buffer. `add` normalises
/// each vector, so the score of a normalised query is its cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
	dimension: usize,
	data: Vec<f32>,
}

impl FlatIpIndex {
	pub fn new(dimension: usize) -> Result<Self> {
		if dimension == 0 {
			return Err(VectorError::InvalidDimension);
		}
		Ok(Self {
			dimension,
			data: Vec::new(),
		})
	}

	/// Rebuild from a row-major buffer that is already normalised.
	pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
		if dimension == 0 {
			return Err(VectorError::InvalidDimension);
		}
		if data.len() % dimension != 0 {
			return Err(VectorError::Corruption(format!(
				"buffer of {} floats is not a multiple of dimension {}",
				data.len(),
				dimension
			)));
		}
		Ok(Self { dimension, data })
	}

	pub fn dimension(&self) -> usize {
		self.dimension
	}

	pub fn len(&self) -> usize {
		self.data.len() / self.dimension
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn as_slice(&self) -> &[f32] {
		&self.data
	}

	pub fn vector(&self, position: usize) -> Option<&[f32]> {
		let start = position.checked_mul(self.dimension)?;
		self.data.get(start..start + self.dimension)
	}

	fn check_dimension(&self, v: &[f32]) -> Result<()> {
		if v.len() != self.dimension {
			return Err(VectorError::DimensionMismatch {
				expected: self.dimension,
				actual: v.len(),
			});
		}
		Ok(())
	}

	/// Append vectors. Either all are added or none.
	pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
		for v in vectors {
			self.check_dimension(v)?;
		}
		self.data.reserve(vectors.len() * self.dimension);
		for v in vectors {
			let start = self.data.len();
			self.data.extend_from_slice(v);
			normalize_l2(&mut self.data[start..]);
		}
		Ok(())
	}

	/// Top `k` rows by inner product with the normalised query. Ties go to the
	/// lower position.
	pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
		self.search_where(query, k, |_| true)
	}

	/// Like [`FlatIpIndex::search`], restricted to rows accepted by `accept`.
	pub fn search_where<F>(&self, query: &[f32], k: usize, accept: F) -> Result<Vec<(usize, f32)>>
	where
		F: Fn(usize) -> bool,
	{
		self.check_dimension(query)?;
		if k == 0 {
			return Ok(Vec::new());
		}
		let q = normalized(query);
		let mut scored: Vec<(usize, f32)> = self
			.data
			.chunks_exact(self.dimension)
			.enumerate()
			.filter(|(i, _)| accept(*i))
			.map(|(i, row)| (i, dot(&q, row)))
			.collect();
		scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		scored.truncate(k);
		Ok(scored)
	}
}
