//! Weight tensors and the per-layer weight sets exchanged each round.
//!
//! Tensors are dense f64 arrays stored flat with an explicit shape. On the
//! wire they are nested numeric arrays (what numpy's `tolist()` produces),
//! so a custom serde implementation maps between the two representations.
//! Deserialization infers the shape from the nesting and rejects ragged
//! input; round-trips preserve f64 values exactly.

use rand::Rng;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense n-dimensional f64 tensor (one model layer).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Tensor {
    /// Build a tensor from a shape and flat row-major values.
    /// Returns `None` if the value count does not match the shape.
    pub fn from_flat(shape: Vec<usize>, values: Vec<f64>) -> Option<Self> {
        if shape.iter().product::<usize>() != values.len() {
            return None;
        }
        Some(Self { shape, values })
    }

    /// Scalar (0-dimensional) tensor.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    /// 1-dimensional tensor.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// All-zeros tensor with the same shape as `self`.
    pub fn zeros_like(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            values: vec![0.0; self.values.len()],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn same_shape(&self, other: &Tensor) -> bool {
        self.shape == other.shape
    }

    /// `self += factor * other`. Returns false on shape mismatch.
    pub fn add_scaled(&mut self, other: &Tensor, factor: f64) -> bool {
        if !self.same_shape(other) {
            return false;
        }
        for (a, b) in self.values.iter_mut().zip(other.values.iter()) {
            *a += factor * b;
        }
        true
    }

    /// Mean absolute elementwise difference, or `None` on shape mismatch
    /// or empty tensors.
    pub fn mean_abs_diff(&self, other: &Tensor) -> Option<f64> {
        if !self.same_shape(other) || self.values.is_empty() {
            return None;
        }
        let sum: f64 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        Some(sum / self.values.len() as f64)
    }
}

/// Serializes the flat buffer as nested sequences following `shape`.
struct NestedView<'a> {
    shape: &'a [usize],
    values: &'a [f64],
}

impl Serialize for NestedView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.shape.split_first() {
            None => self.values[0].serialize(serializer),
            Some((&dim, rest)) => {
                let mut seq = serializer.serialize_seq(Some(dim))?;
                if rest.is_empty() {
                    for v in self.values {
                        seq.serialize_element(v)?;
                    }
                } else {
                    let stride = rest.iter().product::<usize>();
                    if stride == 0 {
                        // A zero-length inner dimension carries no values;
                        // emit `dim` empty subtrees so the round-trip stays total.
                        for _ in 0..dim {
                            seq.serialize_element(&NestedView {
                                shape: rest,
                                values: &[],
                            })?;
                        }
                    } else {
                        for chunk in self.values.chunks(stride) {
                            seq.serialize_element(&NestedView {
                                shape: rest,
                                values: chunk,
                            })?;
                        }
                    }
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Tensor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NestedView {
            shape: &self.shape,
            values: &self.values,
        }
        .serialize(serializer)
    }
}

struct TensorVisitor;

impl<'de> Visitor<'de> for TensorVisitor {
    type Value = Tensor;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a (nested) array of numbers")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Tensor, E> {
        Ok(Tensor::scalar(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Tensor, E> {
        Ok(Tensor::scalar(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Tensor, E> {
        Ok(Tensor::scalar(v as f64))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Tensor, A::Error> {
        let mut inner_shape: Option<Vec<usize>> = None;
        let mut values = Vec::new();
        let mut count = 0usize;

        while let Some(child) = seq.next_element::<Tensor>()? {
            match &inner_shape {
                None => inner_shape = Some(child.shape.clone()),
                Some(shape) if *shape != child.shape => {
                    return Err(de::Error::custom("ragged tensor: sibling shapes differ"));
                }
                Some(_) => {}
            }
            values.extend_from_slice(&child.values);
            count += 1;
        }

        let mut shape = vec![count];
        shape.extend(inner_shape.unwrap_or_default());
        Ok(Tensor { shape, values })
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TensorVisitor)
    }
}

/// Ordered per-layer weight tensors — the unit exchanged each round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct WeightSet(pub Vec<Tensor>);

impl WeightSet {
    pub fn new(layers: Vec<Tensor>) -> Self {
        Self(layers)
    }

    pub fn layer_count(&self) -> usize {
        self.0.len()
    }

    pub fn layers(&self) -> &[Tensor] {
        &self.0
    }

    /// True when there are no layers, or any layer has no elements.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty() || self.0.iter().any(|t| t.is_empty())
    }

    /// Same layer count and identical per-layer shapes.
    pub fn shape_matches(&self, other: &WeightSet) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.same_shape(b))
    }

    /// Seed a fresh global model: one tensor per requested shape with
    /// values uniform in [-0.05, 0.05], like fresh dense-layer init.
    pub fn seed<R: Rng>(shapes: &[Vec<usize>], rng: &mut R) -> Self {
        let layers = shapes
            .iter()
            .map(|shape| {
                let n = shape.iter().product::<usize>();
                let values = (0..n).map(|_| rng.gen_range(-0.05..0.05)).collect();
                Tensor {
                    shape: shape.clone(),
                    values,
                }
            })
            .collect();
        Self(layers)
    }
}
