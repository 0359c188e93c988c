//! Memory references and local-memory layout.
//!
//! Tensors in local memory are spread across the NPU lanes: channel `c`
//! lives on lane `(c + npu_offset) % npu_num`, and the stride of each
//! dimension depends on the layout the instruction declared. Global tensors
//! are plain row-major.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DType {
    Int4,
    Uint4,
    Int8,
    Uint8,
    Int16,
    Uint16,
    F16,
    Bf16,
    Int32,
    Uint32,
    F32,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Int4,
        DType::Uint4,
        DType::Int8,
        DType::Uint8,
        DType::Int16,
        DType::Uint16,
        DType::F16,
        DType::Bf16,
        DType::Int32,
        DType::Uint32,
        DType::F32,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            DType::Int4 => "int4",
            DType::Uint4 => "uint4",
            DType::Int8 => "int8",
            DType::Uint8 => "uint8",
            DType::Int16 => "int16",
            DType::Uint16 => "uint16",
            DType::F16 => "f16",
            DType::Bf16 => "bf16",
            DType::Int32 => "int32",
            DType::Uint32 => "uint32",
            DType::F32 => "f32",
        }
    }

    /// Width of one element in bits.
    pub const fn bits(self) -> u64 {
        match self {
            DType::Int4 | DType::Uint4 => 4,
            DType::Int8 | DType::Uint8 => 8,
            DType::Int16 | DType::Uint16 | DType::F16 | DType::Bf16 => 16,
            DType::Int32 | DType::Uint32 | DType::F32 => 32,
        }
    }
}

/// Layout declared by an instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// Row-major, densely packed.
    Continuous,
    /// Explicit per-dimension stride carried by the reference.
    Stride,
    /// Local memory, `h*w` aligned to the execution-unit width.
    AlignEu,
    /// Local memory, `h*w` packed without alignment.
    Compact,
    /// Scalar per lane.
    Offset,
    /// Local memory, each row aligned to the execution-unit width.
    T3,
    /// Single aligned row broadcast over n and c.
    T4,
    /// Row-aligned, one batch per lane bank.
    T5,
}

impl Layout {
    pub const ALL: [Layout; 8] = [
        Layout::Continuous,
        Layout::Stride,
        Layout::AlignEu,
        Layout::Compact,
        Layout::Offset,
        Layout::T3,
        Layout::T4,
        Layout::T5,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Layout::Continuous => "continuous",
            Layout::Stride => "stride",
            Layout::AlignEu => "align-eu",
            Layout::Compact => "compact",
            Layout::Offset => "offset",
            Layout::T3 => "t3",
            Layout::T4 => "t4",
            Layout::T5 => "t5",
        }
    }

    /// Whether the layout describes the NPU local-memory arrangement.
    pub const fn is_local(self) -> bool {
        !matches!(self, Layout::Continuous | Layout::Stride)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        DType::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| TargetError::Validation {
                detail: format!("unknown dtype '{s}'"),
            })
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        Layout::ALL
            .into_iter()
            .find(|l| l.name() == s)
            .ok_or_else(|| TargetError::Validation {
                detail: format!("unknown layout '{s}'"),
            })
    }
}

/// Row-major contiguous strides for `shape`.
///
/// The last dimension has stride 1; each earlier dimension's stride is the
/// product of every size to its right. An empty shape gives an empty stride.
/// Strides past `u64::MAX` saturate; use [`checked_contiguous_stride`] to
/// detect that instead.
pub fn contiguous_stride(shape: &[u64]) -> Vec<u64> {
    let mut stride = vec![0u64; shape.len()];
    let mut acc = 1u64;
    for (s, dim) in stride.iter_mut().zip(shape).rev() {
        *s = acc;
        acc = acc.saturating_mul(*dim);
    }
    stride
}

/// Like [`contiguous_stride`], but `None` if any stride exceeds `u64::MAX`.
pub fn checked_contiguous_stride(shape: &[u64]) -> Option<Vec<u64>> {
    let mut stride = vec![0u64; shape.len()];
    let mut acc = 1u64;
    for (i, dim) in shape.iter().enumerate().rev() {
        stride[i] = acc;
        // the product left of the outermost dim is never used
        if i > 0 {
            acc = acc.checked_mul(*dim)?;
        }
    }
    Some(stride)
}

/// A tensor resident in chip memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemRef {
    pub address: u64,
    pub shape: Vec<u64>,
    /// Element stride per dimension.
    pub stride: Vec<u64>,
    pub dtype: DType,
    pub layout: Layout,
}

impl MemRef {
    /// Create a reference with the contiguous stride for `shape`.
    pub fn new(address: u64, shape: Vec<u64>, dtype: DType, layout: Layout) -> Self {
        let stride = contiguous_stride(&shape);
        Self {
            address,
            shape,
            stride,
            dtype,
            layout,
        }
    }

    /// Override the stride (used with [`Layout::Stride`]).
    pub fn with_stride(mut self, stride: Vec<u64>) -> Self {
        self.stride = stride;
        self
    }
}

/// Lane geometry of a chip's local memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LocalGeometry {
    /// Number of NPU lanes.
    pub npu_num: u64,
    /// Execution-unit alignment in bytes.
    pub align_eu_base: u64,
    /// Local memory bytes per lane.
    pub lane_bytes: u64,
    /// Base address of local memory.
    pub local_base: u64,
}

impl LocalGeometry {
    /// Elements of `dtype` per execution-unit row.
    pub fn eu_num(&self, dtype: DType) -> u64 {
        (self.align_eu_base * 8 / dtype.bits()).max(1)
    }

    /// Lane that holds the first channel of a tensor at `address`.
    pub fn npu_offset(&self, address: u64) -> u64 {
        address.saturating_sub(self.local_base) / self.lane_bytes % self.npu_num
    }

    /// Stride for `memref` under its declared layout.
    ///
    /// The result always has one entry per dimension of the shape.
    ///
    /// # Errors
    ///
    /// [`TargetError::InvalidShape`] for a shape the layout cannot describe,
    /// [`TargetError::StrideOverflow`] when a stride does not fit in `u64`.
    pub fn stride(&self, memref: &MemRef) -> Result<Vec<u64>> {
        let overflow = || TargetError::StrideOverflow {
            layout: memref.layout,
            shape: memref.shape.clone(),
        };
        let eu = self.eu_num(memref.dtype);
        let stride = match memref.layout {
            Layout::Continuous => {
                return checked_contiguous_stride(&memref.shape).ok_or_else(overflow);
            }
            Layout::Stride => {
                if memref.stride.len() != memref.shape.len() {
                    return Err(TargetError::InvalidShape {
                        layout: Layout::Stride,
                        expected: memref.shape.len(),
                        actual: memref.stride.len(),
                    });
                }
                return Ok(memref.stride.clone());
            }
            Layout::AlignEu => {
                let [_, c, h, w] = nchw(memref)?;
                let c_stride = h
                    .checked_mul(w)
                    .and_then(|hw| align_up(hw, eu))
                    .ok_or_else(overflow)?;
                let n_stride = self.n_stride(memref, c, c_stride).ok_or_else(overflow)?;
                [n_stride, c_stride, w, 1]
            }
            Layout::Compact => {
                let [_, c, h, w] = nchw(memref)?;
                let c_stride = h.checked_mul(w).ok_or_else(overflow)?;
                let n_stride = self.n_stride(memref, c, c_stride).ok_or_else(overflow)?;
                [n_stride, c_stride, w, 1]
            }
            Layout::Offset => {
                nchw(memref)?;
                [0, 1, 0, 0]
            }
            Layout::T3 => {
                let [_, c, h, w] = nchw(memref)?;
                let h_stride = align_up(w, eu).ok_or_else(overflow)?;
                let c_stride = h.checked_mul(h_stride).ok_or_else(overflow)?;
                let n_stride = self.n_stride(memref, c, c_stride).ok_or_else(overflow)?;
                [n_stride, c_stride, h_stride, 1]
            }
            Layout::T4 => {
                let [_, _, _, w] = nchw(memref)?;
                [0, 0, align_up(w, eu).ok_or_else(overflow)?, 1]
            }
            Layout::T5 => {
                let [_, _, _, w] = nchw(memref)?;
                let n_stride = self.lane_bytes * 8 / memref.dtype.bits();
                [n_stride, align_up(w, eu).ok_or_else(overflow)?, w, 1]
            }
        };
        Ok(stride.to_vec())
    }

    /// Batch stride: the lane rounds `c` channels need from the memref's
    /// starting lane, times the per-channel stride.
    fn n_stride(&self, memref: &MemRef, c: u64, c_stride: u64) -> Option<u64> {
        let rounds = c
            .checked_add(self.npu_offset(memref.address))?
            .div_ceil(self.npu_num);
        rounds.checked_mul(c_stride)
    }
}

fn nchw(memref: &MemRef) -> Result<[u64; 4]> {
    match memref.shape.as_slice() {
        [n, c, h, w] => Ok([*n, *c, *h, *w]),
        other => Err(TargetError::InvalidShape {
            layout: memref.layout,
            expected: 4,
            actual: other.len(),
        }),
    }
}

fn align_up(value: u64, align: u64) -> Option<u64> {
    value.div_ceil(align).checked_mul(align)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> LocalGeometry {
        LocalGeometry {
            npu_num: 64,
            align_eu_base: 64,
            lane_bytes: 256 * 1024,
            local_base: 0x0800_0000,
        }
    }

    #[test]
    fn names_parse_back() {
        for dtype in DType::ALL {
            assert_eq!(dtype.name().parse::<DType>().unwrap(), dtype);
        }
        for layout in Layout::ALL {
            assert_eq!(layout.to_string().parse::<Layout>().unwrap(), layout);
        }
        assert!("AlignEu".parse::<Layout>().is_err());
        assert!("float".parse::<DType>().is_err());
    }

    #[test]
    fn contiguous_three_dims() {
        assert_eq!(contiguous_stride(&[2, 3, 4]), vec![12, 4, 1]);
    }

    #[test]
    fn contiguous_one_dim() {
        assert_eq!(contiguous_stride(&[5]), vec![1]);
    }

    #[test]
    fn contiguous_zero_dims() {
        assert!(contiguous_stride(&[]).is_empty());
    }

    #[test]
    fn contiguous_with_zero_sized_dim() {
        assert_eq!(contiguous_stride(&[3, 0, 2]), vec![0, 2, 1]);
    }

    #[test]
    fn memref_new_computes_contiguous_stride() {
        let m = MemRef::new(0, vec![1, 2, 3, 4], DType::F32, Layout::Continuous);
        assert_eq!(m.stride, vec![24, 12, 4, 1]);
    }

    #[test]
    fn align_eu_stride() {
        let g = geometry();
        // f32: 16 elements per EU row, h*w = 15 aligns to 16
        let m = MemRef::new(0x0800_0000, vec![2, 70, 3, 5], DType::F32, Layout::AlignEu);
        // 70 channels over 64 lanes -> 2 lane rounds
        assert_eq!(g.stride(&m).unwrap(), vec![32, 16, 5, 1]);
    }

    #[test]
    fn compact_stride_with_lane_offset() {
        let g = geometry();
        // start on lane 63: 2 channels straddle the lane wrap
        let addr = 0x0800_0000 + 63 * 256 * 1024;
        let m = MemRef::new(addr, vec![1, 2, 4, 4], DType::Int8, Layout::Compact);
        assert_eq!(g.stride(&m).unwrap(), vec![32, 16, 4, 1]);
    }

    #[test]
    fn fixed_layouts() {
        let g = geometry();
        let offset = MemRef::new(0x0800_0000, vec![1, 64, 1, 1], DType::F32, Layout::Offset);
        assert_eq!(g.stride(&offset).unwrap(), vec![0, 1, 0, 0]);
        let t4 = MemRef::new(0x0800_0000, vec![1, 1, 1, 20], DType::F32, Layout::T4);
        assert_eq!(g.stride(&t4).unwrap(), vec![0, 0, 32, 1]);
    }

    #[test]
    fn t3_and_t5() {
        let g = geometry();
        let t3 = MemRef::new(0x0800_0000, vec![1, 8, 3, 20], DType::F16, Layout::T3);
        // f16: 32 per EU row -> h_stride 32, c_stride 96
        assert_eq!(g.stride(&t3).unwrap(), vec![96, 96, 32, 1]);
        let t5 = MemRef::new(0x0800_0000, vec![1, 1, 1, 20], DType::F32, Layout::T5);
        assert_eq!(g.stride(&t5).unwrap(), vec![65536, 32, 20, 1]);
    }

    #[test]
    fn int4_packs_two_per_byte() {
        let g = geometry();
        assert_eq!(g.eu_num(DType::Int4), 128);
        assert_eq!(g.eu_num(DType::Int8), 64);
    }

    #[test]
    fn local_layout_requires_four_dims() {
        let g = geometry();
        let m = MemRef::new(0x0800_0000, vec![4, 4], DType::F32, Layout::AlignEu);
        let err = g.stride(&m).unwrap_err();
        assert!(matches!(err, TargetError::InvalidShape { expected: 4, actual: 2, .. }));
    }

    #[test]
    fn explicit_stride_is_returned_as_is() {
        let g = geometry();
        let m = MemRef::new(0x1_0000_0000, vec![2, 2], DType::F32, Layout::Stride)
            .with_stride(vec![8, 2]);
        assert_eq!(g.stride(&m).unwrap(), vec![8, 2]);
        let bad = m.clone().with_stride(vec![1]);
        assert!(g.stride(&bad).is_err());
    }

    #[test]
    fn huge_shapes_overflow_instead_of_wrapping() {
        let g = geometry();
        let shape = vec![1, 1, 1 << 32, 1 << 32];
        for layout in [Layout::AlignEu, Layout::Compact, Layout::T3] {
            let m = MemRef::new(0x0800_0000, shape.clone(), DType::F32, layout);
            assert!(
                matches!(g.stride(&m), Err(TargetError::StrideOverflow { .. })),
                "{layout}"
            );
        }
        let t4 = MemRef::new(0x0800_0000, vec![1, 1, 1, u64::MAX], DType::F32, Layout::T4);
        assert!(matches!(g.stride(&t4), Err(TargetError::StrideOverflow { .. })));

        // channel count past the starting lane
        let lane1 = 0x0800_0000 + 256 * 1024;
        let m = MemRef::new(lane1, vec![1, u64::MAX, 1, 16], DType::F32, Layout::AlignEu);
        assert!(matches!(g.stride(&m), Err(TargetError::StrideOverflow { .. })));
    }

    #[test]
    fn checked_contiguous_overflow() {
        let shape = [2, 1 << 32, 1 << 32];
        assert_eq!(checked_contiguous_stride(&shape), None);
        assert_eq!(contiguous_stride(&shape), vec![u64::MAX, 1 << 32, 1]);
        // the outermost size never enters a stride
        assert_eq!(checked_contiguous_stride(&[u64::MAX, 4]), Some(vec![4, 1]));

        let g = geometry();
        let m = MemRef::new(0x1_0000_0000, shape.to_vec(), DType::F32, Layout::Continuous);
        assert!(matches!(g.stride(&m), Err(TargetError::StrideOverflow { .. })));
    }

    #[test]
    fn continuous_any_rank() {
        let g = geometry();
        let m = MemRef::new(0x1_0000_0000, vec![3, 5], DType::F32, Layout::Continuous);
        assert_eq!(g.stride(&m).unwrap(), vec![5, 1]);
    }
}
