//! Addressing for rectangular transfers.
//!
//! `region[0]`, `origin[0]` and both pitches are byte counts; `region[1..]`
//! and `origin[1..]` count rows and slices, matching the native rect calls.

use crate::error::{Error, Result};

pub type Triple = [usize; 3];

/// Pads `region` to three components. Zero components become 1.
pub fn normalize_region(region: &[usize]) -> Result<Triple> {
    if region.len() > 3 {
        return Err(Error::invalid(format!(
            "Invalid region size: {} dimensions given, at most 3 allowed.",
            region.len()
        )));
    }
    let mut out = [1usize; 3];
    for (o, &r) in out.iter_mut().zip(region) {
        *o = r.max(1);
    }
    Ok(out)
}

/// Pads an origin to three components with zeros.
pub fn normalize_origin(origin: &[usize], name: &str) -> Result<Triple> {
    if origin.len() > 3 {
        return Err(Error::invalid(format!(
            "Invalid {name}: {} dimensions given, at most 3 allowed.",
            origin.len()
        )));
    }
    let mut out = [0usize; 3];
    out[..origin.len()].copy_from_slice(origin);
    Ok(out)
}

/// One side (host or device) of a rectangular transfer, fully resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RectSide {
    pub origin: Triple,
    pub row_pitch: usize,
    pub slice_pitch: usize,
}

impl RectSide {
    /// Zero pitches are derived: `row = region.x`, `slice = region.y * row`.
    pub fn new(
        region: &Triple,
        origin: &[usize],
        row_pitch: usize,
        slice_pitch: usize,
        name: &str,
    ) -> Result<Self> {
        let origin = normalize_origin(origin, name)?;
        let row_pitch = if row_pitch == 0 { region[0] } else { row_pitch };
        let slice_pitch = if slice_pitch == 0 {
            region[1]
                .checked_mul(row_pitch)
                .ok_or_else(|| Error::invalid("slice pitch overflows."))?
        } else {
            slice_pitch
        };
        Ok(Self {
            origin,
            row_pitch,
            slice_pitch,
        })
    }

    /// Byte position of the last element touched, or `None` on overflow or
    /// an empty region.
    pub fn last_byte(&self, region: &Triple) -> Option<usize> {
        let z = self.origin[2].checked_add(region[2].checked_sub(1)?)?;
        let y = self.origin[1].checked_add(region[1].checked_sub(1)?)?;
        let x = self.origin[0].checked_add(region[0].checked_sub(1)?)?;
        z.checked_mul(self.slice_pitch)?
            .checked_add(y.checked_mul(self.row_pitch)?)?
            .checked_add(x)
    }

    /// Rejects the transfer unless the last byte lies inside `capacity`.
    pub fn check(&self, region: &Triple, capacity: usize, too_small: &str) -> Result<()> {
        match self.last_byte(region) {
            Some(pos_max) if pos_max < capacity => Ok(()),
            _ => Err(Error::invalid(too_small)),
        }
    }
}

#[cfg(test)]
fn gather(src: &[f32], src_side: &RectSide, dst: &mut [f32], dst_side: &RectSide, region: &Triple) {
    // host-side model of the native rect copy, in f32 units
    let v = std::mem::size_of::<f32>();
    for z in 0..region[2] {
        for y in 0..region[1] {
            for x in (0..region[0]).step_by(v) {
                let s = (src_side.origin[2] + z) * src_side.slice_pitch
                    + (src_side.origin[1] + y) * src_side.row_pitch
                    + src_side.origin[0]
                    + x;
                let d = (dst_side.origin[2] + z) * dst_side.slice_pitch
                    + (dst_side.origin[1] + y) * dst_side.row_pitch
                    + dst_side.origin[0]
                    + x;
                dst[d / v] = src[s / v];
            }
        }
    }
}

#[test]
fn zero_region_components_become_one() {
    assert_eq!(normalize_region(&[0, 0, 0]).unwrap(), [1, 1, 1]);
    assert_eq!(normalize_region(&[8]).unwrap(), [8, 1, 1]);
    assert_eq!(normalize_region(&[]).unwrap(), [1, 1, 1]);
    assert_eq!(
        normalize_region(&[4, 0, 2]).unwrap(),
        normalize_region(&[4, 1, 2]).unwrap()
    );
    assert!(normalize_region(&[1, 1, 1, 1]).unwrap_err().is_invalid_argument());
}

#[test]
fn origins_are_zero_padded() {
    assert_eq!(normalize_origin(&[4, 1], "buffer_origin").unwrap(), [4, 1, 0]);
    assert_eq!(normalize_origin(&[], "host_origin").unwrap(), [0, 0, 0]);
    assert!(normalize_origin(&[0, 0, 0, 0], "host_origin").is_err());
}

#[test]
fn zero_pitch_is_derived() {
    let region = [8, 2, 2];
    let derived = RectSide::new(&region, &[], 0, 0, "host_origin").unwrap();
    assert_eq!(derived.row_pitch, 8);
    assert_eq!(derived.slice_pitch, 16);
    let explicit = RectSide::new(&region, &[], 8, 16, "host_origin").unwrap();
    assert_eq!(derived, explicit);
    let row_only = RectSide::new(&region, &[], 12, 0, "host_origin").unwrap();
    assert_eq!(row_only.slice_pitch, 24);
}

#[test]
fn bounds_check_is_strict() {
    let region = [4, 1, 1];
    let side = RectSide::new(&region, &[12], 0, 0, "buffer_origin").unwrap();
    assert_eq!(side.last_byte(&region), Some(15));
    assert!(side.check(&region, 16, "buffer is too small.").is_ok());
    let err = side.check(&region, 15, "buffer is too small.").unwrap_err();
    assert_eq!(err.to_string(), "invalid argument: buffer is too small.");
}

#[test]
fn overflowing_positions_are_rejected() {
    let region = [usize::MAX, 2, 1];
    let side = RectSide::new(&region, &[], 0, 0, "buffer_origin");
    assert!(side.is_err());
    let region = [1, 1, 1];
    let side = RectSide::new(&region, &[0, 0, usize::MAX], 4, 4, "buffer_origin").unwrap();
    assert_eq!(side.last_byte(&region), None);
    assert!(side.check(&region, usize::MAX, "buffer is too small.").is_err());
}

#[test]
fn octant_of_a_cube() {
    let v = std::mem::size_of::<f32>();
    #[rustfmt::skip]
    let cube: Vec<f32> = vec![
        99., 99., 99.,  99., 99., 99.,  99., 99., 99.,
        99., 99., 99.,  99., 1., 2.,    99., 3., 4.,
        99., 99., 99.,  99., 5., 6.,    99., 7., 8.,
    ];
    let region = normalize_region(&[2 * v, 2, 2]).unwrap();
    let src = RectSide::new(&region, &[v, 1, 1], 3 * v, 9 * v, "src_origin").unwrap();
    let dst = RectSide::new(&region, &[], 2 * v, 4 * v, "dst_origin").unwrap();
    src.check(&region, cube.len() * v, "Source buffer is too small.").unwrap();
    dst.check(&region, 8 * v, "destination buffer is too small.").unwrap();
    assert!(dst.check(&region, 7 * v, "destination buffer is too small.").is_err());

    let mut out = vec![0f32; 8];
    gather(&cube, &src, &mut out, &dst, &region);
    assert_eq!(out, vec![1., 2., 3., 4., 5., 6., 7., 8.]);
}
