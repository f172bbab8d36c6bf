//! 2D resampling kernels.
//!
//! Both follow the PyTorch conventions used at training time: `area` is
//! adaptive average pooling, `bilinear` uses half-pixel centers
//! (`align_corners = false`).

use ndarray::{Array2, ArrayView2, Axis};

/// Input range `[start, end)` pooled into each output cell.
fn adaptive_windows(in_len: usize, out_len: usize) -> Vec<(usize, usize)> {
    (0..out_len)
        .map(|o| {
            let start = (o * in_len) / out_len;
            let end = ((o + 1) * in_len + out_len - 1) / out_len;
            (start, end.max(start + 1))
        })
        .collect()
}

/// Area (adaptive average pooling) resize to `(out_h, out_w)`.
pub fn area_resize(src: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    let rows = adaptive_windows(in_h, out_h);
    let cols = adaptive_windows(in_w, out_w);

    // Box windows are separable: pool columns first, then rows.
    let mut horizontal = Array2::<f64>::zeros((in_h, out_w));
    for (y, src_row) in src.axis_iter(Axis(0)).enumerate() {
        for (x, &(start, end)) in cols.iter().enumerate() {
            let sum: f64 = src_row
                .slice(ndarray::s![start..end])
                .iter()
                .map(|v| *v as f64)
                .sum();
            horizontal[[y, x]] = sum / (end - start) as f64;
        }
    }

    let mut out = Array2::<f32>::zeros((out_h, out_w));
    for (y, &(start, end)) in rows.iter().enumerate() {
        for x in 0..out_w {
            let sum: f64 = (start..end).map(|r| horizontal[[r, x]]).sum();
            out[[y, x]] = (sum / (end - start) as f64) as f32;
        }
    }
    out
}

/// Source coordinate and blend weight along one axis.
fn linear_taps(in_len: usize, out_len: usize) -> Vec<(usize, usize, f32)> {
    let scale = in_len as f32 / out_len as f32;
    (0..out_len)
        .map(|o| {
            let src = (scale * (o as f32 + 0.5) - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(in_len - 1);
            let i1 = if i0 < in_len - 1 { i0 + 1 } else { i0 };
            (i0, i1, src - i0 as f32)
        })
        .collect()
}

/// Bilinear resize to `(out_h, out_w)` with `align_corners = false`.
pub fn bilinear_resize(src: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    let rows = linear_taps(in_h, out_h);
    let cols = linear_taps(in_w, out_w);

    let mut out = Array2::<f32>::zeros((out_h, out_w));
    for (y, &(y0, y1, ly)) in rows.iter().enumerate() {
        for (x, &(x0, x1, lx)) in cols.iter().enumerate() {
            let top = src[[y0, x0]] * (1.0 - lx) + src[[y0, x1]] * lx;
            let bottom = src[[y1, x0]] * (1.0 - lx) + src[[y1, x1]] * lx;
            out[[y, x]] = top * (1.0 - ly) + bottom * ly;
        }
    }
    out
}
