use super::backend::CpuBackend;
use super::math::DTypeOps;
use crate::backend::{Convolution, Window2d};
use crate::tensor::{Dim2, Dims, ITensor, Tensor2};

/// Yields `(out_row, patch_offset, input_offset)` for every element covered by every window
/// of a single sample, in im2col order.
fn window_offsets(window: &Window2d) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
    let (oh, ow) = window.output_size().unwrap_or((0, 0));
    let (kh, kw) = window.kernel;
    let (sh, sw) = window.stride;
    let w = window.input.width();
    let c = window.input.channels();
    (0..oh).flat_map(move |oy| {
        (0..ow).flat_map(move |ox| {
            (0..kh).flat_map(move |ky| {
                (0..kw).flat_map(move |kx| {
                    (0..c).map(move |ch| {
                        let out_row = oy * ow + ox;
                        let patch = (ky * kw + kx) * c + ch;
                        let src = ((oy * sh + ky) * w + ox * sw + kx) * c + ch;
                        (out_row, patch, src)
                    })
                })
            })
        })
    })
}

fn windows_per_sample(window: &Window2d) -> usize {
    window.output_size().map_or(0, |(oh, ow)| oh * ow)
}

impl<DT: DTypeOps> Convolution for CpuBackend<DT> {
    fn im2col(&self, input: &Tensor2<DT>, window: &Window2d, cols: &mut Tensor2<DT>) {
        let samples = input.dims().rows();
        let windows = windows_per_sample(window);
        let patch_len = window.patch_len();
        assert_eq!(input.dims().cols(), window.input.tensor_len());
        assert_eq!(cols.dims(), &Dim2(samples * windows, patch_len));
        let sample_len = window.input.tensor_len();
        let input = input.as_ref();
        let cols = cols.as_mut();
        for n in 0..samples {
            let src = &input[n * sample_len..(n + 1) * sample_len];
            let dst = &mut cols[n * windows * patch_len..(n + 1) * windows * patch_len];
            for (row, patch, offset) in window_offsets(window) {
                dst[row * patch_len + patch] = src[offset];
            }
        }
    }

    fn col2im(&self, cols: &Tensor2<DT>, window: &Window2d, result: &mut Tensor2<DT>) {
        let samples = result.dims().rows();
        let windows = windows_per_sample(window);
        let patch_len = window.patch_len();
        assert_eq!(result.dims().cols(), window.input.tensor_len());
        assert_eq!(cols.dims(), &Dim2(samples * windows, patch_len));
        let sample_len = window.input.tensor_len();
        let cols = cols.as_ref();
        let result = result.as_mut();
        result.fill(DT::ZERO);
        for n in 0..samples {
            let src = &cols[n * windows * patch_len..(n + 1) * windows * patch_len];
            let dst = &mut result[n * sample_len..(n + 1) * sample_len];
            for (row, patch, offset) in window_offsets(window) {
                dst[offset] += src[row * patch_len + patch];
            }
        }
    }

    fn max_pool(&self, input: &Tensor2<DT>, window: &Window2d, output: &mut Tensor2<DT>) {
        let samples = input.dims().rows();
        let windows = windows_per_sample(window);
        let c = window.input.channels();
        assert_eq!(input.dims().cols(), window.input.tensor_len());
        assert_eq!(output.dims(), &Dim2(samples, windows * c));
        let sample_len = window.input.tensor_len();
        let input = input.as_ref();
        let output = output.as_mut();
        output.fill(DT::neg_infinity());
        for n in 0..samples {
            let src = &input[n * sample_len..(n + 1) * sample_len];
            let dst = &mut output[n * windows * c..(n + 1) * windows * c];
            for (row, patch, offset) in window_offsets(window) {
                let o = &mut dst[row * c + patch % c];
                if src[offset] > *o {
                    *o = src[offset];
                }
            }
        }
    }

    fn max_pool_error(
        &self,
        input: &Tensor2<DT>,
        output: &Tensor2<DT>,
        out_error: &Tensor2<DT>,
        window: &Window2d,
        result: &mut Tensor2<DT>,
    ) {
        let samples = input.dims().rows();
        let windows = windows_per_sample(window);
        let c = window.input.channels();
        assert_eq!(input.dims(), result.dims());
        assert_eq!(output.dims(), &Dim2(samples, windows * c));
        assert_eq!(output.dims(), out_error.dims());
        let sample_len = window.input.tensor_len();
        let out_len = windows * c;
        let (input, output, out_error) = (input.as_ref(), output.as_ref(), out_error.as_ref());
        let result = result.as_mut();
        result.fill(DT::ZERO);
        let mut routed = vec![false; out_len];
        for n in 0..samples {
            let src = &input[n * sample_len..(n + 1) * sample_len];
            let out = &output[n * out_len..(n + 1) * out_len];
            let err = &out_error[n * out_len..(n + 1) * out_len];
            let dst = &mut result[n * sample_len..(n + 1) * sample_len];
            routed.fill(false);
            for (row, patch, offset) in window_offsets(window) {
                let o = row * c + patch % c;
                if !routed[o] && src[offset] == out[o] {
                    routed[o] = true;
                    dst[offset] += err[o];
                }
            }
        }
    }
}
