use crate::activation::ActivationFn;
use crate::backend::{Backend, Window2d};
use crate::dtype::DType;
use crate::error::Error;
use crate::net::initializer::NetInitializer;
use crate::net::layer::{geometry_error, ConcreteLayerParams, Layer, LayerParams, LayerType};
use crate::net::param::Param;
use crate::net::Mode;
use crate::optimizer::Optimizer;
use crate::tensor::{Dim1, Dim2, Dim3, ITensor};
use std::fmt::{Debug, Formatter};

/// 2-D convolution with valid padding over NHWC samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dLayerParams {
    pub filters: usize,
    pub kernel: (usize, usize),
    pub stride: (usize, usize),
    pub activation_fn: ActivationFn,
}

impl Conv2dLayerParams {
    /// Unit stride, `kernel × kernel` window.
    pub fn square(filters: usize, kernel: usize, activation_fn: ActivationFn) -> Self {
        Conv2dLayerParams {
            filters,
            kernel: (kernel, kernel),
            stride: (1, 1),
            activation_fn,
        }
    }
}

impl<B: Backend> LayerParams<B> for Conv2dLayerParams {
    type Layer = Conv2dLayer<B>;

    fn create_layer(
        &self,
        backend: &B,
        layer_idx: usize,
        input_shape: Dim3,
        initializer: &mut dyn NetInitializer<B::Float>,
    ) -> Result<Self::Layer, Error> {
        if self.filters == 0 || input_shape.channels() == 0 {
            return Err(geometry_error(layer_idx, LayerType::Conv2d, input_shape, "no filters or channels"));
        }
        let window = Window2d {
            input: input_shape,
            kernel: self.kernel,
            stride: self.stride,
        };
        let (out_h, out_w) = window.output_size().ok_or_else(|| {
            geometry_error(
                layer_idx,
                LayerType::Conv2d,
                input_shape,
                format!("kernel {:?} with stride {:?} does not fit", self.kernel, self.stride),
            )
        })?;
        let patch_len = window.patch_len();
        let receptive = self.kernel.0 * self.kernel.1;
        let kernel = initializer.get_weights(
            LayerType::Conv2d,
            Dim2(patch_len, self.filters),
            layer_idx,
            patch_len,
            receptive * self.filters,
        );
        let biases = initializer.get_biases(LayerType::Conv2d, Dim1(self.filters), layer_idx);
        let rows = Dim2(0, self.filters);
        Ok(Conv2dLayer {
            window,
            output_shape: Dim3(out_h, out_w, self.filters),
            kernel: Param::new(backend, kernel),
            biases: Param::new(backend, biases),
            activation_fn: self.activation_fn,
            cols: backend.new_tensor_exact(Dim2(0, patch_len)),
            col_error: backend.new_tensor_exact(Dim2(0, patch_len)),
            activation: backend.new_tensor_exact(rows),
            activation_out: backend.new_tensor_exact(rows),
            activation_out_error: backend.new_tensor_exact(rows),
            activation_error: backend.new_tensor_exact(rows),
        })
    }
}

impl From<Conv2dLayerParams> for ConcreteLayerParams {
    fn from(params: Conv2dLayerParams) -> Self {
        ConcreteLayerParams::Conv2d(params)
    }
}

/// Runs as im2col followed by one gemm against the `(patch, filters)` kernel matrix. The
/// per-window buffers hold one row per output pixel.
pub struct Conv2dLayer<B: Backend> {
    window: Window2d,
    output_shape: Dim3,
    kernel: Param<B, Dim2>,
    biases: Param<B, Dim1>,
    activation_fn: ActivationFn,
    cols: B::Tensor<Dim2>,
    col_error: B::Tensor<Dim2>,
    activation: B::Tensor<Dim2>,
    activation_out: B::Tensor<Dim2>,
    activation_out_error: B::Tensor<Dim2>,
    activation_error: B::Tensor<Dim2>,
}

impl<B: Backend> Conv2dLayer<B> {
    #[inline]
    fn pixel_rows(&self, samples: usize) -> usize {
        samples * self.output_shape.height() * self.output_shape.width()
    }

    #[inline]
    pub fn kernel(&self) -> &Param<B, Dim2> {
        &self.kernel
    }
}

impl<B: Backend> Layer<B> for Conv2dLayer<B> {
    fn forward(&mut self, backend: &B, _mode: Mode, input: &B::Tensor<Dim2>, output: &mut B::Tensor<Dim2>) {
        let samples = input.dims().rows();
        assert_eq!(input.dims(), &Dim2(samples, self.input_size()), "Invalid dimensions for input tensor");
        assert_eq!(output.dims(), &Dim2(samples, self.output_size()), "Invalid dimensions for output tensor");
        let pixels = self.pixel_rows(samples);

        backend.resize_tensor_major(&mut self.cols, pixels);
        backend.im2col(input, &self.window, &mut self.cols);
        backend.resize_tensor_major(&mut self.activation, pixels);
        backend.matmul(
            B::Float::ONE,
            &self.cols,
            false,
            self.kernel.value(),
            false,
            B::Float::ZERO,
            &mut self.activation,
        );
        backend.add_row(self.biases.value(), &mut self.activation);
        backend.resize_tensor_major(&mut self.activation_out, pixels);
        self.activation_fn
            .compute(backend, &self.activation, &mut self.activation_out);
        backend.copy_reshaped(&self.activation_out, output);
    }

    fn backprop(
        &mut self,
        backend: &B,
        input: &B::Tensor<Dim2>,
        output: &B::Tensor<Dim2>,
        input_error: Option<&mut B::Tensor<Dim2>>,
        out_error: &B::Tensor<Dim2>,
    ) {
        let samples = input.dims().rows();
        assert_eq!(out_error.dims(), output.dims(), "Invalid dimensions for out_error tensor");
        let pixels = self.pixel_rows(samples);

        backend.resize_tensor_major(&mut self.activation_out_error, pixels);
        backend.copy_reshaped(out_error, &mut self.activation_out_error);
        backend.resize_tensor_major(&mut self.activation_error, pixels);
        self.activation_fn.compute_error(
            backend,
            &self.activation,
            &self.activation_out,
            &self.activation_out_error,
            &mut self.activation_error,
        );

        backend.matmul(
            B::Float::ONE,
            &self.cols,
            true,
            &self.activation_error,
            false,
            B::Float::ZERO,
            self.kernel.grad_mut(),
        );
        backend.column_sum(B::Float::ONE, &self.activation_error, B::Float::ZERO, self.biases.grad_mut());

        if let Some(input_error) = input_error {
            assert_eq!(input_error.dims(), input.dims());
            backend.resize_tensor_major(&mut self.col_error, pixels);
            backend.matmul(
                B::Float::ONE,
                &self.activation_error,
                false,
                self.kernel.value(),
                true,
                B::Float::ZERO,
                &mut self.col_error,
            );
            backend.col2im(&self.col_error, &self.window, input_error);
        }
    }

    fn update(&mut self, backend: &B, optimizer: &Optimizer) {
        optimizer.apply(backend, &mut self.kernel);
        optimizer.apply(backend, &mut self.biases);
    }

    #[inline]
    fn layer_type(&self) -> LayerType {
        LayerType::Conv2d
    }

    #[inline]
    fn input_shape(&self) -> Dim3 {
        self.window.input
    }

    #[inline]
    fn output_shape(&self) -> Dim3 {
        self.output_shape
    }

    fn param_count(&self) -> usize {
        self.kernel.len() + self.biases.len()
    }
}

impl<B: Backend> Debug for Conv2dLayer<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conv2dLayer")
            .field("window", &self.window)
            .field("filters", &self.output_shape.channels())
            .field("activation_fn", &self.activation_fn)
            .field("kernel", &self.kernel)
            .finish_non_exhaustive()
    }
}
