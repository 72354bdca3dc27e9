use digitnet::activation::ActivationFn;
use digitnet::backend::Backend;
use digitnet::net::initializer::RandomNetInitializer;
use digitnet::net::layer::{
    Conv2dLayerParams, DenseLayerParams, DropoutLayerParams, FlattenLayerParams, MaxPool2dLayerParams,
};
use digitnet::net::{Net, NetBuilder};
use digitnet::tensor::Dim3;

pub const INPUT_SHAPE: Dim3 = Dim3(28, 28, 1);

/// The two-convolution MNIST classifier, initialized from `seed`.
pub fn build_classifier<B: Backend>(backend: B, num_classes: usize, seed: u64) -> Result<Net<B>, digitnet::Error> {
    NetBuilder::new(backend, INPUT_SHAPE)
        .with_initializer(RandomNetInitializer::seed_from_u64(seed))
        .with_layer(Conv2dLayerParams::square(32, 3, ActivationFn::RELU))
        .with_layer(Conv2dLayerParams::square(64, 3, ActivationFn::RELU))
        .with_layer(MaxPool2dLayerParams { pool: (2, 2), stride: None })
        .with_layer(DropoutLayerParams { rate: 0.25 })
        .with_layer(FlattenLayerParams)
        .with_layer(DenseLayerParams {
            size: 128,
            activation_fn: ActivationFn::RELU,
        })
        .with_layer(DropoutLayerParams { rate: 0.5 })
        .with_layer(DenseLayerParams {
            size: num_classes,
            activation_fn: ActivationFn::Softmax,
        })
        .build()
}
