use crate::error::{Error, Result};
use digitnet::net::train::LabeledData;
use digitnet::tensor::{Dim2, Dim4, Tensor2, Tensor4};
use mnist::{Mnist, MnistBuilder};
use std::path::Path;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const TRAIN_SAMPLES: usize = 60_000;
pub const TEST_SAMPLES: usize = 10_000;

const IDX_FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

/// Undecoded pixels and digit labels, one byte each.
#[derive(Clone, Debug)]
pub struct RawSplit {
    pub images: Vec<u8>,
    pub labels: Vec<u8>,
    pub count: usize,
}

impl RawSplit {
    pub fn new(images: Vec<u8>, labels: Vec<u8>, rows: usize, cols: usize) -> Result<Self> {
        let count = labels.len();
        if images.len() != count * rows * cols {
            return Err(digitnet::Error::MismatchedSampleCount {
                images: images.len() / (rows * cols).max(1),
                labels: count,
            }
            .into());
        }
        Ok(RawSplit { images, labels, count })
    }
}

#[derive(Clone, Debug)]
pub struct MnistData {
    pub train: RawSplit,
    pub test: RawSplit,
    pub rows: usize,
    pub cols: usize,
}

pub fn load_mnist(dir: &Path) -> Result<MnistData> {
    let mut builder = MnistBuilder::new();
    #[cfg(feature = "download")]
    builder.download_and_extract();
    if !cfg!(feature = "download") && IDX_FILES.iter().any(|file| !dir.join(file).is_file()) {
        return Err(Error::DatasetMissing(dir.to_path_buf()));
    }

    let base_path = dir.to_string_lossy();
    let Mnist {
        trn_img,
        trn_lbl,
        tst_img,
        tst_lbl,
        ..
    } = builder
        .base_path(&base_path)
        .label_format_digit()
        .training_set_length(TRAIN_SAMPLES as u32)
        .validation_set_length(0)
        .test_set_length(TEST_SAMPLES as u32)
        .finalize();
    log::debug!("loaded {} train and {} test samples from {}", trn_lbl.len(), tst_lbl.len(), dir.display());

    Ok(MnistData {
        train: RawSplit::new(trn_img, trn_lbl, IMAGE_ROWS, IMAGE_COLS)?,
        test: RawSplit::new(tst_img, tst_lbl, IMAGE_ROWS, IMAGE_COLS)?,
        rows: IMAGE_ROWS,
        cols: IMAGE_COLS,
    })
}

/// Scales pixels into `[0, 1]` and lays them out as `(n, rows, cols, 1)`.
pub fn preprocess_images(raw: &[u8], rows: usize, cols: usize) -> Tensor4<f32> {
    let count = raw.len() / (rows * cols).max(1);
    let data = raw[..count * rows * cols].iter().map(|&p| p as f32 / 255.0).collect();
    Tensor4::from_vec(data, Dim4(count, rows, cols, 1))
}

/// One-hot encodes digit labels.
pub fn to_categorical(labels: &[u8], num_classes: usize) -> Result<Tensor2<f32>> {
    let mut encoded = Tensor2::zeroed(Dim2(labels.len(), num_classes));
    let rows = encoded.as_mut();
    for (i, &label) in labels.iter().enumerate() {
        if label as usize >= num_classes {
            return Err(Error::LabelOutOfRange { label, num_classes });
        }
        rows[i * num_classes + label as usize] = 1.0;
    }
    Ok(encoded)
}

/// Train and test sets ready for fitting.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub train: LabeledData<f32>,
    pub test: LabeledData<f32>,
}

impl Preprocessed {
    pub fn from_raw(data: &MnistData, num_classes: usize) -> Result<Self> {
        Ok(Preprocessed {
            train: prepare_split("train", &data.train, data.rows, data.cols, num_classes)?,
            test: prepare_split("test", &data.test, data.rows, data.cols, num_classes)?,
        })
    }
}

fn prepare_split(name: &str, split: &RawSplit, rows: usize, cols: usize, num_classes: usize) -> Result<LabeledData<f32>> {
    let pixels = rows * cols;
    let keep: Vec<usize> = (0..split.count)
        .filter(|&i| (split.labels[i] as usize) < num_classes)
        .collect();
    let dropped = split.count - keep.len();
    if dropped > 0 {
        log::warn!("dropping {dropped} {name} samples labelled outside 0..{num_classes}");
        let images: Vec<u8> = keep
            .iter()
            .flat_map(|&i| split.images[i * pixels..(i + 1) * pixels].iter().copied())
            .collect();
        let labels: Vec<u8> = keep.iter().map(|&i| split.labels[i]).collect();
        return encode(&images, &labels, rows, cols, num_classes);
    }
    encode(&split.images, &split.labels, rows, cols, num_classes)
}

fn encode(images: &[u8], labels: &[u8], rows: usize, cols: usize, num_classes: usize) -> Result<LabeledData<f32>> {
    let images = preprocess_images(images, rows, cols);
    let labels = to_categorical(labels, num_classes)?;
    Ok(LabeledData::new(images, labels)?)
}
