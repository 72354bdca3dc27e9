use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] mongodb::bson::ser::Error),
    #[error(transparent)]
    Net(#[from] digitnet::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unknown configuration key `{0}`")]
    UnknownConfigKey(String),
    #[error("MNIST IDX files not found in {}", .0.display())]
    DatasetMissing(PathBuf),
    #[error("label {label} is outside 0..{num_classes}")]
    LabelOutOfRange { label: u8, num_classes: usize },
    #[error("invalid MongoDB address `{0}`, expected host:port:db_name or db_name")]
    InvalidMongoUrl(String),
    #[error("cannot format timestamp: {0}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, Error>;
