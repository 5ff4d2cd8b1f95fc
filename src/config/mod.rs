pub mod settings;

pub use settings::{NetworkSettings, ProgressSettings, Settings, StorageSettings, TransferSettings};
