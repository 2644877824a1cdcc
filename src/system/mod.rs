pub mod opener;

pub use opener::{LinkOpener, RecordingOpener, SystemOpener};
