pub mod camera;
pub mod file;

pub use camera::{CameraDevice, CameraSession, FacingMode, MediaStream, StillFrameCamera};
pub use file::{SelectedFile, select_file};
