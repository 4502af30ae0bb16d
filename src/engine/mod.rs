pub mod batch;
pub mod capture;
pub mod merger;
pub mod reconstruct;
pub mod state;

pub use batch::BatchSession;
pub use capture::{CaptureEngine, CaptureSession, CaptureSettings, Termination};
pub use merger::{Merge, Merger};
pub use reconstruct::{densify, finalize, finalize_all};
pub use state::CaptureState;
