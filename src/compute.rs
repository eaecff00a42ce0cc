//! Compute module contract.
//!
//! A compute module is a black box with a two-step lifecycle: `init()` builds whatever context
//! the module needs, `render()` blocks the calling thread until a frame is produced. The
//! coordinator never looks inside; it only loads modules through a [`ComputeLoader`] and
//! validates what comes back.

pub mod tracer;

use crate::error::{DispatchError, Result};
use std::panic::{self, AssertUnwindSafe};

pub use tracer::{RayTracer, TracerLoader};

/// Raw output of one render pass, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// RGBA, row-major, top row first
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub total_rays: u64,
}

/// Display-ready result handed to the UI collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    samples_per_pixel: u32,
    total_rays: u64,
    duration_ms: f64,
}

impl RenderResult {
    /// Validate a raw frame and attach the measured duration.
    ///
    /// The pixel buffer must hold exactly `4 * width * height` bytes.
    pub fn from_frame(frame: RawFrame, duration_ms: f64) -> Result<Self> {
        let expected = 4u64 * u64::from(frame.width) * u64::from(frame.height);
        if frame.width == 0 || frame.height == 0 {
            return Err(DispatchError::render_failure(format!(
                "malformed render output: empty image {}x{}",
                frame.width, frame.height
            )));
        }
        if frame.pixels.len() as u64 != expected {
            return Err(DispatchError::render_failure(format!(
                "malformed render output: {} bytes for a {}x{} RGBA image (expected {})",
                frame.pixels.len(),
                frame.width,
                frame.height,
                expected
            )));
        }

        Ok(Self {
            pixels: frame.pixels,
            width: frame.width,
            height: frame.height,
            samples_per_pixel: frame.samples_per_pixel,
            total_rays: frame.total_rays,
            duration_ms,
        })
    }

    pub(crate) fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    pub fn total_rays(&self) -> u64 {
        self.total_rays
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }
}

/// The opaque render function.
pub trait ComputeModule: Send {
    /// Build the module's context. Called once before any `render()`.
    fn init(&mut self) -> Result<()>;

    /// Produce one frame. Blocks for the whole computation.
    fn render(&mut self) -> Result<RawFrame>;
}

/// Loads a compute module where it is going to run.
pub trait ComputeLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn ComputeModule>>;
}

impl<F> ComputeLoader for F
where
    F: Fn() -> Result<Box<dyn ComputeModule>> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn ComputeModule>> {
        self()
    }
}

/// Load a module and initialize it. Every failure here is an import failure.
pub fn load_and_init(loader: &dyn ComputeLoader) -> Result<Box<dyn ComputeModule>> {
    let mut module = loader.load().map_err(as_import_failure)?;
    match panic::catch_unwind(AssertUnwindSafe(|| module.init())) {
        Ok(Ok(())) => Ok(module),
        Ok(Err(e)) => Err(as_import_failure(e)),
        Err(payload) => Err(DispatchError::import_failure(format!(
            "compute module panicked during init: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Run `render()`, turning errors and panics into `RenderFailure`.
pub fn guarded_render(module: &mut dyn ComputeModule) -> Result<RawFrame> {
    match panic::catch_unwind(AssertUnwindSafe(|| module.render())) {
        Ok(Ok(frame)) => Ok(frame),
        Ok(Err(DispatchError::RenderFailure { message })) => {
            Err(DispatchError::RenderFailure { message })
        }
        Ok(Err(e)) => Err(DispatchError::render_failure(e.to_string())),
        Err(payload) => Err(DispatchError::render_failure(format!(
            "compute module panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn as_import_failure(err: DispatchError) -> DispatchError {
    match err {
        DispatchError::ImportFailure { message } => DispatchError::ImportFailure { message },
        other => DispatchError::import_failure(other.to_string()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        frame: RawFrame,
        fail_init: bool,
    }

    impl ComputeModule for Fixed {
        fn init(&mut self) -> Result<()> {
            if self.fail_init {
                Err(DispatchError::other("no scene"))
            } else {
                Ok(())
            }
        }

        fn render(&mut self) -> Result<RawFrame> {
            Ok(self.frame.clone())
        }
    }

    struct Panicking;

    impl ComputeModule for Panicking {
        fn init(&mut self) -> Result<()> {
            Ok(())
        }

        fn render(&mut self) -> Result<RawFrame> {
            panic!("out of rays")
        }
    }

    fn frame(width: u32, height: u32, len: usize) -> RawFrame {
        RawFrame {
            pixels: vec![7; len],
            width,
            height,
            samples_per_pixel: 4,
            total_rays: 99,
        }
    }

    #[test]
    fn result_accepts_exact_rgba_buffer() {
        let result = RenderResult::from_frame(frame(3, 2, 24), 12.5).unwrap();
        assert_eq!(result.width(), 3);
        assert_eq!(result.height(), 2);
        assert_eq!(result.pixels().len(), 24);
        assert_eq!(result.samples_per_pixel(), 4);
        assert_eq!(result.total_rays(), 99);
        assert_eq!(result.duration_ms(), 12.5);
    }

    #[test]
    fn result_rejects_short_buffer() {
        let err = RenderResult::from_frame(frame(3, 2, 18), 0.0).unwrap_err();
        assert!(matches!(err, DispatchError::RenderFailure { .. }));
        assert!(err.to_string().contains("malformed render output"));
    }

    #[test]
    fn result_rejects_empty_image() {
        assert!(RenderResult::from_frame(frame(0, 2, 0), 0.0).is_err());
    }

    #[test]
    fn load_and_init_maps_init_errors_to_import_failure() {
        let loader = || -> Result<Box<dyn ComputeModule>> {
            Ok(Box::new(Fixed {
                frame: frame(1, 1, 4),
                fail_init: true,
            }))
        };
        let err = load_and_init(&loader).err().expect("init should fail");
        assert!(err.is_import_failure());
    }

    #[test]
    fn guarded_render_catches_panics() {
        let mut module = Panicking;
        let err = guarded_render(&mut module).unwrap_err();
        match err {
            DispatchError::RenderFailure { message } => assert!(message.contains("out of rays")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn guarded_render_passes_frames_through() {
        let mut module = Fixed {
            frame: frame(1, 1, 4),
            fail_init: false,
        };
        assert_eq!(guarded_render(&mut module).unwrap().pixels.len(), 4);
    }
}
