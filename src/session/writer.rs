//! Asynchronous session writer
//!
//! [`WriteSession`] decouples frame production from disk persistence with
//! a fixed-capacity ring of payload slots and one dedicated worker thread
//! started at construction. `push` never performs frame I/O: it validates
//! the payload, hands it to a free slot and returns. When the ring is
//! full, `push` spin-waits until the worker frees a slot — backpressure is
//! blocking, never frame-dropping.
//!
//! The worker drains slots in FIFO order, applies the session rotation to
//! the content and encodes through the container backends. Dropping the
//! session (or calling [`WriteSession::finish`]) clears the writing flag,
//! joins the worker once the ring is empty and only then finalizes the
//! containers, so every pushed frame reaches disk.
//!
//! Side files are created lazily: the parameter file is serialized and
//! the containers are opened on the first push that needs them. An open
//! failure (for example a missing output directory) is returned from that
//! push without buffering anything; the state stays unopened so a later
//! push can retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{error, info, trace};

use crate::backend::{
    DepthFormat, DepthWriteBackend, ImageFormat, ImageWriteBackend, ParameterFormat,
};
use crate::config::RecordingConfig;
use crate::error::{RecordingError, Result};
use crate::frame::{DepthPayload, FrameShape, ImagePayload, PayloadKind, Rotation};
use crate::session::parameters::{Intrinsics, RecordingParameters, StreamProfile};
use crate::session::paths::{resolve_write, SessionFilePaths};

/// Options of a new write session
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Container format of the image substream
    pub image_format: ImageFormat,
    /// Container format of the depth substream
    pub depth_format: DepthFormat,
    /// Serialization format of the parameter file
    pub parameters_format: ParameterFormat,
    /// Orientation applied to frame content before persisting
    pub rotation: Rotation,
    /// Payload representation this session will carry
    pub payload: PayloadKind,
    /// Target session number; `None` appends after the existing sessions
    pub session: Option<u32>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            image_format: ImageFormat::default(),
            depth_format: DepthFormat::default(),
            parameters_format: ParameterFormat::default(),
            rotation: Rotation::None,
            payload: PayloadKind::Structured,
            session: None,
        }
    }
}

/// One ring slot: pending payloads plus their sequence counter
#[derive(Debug, Default)]
struct Slot {
    counter: u64,
    image: Option<ImagePayload>,
    depth: Option<DepthPayload>,
}

/// Container backends, opened lazily on the first push that needs them
#[derive(Debug)]
struct OpenBackends {
    image: Option<ImageWriteBackend>,
    depth: Option<DepthWriteBackend>,
    shape: FrameShape,
}

/// State shared between the producer and the worker thread
#[derive(Debug)]
struct RingShared {
    slots: Vec<Mutex<Slot>>,
    size: Mutex<usize>,
    writing: AtomicBool,
    backends: Mutex<Option<OpenBackends>>,
    last_error: Mutex<Option<RecordingError>>,
    rotation: Rotation,
}

impl RingShared {
    fn len(&self) -> usize {
        *self.size.lock().expect("ring size mutex poisoned")
    }

    /// Rotate and encode the payloads of one slot
    fn encode_slot(&self, mut slot: Slot) -> Result<()> {
        let mut guard = self.backends.lock().expect("backends mutex poisoned");
        let backends = guard.as_mut().ok_or(RecordingError::ParametersNotSet)?;
        let shape = backends.shape;

        if let Some(mut image) = slot.image.take() {
            image.rotate(self.rotation, &shape);
            let writer = backends.image.as_mut().ok_or(RecordingError::ParametersNotSet)?;
            writer.write_frame(&image.view(&shape))?;
        }
        if let Some(mut depth) = slot.depth.take() {
            depth.rotate(self.rotation, &shape);
            let writer = backends.depth.as_mut().ok_or(RecordingError::ParametersNotSet)?;
            writer.write_frame(&depth.view(&shape))?;
        }
        trace!(counter = slot.counter, "frame persisted");
        Ok(())
    }
}

/// Worker loop: drain slots in FIFO order until the writing flag clears
/// and the ring is empty
fn run_worker(shared: Arc<RingShared>, capacity: usize) {
    info!("session writer worker started");
    let mut start = 0usize;
    loop {
        while shared.writing.load(Ordering::SeqCst) && shared.len() == 0 {
            thread::yield_now();
        }
        if shared.len() == 0 {
            break;
        }

        let slot = {
            let mut guard = shared.slots[start].lock().expect("ring slot mutex poisoned");
            std::mem::take(&mut *guard)
        };
        if let Err(e) = shared.encode_slot(slot) {
            error!(error = %e, "failed to persist frame");
            let mut latch = shared
                .last_error
                .lock()
                .expect("writer error mutex poisoned");
            latch.get_or_insert(e);
        }

        start = (start + 1) % capacity;
        let mut size = shared.size.lock().expect("ring size mutex poisoned");
        *size -= 1;
    }
    info!("session writer worker drained");
}

/// Asynchronous writer of one recorded session
#[derive(Debug)]
pub struct WriteSession {
    parameters: RecordingParameters,
    paths: SessionFilePaths,
    session_number: u32,
    payload_kind: PayloadKind,
    capacity: usize,
    /// Producer-owned ring index of the next free slot
    end: usize,
    parameters_written: bool,
    image_open: bool,
    depth_open: bool,
    shared: Arc<RingShared>,
    worker: Option<JoinHandle<()>>,
}

impl WriteSession {
    /// Create a session whose geometry is copied from another descriptor
    /// (applying this session's own rotation)
    pub fn with_parameters(
        config: &RecordingConfig,
        options: WriterOptions,
        source: &RecordingParameters,
    ) -> Result<Self> {
        let mut parameters = Self::base_parameters(&options);
        parameters.set_from_parameters(source);
        Self::create(config, options, parameters)
    }

    /// Create a session whose geometry comes from a sensor stream profile
    pub fn with_profile(
        config: &RecordingConfig,
        options: WriterOptions,
        profile: &StreamProfile,
    ) -> Result<Self> {
        let mut parameters = Self::base_parameters(&options);
        parameters.set_from_profile(profile);
        Self::create(config, options, parameters)
    }

    /// Create a session from intrinsics and a frame rate
    pub fn with_intrinsics(
        config: &RecordingConfig,
        options: WriterOptions,
        fps: f64,
        intrinsics: &Intrinsics,
    ) -> Result<Self> {
        let mut parameters = Self::base_parameters(&options);
        parameters.set_from_intrinsics(fps, intrinsics);
        Self::create(config, options, parameters)
    }

    /// Create a session whose geometry will be supplied later
    ///
    /// Pushing before one of the `set_parameters_*` calls fails with
    /// [`RecordingError::ParametersNotSet`].
    pub fn deferred(config: &RecordingConfig, options: WriterOptions) -> Result<Self> {
        let parameters = Self::base_parameters(&options);
        Self::create(config, options, parameters)
    }

    fn base_parameters(options: &WriterOptions) -> RecordingParameters {
        RecordingParameters::new(
            options.image_format,
            options.depth_format,
            options.parameters_format,
            options.rotation,
        )
    }

    fn create(
        config: &RecordingConfig,
        options: WriterOptions,
        parameters: RecordingParameters,
    ) -> Result<Self> {
        let capacity = config.write_buffer_size;
        let (paths, session_number) = resolve_write(config, &parameters, options.session)?;

        let shared = Arc::new(RingShared {
            slots: (0..capacity).map(|_| Mutex::new(Slot::default())).collect(),
            size: Mutex::new(0),
            writing: AtomicBool::new(true),
            backends: Mutex::new(None),
            last_error: Mutex::new(None),
            rotation: parameters.rotation,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("session-writer".to_string())
            .spawn(move || run_worker(worker_shared, capacity))?;

        info!(session = session_number, capacity, "write session started");
        Ok(Self {
            parameters,
            paths,
            session_number,
            payload_kind: options.payload,
            capacity,
            end: 0,
            parameters_written: false,
            image_open: false,
            depth_open: false,
            shared,
            worker: Some(worker),
        })
    }

    /// Supply geometry from another descriptor; must happen before the
    /// first push
    pub fn set_parameters(&mut self, source: &RecordingParameters) {
        self.parameters.set_from_parameters(source);
    }

    /// Supply geometry from a sensor stream profile; must happen before
    /// the first push
    pub fn set_parameters_from_profile(&mut self, profile: &StreamProfile) {
        self.parameters.set_from_profile(profile);
    }

    /// Supply geometry from intrinsics; must happen before the first push
    pub fn set_parameters_from_intrinsics(&mut self, fps: f64, intrinsics: &Intrinsics) {
        self.parameters.set_from_intrinsics(fps, intrinsics);
    }

    /// Supply frame rate and dimensions only; must happen before the
    /// first push
    pub fn set_parameters_from_dimensions(&mut self, fps: f64, width: u32, height: u32) {
        self.parameters.set_from_dimensions(fps, width, height);
    }

    pub fn parameters(&self) -> &RecordingParameters {
        &self.parameters
    }

    pub fn session_number(&self) -> u32 {
        self.session_number
    }

    pub fn payload_kind(&self) -> PayloadKind {
        self.payload_kind
    }

    /// Number of frames currently waiting in the ring
    pub fn buffered(&self) -> usize {
        self.shared.len()
    }

    /// Ring capacity in frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffer one frame pair for persistence
    ///
    /// Either substream may be absent. The call blocks while the ring is
    /// full and returns once the payloads are buffered; the actual disk
    /// write happens on the worker thread. Errors are immediate: payload
    /// validation, the lazy parameter-file write and the lazy container
    /// opening all happen on this thread, and a failure leaves the session
    /// unopened so the push can be retried.
    pub fn push(
        &mut self,
        image: Option<ImagePayload>,
        depth: Option<DepthPayload>,
        counter: u64,
    ) -> Result<()> {
        if let Some(payload) = &image {
            if payload.kind() != self.payload_kind {
                return Err(RecordingError::PayloadKindMismatch {
                    expected: self.payload_kind,
                    actual: payload.kind(),
                });
            }
        }
        if let Some(payload) = &depth {
            if payload.kind() != self.payload_kind {
                return Err(RecordingError::PayloadKindMismatch {
                    expected: self.payload_kind,
                    actual: payload.kind(),
                });
            }
        }

        self.ensure_backends(image.is_some(), depth.is_some())?;

        let shape = self.parameters.shape();
        if let Some(ImagePayload::Raw(data)) = &image {
            let expected = shape.image_elements();
            if data.len() != expected {
                return Err(RecordingError::PayloadSizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }
        if let Some(DepthPayload::Millimeters(data)) = &depth {
            let expected = shape.depth_elements();
            if data.len() != expected {
                return Err(RecordingError::PayloadSizeMismatch {
                    expected,
                    actual: data.len(),
                });
            }
        }

        // Backpressure: spin until the worker frees a slot
        loop {
            if self.shared.len() < self.capacity {
                break;
            }
            thread::yield_now();
        }

        {
            let mut slot = self.shared.slots[self.end]
                .lock()
                .expect("ring slot mutex poisoned");
            // Overwriting drops whatever stale payload the slot still held
            *slot = Slot {
                counter,
                image,
                depth,
            };
        }
        self.end = (self.end + 1) % self.capacity;
        {
            let mut size = self.shared.size.lock().expect("ring size mutex poisoned");
            *size += 1;
        }
        trace!(counter, "frame buffered");
        Ok(())
    }

    /// Serialize the parameter file and open the containers that this
    /// push needs and that are not open yet
    fn ensure_backends(&mut self, uses_image: bool, uses_depth: bool) -> Result<()> {
        let need_image = uses_image && !self.image_open;
        let need_depth = uses_depth && !self.depth_open;
        if !need_image && !need_depth {
            return Ok(());
        }

        if !self.parameters.is_initialized() {
            return Err(RecordingError::ParametersNotSet);
        }
        if !self.parameters_written {
            self.parameters.serialize(&self.paths.parameters)?;
            self.parameters_written = true;
            info!(path = %self.paths.parameters.display(), "wrote session parameters");
        }

        let shape = self.parameters.shape();
        let mut guard = self
            .shared
            .backends
            .lock()
            .expect("backends mutex poisoned");
        let backends = guard.get_or_insert_with(|| OpenBackends {
            image: None,
            depth: None,
            shape,
        });
        if need_image {
            backends.image = Some(ImageWriteBackend::create(
                self.parameters.image_format,
                &self.paths.image,
                self.parameters.fps,
                &shape,
            )?);
            self.image_open = true;
            info!(path = %self.paths.image.display(), "opened image container");
        }
        if need_depth {
            backends.depth = Some(DepthWriteBackend::create(
                self.parameters.depth_format,
                &self.paths.depth,
            )?);
            self.depth_open = true;
            info!(path = %self.paths.depth.display(), "opened depth container");
        }
        Ok(())
    }

    /// Drain the ring, join the worker and finalize the containers
    ///
    /// Surfaces the first error the worker hit while encoding, if any.
    pub fn finish(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.shared.writing.store(false, Ordering::SeqCst);
        if worker.join().is_err() {
            error!("session writer worker panicked");
        }

        let mut first_error = self
            .shared
            .last_error
            .lock()
            .expect("writer error mutex poisoned")
            .take();

        let mut guard = self
            .shared
            .backends
            .lock()
            .expect("backends mutex poisoned");
        if let Some(mut backends) = guard.take() {
            if let Some(mut image) = backends.image.take() {
                if let Err(e) = image.finish() {
                    error!(error = %e, "failed to finalize image container");
                    first_error.get_or_insert(e);
                }
            }
            if let Some(mut depth) = backends.depth.take() {
                if let Err(e) = depth.finish() {
                    error!(error = %e, "failed to finalize depth container");
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(guard);

        info!(session = self.session_number, "write session finished");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "write session shutdown reported an error");
        }
    }
}
