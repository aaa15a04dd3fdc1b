//! In-memory engine for unit tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use spacesync_core::{ObjectId, SyncError, SyncResult, TimeNs, Transform};

use crate::{AcousticEngine, ObjectProps, ObjectSpec, SourceSettings, SpatialParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysCall {
    Update(ObjectId, TimeNs, Transform),
    Reset(ObjectId, TimeNs, Transform),
}

#[derive(Default)]
struct State {
    objects: HashMap<ObjectId, String>,
    props: HashMap<ObjectId, ObjectProps>,
    sources: HashMap<ObjectId, Vec<f32>>,
    phys: Vec<PhysCall>,
    processed: Vec<TimeNs>,
    params: Option<SpatialParams>,
    listener: Option<ObjectId>,
}

pub struct FakeEngine {
    state: Mutex<State>,
    next_id: AtomicU64,
    sample_rate: AtomicU32,
    frame_length: AtomicU32,
    started: AtomicBool,
    finalized: AtomicU32,
    viewer_frames: AtomicU64,
    viewer_exit_after: AtomicU64,
    viewer_finalized: AtomicBool,
    viewer_init_fails: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        FakeEngine {
            state: Mutex::new(State::default()),
            next_id: AtomicU64::new(1),
            sample_rate: AtomicU32::new(48_000),
            frame_length: AtomicU32::new(512),
            started: AtomicBool::new(false),
            finalized: AtomicU32::new(0),
            viewer_frames: AtomicU64::new(0),
            viewer_exit_after: AtomicU64::new(u64::MAX),
            viewer_finalized: AtomicBool::new(false),
            viewer_init_fails: AtomicBool::new(false),
        }
    }

    fn next(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn started(&self) -> bool {
        self.started.load(Ordering::Relaxed)
    }

    pub fn finalize_count(&self) -> u32 {
        self.finalized.load(Ordering::Relaxed)
    }

    pub fn viewer_frames(&self) -> u64 {
        self.viewer_frames.load(Ordering::Relaxed)
    }

    pub fn set_viewer_exit_after(&self, frames: u64) {
        self.viewer_exit_after.store(frames, Ordering::Relaxed);
    }

    pub fn fail_viewer_init(&self) {
        self.viewer_init_fails.store(true, Ordering::Relaxed);
    }

    pub fn viewer_finalized(&self) -> bool {
        self.viewer_finalized.load(Ordering::Relaxed)
    }

    pub fn last_params(&self) -> Option<SpatialParams> {
        self.state.lock().params.clone()
    }

    pub fn phys_calls(&self) -> Vec<PhysCall> {
        self.state.lock().phys.clone()
    }

    pub fn processed(&self) -> Vec<TimeNs> {
        self.state.lock().processed.clone()
    }

    pub fn object_kind(&self, id: ObjectId) -> Option<String> {
        self.state.lock().objects.get(&id).cloned()
    }

    pub fn props(&self, id: ObjectId) -> Option<ObjectProps> {
        self.state.lock().props.get(&id).copied()
    }

    pub fn source_input(&self, id: ObjectId) -> Option<Vec<f32>> {
        self.state.lock().sources.get(&id).cloned()
    }

    pub fn source_count(&self) -> usize {
        self.state.lock().sources.len()
    }

    /// Drop an object behind the host's back
    pub fn forget(&self, id: ObjectId) {
        self.state.lock().objects.remove(&id);
    }

    fn require(&self, id: ObjectId) -> SyncResult<()> {
        let state = self.state.lock();
        if state.objects.contains_key(&id) || state.sources.contains_key(&id) {
            Ok(())
        } else {
            Err(SyncError::ObjectMissing(id))
        }
    }
}

impl AcousticEngine for FakeEngine {
    fn startup(&self, _gpu_index: u32, _data_dir: Option<&Path>) -> SyncResult<()> {
        self.started.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn finalize(&self) {
        self.finalized.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_length(&self) -> u32 {
        self.frame_length.load(Ordering::Relaxed)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.load(Ordering::Relaxed)
    }

    fn configure_audio(&self, sample_rate_hz: u32, frame_length: u32) {
        self.sample_rate.store(sample_rate_hz, Ordering::Relaxed);
        self.frame_length.store(frame_length, Ordering::Relaxed);
    }

    fn object_exists(&self, id: ObjectId) -> bool {
        self.state.lock().objects.contains_key(&id)
    }

    fn add_object(&self, spec: ObjectSpec<'_>) -> SyncResult<ObjectId> {
        if let ObjectSpec::Listener = spec {
            let existing = self.state.lock().listener;
            if let Some(id) = existing {
                return Ok(id);
            }
        }
        let id = self.next();
        let kind = match spec {
            ObjectSpec::Head { .. } => "head",
            ObjectSpec::Mic { .. } => "mic",
            ObjectSpec::Speaker { .. } => "speaker",
            ObjectSpec::Listener => "listener",
            ObjectSpec::Room => "room",
            ObjectSpec::Mesh { .. } => "mesh",
        };
        let mut state = self.state.lock();
        state.objects.insert(id, kind.to_string());
        if let ObjectSpec::Listener = spec {
            state.listener = Some(id);
        }
        Ok(id)
    }

    fn remove_object(&self, id: ObjectId) -> SyncResult<()> {
        self.state
            .lock()
            .objects
            .remove(&id)
            .map(|_| ())
            .ok_or(SyncError::ObjectMissing(id))
    }

    fn set_props(&self, id: ObjectId, props: ObjectProps) -> SyncResult<()> {
        self.require(id)?;
        self.state.lock().props.insert(id, props);
        Ok(())
    }

    fn phys_update(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()> {
        self.require(id)?;
        self.state.lock().phys.push(PhysCall::Update(id, time, *transform));
        Ok(())
    }

    fn phys_reset(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()> {
        self.require(id)?;
        self.state.lock().phys.push(PhysCall::Reset(id, time, *transform));
        Ok(())
    }

    fn source_add(&self) -> SyncResult<ObjectId> {
        let id = self.next();
        self.state.lock().sources.insert(id, Vec::new());
        Ok(id)
    }

    fn source_remove(&self, id: ObjectId) -> SyncResult<()> {
        self.state
            .lock()
            .sources
            .remove(&id)
            .map(|_| ())
            .ok_or(SyncError::ObjectMissing(id))
    }

    fn source_configure(&self, id: ObjectId, _settings: &SourceSettings) -> SyncResult<()> {
        self.require(id)
    }

    fn source_write(&self, id: ObjectId, samples: &[f32]) -> SyncResult<()> {
        let mut state = self.state.lock();
        let input = state.sources.get_mut(&id).ok_or(SyncError::ObjectMissing(id))?;
        *input = samples.to_vec();
        Ok(())
    }

    fn process(&self, as_of: TimeNs) {
        self.state.lock().processed.push(as_of);
    }

    fn output_channel_count(&self) -> u32 {
        2
    }

    fn output_channel_read(&self, channel: u32, out: &mut [f32]) {
        out.fill(channel as f32 + 1.0);
    }

    fn apply_params(&self, params: &SpatialParams) {
        self.state.lock().params = Some(params.clone());
    }

    fn viewer_init(&self) -> SyncResult<()> {
        if self.viewer_init_fails.load(Ordering::Relaxed) {
            return Err(SyncError::Engine("no display".into()));
        }
        Ok(())
    }

    fn viewer_draw(&self) -> bool {
        if self.viewer_frames() >= self.viewer_exit_after.load(Ordering::Relaxed) {
            return false;
        }
        self.viewer_frames.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn viewer_finalize(&self) {
        self.viewer_finalized.store(true, Ordering::Relaxed);
    }
}
