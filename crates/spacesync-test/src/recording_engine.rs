//! Recording acoustic engine
//!
//! Keeps every call in order and enforces the engine's interpolation-history
//! rule: for one object, `phys_update` times never go backwards unless a
//! `phys_reset` came in between.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use spacesync_core::{ObjectId, SyncError, SyncResult, TimeNs, Transform};
use spacesync_runtime::{AcousticEngine, ObjectProps, ObjectSpec, SourceSettings, SpatialParams};

/// One engine call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Startup { gpu_index: u32, has_data_dir: bool },
    Finalize,
    ConfigureAudio { sample_rate_hz: u32, frame_length: u32 },
    AddObject { id: ObjectId, kind: &'static str },
    RemoveObject(ObjectId),
    SetProps(ObjectId, ObjectProps),
    PhysUpdate(ObjectId, TimeNs, Transform),
    PhysReset(ObjectId, TimeNs, Transform),
    SourceAdd(ObjectId),
    SourceRemove(ObjectId),
    SourceConfigure(ObjectId),
    SourceWrite(ObjectId, usize),
    Process(TimeNs),
    ApplyParams(u32),
}

/// An update that went back in time without a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryViolation {
    pub object: ObjectId,
    pub previous: TimeNs,
    pub time: TimeNs,
}

#[derive(Default)]
struct Inner {
    calls: Vec<EngineCall>,
    objects: HashMap<ObjectId, &'static str>,
    sources: HashMap<ObjectId, usize>,
    /// Latest history point per object
    history: HashMap<ObjectId, TimeNs>,
    violations: Vec<HistoryViolation>,
    singletons: HashMap<&'static str, ObjectId>,
}

pub struct RecordingEngine {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    sample_rate: AtomicU32,
    frame_length: AtomicU32,
    channels: u32,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::with_channels(2)
    }

    pub fn with_channels(channels: u32) -> Self {
        RecordingEngine {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(0x100),
            sample_rate: AtomicU32::new(48_000),
            frame_length: AtomicU32::new(512),
            channels,
        }
    }

    fn record(&self, call: EngineCall) {
        self.inner.lock().calls.push(call);
    }

    fn allocate(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn violations(&self) -> Vec<HistoryViolation> {
        self.inner.lock().violations.clone()
    }

    /// Phys calls for one object, in order: (time, was_reset)
    pub fn history_of(&self, id: ObjectId) -> Vec<(TimeNs, bool)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::PhysUpdate(obj, t, _) if *obj == id => Some((*t, false)),
                EngineCall::PhysReset(obj, t, _) if *obj == id => Some((*t, true)),
                _ => None,
            })
            .collect()
    }

    /// Make an object disappear, as if the engine removed it on its own
    pub fn drop_object(&self, id: ObjectId) {
        let mut inner = self.inner.lock();
        inner.objects.remove(&id);
        inner.history.remove(&id);
    }

    pub fn live_objects(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn live_sources(&self) -> usize {
        self.inner.lock().sources.len()
    }

    fn ensure_known(inner: &Inner, id: ObjectId) -> SyncResult<()> {
        if inner.objects.contains_key(&id) || inner.sources.contains_key(&id) {
            Ok(())
        } else {
            Err(SyncError::ObjectMissing(id))
        }
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AcousticEngine for RecordingEngine {
    fn startup(&self, gpu_index: u32, data_dir: Option<&Path>) -> SyncResult<()> {
        self.record(EngineCall::Startup {
            gpu_index,
            has_data_dir: data_dir.is_some(),
        });
        Ok(())
    }

    fn finalize(&self) {
        self.record(EngineCall::Finalize);
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
        self.record(EngineCall::ConfigureAudio {
            sample_rate_hz,
            frame_length,
        });
    }

    fn object_exists(&self, id: ObjectId) -> bool {
        self.inner.lock().objects.contains_key(&id)
    }

    fn add_object(&self, spec: ObjectSpec<'_>) -> SyncResult<ObjectId> {
        let kind = match spec {
            ObjectSpec::Head { .. } => "head",
            ObjectSpec::Mic { .. } => "mic",
            ObjectSpec::Speaker { .. } => "speaker",
            ObjectSpec::Listener => "listener",
            ObjectSpec::Room => "room",
            ObjectSpec::Mesh { vertices, triangles, .. } => {
                if vertices.len() < 3 || triangles.is_empty() {
                    return Err(SyncError::InvalidMesh("empty mesh".into()));
                }
                "mesh"
            }
        };
        let singleton = matches!(spec, ObjectSpec::Listener | ObjectSpec::Room);

        let mut inner = self.inner.lock();
        if singleton {
            if let Some(&id) = inner.singletons.get(kind) {
                return Ok(id);
            }
        }
        let id = self.allocate();
        inner.objects.insert(id, kind);
        if singleton {
            inner.singletons.insert(kind, id);
        }
        inner.calls.push(EngineCall::AddObject { id, kind });
        Ok(id)
    }

    fn remove_object(&self, id: ObjectId) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        inner.objects.remove(&id).ok_or(SyncError::ObjectMissing(id))?;
        inner.history.remove(&id);
        inner.calls.push(EngineCall::RemoveObject(id));
        Ok(())
    }

    fn set_props(&self, id: ObjectId, props: ObjectProps) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_known(&inner, id)?;
        inner.calls.push(EngineCall::SetProps(id, props));
        Ok(())
    }

    fn phys_update(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_known(&inner, id)?;
        let previous = inner.history.get(&id).copied();
        if let Some(previous) = previous {
            if time < previous {
                inner.violations.push(HistoryViolation {
                    object: id,
                    previous,
                    time,
                });
            }
        }
        inner.history.insert(id, time);
        inner.calls.push(EngineCall::PhysUpdate(id, time, *transform));
        Ok(())
    }

    fn phys_reset(&self, id: ObjectId, time: TimeNs, transform: &Transform) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_known(&inner, id)?;
        inner.history.insert(id, time);
        inner.calls.push(EngineCall::PhysReset(id, time, *transform));
        Ok(())
    }

    fn source_add(&self) -> SyncResult<ObjectId> {
        let id = self.allocate();
        let mut inner = self.inner.lock();
        inner.sources.insert(id, 0);
        inner.calls.push(EngineCall::SourceAdd(id));
        Ok(id)
    }

    fn source_remove(&self, id: ObjectId) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        inner.sources.remove(&id).ok_or(SyncError::ObjectMissing(id))?;
        inner.history.remove(&id);
        inner.calls.push(EngineCall::SourceRemove(id));
        Ok(())
    }

    fn source_configure(&self, id: ObjectId, _settings: &SourceSettings) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        Self::ensure_known(&inner, id)?;
        inner.calls.push(EngineCall::SourceConfigure(id));
        Ok(())
    }

    fn source_write(&self, id: ObjectId, samples: &[f32]) -> SyncResult<()> {
        let mut inner = self.inner.lock();
        let written = inner.sources.get_mut(&id).ok_or(SyncError::ObjectMissing(id))?;
        *written += 1;
        inner.calls.push(EngineCall::SourceWrite(id, samples.len()));
        Ok(())
    }

    fn process(&self, as_of: TimeNs) {
        self.record(EngineCall::Process(as_of));
    }

    fn output_channel_count(&self) -> u32 {
        self.channels
    }

    fn output_channel_read(&self, channel: u32, out: &mut [f32]) {
        let level = 0.1 * (channel + 1) as f32;
        out.fill(level);
    }

    fn apply_params(&self, params: &SpatialParams) {
        self.record(EngineCall::ApplyParams(params.order));
    }
}
