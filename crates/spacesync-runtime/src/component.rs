//! Spatial components: tick-domain objects tracked by the acoustic engine
//!
//! Each component pairs an engine object with its own [`ClockState`]. On every
//! host tick the clock is reconciled against audio time and the transform is
//! pushed to the engine as either an interpolation point or a hard reset.

use spacesync_core::{ObjectId, SyncError, SyncResult, Transform};
use spacesync_time::{ClockState, Reconciled};

use crate::{AcousticEngine, MeshGeometry, ObjectProps, ObjectSpec, SyncContext};

pub const MAX_HEAD_CHANNEL: u8 = 30;
pub const MAX_OUTPUT_CHANNEL: u8 = 31;

/// What kind of engine object a component drives
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Head {
        hrtf: u8,
        output_channel: u8,
        test_sound: bool,
    },
    Mic {
        output_channel: u8,
        test_sound: bool,
    },
    Speaker {
        output_channel: u8,
        test_sound: bool,
    },
    Listener,
    Room,
    Mesh {
        material_index: u8,
        geometry: MeshGeometry,
    },
}

impl ComponentKind {
    pub fn head(hrtf: u8, output_channel: u8) -> Self {
        ComponentKind::Head {
            hrtf,
            output_channel,
            test_sound: false,
        }
    }

    pub fn mic(output_channel: u8) -> Self {
        ComponentKind::Mic {
            output_channel,
            test_sound: false,
        }
    }

    pub fn speaker(output_channel: u8) -> Self {
        ComponentKind::Speaker {
            output_channel,
            test_sound: false,
        }
    }

    pub fn mesh(material_index: u8, geometry: MeshGeometry) -> Self {
        ComponentKind::Mesh {
            material_index,
            geometry,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Head { .. } => "head",
            ComponentKind::Mic { .. } => "mic",
            ComponentKind::Speaker { .. } => "speaker",
            ComponentKind::Listener => "listener",
            ComponentKind::Room => "room",
            ComponentKind::Mesh { .. } => "mesh",
        }
    }

    /// Mesh geometry is authored in host units, so its scale is converted too
    pub fn requires_scale_scale(&self) -> bool {
        matches!(self, ComponentKind::Mesh { .. })
    }

    pub fn validate(&self) -> SyncResult<()> {
        self.validate_props()?;
        match self {
            ComponentKind::Mesh { geometry, .. } => geometry.validate(),
            _ => Ok(()),
        }
    }

    /// Range checks on the properties pushed every tick
    pub fn validate_props(&self) -> SyncResult<()> {
        match self {
            ComponentKind::Head { output_channel, .. } => {
                check_channel(*output_channel, MAX_HEAD_CHANNEL)
            }
            ComponentKind::Mic { output_channel, .. }
            | ComponentKind::Speaker { output_channel, .. } => {
                check_channel(*output_channel, MAX_OUTPUT_CHANNEL)
            }
            ComponentKind::Mesh { .. } | ComponentKind::Listener | ComponentKind::Room => Ok(()),
        }
    }

    /// Create the engine object
    pub fn create(&self, engine: &dyn AcousticEngine, scale_factor: f32) -> SyncResult<ObjectId> {
        self.validate()?;
        match self {
            ComponentKind::Head {
                hrtf,
                output_channel,
                ..
            } => engine.add_object(ObjectSpec::Head {
                hrtf: *hrtf,
                output_channel: *output_channel,
            }),
            ComponentKind::Mic { output_channel, .. } => engine.add_object(ObjectSpec::Mic {
                output_channel: *output_channel,
            }),
            ComponentKind::Speaker { output_channel, .. } => {
                engine.add_object(ObjectSpec::Speaker {
                    output_channel: *output_channel,
                })
            }
            ComponentKind::Listener => engine.add_object(ObjectSpec::Listener),
            ComponentKind::Room => engine.add_object(ObjectSpec::Room),
            ComponentKind::Mesh {
                material_index,
                geometry,
            } => {
                let vertices = geometry.scaled_vertices(scale_factor);
                engine.add_object(ObjectSpec::Mesh {
                    material_index: *material_index,
                    vertices: &vertices,
                    triangles: &geometry.triangles,
                })
            }
        }
    }

    /// Destroy the engine object. The listener and room are engine singletons.
    pub fn destroy(&self, engine: &dyn AcousticEngine, id: ObjectId) -> SyncResult<()> {
        match self {
            ComponentKind::Listener | ComponentKind::Room => Ok(()),
            _ => engine.remove_object(id),
        }
    }

    /// Push the current editable properties. Out-of-range edits are refused.
    pub fn update_props(&self, engine: &dyn AcousticEngine, id: ObjectId) -> SyncResult<()> {
        self.validate_props()?;
        match self.props() {
            Some(props) => engine.set_props(id, props),
            None => Ok(()),
        }
    }

    fn props(&self) -> Option<ObjectProps> {
        match *self {
            ComponentKind::Head {
                hrtf,
                output_channel,
                test_sound,
            } => Some(ObjectProps::Head {
                hrtf,
                output_channel,
                test_sound,
            }),
            ComponentKind::Mic {
                output_channel,
                test_sound,
            } => Some(ObjectProps::Mic {
                output_channel,
                test_sound,
            }),
            ComponentKind::Speaker {
                output_channel,
                test_sound,
            } => Some(ObjectProps::Speaker {
                output_channel,
                test_sound,
            }),
            ComponentKind::Mesh { material_index, .. } => Some(ObjectProps::Mesh { material_index }),
            ComponentKind::Listener | ComponentKind::Room => None,
        }
    }
}

fn check_channel(channel: u8, max: u8) -> SyncResult<()> {
    if channel > max {
        Err(SyncError::InvalidProperty {
            name: "output_channel",
            value: channel as u32,
            max: max as u32,
        })
    } else {
        Ok(())
    }
}

/// A tick-domain object: engine object plus its clock
#[derive(Debug)]
pub struct SpatialComponent {
    kind: ComponentKind,
    object: Option<ObjectId>,
    clock: ClockState,
    intentionally_not_created: bool,
}

impl SpatialComponent {
    pub fn new(kind: ComponentKind) -> Self {
        SpatialComponent {
            kind,
            object: None,
            clock: ClockState::new(),
            intentionally_not_created: false,
        }
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Edit properties; they reach the engine on the next tick
    pub fn kind_mut(&mut self) -> &mut ComponentKind {
        &mut self.kind
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub fn clock(&self) -> &ClockState {
        &self.clock
    }

    pub fn is_created(&self) -> bool {
        self.object.is_some()
    }

    /// Activate. Outside a game world (e.g. an editor preview) no engine object
    /// is created and ticks are skipped.
    pub fn register(&mut self, ctx: &SyncContext, is_game_world: bool) -> SyncResult<()> {
        ctx.ensure_active()?;
        if !is_game_world {
            tracing::debug!(kind = self.kind.name(), "not creating component outside game world");
            self.intentionally_not_created = true;
            return Ok(());
        }
        let id = self.kind.create(ctx.engine(), ctx.scale_factor())?;
        tracing::debug!(kind = self.kind.name(), object = %id, "component created");
        self.object = Some(id);
        self.clock = ClockState::new();
        Ok(())
    }

    /// Deactivate: destroy the engine object and discard the clock
    pub fn unregister(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let result = match self.object.take() {
            Some(id) if ctx.is_active() => self.kind.destroy(ctx.engine(), id),
            _ => Ok(()),
        };
        self.clock.reset();
        self.intentionally_not_created = false;
        result
    }

    /// One host tick.
    ///
    /// Returns `Ok(None)` when the component is intentionally inert and
    /// `Err(ObjectMissing)` when the engine no longer knows the object; the
    /// caller skips this component for the tick in that case.
    pub fn tick(
        &mut self,
        ctx: &SyncContext,
        delta_seconds: f64,
        transform: Transform,
    ) -> SyncResult<Option<Reconciled>> {
        if self.intentionally_not_created {
            return Ok(None);
        }
        ctx.ensure_active()?;

        let engine = ctx.engine();
        let id = match self.object {
            Some(id) if engine.object_exists(id) => id,
            other => {
                let id = other.unwrap_or(ObjectId::NONE);
                tracing::warn!(kind = self.kind.name(), object = %id, "object missing, skipping tick");
                return Err(SyncError::ObjectMissing(id));
            }
        };

        let period = ctx.frame_period()?;
        let reconciled = self.clock.advance(delta_seconds, ctx.signal().audio_time(), period);
        for warning in reconciled.warnings() {
            ctx.notify(warning);
        }

        let engine_transform =
            transform.to_engine_units(ctx.scale_factor(), self.kind.requires_scale_scale());
        if reconciled.was_reset() {
            engine.phys_reset(id, reconciled.time, &engine_transform)?;
        } else {
            engine.phys_update(id, reconciled.time, &engine_transform)?;
        }

        self.kind.update_props(engine, id)?;
        Ok(Some(reconciled))
    }
}
