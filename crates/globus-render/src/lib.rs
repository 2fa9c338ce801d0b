//! Per-frame draw context, ordered rendering queues, and picking for the globe renderer.
//!
//! Everything here runs on the thread that owns the graphics context. The
//! [`DrawContext`] is reinitialized once per frame by the frame driver, which
//! is also responsible for draining both ordered queues before the frame ends.

pub mod backend;
pub mod context;
pub mod credit;
pub mod error;
pub mod headless;
pub mod ordered;
pub mod pick;
pub mod resource_cache;
pub mod stats;
pub mod surface;
pub mod terrain;
pub mod text;
pub mod view;

pub use backend::{DepthOffset, RenderBackend, TextureId};
pub use context::DrawContext;
pub use credit::ScreenCredit;
pub use error::RenderError;
pub use headless::{Command, HeadlessBackend};
pub use ordered::{OrderedRenderable, QueueOutcome};
pub use pick::{LayerId, ObjectId, PickSupport, PickedObject, PickedObjectList};
pub use resource_cache::{BasicGpuResourceCache, GpuResource, GpuResourceCache};
pub use stats::PerFrameStatistic;
pub use surface::{SurfaceObject, SurfaceStateKey, SurfaceTile};
pub use terrain::{ElevationLookup, GlobeTerrain, Terrain};
pub use text::{TextRenderer, TextRendererCache};
pub use view::{BasicView, View};
