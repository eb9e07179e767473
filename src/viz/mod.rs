// Audio- and emotion-driven metaball engine: blob simulation, influence
// field sampling, emotion highlight placement and rendering.

pub mod audio;
pub mod blob;
pub mod connection;
pub mod emotion;
pub mod field;
pub mod highlight;
pub mod noise;
pub mod params;
pub mod render;
pub mod session;
pub mod simulator;

pub use render::{DrawCommand, RecordingSurface, RenderSurface, Rgba};
pub use session::{SessionConfig, VisualizationSession};
