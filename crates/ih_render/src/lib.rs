pub mod gpu_context;
pub mod sprite_pipeline;
pub mod texture;

pub use gpu_context::GpuContext;
pub use sprite_pipeline::{ScreenUniform, SpritePipeline, SpriteVertex};
pub use texture::Texture;
