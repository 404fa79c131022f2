pub mod frame;
mod renderer;
mod shaders;

pub use frame::{build_frame, FrameData};
pub use renderer::Renderer;
