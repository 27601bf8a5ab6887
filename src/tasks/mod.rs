//! Invocable tasks, one file per namespace. Each is an `impl App` block.

mod complete;
mod infra;
mod pbf;
mod resources;
mod styles;
mod tiles;

pub use complete::CompletionProvider;
pub use infra::clamp_user_id;
pub use resources::rewrite_layer_sources;
pub use styles::StyleSource;
