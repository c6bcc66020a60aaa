//! Template-backed components on top of `owlet-template`.

pub mod component;
pub mod lifecycle;
pub mod node_ref;
mod shared_render;

pub use component::{ComponentDef, ComponentRegistry, Method, RenderOutcome, TemplateComponent};
pub use lifecycle::Lifecycle;
pub use node_ref::NodeRef;
