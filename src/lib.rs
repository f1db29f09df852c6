#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod drag;
pub mod error;
pub mod graph;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod render;
pub mod scene;
pub mod session;
pub mod split;
pub mod surface;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use drag::DragSession;
pub use error::{GraphError, GraphResult};
pub use graph::{Anchor, BoxGraph, Connector, Link};
pub use layout::{Route, RouteTemplate, TidyEngine, TidyPlan, route};
pub use model::{
    BoxId, BoxKind, BoxNode, CodeRegion, ConnectorId, Location, Rect, SourceRange, SymbolNode,
};
pub use scene::{Scene, load_scene, parse_scene};
pub use session::{
    BoxBuilder, CallerExpansion, CallerStep, CodeIndex, MeasuredBuilder, MemoryIndex, Session,
    SessionContext,
};
pub use surface::{Canvas, Surface};
