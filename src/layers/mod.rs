//! Layer Model Module
//!
//! - Definitions: the five-field layer record and its partial override
//! - Registry: the ordered, immutable default layer set
//! - Merge: per-run overrides applied over the registry

mod definition;
mod merge;
mod registry;

pub use definition::{parse_overrides, LayerDefinition, LayerId, LayerOverride, LayerOverrides};
pub use merge::merge_layers;
pub use registry::{LayerRegistry, BUILTIN_LAYERS_JSON, LAYERS_PATH_ENV};
