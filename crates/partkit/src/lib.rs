#![warn(missing_docs)]

//! Declarative composition and scaling of modular 3D parts.
//!
//! Designers author [`ModelDefinition`]s (dimensions, mounting profiles,
//! attach nodes, sub-model edits, optional compound segments) and
//! [`ModelLayout`]s in the `partkit-cfg` record format. At run time a
//! [`ModelModule`] binds a definition to a mounting slot, instantiates its
//! geometry in the host scene, scales it non-uniformly, and derives attach
//! node placement, neighbour compatibility, and scaled mass, cost and
//! volume.
//!
//! # Example
//!
//! ```
//! use partkit::{
//!     DefinitionCatalog, EngineSettings, ModelDefinitionLayoutOptions, ModelModule,
//!     ModelOrientation,
//! };
//!
//! let mut catalog = DefinitionCatalog::new();
//! catalog
//!     .load_str("MODEL_DEFINITION\n{\n name = tank\n height = 4\n mass = 1\n maxVerticalScale = 2\n}\n")
//!     .unwrap();
//!
//! let options = vec![ModelDefinitionLayoutOptions::single(catalog.get("tank").unwrap())];
//! let mut module =
//!     ModelModule::new("core", ModelOrientation::Top, options, &EngineSettings::default()).unwrap();
//! module.set_scale(2.0, 2.0);
//! assert_eq!(module.current_height(), 8.0);
//! assert!((module.module_mass() - 8.0).abs() < 1e-9);
//! ```

mod attach;
mod catalog;
mod compound;
mod definition;
mod error;
mod fields;
mod layout;
mod module;
mod nodes;
mod orientation;
mod profile;
mod recolor;
mod scene;
mod settings;
mod symmetry;

pub use attach::{default_node_size, AttachNodeBaseData, NODE_DISABLED};
pub use catalog::{DefinitionCatalog, TEXTURE_SET_RECORD};
pub use compound::{CompoundModelData, CompoundTransformDescriptor, SegmentPlacement};
pub use definition::{AncillaryData, MergeGroup, ModelDefinition, SubModelEntry, DEFINITION_RECORD};
pub use error::{ModelError, Result};
pub use layout::{
    LayoutCatalog, ModelDefinitionLayoutOptions, ModelLayout, ModelPositionData, DEFAULT_LAYOUT,
    LAYOUT_RECORD, USAGE_RECORD,
};
pub use module::{ModelModule, ModuleState, ModuleStatus};
pub use nodes::{AttachNodeHost, AttachNodes, AttachPoint, MatedPart};
pub use orientation::ModelOrientation;
pub use profile::is_subset;
pub use recolor::{
    decode_colors, encode_colors, Color, RecoloringData, TextureSet, TextureSetMaterial,
    TextureState, MASK_COLOR_PARAMS,
};
pub use scene::{AssetNode, MaterialValue, NodeId, SceneGraph, SceneHost, SceneNode};
pub use settings::{EngineSettings, ScalePowers};
pub use symmetry::{fan_out, SymmetryGroup};
