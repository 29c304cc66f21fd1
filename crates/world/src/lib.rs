//! # Basalt World
//!
//! Block-state storage and its wire form.
//!
//! ## Features
//! - Block-state registry loaded from the data-generator block report
//! - Global and linear palettes
//! - Chunk sections that widen and promote their palette on demand
//! - Chunk columns and the Chunk Data packet

pub mod chunk;
pub mod error;
pub mod palette;
pub mod registry;
pub mod section;

pub use chunk::{ChunkColumn, ChunkData};
pub use error::{RegistryError, Result};
pub use palette::{LinearPalette, Palette};
pub use registry::{BlockState, BlockStateRegistry};
pub use section::ChunkSection;
