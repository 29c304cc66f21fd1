//! Block-state registry
//!
//! The server-wide, startup-fixed list of every block state. Global palette
//! ids are positions in this list, which the loader checks are equal to the
//! report's state ids.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::error::{RegistryError, Result};

/// Names treated as air when counting non-air blocks
const AIR_BLOCKS: [&str; 3] = ["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

/// A block state, identified by its global id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState(u32);

impl BlockState {
    pub const fn from_id(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Metadata for one registered state
#[derive(Debug, Clone)]
pub struct StateInfo {
    pub name: String,
    pub properties: BTreeMap<String, String>,
    pub default: bool,
}

#[derive(Debug, Deserialize)]
struct BlockReport {
    states: Vec<StateReport>,
}

#[derive(Debug, Deserialize)]
struct StateReport {
    id: u32,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

/// Block State Registry
///
/// # Thread Safety
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct BlockStateRegistry {
    /// Indexed by global id
    states: Vec<StateInfo>,

    /// Default state per block name
    defaults: HashMap<String, BlockState>,

    air: HashSet<BlockState>,
}

impl BlockStateRegistry {
    /// Parse a data-generator block report
    ///
    /// # Format
    /// ```json
    /// {"minecraft:stone": {"states": [{"id": 1, "default": true}]}}
    /// ```
    pub fn from_report_json(json: &str) -> Result<Self> {
        let report: HashMap<String, BlockReport> =
            serde_json::from_str(json).map_err(|e| RegistryError::InvalidFormat(e.to_string()))?;

        let mut flat: Vec<(u32, StateInfo)> = report
            .into_iter()
            .flat_map(|(name, block)| {
                block.states.into_iter().map(move |state| {
                    (
                        state.id,
                        StateInfo {
                            name: name.clone(),
                            properties: state.properties,
                            default: state.default,
                        },
                    )
                })
            })
            .collect();
        flat.sort_by_key(|(id, _)| *id);

        for (index, (id, _)) in flat.iter().enumerate() {
            if *id as usize != index {
                return Err(RegistryError::InvalidFormat(format!(
                    "State ids are not contiguous: expected {}, found {}",
                    index, id
                )));
            }
        }

        Self::build(flat.into_iter().map(|(_, info)| info).collect())
    }

    /// Load a block report from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_report_json(&json)?;
        tracing::info!("Loaded {} block states from {}", registry.len(), path.display());
        Ok(registry)
    }

    /// One property-less state per name, ids in the given order
    pub fn from_names(names: &[&str]) -> Result<Self> {
        Self::build(
            names
                .iter()
                .map(|name| StateInfo {
                    name: name.to_string(),
                    properties: BTreeMap::new(),
                    default: true,
                })
                .collect(),
        )
    }

    fn build(states: Vec<StateInfo>) -> Result<Self> {
        if states.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut defaults = HashMap::new();
        let mut air = HashSet::new();
        for (id, info) in states.iter().enumerate() {
            let state = BlockState(id as u32);
            if info.default || !defaults.contains_key(&info.name) {
                defaults.insert(info.name.clone(), state);
            }
            if AIR_BLOCKS.contains(&info.name.as_str()) {
                air.insert(state);
            }
        }

        Ok(Self { states, defaults, air })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn contains(&self, state: BlockState) -> bool {
        (state.0 as usize) < self.states.len()
    }

    /// Global palette id of `state`
    pub fn index_of(&self, state: BlockState) -> Option<u32> {
        self.contains(state).then_some(state.0)
    }

    /// State at a global palette id
    pub fn state_at(&self, index: u32) -> Option<BlockState> {
        let state = BlockState(index);
        self.contains(state).then_some(state)
    }

    pub fn info(&self, state: BlockState) -> Option<&StateInfo> {
        self.states.get(state.0 as usize)
    }

    /// Default state of a block, e.g. `minecraft:stone`
    pub fn default_state(&self, name: &str) -> Option<BlockState> {
        self.defaults.get(name).copied()
    }

    pub fn is_air(&self, state: BlockState) -> bool {
        self.air.contains(&state)
    }

    /// The state new sections are filled with
    pub fn air(&self) -> BlockState {
        self.default_state(AIR_BLOCKS[0]).unwrap_or(BlockState(0))
    }

    /// Bits needed to index every state: `ceil(log2(len))`
    pub fn bits_per_entry(&self) -> u8 {
        bits_for(self.states.len())
    }
}

/// Bits needed to represent `count` distinct values
pub(crate) fn bits_for(count: usize) -> u8 {
    if count <= 1 {
        return 0;
    }
    (usize::BITS - (count - 1).leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const REPORT: &str = r#"{
        "minecraft:air": {"states": [{"id": 0, "default": true}]},
        "minecraft:stone": {"states": [{"id": 1, "default": true}]},
        "minecraft:grass_block": {
            "properties": {"snowy": ["true", "false"]},
            "states": [
                {"id": 2, "properties": {"snowy": "true"}},
                {"id": 3, "default": true, "properties": {"snowy": "false"}}
            ]
        }
    }"#;

    #[test]
    fn test_parse_report() {
        let registry = BlockStateRegistry::from_report_json(REPORT).unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.default_state("minecraft:stone"), Some(BlockState::from_id(1)));
        assert_eq!(registry.default_state("minecraft:grass_block"), Some(BlockState::from_id(3)));
        assert_eq!(registry.info(BlockState::from_id(2)).unwrap().properties["snowy"], "true");
        assert!(registry.is_air(registry.air()));
        assert!(!registry.is_air(BlockState::from_id(1)));
    }

    #[test]
    fn test_gap_in_ids() {
        let report = r#"{"minecraft:air": {"states": [{"id": 0}]}, "minecraft:stone": {"states": [{"id": 5}]}}"#;
        assert!(matches!(
            BlockStateRegistry::from_report_json(report),
            Err(RegistryError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_empty_registry() {
        assert!(matches!(BlockStateRegistry::from_names(&[]), Err(RegistryError::Empty)));
    }

    #[test]
    fn test_index_roundtrip() {
        let registry = BlockStateRegistry::from_names(&["minecraft:air", "minecraft:stone"]).unwrap();
        let stone = registry.default_state("minecraft:stone").unwrap();
        assert_eq!(registry.index_of(stone), Some(1));
        assert_eq!(registry.state_at(1), Some(stone));
        assert_eq!(registry.state_at(2), None);
        assert_eq!(registry.index_of(BlockState::from_id(9)), None);
    }

    #[test]
    fn test_bits_per_entry() {
        assert_eq!(bits_for(1), 0);
        assert_eq!(bits_for(2), 1);
        assert_eq!(bits_for(16), 4);
        assert_eq!(bits_for(17), 5);
        assert_eq!(bits_for(300), 9);
        assert_eq!(bits_for(17_112), 15);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(REPORT.as_bytes()).unwrap();

        let registry = BlockStateRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 4);
    }
}
