//! Name-to-cube lookup, built by the application at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Cube;
use crate::error::{CubeError, CubeResult};
use crate::query::normalize_code;

/// Cubes keyed by case-insensitive name.
///
/// Populated once and then shared read-only (wrap in `Arc` to share).
#[derive(Clone, Default)]
pub struct CubeRegistry {
    cubes: HashMap<String, Arc<dyn Cube>>,
}

impl CubeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the cube's own schema name. Returns the replaced cube.
    pub fn register(&mut self, cube: Arc<dyn Cube>) -> Option<Arc<dyn Cube>> {
        let name = cube.name().to_string();
        self.register_as(&name, cube)
    }

    pub fn register_as(&mut self, name: &str, cube: Arc<dyn Cube>) -> Option<Arc<dyn Cube>> {
        self.cubes.insert(normalize_code(name), cube)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Cube>> {
        self.cubes.get(&normalize_code(name)).cloned()
    }

    pub fn require(&self, name: &str) -> CubeResult<Arc<dyn Cube>> {
        self.get(name)
            .ok_or_else(|| CubeError::UnknownCube(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.cubes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.cubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cubes.is_empty()
    }
}

impl fmt::Debug for CubeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CubeRegistry")
            .field("cubes", &self.names())
            .finish()
    }
}
