//! Shader module loading
//!
//! SPIR-V blobs are read from disk once per logical name and kept in a cache
//! until the pipeline that references them exists.

use ash::{vk, Device};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(|e| VulkanError::pipeline("shader module", e))?
        };

        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let words = read_spirv(path.as_ref())?;
        Self::from_words(device, &words)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Read a whole SPIR-V file into words.
///
/// Fails when the file cannot be opened, the read comes up short of the size
/// the file reported, or the contents are not a whole number of words.
pub fn read_spirv(path: &Path) -> VulkanResult<Vec<u32>> {
    let load_error = |reason: String| VulkanError::ShaderLoadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let mut file = File::open(path).map_err(|e| load_error(format!("cannot open: {e}")))?;
    let expected = file
        .metadata()
        .map_err(|e| load_error(format!("cannot stat: {e}")))?
        .len();

    let mut bytes = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut bytes)
        .map_err(|e| load_error(format!("read failed: {e}")))?;

    if (bytes.len() as u64) < expected {
        return Err(load_error(format!("short read: {} of {} bytes", bytes.len(), expected)));
    }

    ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(|e| load_error(e.to_string()))
}

/// Modules keyed by logical name.
///
/// Loading a name that is already cached returns the cached module without
/// touching the loader again.
pub struct ModuleCache<M> {
    modules: HashMap<String, M>,
}

impl<M> ModuleCache<M> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Return the module cached under `name`, loading it on first request
    pub fn get_or_load_with<F>(&mut self, name: &str, load: F) -> VulkanResult<&M>
    where
        F: FnOnce() -> VulkanResult<M>,
    {
        if !self.modules.contains_key(name) {
            let module = load()?;
            self.modules.insert(name.to_string(), module);
        }

        self.modules
            .get(name)
            .ok_or_else(|| VulkanError::PipelineCreationFailed {
                step: "shader cache",
                reason: format!("module {name} missing after load"),
            })
    }

    /// Cached module for `name`, if any
    pub fn get(&self, name: &str) -> Option<&M> {
        self.modules.get(name)
    }

    /// Number of cached modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drop every cached module
    pub fn clear(&mut self) {
        self.modules.clear();
    }
}

impl<M> Default for ModuleCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache of device shader modules
pub struct ShaderModuleCache {
    device: Device,
    cache: ModuleCache<ShaderModule>,
}

impl ShaderModuleCache {
    /// Create an empty cache for `device`
    pub fn new(device: Device) -> Self {
        Self {
            device,
            cache: ModuleCache::new(),
        }
    }

    /// Load the module at `path` under `name`, or return the cached one
    pub fn load_shader_module(&mut self, name: &str, path: impl AsRef<Path>) -> VulkanResult<vk::ShaderModule> {
        let device = &self.device;
        let path = path.as_ref();
        let module = self.cache.get_or_load_with(name, || {
            log::debug!("Loading shader {} from {}", name, path.display());
            ShaderModule::from_file(device.clone(), path)
        })?;
        Ok(module.handle())
    }

    /// Release every module; call once the pipeline referencing them exists
    pub fn clear(&mut self) {
        if !self.cache.is_empty() {
            log::debug!("Releasing {} shader module(s)", self.cache.len());
        }
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Write;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn test_read_spirv_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let path = write_file(dir.path(), "cube.vert.spv", &bytes);

        assert_eq!(read_spirv(&path).unwrap(), words.to_vec());
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.spv");

        match read_spirv(&path) {
            Err(VulkanError::ShaderLoadFailed { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected ShaderLoadFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_word_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0, 1]);
        let path = write_file(dir.path(), "truncated.spv", &bytes);

        let err = read_spirv(&path).unwrap_err();
        assert!(matches!(err, VulkanError::ShaderLoadFailed { .. }));
        assert_eq!(err.stage_tag(), "shader");
    }

    #[test]
    fn test_cache_loads_each_name_once() {
        let loads = Cell::new(0);
        let mut cache: ModuleCache<u64> = ModuleCache::new();

        let load = || {
            loads.set(loads.get() + 1);
            Ok(42)
        };
        let first = *cache.get_or_load_with("vert", load).unwrap();
        let second = *cache
            .get_or_load_with("vert", || {
                loads.set(loads.get() + 1);
                Ok(7)
            })
            .unwrap();

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(loads.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_reads_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let bytes: Vec<u8> = [SPIRV_MAGIC, 0x0001_0000].iter().flat_map(|w| w.to_le_bytes()).collect();
        let path = write_file(dir.path(), "cube.frag.spv", &bytes);

        let reads = Cell::new(0);
        let mut cache: ModuleCache<Vec<u32>> = ModuleCache::new();
        for _ in 0..2 {
            cache
                .get_or_load_with("frag", || {
                    reads.set(reads.get() + 1);
                    read_spirv(&path)
                })
                .unwrap();
        }

        // Deleting the file proves the second lookup never touched disk
        std::fs::remove_file(&path).unwrap();
        let cached = cache
            .get_or_load_with("frag", || {
                reads.set(reads.get() + 1);
                read_spirv(&path)
            })
            .unwrap();

        assert_eq!(reads.get(), 1);
        assert_eq!(cached[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut cache: ModuleCache<u32> = ModuleCache::new();
        let err = cache.get_or_load_with("vert", || {
            Err(VulkanError::ShaderLoadFailed {
                path: "missing.spv".into(),
                reason: "cannot open".to_string(),
            })
        });

        assert!(err.is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_load_with("vert", || Ok(3)).unwrap(), 3);
    }

    #[test]
    fn test_clear_empties_cache() {
        let mut cache: ModuleCache<u32> = ModuleCache::new();
        cache.get_or_load_with("vert", || Ok(1)).unwrap();
        cache.get_or_load_with("frag", || Ok(2)).unwrap();
        assert_eq!(cache.get("frag"), Some(&2));

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("vert").is_none());
    }
}
