//! WGSL shader compilation with injected constants
//!
//! Shader sources reference culling constants (`TILE_X_DIM`, `Z_BIN_COUNT`,
//! ...) without defining them; the library prepends a generated preamble so
//! CPU and GPU always agree on the values. Compilation runs once at startup
//! under a validation error scope so failures surface as typed errors with
//! the compiler's diagnostic log attached.

use std::collections::HashMap;
use std::sync::Arc;

use crate::constants::{
    EMPTY_Z_BIN, LIGHTS_PER_GROUP, MAX_CS_THREAD_COUNT, MAX_LIGHT_BATCH_COUNT,
    SPOT_LIGHT_CULLING_DATA_STRIDE, SPOT_LIGHT_TRIANGLE_COUNT, TILES_PER_GROUP,
    TILE_CULLING_DATA_STRIDE, TILE_X_DIM, TILE_Y_DIM, Z_BINNING_GROUP_SIZE, Z_BIN_COUNT,
};
use crate::error::{EngineError, EngineResult};

/// The macro set recognized by the culling shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderMacro {
    TileXDim,
    TileYDim,
    ZBinCount,
    MaxCsThreadCount,
    ZBinningGroupSize,
    LightsPerGroup,
    TilesPerGroup,
}

impl ShaderMacro {
    pub fn name(self) -> &'static str {
        match self {
            ShaderMacro::TileXDim => "TILE_X_DIM",
            ShaderMacro::TileYDim => "TILE_Y_DIM",
            ShaderMacro::ZBinCount => "Z_BIN_COUNT",
            ShaderMacro::MaxCsThreadCount => "MAX_CS_THREAD_COUNT",
            ShaderMacro::ZBinningGroupSize => "Z_BINNING_GROUP_SIZE",
            ShaderMacro::LightsPerGroup => "LIGHTS_PER_GROUP",
            ShaderMacro::TilesPerGroup => "TILES_PER_GROUP",
        }
    }

    pub fn value(self) -> u32 {
        match self {
            ShaderMacro::TileXDim => TILE_X_DIM,
            ShaderMacro::TileYDim => TILE_Y_DIM,
            ShaderMacro::ZBinCount => Z_BIN_COUNT,
            ShaderMacro::MaxCsThreadCount => MAX_CS_THREAD_COUNT,
            ShaderMacro::ZBinningGroupSize => Z_BINNING_GROUP_SIZE,
            ShaderMacro::LightsPerGroup => LIGHTS_PER_GROUP,
            ShaderMacro::TilesPerGroup => TILES_PER_GROUP,
        }
    }
}

/// The default macros every culling shader receives.
pub fn default_shader_macros() -> Vec<ShaderMacro> {
    vec![
        ShaderMacro::TileXDim,
        ShaderMacro::TileYDim,
        ShaderMacro::ZBinCount,
    ]
}

/// Generate the WGSL constants preamble for a macro set. Derived constants
/// (batch count, sentinels, strides) are always emitted alongside.
pub fn generate_wgsl_preamble(macros: &[ShaderMacro]) -> String {
    let debug_value: u32 = if cfg!(debug_assertions) { 1 } else { 0 };

    let mut preamble = String::from("// Generated constants - do not edit\n");
    preamble.push_str(&format!("const DEBUG: u32 = {}u;\n", debug_value));

    for macro_def in macros {
        preamble.push_str(&format!(
            "const {}: u32 = {}u;\n",
            macro_def.name(),
            macro_def.value()
        ));
    }

    preamble.push_str(&format!("const EMPTY_Z_BIN: u32 = {}u;\n", EMPTY_Z_BIN));
    preamble.push_str(&format!(
        "const MAX_LIGHT_BATCH_COUNT: u32 = {}u;\n",
        MAX_LIGHT_BATCH_COUNT
    ));
    preamble.push_str(&format!(
        "const SPOT_LIGHT_CULLING_DATA_STRIDE: u32 = {}u;\n",
        SPOT_LIGHT_CULLING_DATA_STRIDE
    ));
    preamble.push_str(&format!(
        "const SPOT_LIGHT_TRIANGLE_COUNT: u32 = {}u;\n",
        SPOT_LIGHT_TRIANGLE_COUNT
    ));
    preamble.push_str(&format!(
        "const TILE_CULLING_DATA_STRIDE: u32 = {}u;\n",
        TILE_CULLING_DATA_STRIDE
    ));
    preamble.push('\n');
    preamble
}

/// Compiles and caches shader modules. Shaders are compiled once; there is
/// no runtime reload.
pub struct ShaderLibrary {
    device: Arc<wgpu::Device>,
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        Self {
            device,
            modules: HashMap::new(),
        }
    }

    /// Compile `source` with the given macro set, or return the cached
    /// module compiled under the same name.
    pub fn compile(
        &mut self,
        name: &str,
        source: &str,
        macros: &[ShaderMacro],
    ) -> EngineResult<Arc<wgpu::ShaderModule>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(Arc::clone(module));
        }

        let full_source = format!("{}{}", generate_wgsl_preamble(macros), source);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(full_source.into()),
            });
        let compile_error = pollster::block_on(self.device.pop_error_scope());

        if let Some(error) = compile_error {
            log::error!("[ShaderLibrary::compile] {} failed:\n{}", name, error);
            return Err(EngineError::ShaderCompile {
                shader: name.to_string(),
                log: error.to_string(),
            });
        }

        log::info!("[ShaderLibrary::compile] Compiled shader '{}'", name);
        let module = Arc::new(module);
        self.modules.insert(name.to_string(), Arc::clone(&module));
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_contains_requested_macros() {
        let preamble = generate_wgsl_preamble(&[ShaderMacro::TileXDim, ShaderMacro::ZBinCount]);
        assert!(preamble.contains("const TILE_X_DIM: u32 = 32u;"));
        assert!(preamble.contains("const Z_BIN_COUNT: u32 = 1024u;"));
        assert!(preamble.contains("const MAX_LIGHT_BATCH_COUNT: u32 = 313u;"));
    }

    #[test]
    fn preamble_always_defines_debug() {
        let preamble = generate_wgsl_preamble(&[]);
        assert!(preamble.contains("const DEBUG: u32 ="));
    }
}
