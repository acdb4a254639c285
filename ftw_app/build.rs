// build.rs
// Compiles the GLSL sources under resources/shaders into target/shaders/*.spv

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const STAGE_EXTENSIONS: [&str; 2] = ["vert", "frag"];

/// Compile every shader in `shader_dir` whose output is missing or stale
fn compile_shaders(shader_dir: &Path, target_dir: &Path, glslc: &Path) -> usize {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            eprintln!("info: No shader directory found at: {:?}", shader_dir);
            return 0;
        }
    };

    let mut compiled = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let is_stage = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| STAGE_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_stage {
            continue;
        }

        // cube.vert -> cube.vert.spv, so stages sharing a stem don't collide
        let out_file = target_dir.join(format!("{file_name}.spv"));

        let up_to_date = match (std::fs::metadata(&path), std::fs::metadata(&out_file)) {
            (Ok(src), Ok(dst)) => match (src.modified(), dst.modified()) {
                (Ok(src), Ok(dst)) => dst >= src,
                _ => false,
            },
            _ => false,
        };
        if up_to_date {
            eprintln!("info: Shader {} is up to date", file_name);
            continue;
        }

        let status = Command::new(glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: Compiled {} -> {:?}", file_name, out_file);
                compiled += 1;
            }
            Ok(s) => {
                panic!("glslc failed for {:?} with exit code {}", path, s.code().unwrap_or(-1));
            }
            Err(e) => {
                panic!("Failed to run glslc for {:?}: {}", path, e);
            }
        }
    }
    compiled
}

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let workspace_root = manifest_dir.parent().map_or_else(|| manifest_dir.clone(), Path::to_path_buf);
    let shader_dir = workspace_root.join("resources/shaders");
    let target_dir = workspace_root.join("target/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
        eprintln!("hint: Install the Vulkan SDK or place cube.vert.spv/cube.frag.spv in target/shaders");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        Path::new(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        Path::new(&vulkan_sdk).join("bin").join("glslc")
    };

    if !glslc.exists() {
        eprintln!("warning: glslc not found at {:?}, shader compilation skipped", glslc);
        return;
    }

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        eprintln!("warning: Failed to create {:?}: {}", target_dir, e);
        return;
    }

    let compiled = compile_shaders(&shader_dir, &target_dir, &glslc);
    if compiled > 0 {
        eprintln!("info: Successfully compiled {} shader(s)", compiled);
    } else {
        eprintln!("info: All shaders are up to date");
    }
}
