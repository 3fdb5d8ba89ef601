// SPDX-License-Identifier: Apache-2.0

#[cfg(feature = "tflite")]
mod native {
    use std::{
        env,
        path::{Path, PathBuf},
    };

    /// Native libraries needed by the `tflite` feature, as (pkg-config name,
    /// fallback link name).
    const NATIVE_LIBS: &[(&str, &str)] = &[
        ("tensorflowlite_c", "tensorflowlite_c"),
        ("edgetpu", "edgetpu"),
        ("tensorflowlite_gpu_delegate", "tensorflowlite_gpu_delegate"),
    ];

    /// Links the native libraries and returns the include paths pkg-config
    /// reported for them.
    fn link_native_libs() -> Vec<PathBuf> {
        if let Ok(dir) = env::var("RUNECORAL_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
        }

        let mut include_paths = Vec::new();
        for (pkg, lib) in NATIVE_LIBS {
            match pkg_config::Config::new().probe(pkg) {
                Ok(library) => include_paths.extend(library.include_paths),
                // Fall back to a plain link directive when there is no .pc file,
                // e.g. for libraries unpacked from a prebuilt bundle
                Err(_) => {
                    println!("cargo:warning=pkg-config could not find {}, linking -l{}", pkg, lib);
                    println!("cargo:rustc-link-lib={}", lib);
                }
            }
        }

        if let Ok(dir) = env::var("RUNECORAL_INCLUDE_DIR") {
            include_paths.push(PathBuf::from(dir));
        }
        include_paths
    }

    /// Generates `OUT_DIR/tflite_bindings.rs` from `wrapper.h`.
    fn generate_bindings(include_paths: &[PathBuf], out_dir: &Path) {
        let bindings = bindgen::Builder::default()
            .header("wrapper.h")
            .clang_args(
                include_paths
                    .iter()
                    .map(|path| format!("-I{}", path.display())),
            )
            .allowlist_function("TfLite(Model|InterpreterOptions|Interpreter|Tensor)[A-Za-z]*")
            .allowlist_function("TfLiteGpuDelegateV2(Create|Delete)")
            .allowlist_function("edgetpu_.*")
            .allowlist_type("edgetpu_device_type")
            .prepend_enum_name(false)
            .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
            .derive_default(true)
            .generate()
            .expect("Unable to generate TensorFlow Lite bindings");

        bindings
            .write_to_file(out_dir.join("tflite_bindings.rs"))
            .expect("Couldn't write TensorFlow Lite bindings");
    }

    /// Writes `runecoral.h` for the exported C ABI to `OUT_DIR`.
    fn generate_header(out_dir: &Path) {
        let crate_dir = match env::var("CARGO_MANIFEST_DIR") {
            Ok(crate_dir) => crate_dir,
            Err(_) => return,
        };

        let header = cbindgen::Builder::new()
            .with_crate(crate_dir)
            .with_language(cbindgen::Language::C)
            .with_include_guard("RUNECORAL_H")
            .with_define("feature", "tflite", "RUNECORAL_TFLITE")
            .generate();

        match header {
            Ok(header) => {
                header.write_to_file(out_dir.join("runecoral.h"));
            }
            Err(e) => println!("cargo:warning=Could not generate runecoral.h: {}", e),
        }
    }

    pub fn build() {
        let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
        let include_paths = link_native_libs();
        generate_bindings(&include_paths, &out_dir);
        generate_header(&out_dir);
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=wrapper.h");
    println!("cargo:rerun-if-changed=src/capi.rs");
    println!("cargo:rerun-if-env-changed=RUNECORAL_LIB_DIR");
    println!("cargo:rerun-if-env-changed=RUNECORAL_INCLUDE_DIR");

    // Nothing to link, bind or export unless the native engine is requested
    #[cfg(feature = "tflite")]
    native::build();
}
