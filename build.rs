//! Purpose: Compile the C API test-double libraries used by the test suite.
//! Role: Cargo build-script; drives the `cc`-detected C compiler to link shared libraries.
//! Invariants: Paths are exported as `OKB_CAPI_STUB` and `OKB_CAPI_EMPTY` for tests.
//! Invariants: A missing C compiler only warns; the CLI itself has no C sources.
//! Invariants: Uses only Cargo-provided env vars (e.g. `OUT_DIR`, `TARGET`).
use std::env;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=tests/fixtures/capi_stub.c");
    println!("cargo:rerun-if-changed=tests/fixtures/capi_empty.c");

    let target = env::var("TARGET").unwrap_or_default();
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR"));
    let fixtures = manifest_dir.join("tests").join("fixtures");

    let stubs = [
        ("okb_capi_stub", "capi_stub.c", "OKB_CAPI_STUB"),
        ("okb_capi_empty", "capi_empty.c", "OKB_CAPI_EMPTY"),
    ];
    for (stem, source, env_key) in stubs {
        match build_shared_library(&target, &out_dir, &fixtures.join(source), stem) {
            Ok(path) => println!("cargo:rustc-env={env_key}={}", path.display()),
            Err(err) => println!("cargo:warning=skipping test library {stem}: {err}"),
        }
    }
}

fn shared_library_name(target: &str, stem: &str) -> String {
    if target.contains("windows") {
        format!("{stem}.dll")
    } else if target.contains("apple") {
        format!("lib{stem}.dylib")
    } else {
        format!("lib{stem}.so")
    }
}

fn build_shared_library(
    target: &str,
    out_dir: &Path,
    source: &Path,
    stem: &str,
) -> Result<PathBuf, String> {
    let compiler = cc::Build::new()
        .cargo_metadata(false)
        .try_get_compiler()
        .map_err(|err| err.to_string())?;
    let output = out_dir.join(shared_library_name(target, stem));

    let mut command = compiler.to_command();
    if compiler.is_like_msvc() {
        command
            .arg("/LD")
            .arg(source)
            .arg(format!("/Fo{}\\", out_dir.display()))
            .arg(format!("/Fe{}", output.display()));
    } else {
        command
            .arg("-shared")
            .arg("-fPIC")
            .arg(source)
            .arg("-o")
            .arg(&output);
    }

    let status = command
        .status()
        .map_err(|err| format!("failed to run C compiler: {err}"))?;
    if !status.success() {
        return Err(format!("C compiler exited with {status}"));
    }
    Ok(output)
}
