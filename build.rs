use std::path::Path;

fn main() {
    // Tell Cargo to re-run this build script if layouts/ changes
    println!("cargo:rerun-if-changed=layouts/");

    // include_dir! in config::loader fails to compile if the directory is missing
    let layouts = Path::new("layouts");
    if !layouts.exists() {
        std::fs::create_dir_all(layouts).expect("Failed to create layouts directory");
    }
}
