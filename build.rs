// build.rs

fn main() {
    // Generate build info
    vergen::EmitBuilder::builder()
        .all_build()
        .git_sha(true)
        .emit()
        .expect("Unable to generate build info");
}
