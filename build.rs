#![forbid(unsafe_code)]

fn main() {
    // Reported by the version endpoint and the startup log.
    build_data::set_GIT_BRANCH();
    build_data::set_GIT_COMMIT_SHORT();
    build_data::set_GIT_DIRTY();
    build_data::set_SOURCE_TIMESTAMP();  // Using BUILD_TIMESTAMP makes build unreproducible.
    build_data::set_RUSTC_VERSION();
}
