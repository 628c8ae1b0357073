//! Build script for vfs-dircache.

/// Expose the commit the binary was built from as `VERGEN_GIT_SHA`.
///
/// Builds outside a git checkout (release tarballs, some CI runners) can pass
/// the SHA through the `GIT_SHA` environment variable instead.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    match std::env::var("GIT_SHA") {
        Ok(sha) => println!("cargo:rustc-env=VERGEN_GIT_SHA={sha}"),
        Err(_) => {
            let gitcl = vergen_gitcl::GitclBuilder::default().sha(true).build()?;
            vergen_gitcl::Emitter::default()
                .add_instructions(&gitcl)?
                .emit()?;
        }
    }
    Ok(())
}
