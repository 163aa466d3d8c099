// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with some content.\n\n- Bullet point\n  - Nested item\n- Another item\n\n> Quoted line\n\n```rust\nfn example() {}\n```\n\n";
    base.repeat(size)
}

/// The same content with a new paragraph above every section, so stored paths
/// drift and resolution falls through to scoring.
#[allow(dead_code)]
pub fn generate_edited_content(size: usize) -> String {
    let base = "# Title\n\nInserted paragraph.\n\n## Section\n\nParagraph with some content.\n\n- New first bullet\n- Bullet point\n  - Nested item\n- Another item\n\n> Quoted line\n\n```rust\nfn example() {}\n```\n\n";
    base.repeat(size)
}
