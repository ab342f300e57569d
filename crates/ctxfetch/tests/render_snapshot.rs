use std::fs;
use std::sync::Arc;

use ctxfetch::infra::config::Config;
use ctxfetch::{FsFileSource, LineRange, Session};
use insta::assert_snapshot;

#[test]
fn rendered_document_layout() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("README.md"), "# Demo\n").expect("write readme");
    fs::write(
        temp.path().join("lib.rs"),
        "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\npub fn sub(a: i32, b: i32) -> i32 {\n    a - b\n}\n",
    )
    .expect("write lib");

    let source = Arc::new(FsFileSource::new(temp.path()));
    let session = Session::new(source.clone(), &Config::default());
    let lib = source.resolve("lib.rs");
    session.store().add_file(&source.resolve("README.md"));
    session
        .store()
        .add_snippet(&lib, LineRange::new(4, 6).expect("range"));
    session
        .store()
        .add_snippet(&lib, LineRange::new(0, 0).expect("range"));

    let rendered = session.generate();
    assert_snapshot!(rendered.text.trim_end(), @r###"
# --- Code context ---

## File: README.md:

```markdown
# Demo
```

## File: lib.rs:

### L1-1
```rust
pub fn add(a: i32, b: i32) -> i32 {
```

### L5-7
```rust
pub fn sub(a: i32, b: i32) -> i32 {
    a - b
}
```

# End of code context
"###);
}
