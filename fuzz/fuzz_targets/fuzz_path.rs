// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for VirtualPath parsing, child validation and rebasing

#![no_main]

use arbitrary::Arbitrary;
use arbor_core::path::VirtualPath;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    uri: &'a str,
    backend: &'a str,
    path: &'a str,
    child: &'a str,
    onto: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let _ = VirtualPath::parse_uri(input.uri);

    let vpath = VirtualPath::new(input.backend, input.path);
    assert!(vpath.segments.iter().all(|s| !s.is_empty() && s != "." && s != ".." && !s.contains('/')));

    if !input.backend.is_empty() && !input.backend.contains('/') {
        let reparsed = VirtualPath::parse_uri(&vpath.to_uri());
        assert_eq!(reparsed.as_ref(), Some(&vpath));
    }

    let _ = vpath.name();
    let _ = vpath.extension();
    if let Some(parent) = vpath.parent() {
        assert_eq!(parent.segments.len() + 1, vpath.segments.len());
    }

    if let Ok(child) = vpath.child(input.child) {
        assert_eq!(child.parent().as_ref(), Some(&vpath));
        assert_eq!(child.name(), Some(input.child));

        let onto = VirtualPath::new("fuzz", input.onto);
        let moved = child.rebase(&vpath, &onto);
        assert_eq!(moved.and_then(|m| m.name().map(str::to_owned)).as_deref(), Some(input.child));
    }
});
