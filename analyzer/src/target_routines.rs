//! Selection of the routines and image to instrument

use symbolic_common::Name;
use symbolic_demangle::{Demangle, DemangleOptions};

/// Removes the directory part of an image path
pub fn strip_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Returns the bare routine name of a symbol: demangled without return type, parameters or
/// trailing template arguments.  Symbols that do not demangle are returned as they are.
pub fn undecorate(symbol: &str) -> String {
    let name = Name::from(symbol)
        .demangle(DemangleOptions::name_only())
        .unwrap_or_else(|| symbol.to_string());
    strip_template_args(name.trim()).to_string()
}

/// Removes the template argument list closing `name`, as in `foo<int>`
fn strip_template_args(name: &str) -> &str {
    let operators = ["operator>", "operator>>", "operator->"];
    if !name.ends_with('>') || operators.iter().any(|op| name.ends_with(op)) {
        return name;
    }
    let mut depth = 0usize;
    for (pos, c) in name.char_indices().rev() {
        match c {
            '>' => depth += 1,
            '<' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return name[..pos].trim_end();
                }
            }
            _ => {}
        }
    }
    name
}

/// Allow-list of routine names, plus an optional image filter
#[derive(Clone, Debug, Default)]
pub struct TargetRoutines {
    names: Vec<String>,
    image: Option<String>,
}

impl TargetRoutines {
    pub fn new<S: AsRef<str>>(names: &[S], image: Option<&str>) -> Self {
        Self {
            names: names.iter().map(|name| name.as_ref().trim().to_string()).collect(),
            image: image.map(|image| strip_path(image).to_string()),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True if routines of the image at `path` may be instrumented
    pub fn is_target_image(&self, path: &str) -> bool {
        match &self.image {
            Some(image) => strip_path(path) == image,
            None => true,
        }
    }

    /// Returns the undecorated name of `symbol` if it is in the allow-list
    pub fn match_symbol(&self, symbol: &str) -> Option<String> {
        let name = undecorate(symbol);
        self.names.iter().any(|target| *target == name).then_some(name)
    }
}
