//! Reference module loaders
//!
//! [`MemoryLoader`] keeps module bodies as closures keyed by absolute path and
//! lets callers swap a body at runtime, which is how embedders and tests
//! simulate an edited file. [`FileLoader`] reads small line-oriented module
//! files from disk:
//!
//! ```text
//! # counter.qr
//! require ./format.qr
//! accept
//! export label = "clicks"
//! export count = 0
//! keep count
//! class Widget
//! method render = "v1"
//! static instances = 0
//! ```
//!
//! `keep` names exports whose values survive reloads through the module's
//! stash. `class` starts a class exported under its name; the `method` and
//! `static` lines that follow attach to it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use super::hooks::{ModuleLoader, ModuleScope};
use super::ModuleId;
use crate::error::{Error, Result};
use crate::runtime::Value;

/// Body of an in-memory module
pub type ModuleBody = Rc<dyn Fn(&mut ModuleScope<'_>) -> Result<()>>;

/// Lexically normalize a path, resolving `.` and `..` without touching disk
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Base directory for resolving a relative specifier
fn referrer_dir(referrer: Option<&ModuleId>, fallback: &Path) -> PathBuf {
    referrer
        .and_then(|r| r.as_path().parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf())
}

fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// In-memory module loader
pub struct MemoryLoader {
    base_dir: PathBuf,
    modules: RefCell<BTreeMap<ModuleId, ModuleBody>>,
    executions: RefCell<BTreeMap<ModuleId, usize>>,
}

impl std::fmt::Debug for MemoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLoader")
            .field("base_dir", &self.base_dir)
            .field("modules", &self.modules.borrow().keys().collect::<Vec<_>>())
            .field("executions", &self.executions)
            .finish()
    }
}

impl MemoryLoader {
    /// Create a loader resolving top-level relative specifiers against `/`
    pub fn new() -> Self {
        Self::with_base_dir(PathBuf::from("/"))
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            modules: RefCell::new(BTreeMap::new()),
            executions: RefCell::new(BTreeMap::new()),
        }
    }

    /// Define or replace the body of the module at `path`
    pub fn define<F>(&self, path: &str, body: F)
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<()> + 'static,
    {
        let id = ModuleId::from_path(normalize_path(Path::new(path)));
        self.modules.borrow_mut().insert(id, Rc::new(body));
    }

    /// How many times the body of `path` has run
    pub fn executions(&self, path: &str) -> usize {
        self.executions
            .borrow()
            .get(&ModuleId::from(path))
            .copied()
            .unwrap_or(0)
    }
}

impl Default for MemoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for MemoryLoader {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<ModuleId> {
        let path = if specifier.starts_with('/') {
            PathBuf::from(specifier)
        } else if is_relative_specifier(specifier) {
            referrer_dir(referrer, &self.base_dir).join(specifier)
        } else {
            return Err(Error::ModuleError(format!(
                "bare specifiers are not supported: {}",
                specifier
            )));
        };

        let id = ModuleId::from_path(normalize_path(&path));
        if self.modules.borrow().contains_key(&id) {
            Ok(id)
        } else {
            Err(Error::ModuleNotFound(specifier.to_string()))
        }
    }

    fn execute(&self, scope: &mut ModuleScope<'_>) -> Result<()> {
        let body = self.modules.borrow().get(scope.id()).cloned();
        let body = body.ok_or_else(|| Error::ModuleNotFound(scope.id().to_string()))?;
        *self
            .executions
            .borrow_mut()
            .entry(scope.id().clone())
            .or_insert(0) += 1;
        body(scope)
    }
}

/// Extension tried when a specifier does not name an existing file
pub const DEFAULT_EXTENSION: &str = "qr";

/// One line of a module file
#[derive(Debug, Clone, PartialEq)]
enum Directive {
    Require(String),
    Accept,
    Export(String, serde_json::Value),
    Keep(String),
    Class(String),
    Method(String, serde_json::Value),
    Static(String, serde_json::Value),
}

fn parse_assignment(rest: &str, line_no: usize) -> Result<(String, serde_json::Value)> {
    let (name, literal) = rest.split_once('=').ok_or_else(|| {
        Error::ModuleError(format!("line {}: expected `name = value`", line_no))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::ModuleError(format!("line {}: missing name", line_no)));
    }
    let literal = serde_json::from_str(literal.trim())
        .map_err(|e| Error::ModuleError(format!("line {}: invalid literal: {}", line_no, e)))?;
    Ok((name.to_string(), literal))
}

fn parse_module(source: &str) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let directive = match keyword {
            "require" if !rest.is_empty() => Directive::Require(rest.to_string()),
            "accept" => Directive::Accept,
            "keep" if !rest.is_empty() => Directive::Keep(rest.to_string()),
            "class" if !rest.is_empty() => Directive::Class(rest.to_string()),
            "export" => {
                let (name, value) = parse_assignment(rest, line_no)?;
                Directive::Export(name, value)
            }
            "method" => {
                let (name, value) = parse_assignment(rest, line_no)?;
                Directive::Method(name, value)
            }
            "static" => {
                let (name, value) = parse_assignment(rest, line_no)?;
                Directive::Static(name, value)
            }
            _ => {
                return Err(Error::ModuleError(format!(
                    "line {}: unknown directive `{}`",
                    line_no, line
                )))
            }
        };
        directives.push(directive);
    }
    Ok(directives)
}

/// Convert a JSON literal to a runtime value (primitives only)
pub fn literal_to_value(literal: &serde_json::Value) -> Result<Value> {
    match literal {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => Ok(Value::Number(n.as_f64().unwrap_or(f64::NAN))),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(Error::type_error(format!(
            "only primitive literals are supported, got {}",
            other
        ))),
    }
}

/// Convert a primitive runtime value to a JSON literal
pub fn value_to_literal(value: &Value) -> serde_json::Value {
    match value {
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        _ => serde_json::Value::Null,
    }
}

/// Loader for line-oriented module files on disk
#[derive(Debug, Clone)]
pub struct FileLoader {
    base_dir: PathBuf,
}

impl FileLoader {
    pub fn new() -> Self {
        Self {
            base_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn canonical(path: &Path) -> Result<ModuleId> {
        let canonical = path.canonicalize()?;
        Ok(ModuleId::from_path(canonical))
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for FileLoader {
    fn resolve(&self, specifier: &str, referrer: Option<&ModuleId>) -> Result<ModuleId> {
        let candidate = if Path::new(specifier).is_absolute() {
            PathBuf::from(specifier)
        } else if is_relative_specifier(specifier) || referrer.is_none() {
            referrer_dir(referrer, &self.base_dir).join(specifier)
        } else {
            return Err(Error::ModuleError(format!(
                "bare specifiers are not supported: {}",
                specifier
            )));
        };

        if candidate.is_file() {
            return Self::canonical(&candidate);
        }
        if candidate.extension().is_none() {
            let with_ext = candidate.with_extension(DEFAULT_EXTENSION);
            if with_ext.is_file() {
                return Self::canonical(&with_ext);
            }
        }
        Err(Error::ModuleNotFound(specifier.to_string()))
    }

    fn execute(&self, scope: &mut ModuleScope<'_>) -> Result<()> {
        let source = std::fs::read_to_string(scope.id().as_path())?;
        let directives = parse_module(&source)?;
        let hot = scope.hot().cloned();
        let mut current_class: Option<Value> = None;
        let mut kept = Vec::new();

        for directive in directives {
            match directive {
                Directive::Require(specifier) => {
                    scope.require(&specifier)?;
                }
                Directive::Accept => {
                    if let Some(hot) = &hot {
                        hot.accept();
                    }
                }
                Directive::Export(name, literal) => {
                    scope.export(&name, literal_to_value(&literal)?)?;
                }
                Directive::Keep(name) => kept.push(name),
                Directive::Class(name) => {
                    let class = Value::new_class(name.clone());
                    scope.export(&name, class.clone())?;
                    current_class = Some(class);
                }
                Directive::Method(name, literal) => {
                    let class = current_class.as_ref().ok_or_else(|| {
                        Error::ModuleError(format!("method `{}` outside of a class", name))
                    })?;
                    let result = literal_to_value(&literal)?;
                    class.define_method(&name, move |_, _| Ok(result.clone()))?;
                }
                Directive::Static(name, literal) => {
                    let class = current_class.as_ref().ok_or_else(|| {
                        Error::ModuleError(format!("static `{}` outside of a class", name))
                    })?;
                    class.set(&name, literal_to_value(&literal)?)?;
                }
            }
        }

        let Some(hot) = hot else {
            return Ok(());
        };
        if kept.is_empty() {
            // Replace the store handler of an earlier load that still had `keep` lines
            hot.store(|_| Ok(()));
            return Ok(());
        }

        let exports = scope.exports();
        hot.restore(|data| {
            for name in &kept {
                if let Some(json) = data.get::<String>(name)? {
                    let literal: serde_json::Value = serde_json::from_str(&json)
                        .map_err(|e| Error::SerializationError(e.to_string()))?;
                    exports.set(name, literal_to_value(&literal)?)?;
                }
            }
            Ok(())
        })?;

        let stored = exports.clone();
        hot.store(move |data| {
            for name in &kept {
                let literal = value_to_literal(&stored.get(name));
                data.set(name, &literal.to_string())?;
            }
            Ok(())
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/app/src/../lib/./a.js")),
            PathBuf::from("/app/lib/a.js")
        );
    }

    #[test]
    fn test_memory_loader_resolution() {
        let loader = MemoryLoader::new();
        loader.define("/app/lib/a.js", |_| Ok(()));
        loader.define("/app/main.js", |_| Ok(()));

        let main = ModuleId::from("/app/main.js");
        assert_eq!(
            loader.resolve("./lib/a.js", Some(&main)).unwrap(),
            ModuleId::from("/app/lib/a.js")
        );
        assert_eq!(
            loader.resolve("../main.js", Some(&ModuleId::from("/app/lib/a.js"))).unwrap(),
            main
        );
        assert!(matches!(
            loader.resolve("./missing.js", Some(&main)),
            Err(Error::ModuleNotFound(_))
        ));
        assert!(matches!(
            loader.resolve("lodash", Some(&main)),
            Err(Error::ModuleError(_))
        ));
    }

    #[test]
    fn test_parse_module() {
        let directives = parse_module(
            "# comment\nrequire ./b.qr\naccept\nexport count = 3\nclass Widget\nmethod render = \"v1\"\nstatic total = 0\nkeep count\n",
        )
        .unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Require("./b.qr".to_string()),
                Directive::Accept,
                Directive::Export("count".to_string(), serde_json::json!(3)),
                Directive::Class("Widget".to_string()),
                Directive::Method("render".to_string(), serde_json::json!("v1")),
                Directive::Static("total".to_string(), serde_json::json!(0)),
                Directive::Keep("count".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_module_errors() {
        assert!(parse_module("frobnicate").is_err());
        assert!(parse_module("export count").is_err());
        assert!(parse_module("export count = nope").is_err());
    }

    #[test]
    fn test_literal_conversion() {
        assert_eq!(literal_to_value(&serde_json::json!(1.5)).unwrap(), Value::Number(1.5));
        assert_eq!(literal_to_value(&serde_json::json!("x")).unwrap(), Value::from("x"));
        assert!(literal_to_value(&serde_json::json!([1])).is_err());
        assert_eq!(value_to_literal(&Value::Boolean(true)), serde_json::json!(true));
        assert_eq!(value_to_literal(&Value::Undefined), serde_json::Value::Null);
    }
}
