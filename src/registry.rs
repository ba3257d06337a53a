use lazy_static::lazy_static;
use regex::Regex;

use crate::error::RebindError;

lazy_static! {
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

// Reserved in strict code, where a tracked name could never appear as a read.
const RESERVED_WORDS: [&str; 46] = [
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

fn is_target_name(name: &str) -> bool {
    IDENT_RE.is_match(name) && !RESERVED_WORDS.contains(&name)
}

pub const JS_TIMER_NAMES: [&str; 8] = [
    "setTimeout",
    "setInterval",
    "setImmediate",
    "clearTimeout",
    "clearInterval",
    "clearImmediate",
    "requestAnimationFrame",
    "cancelAnimationFrame",
];

const BUFFER_TEMPLATE: &str =
    "var _Buffer = typeof Buffer === 'undefined' ? require('buffer/').Buffer : Buffer";

const SLOW_BUFFER_TEMPLATE: &str =
    "var _SlowBuffer = typeof SlowBuffer === 'undefined' ? require('buffer/').SlowBuffer : SlowBuffer";

// Keeps a native-but-partial `process` (no `title`) by layering it over the
// browser polyfill, and pins `env.NODE_ENV`.
const PROCESS_TEMPLATE: &str = concat!(
    "var _process = (function(){",
    "    var res = typeof process === 'undefined' ? require('process/browser.js') : process;",
    "    if (!res.title) {",
    "        var polyfill = require('process/browser.js');",
    "        for (var key in res) {",
    "            polyfill[key] = res[key];",
    "        }",
    "        res = polyfill;",
    "    }",
    "    res.env = res.env || {};",
    "    if (!res.env.NODE_ENV) {",
    "      res.env.NODE_ENV = (typeof __DEV__ !== 'undefined' && __DEV__) ? 'development' : 'production';",
    "    }",
    "    return res;",
    "})();"
);

const JS_TIMERS_MODULE: &str = "react-native/Libraries/JavaScriptAppEngine/System/JSTimers/JSTimers";

fn timer_template(name: &str) -> String {
    format!(
        "var _timer = typeof {name} === \"undefined\" ? require(\"{JS_TIMERS_MODULE}\").{name} : {name};"
    )
}

/// A global the rebinder tracks, with the source of the declaration that
/// computes its runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    pub name: String,
    pub template: String,
}

/// Ordered table of tracked globals. Iteration order is the order in which
/// initializers are emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRegistry {
    entries: Vec<TargetName>,
}

impl TargetRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `Buffer`, `SlowBuffer`, `process` and the JS timer functions.
    pub fn node_globals() -> Self {
        let mut entries = vec![
            TargetName {
                name: "Buffer".into(),
                template: BUFFER_TEMPLATE.into(),
            },
            TargetName {
                name: "SlowBuffer".into(),
                template: SLOW_BUFFER_TEMPLATE.into(),
            },
            TargetName {
                name: "process".into(),
                template: PROCESS_TEMPLATE.into(),
            },
        ];
        entries.extend(JS_TIMER_NAMES.iter().map(|name| TargetName {
            name: (*name).to_string(),
            template: timer_template(name),
        }));
        Self { entries }
    }

    /// Adds `name`, or replaces its template in place when already tracked.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        template: impl Into<String>,
    ) -> Result<(), RebindError> {
        let name = name.into();
        if !is_target_name(&name) {
            return Err(RebindError::InvalidTargetName { name });
        }
        let template = template.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.template = template,
            None => self.entries.push(TargetName { name, template }),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<TargetName> {
        let idx = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(idx))
    }

    pub fn get(&self, name: &str) -> Option<&TargetName> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetName> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_globals_tracks_buffers_process_and_timers() {
        let registry = TargetRegistry::node_globals();
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(&names[..3], &["Buffer", "SlowBuffer", "process"]);
        assert_eq!(registry.len(), 3 + JS_TIMER_NAMES.len());
        for timer in JS_TIMER_NAMES {
            let entry = registry.get(timer).unwrap();
            assert!(entry.template.contains(&format!("typeof {timer} === \"undefined\"")));
            assert!(entry.template.contains(JS_TIMERS_MODULE));
        }
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut registry = TargetRegistry::node_globals();
        registry
            .insert("process", "var p = globalThis.process")
            .unwrap();
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names[2], "process");
        assert_eq!(registry.get("process").unwrap().template, "var p = globalThis.process");
    }

    #[test]
    fn insert_appends_new_names() {
        let mut registry = TargetRegistry::empty();
        registry.insert("global", "var g = globalThis").unwrap();
        registry.insert("$env", "var e = {}").unwrap();
        assert!(registry.contains("global"));
        assert!(registry.contains("$env"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn rejects_names_that_are_not_identifiers() {
        let mut registry = TargetRegistry::empty();
        let err = registry.insert("process.env", "var x = 1").unwrap_err();
        assert_eq!(
            err,
            RebindError::InvalidTargetName {
                name: "process.env".into()
            }
        );
        assert!(registry.insert("1st", "var x = 1").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_reserved_words() {
        let mut registry = TargetRegistry::empty();
        for word in ["typeof", "var", "class", "this", "yield"] {
            let err = registry.insert(word, "var x = 1").unwrap_err();
            assert_eq!(err, RebindError::InvalidTargetName { name: word.into() });
        }
        assert!(registry.is_empty());
        // Only exact words are reserved.
        registry.insert("typeofx", "var x = 1").unwrap();
        registry.insert("Class", "var x = 1").unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_drops_entry() {
        let mut registry = TargetRegistry::node_globals();
        let removed = registry.remove("setImmediate").unwrap();
        assert_eq!(removed.name, "setImmediate");
        assert!(!registry.contains("setImmediate"));
        assert!(registry.remove("setImmediate").is_none());
    }
}
