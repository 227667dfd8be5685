//! Named runtime tweakables.
//!
//! Render code reads values by name with a default; the first read
//! registers the value so an editor panel can list and change it. Commands
//! are one-shot booleans: [`DebugValues::trigger`] arms one and the next
//! [`DebugValues::command`] call consumes it.

use std::collections::BTreeMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebugValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl DebugValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }
}

impl From<bool> for DebugValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for DebugValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for DebugValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Thread-safe registry of debug values and commands.
#[derive(Debug, Default)]
pub struct DebugValues {
    values: RwLock<BTreeMap<String, DebugValue>>,
    commands: RwLock<BTreeMap<String, bool>>,
}

impl DebugValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `name` is registered with another type.
    pub fn bool_value(&self, name: &str, default: bool) -> bool {
        match self.read_or_register(name, DebugValue::Bool(default)) {
            DebugValue::Bool(value) => value,
            other => mismatch(name, "bool", &other),
        }
    }

    /// # Panics
    ///
    /// Panics if `name` is registered with another type.
    pub fn int_value(&self, name: &str, default: i64) -> i64 {
        match self.read_or_register(name, DebugValue::Int(default)) {
            DebugValue::Int(value) => value,
            other => mismatch(name, "int", &other),
        }
    }

    /// # Panics
    ///
    /// Panics if `name` is registered with another type.
    pub fn float_value(&self, name: &str, default: f64) -> f64 {
        match self.read_or_register(name, DebugValue::Float(default)) {
            DebugValue::Float(value) => value,
            other => mismatch(name, "float", &other),
        }
    }

    /// Overwrites or registers a value.
    ///
    /// # Panics
    ///
    /// Panics if `name` is registered with another type.
    pub fn set(&self, name: &str, value: impl Into<DebugValue>) {
        let value = value.into();
        let mut values = self.values.write();
        if let Some(current) = values.get_mut(name) {
            if std::mem::discriminant(current) != std::mem::discriminant(&value) {
                mismatch(name, value.type_name(), current);
            }
            *current = value;
        } else {
            values.insert(name.to_string(), value);
        }
        log::debug!("Debug value '{name}' = {value:?}");
    }

    /// Whether `name` was triggered since the last call. Registers the
    /// command on first use.
    pub fn command(&self, name: &str) -> bool {
        if let Some(false) = self.commands.read().get(name) {
            return false;
        }
        let mut commands = self.commands.write();
        let armed = commands.entry(name.to_string()).or_insert(false);
        std::mem::replace(armed, false)
    }

    /// Arms `name` for the next [`command`](Self::command) call.
    pub fn trigger(&self, name: &str) {
        log::debug!("Debug command '{name}' triggered");
        self.commands.write().insert(name.to_string(), true);
    }

    /// Registered values, sorted by name.
    pub fn entries(&self) -> Vec<(String, DebugValue)> {
        self.values
            .read()
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    /// Registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.read().keys().cloned().collect()
    }

    fn read_or_register(&self, name: &str, default: DebugValue) -> DebugValue {
        if let Some(value) = self.values.read().get(name) {
            return *value;
        }
        *self
            .values
            .write()
            .entry(name.to_string())
            .or_insert(default)
    }
}

fn mismatch(name: &str, requested: &str, current: &DebugValue) -> ! {
    panic!(
        "debug value '{name}' is a {}, not a {requested}",
        current.type_name()
    )
}

static_assertions::assert_impl_all!(DebugValues: Send, Sync);
