//! Tree model for libconfig documents.
//!
//! Groups keep their settings in document order so a tree can be loaded,
//! annotated and written back without reshuffling the author's layout.

/// A single libconfig value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    /// 32-bit range integer (written without suffix).
    Int(i64),
    /// 64-bit integer, written with an `L` suffix.
    Int64(i64),
    Float(f64),
    Str(String),
    /// `[ ... ]`
    Array(Vec<Value>),
    /// `( ... )`
    List(Vec<Value>),
    /// `{ ... }`
    Group(Group),
}

impl Value {
    /// String payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Elements of a list or an array.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_items_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) | Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Int64(_) => "int64",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Group(_) => "group",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Group> for Value {
    fn from(g: Group) -> Self {
        Value::Group(g)
    }
}

/// A named value inside a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub name: String,
    pub value: Value,
}

/// Ordered collection of settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    settings: Vec<Setting>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.settings
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.settings
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.settings.iter().any(|s| s.name == name)
    }

    /// Set `name` to `value`.
    ///
    /// An existing setting is replaced in place and its old value returned;
    /// a new setting is appended after the existing ones.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.settings.iter_mut().find(|s| s.name == name) {
            Some(existing) => Some(std::mem::replace(&mut existing.value, value)),
            None => {
                self.settings.push(Setting { name, value });
                None
            }
        }
    }

    /// Return a mutable reference to `name`, inserting `default()` first if absent.
    pub fn get_or_insert_with(&mut self, name: &str, default: impl FnOnce() -> Value) -> &mut Value {
        let index = match self.settings.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.settings.push(Setting {
                    name: name.to_string(),
                    value: default(),
                });
                self.settings.len() - 1
            }
        };
        &mut self.settings[index].value
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Setting> {
        self.settings.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Setting> {
        self.settings.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub(crate) fn push(&mut self, setting: Setting) {
        self.settings.push(setting);
    }
}

impl<'a> IntoIterator for &'a Group {
    type Item = &'a Setting;
    type IntoIter = std::slice::Iter<'a, Setting>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A parsed configuration file: the implicit top-level group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub root: Group,
}

impl Document {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    /// Look up a top-level setting.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.root.get_mut(name)
    }
}
