//! The typed configuration tree.
//!
//! Settings live in an arena owned by [`SettingTree`]; tree positions are
//! addressed by copyable [`SettingId`]s, so parent links need no fix-up
//! when subtrees are cloned or detached. User code works through two
//! handle types: [`SettingRef`] for reads and [`SettingMut`] for
//! mutation, both obtained from [`Config`](crate::Config).
//!
//! Group children are kept sorted by name at all times; positional access
//! into a group addresses that lexicographic order. List and array
//! children keep insertion order.

use crate::error::{ConfigError, Result};
use crate::printer;
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The eight setting types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingType {
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Int64,
    /// IEEE-754 single-precision float.
    Float,
    /// Unicode text.
    String,
    /// true/false.
    Boolean,
    /// Ordered sequence of scalars sharing one type.
    Array,
    /// Ordered sequence of arbitrarily typed settings.
    List,
    /// Name-keyed collection with unique, lexicographically ordered names.
    Group,
}

impl SettingType {
    /// Lowercase name for use in messages.
    pub fn name(self) -> &'static str {
        match self {
            SettingType::Int => "int",
            SettingType::Int64 => "int64",
            SettingType::Float => "float",
            SettingType::String => "string",
            SettingType::Boolean => "boolean",
            SettingType::Array => "array",
            SettingType::List => "list",
            SettingType::Group => "group",
        }
    }

    /// True for the five scalar types.
    pub fn is_scalar(self) -> bool {
        !self.is_aggregate()
    }

    /// True for Int, Int64, and Float.
    pub fn is_number(self) -> bool {
        matches!(self, SettingType::Int | SettingType::Int64 | SettingType::Float)
    }

    /// True for Array, List, and Group.
    pub fn is_aggregate(self) -> bool {
        matches!(self, SettingType::Array | SettingType::List | SettingType::Group)
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display preference for integer scalars, preserved across parse/print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerFormat {
    /// Plain decimal.
    #[default]
    Decimal,
    /// `0x`-prefixed hexadecimal.
    Hex,
}

/// An owned scalar, used for assignment and element insertion.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// Boolean value.
    Boolean(bool),
    /// 32-bit integer value.
    Int(i32),
    /// 64-bit integer value.
    Int64(i64),
    /// Single-precision float value.
    Float(f32),
    /// String value.
    Str(String),
}

impl ScalarValue {
    /// The setting type this scalar maps to.
    pub fn setting_type(&self) -> SettingType {
        match self {
            ScalarValue::Boolean(_) => SettingType::Boolean,
            ScalarValue::Int(_) => SettingType::Int,
            ScalarValue::Int64(_) => SettingType::Int64,
            ScalarValue::Float(_) => SettingType::Float,
            ScalarValue::Str(_) => SettingType::String,
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Str(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Str(v)
    }
}

/// Where a setting came from: the file, line, and column of the token
/// that introduced it.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    file: Arc<PathBuf>,
    line: usize,
    column: usize,
}

impl SourceInfo {
    pub(crate) fn new(file: Arc<PathBuf>, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }

    /// Source file path.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Source line (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Source column (1-based).
    pub fn column(&self) -> usize {
        self.column
    }
}

/// Arena handle; only meaningful together with the tree that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SettingId(u32);

pub(crate) type ChildList = SmallVec<[SettingId; 4]>;
pub(crate) type ChildMap = IndexMap<String, SettingId>;

/// The value body of a node; the variant is the type tag.
#[derive(Debug, Clone)]
pub(crate) enum Payload {
    Int(i32),
    Int64(i64),
    Float(f32),
    Str(String),
    Bool(bool),
    Array(ChildList),
    List(ChildList),
    Group(ChildMap),
}

impl Payload {
    pub(crate) fn ty(&self) -> SettingType {
        match self {
            Payload::Int(_) => SettingType::Int,
            Payload::Int64(_) => SettingType::Int64,
            Payload::Float(_) => SettingType::Float,
            Payload::Str(_) => SettingType::String,
            Payload::Bool(_) => SettingType::Boolean,
            Payload::Array(_) => SettingType::Array,
            Payload::List(_) => SettingType::List,
            Payload::Group(_) => SettingType::Group,
        }
    }

    /// A zero-valued or empty payload of the given type.
    pub(crate) fn empty(ty: SettingType) -> Payload {
        match ty {
            SettingType::Int => Payload::Int(0),
            SettingType::Int64 => Payload::Int64(0),
            SettingType::Float => Payload::Float(0.0),
            SettingType::String => Payload::Str(String::new()),
            SettingType::Boolean => Payload::Bool(false),
            SettingType::Array => Payload::Array(ChildList::new()),
            SettingType::List => Payload::List(ChildList::new()),
            SettingType::Group => Payload::Group(ChildMap::new()),
        }
    }

    pub(crate) fn from_scalar(value: ScalarValue) -> Payload {
        match value {
            ScalarValue::Boolean(v) => Payload::Bool(v),
            ScalarValue::Int(v) => Payload::Int(v),
            ScalarValue::Int64(v) => Payload::Int64(v),
            ScalarValue::Float(v) => Payload::Float(v),
            ScalarValue::Str(v) => Payload::Str(v),
        }
    }

    fn child_count(&self) -> usize {
        match self {
            Payload::Array(v) | Payload::List(v) => v.len(),
            Payload::Group(m) => m.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    payload: Payload,
    parent: Option<SettingId>,
    format: IntegerFormat,
    source: Option<SourceInfo>,
}

/// A parentless deep copy of a setting subtree, insertable into the same
/// or another tree via [`SettingMut::add_copy`] / [`SettingMut::append_copy`].
#[derive(Debug, Clone)]
pub struct DetachedSetting {
    name: String,
    format: IntegerFormat,
    value: DetachedValue,
}

#[derive(Debug, Clone)]
enum DetachedValue {
    Scalar(ScalarValue),
    Array(Vec<DetachedSetting>),
    List(Vec<DetachedSetting>),
    Group(Vec<DetachedSetting>),
}

impl DetachedSetting {
    /// The name the setting carried when it was copied.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type of the copied setting.
    pub fn setting_type(&self) -> SettingType {
        match &self.value {
            DetachedValue::Scalar(v) => v.setting_type(),
            DetachedValue::Array(_) => SettingType::Array,
            DetachedValue::List(_) => SettingType::List,
            DetachedValue::Group(_) => SettingType::Group,
        }
    }
}

/// One dot-separated path component.
enum PathComponent<'p> {
    Name(&'p str),
    Index(usize),
}

/// Splits a dotted path into components, validating its shape.
fn parse_path(path: &str) -> Result<Vec<PathComponent<'_>>> {
    if path.is_empty() {
        return Err(ConfigError::invalid_argument("path is empty"));
    }
    if path.starts_with('.') || path.ends_with('.') {
        return Err(ConfigError::invalid_argument(
            "path cannot begin or end with '.'",
        ));
    }
    let mut components = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return Err(ConfigError::invalid_argument(
                "path contains an empty component",
            ));
        }
        if let Some(rest) = part.strip_prefix('[') {
            let digits = rest.strip_suffix(']').ok_or_else(|| {
                ConfigError::invalid_argument(format!("malformed index component '{part}'"))
            })?;
            if digits.starts_with('-') {
                return Err(ConfigError::invalid_argument("index cannot be negative"));
            }
            let index = digits.parse::<usize>().map_err(|_| {
                ConfigError::invalid_argument(format!("malformed index component '{part}'"))
            })?;
            components.push(PathComponent::Index(index));
        } else {
            components.push(PathComponent::Name(part));
        }
    }
    Ok(components)
}

/// Arena holding every node of one configuration tree.
#[derive(Debug, Clone)]
pub(crate) struct SettingTree {
    nodes: Vec<Node>,
    free: Vec<SettingId>,
    root: SettingId,
}

impl SettingTree {
    /// A tree holding only an anonymous root group.
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                payload: Payload::Group(ChildMap::new()),
                parent: None,
                format: IntegerFormat::Decimal,
                source: None,
            }],
            free: Vec::new(),
            root: SettingId(0),
        }
    }

    pub(crate) fn root_id(&self) -> SettingId {
        self.root
    }

    fn node(&self, id: SettingId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: SettingId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, node: Node) -> SettingId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0 as usize] = node;
                id
            }
            None => {
                let id = SettingId(self.nodes.len() as u32);
                self.nodes.push(node);
                id
            }
        }
    }

    /// Returns a detached subtree's slots to the free list.
    fn release(&mut self, id: SettingId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            match &self.node(current).payload {
                Payload::Array(v) | Payload::List(v) => pending.extend(v.iter().copied()),
                Payload::Group(m) => pending.extend(m.values().copied()),
                _ => {}
            }
            let slot = self.node_mut(current);
            slot.name = String::new();
            slot.payload = Payload::Bool(false);
            slot.parent = None;
            slot.source = None;
            self.free.push(current);
        }
    }

    pub(crate) fn setting_type(&self, id: SettingId) -> SettingType {
        self.node(id).payload.ty()
    }

    pub(crate) fn name(&self, id: SettingId) -> &str {
        &self.node(id).name
    }

    pub(crate) fn format(&self, id: SettingId) -> IntegerFormat {
        self.node(id).format
    }

    pub(crate) fn set_format(&mut self, id: SettingId, format: IntegerFormat) {
        self.node_mut(id).format = format;
    }

    pub(crate) fn source(&self, id: SettingId) -> Option<&SourceInfo> {
        self.node(id).source.as_ref()
    }

    pub(crate) fn parent(&self, id: SettingId) -> Option<SettingId> {
        self.node(id).parent
    }

    pub(crate) fn child_count(&self, id: SettingId) -> usize {
        self.node(id).payload.child_count()
    }

    pub(crate) fn child_at(&self, id: SettingId, index: usize) -> Option<SettingId> {
        match &self.node(id).payload {
            Payload::Group(map) => map.get_index(index).map(|(_, &child)| child),
            Payload::Array(v) | Payload::List(v) => v.get(index).copied(),
            _ => None,
        }
    }

    pub(crate) fn child_named(&self, id: SettingId, name: &str) -> Option<SettingId> {
        match &self.node(id).payload {
            Payload::Group(map) => map.get(name).copied(),
            _ => None,
        }
    }

    /// The element type of an array, fixed by its first element.
    pub(crate) fn element_type(&self, id: SettingId) -> Option<SettingType> {
        match &self.node(id).payload {
            Payload::Array(v) => v.first().map(|&c| self.setting_type(c)),
            _ => None,
        }
    }

    fn child_path(&self, parent: SettingId, name: &str) -> String {
        let prefix = self.path_of(parent);
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        }
    }

    /// Inserts a named child into a group, keeping the children sorted.
    pub(crate) fn attach_to_group(
        &mut self,
        parent: SettingId,
        name: &str,
        payload: Payload,
        format: IntegerFormat,
        source: Option<SourceInfo>,
    ) -> Result<SettingId> {
        match self.node(parent).payload.ty() {
            SettingType::Group => {}
            other => {
                return Err(ConfigError::type_error(format!(
                    "cannot add a named child to a {} setting",
                    other.name()
                )));
            }
        }
        if name.is_empty() {
            return Err(ConfigError::invalid_argument("setting name is empty"));
        }
        let Payload::Group(map) = &self.node(parent).payload else {
            unreachable!("checked above");
        };
        if map.contains_key(name) {
            return Err(ConfigError::name_clash(self.child_path(parent, name)));
        }
        let id = self.alloc(Node {
            name: name.to_string(),
            payload,
            parent: Some(parent),
            format,
            source,
        });
        let Payload::Group(map) = &mut self.node_mut(parent).payload else {
            unreachable!("checked above");
        };
        let position = match map.binary_search_by(|key, _| key.as_str().cmp(name)) {
            Ok(found) => found,
            Err(insert_at) => insert_at,
        };
        map.shift_insert(position, name.to_string(), id);
        Ok(id)
    }

    /// Appends an anonymous child to a list.
    pub(crate) fn attach_to_list(
        &mut self,
        parent: SettingId,
        payload: Payload,
        format: IntegerFormat,
        source: Option<SourceInfo>,
    ) -> Result<SettingId> {
        match self.node(parent).payload.ty() {
            SettingType::List => {}
            other => {
                return Err(ConfigError::type_error(format!(
                    "cannot append to a {} setting",
                    other.name()
                )));
            }
        }
        let id = self.alloc(Node {
            name: String::new(),
            payload,
            parent: Some(parent),
            format,
            source,
        });
        let Payload::List(children) = &mut self.node_mut(parent).payload else {
            unreachable!("checked above");
        };
        children.push(id);
        Ok(id)
    }

    /// Appends a scalar element to an array, enforcing element-type
    /// homogeneity.
    pub(crate) fn attach_to_array(
        &mut self,
        parent: SettingId,
        payload: Payload,
        format: IntegerFormat,
        source: Option<SourceInfo>,
    ) -> Result<SettingId> {
        match self.node(parent).payload.ty() {
            SettingType::Array => {}
            other => {
                return Err(ConfigError::type_error(format!(
                    "cannot append to a {} setting",
                    other.name()
                )));
            }
        }
        let ty = payload.ty();
        if !ty.is_scalar() {
            return Err(ConfigError::type_error(
                "array elements must be scalar values",
            ));
        }
        if let Some(element_type) = self.element_type(parent) {
            if ty != element_type {
                return Err(ConfigError::type_error(format!(
                    "array elements must have the same type: expected {}, got {}",
                    element_type.name(),
                    ty.name()
                )));
            }
        }
        let id = self.alloc(Node {
            name: String::new(),
            payload,
            parent: Some(parent),
            format,
            source,
        });
        let Payload::Array(children) = &mut self.node_mut(parent).payload else {
            unreachable!("checked above");
        };
        children.push(id);
        Ok(id)
    }

    /// Detaches and destroys the named child of a group.
    pub(crate) fn remove_named(&mut self, parent: SettingId, name: &str) -> Result<()> {
        let removed = match &mut self.node_mut(parent).payload {
            Payload::Group(map) => map.shift_remove(name),
            _ => None,
        };
        match removed {
            Some(child) => {
                self.release(child);
                Ok(())
            }
            None => Err(ConfigError::not_found(self.child_path(parent, name))),
        }
    }

    /// Detaches and destroys the child at `index` in iteration order.
    pub(crate) fn remove_indexed(&mut self, parent: SettingId, index: usize) -> Result<()> {
        let removed = match &mut self.node_mut(parent).payload {
            Payload::Group(map) => map.shift_remove_index(index).map(|(_, child)| child),
            Payload::Array(v) | Payload::List(v) => {
                if index < v.len() {
                    Some(v.remove(index))
                } else {
                    None
                }
            }
            _ => None,
        };
        match removed {
            Some(child) => {
                self.release(child);
                Ok(())
            }
            None => {
                let prefix = self.path_of(parent);
                Err(ConfigError::not_found(if prefix.is_empty() {
                    format!("[{index}]")
                } else {
                    format!("{prefix}.[{index}]")
                }))
            }
        }
    }

    /// Replaces a scalar payload, converting between scalar types where
    /// the assignment matrix allows and checking ranges.
    pub(crate) fn assign(&mut self, id: SettingId, value: ScalarValue) -> Result<()> {
        let target = self.node(id).payload.ty();
        let overflow =
            |to: &str| ConfigError::type_error(format!("integer value out of range for {to}"));
        let payload = match (value, target) {
            (ScalarValue::Boolean(b), SettingType::Boolean) => Payload::Bool(b),
            (ScalarValue::Boolean(b), SettingType::Int) => Payload::Int(b as i32),
            (ScalarValue::Boolean(b), SettingType::Int64) => Payload::Int64(b as i64),
            (ScalarValue::Int(v), SettingType::Boolean) => Payload::Bool(v != 0),
            (ScalarValue::Int(v), SettingType::Int) => Payload::Int(v),
            (ScalarValue::Int(v), SettingType::Int64) => Payload::Int64(v as i64),
            (ScalarValue::Int(v), SettingType::Float) => Payload::Float(v as f32),
            (ScalarValue::Int64(v), SettingType::Boolean) => Payload::Bool(v != 0),
            (ScalarValue::Int64(v), SettingType::Int) => {
                Payload::Int(i32::try_from(v).map_err(|_| overflow("int"))?)
            }
            (ScalarValue::Int64(v), SettingType::Int64) => Payload::Int64(v),
            (ScalarValue::Int64(v), SettingType::Float) => Payload::Float(v as f32),
            (ScalarValue::Float(v), SettingType::Int) => {
                if !v.is_finite() || v < i64::MIN as f32 || v >= i64::MAX as f32 {
                    return Err(overflow("int"));
                }
                Payload::Int(i32::try_from(v as i64).map_err(|_| overflow("int"))?)
            }
            (ScalarValue::Float(v), SettingType::Int64) => {
                if !v.is_finite() || v < i64::MIN as f32 || v >= i64::MAX as f32 {
                    return Err(overflow("int64"));
                }
                Payload::Int64(v as i64)
            }
            (ScalarValue::Float(v), SettingType::Float) => Payload::Float(v),
            (ScalarValue::Str(s), SettingType::String) => Payload::Str(s),
            (value, target) => {
                return Err(ConfigError::type_error(format!(
                    "cannot assign a {} value to a {} setting",
                    value.setting_type().name(),
                    target.name()
                )));
            }
        };
        self.node_mut(id).payload = payload;
        Ok(())
    }

    /// Resolves a dotted path starting at `from`.
    pub(crate) fn resolve(&self, from: SettingId, path: &str) -> Result<SettingId> {
        let components = parse_path(path)?;
        let mut current = from;
        for component in &components {
            let next = match component {
                PathComponent::Name(name) => self.child_named(current, name),
                PathComponent::Index(index) => self.child_at(current, *index),
            };
            current = next.ok_or_else(|| ConfigError::not_found(path))?;
        }
        Ok(current)
    }

    /// Existence test with the same path validation as [`resolve`].
    pub(crate) fn exists(&self, from: SettingId, path: &str) -> Result<bool> {
        let components = parse_path(path)?;
        let mut current = from;
        for component in &components {
            let next = match component {
                PathComponent::Name(name) => self.child_named(current, name),
                PathComponent::Index(index) => self.child_at(current, *index),
            };
            match next {
                Some(id) => current = id,
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// The dotted path from the root; anonymous children contribute
    /// `[index]` components. The root itself has the empty path.
    pub(crate) fn path_of(&self, id: SettingId) -> String {
        let node = self.node(id);
        let parent = match node.parent {
            Some(parent) => parent,
            None => return String::new(),
        };
        let prefix = self.path_of(parent);
        let segment = if node.name.is_empty() {
            format!("[{}]", self.index_in_parent(id).unwrap_or(0))
        } else {
            node.name.clone()
        };
        if prefix.is_empty() {
            segment
        } else {
            format!("{prefix}.{segment}")
        }
    }

    /// Position of a setting among its parent's children, in iteration
    /// order.
    pub(crate) fn index_in_parent(&self, id: SettingId) -> Option<usize> {
        let parent = self.node(id).parent?;
        match &self.node(parent).payload {
            Payload::Group(map) => map.get_index_of(self.node(id).name.as_str()),
            Payload::Array(v) | Payload::List(v) => v.iter().position(|&child| child == id),
            _ => None,
        }
    }

    /// Structural equality: same name, type, and value; aggregates
    /// compare children pairwise in iteration order. Provenance and
    /// format hints are ignored.
    pub(crate) fn structural_eq(
        a: &SettingTree,
        id_a: SettingId,
        b: &SettingTree,
        id_b: SettingId,
    ) -> bool {
        let node_a = a.node(id_a);
        let node_b = b.node(id_b);
        if node_a.name != node_b.name {
            return false;
        }
        match (&node_a.payload, &node_b.payload) {
            (Payload::Int(x), Payload::Int(y)) => x == y,
            (Payload::Int64(x), Payload::Int64(y)) => x == y,
            (Payload::Float(x), Payload::Float(y)) => x == y,
            (Payload::Str(x), Payload::Str(y)) => x == y,
            (Payload::Bool(x), Payload::Bool(y)) => x == y,
            (Payload::Array(x), Payload::Array(y)) | (Payload::List(x), Payload::List(y)) => {
                x.len() == y.len()
                    && x.iter()
                        .zip(y.iter())
                        .all(|(&ca, &cb)| Self::structural_eq(a, ca, b, cb))
            }
            (Payload::Group(x), Payload::Group(y)) => {
                x.len() == y.len()
                    && x.values()
                        .zip(y.values())
                        .all(|(&ca, &cb)| Self::structural_eq(a, ca, b, cb))
            }
            _ => false,
        }
    }

    /// Deep-copies a subtree into an owned, parentless value.
    pub(crate) fn snapshot(&self, id: SettingId) -> DetachedSetting {
        let node = self.node(id);
        let value = match &node.payload {
            Payload::Int(v) => DetachedValue::Scalar(ScalarValue::Int(*v)),
            Payload::Int64(v) => DetachedValue::Scalar(ScalarValue::Int64(*v)),
            Payload::Float(v) => DetachedValue::Scalar(ScalarValue::Float(*v)),
            Payload::Str(v) => DetachedValue::Scalar(ScalarValue::Str(v.clone())),
            Payload::Bool(v) => DetachedValue::Scalar(ScalarValue::Boolean(*v)),
            Payload::Array(v) => {
                DetachedValue::Array(v.iter().map(|&c| self.snapshot(c)).collect())
            }
            Payload::List(v) => DetachedValue::List(v.iter().map(|&c| self.snapshot(c)).collect()),
            Payload::Group(m) => {
                DetachedValue::Group(m.values().map(|&c| self.snapshot(c)).collect())
            }
        };
        DetachedSetting {
            name: node.name.clone(),
            format: node.format,
            value,
        }
    }

    /// Builds fresh nodes for a detached subtree under `parent`. No
    /// validation; callers check insertion constraints first.
    fn materialize(
        &mut self,
        detached: &DetachedSetting,
        name: &str,
        parent: SettingId,
    ) -> SettingId {
        let id = self.alloc(Node {
            name: name.to_string(),
            payload: Payload::empty(detached.setting_type()),
            parent: Some(parent),
            format: detached.format,
            source: None,
        });
        let payload = match &detached.value {
            DetachedValue::Scalar(v) => Payload::from_scalar(v.clone()),
            DetachedValue::Array(items) => {
                let children = items
                    .iter()
                    .map(|item| self.materialize(item, "", id))
                    .collect();
                Payload::Array(children)
            }
            DetachedValue::List(items) => {
                let children = items
                    .iter()
                    .map(|item| self.materialize(item, "", id))
                    .collect();
                Payload::List(children)
            }
            DetachedValue::Group(items) => {
                let mut map = ChildMap::new();
                for item in items {
                    let child = self.materialize(item, &item.name, id);
                    map.insert(item.name.clone(), child);
                }
                Payload::Group(map)
            }
        };
        self.node_mut(id).payload = payload;
        id
    }

    pub(crate) fn copy_into_group(
        &mut self,
        parent: SettingId,
        name: &str,
        detached: &DetachedSetting,
    ) -> Result<SettingId> {
        match self.node(parent).payload.ty() {
            SettingType::Group => {}
            other => {
                return Err(ConfigError::type_error(format!(
                    "cannot add a named child to a {} setting",
                    other.name()
                )));
            }
        }
        if name.is_empty() {
            return Err(ConfigError::invalid_argument("setting name is empty"));
        }
        let Payload::Group(map) = &self.node(parent).payload else {
            unreachable!("checked above");
        };
        if map.contains_key(name) {
            return Err(ConfigError::name_clash(self.child_path(parent, name)));
        }
        let id = self.materialize(detached, name, parent);
        let Payload::Group(map) = &mut self.node_mut(parent).payload else {
            unreachable!("checked above");
        };
        let position = match map.binary_search_by(|key, _| key.as_str().cmp(name)) {
            Ok(found) => found,
            Err(insert_at) => insert_at,
        };
        map.shift_insert(position, name.to_string(), id);
        Ok(id)
    }

    pub(crate) fn copy_into_sequence(
        &mut self,
        parent: SettingId,
        detached: &DetachedSetting,
    ) -> Result<SettingId> {
        match self.node(parent).payload.ty() {
            SettingType::List => {
                let id = self.materialize(detached, "", parent);
                let Payload::List(children) = &mut self.node_mut(parent).payload else {
                    unreachable!("checked above");
                };
                children.push(id);
                Ok(id)
            }
            SettingType::Array => {
                let ty = detached.setting_type();
                if !ty.is_scalar() {
                    return Err(ConfigError::type_error(
                        "array elements must be scalar values",
                    ));
                }
                if let Some(element_type) = self.element_type(parent) {
                    if ty != element_type {
                        return Err(ConfigError::type_error(format!(
                            "array elements must have the same type: expected {}, got {}",
                            element_type.name(),
                            ty.name()
                        )));
                    }
                }
                let id = self.materialize(detached, "", parent);
                let Payload::Array(children) = &mut self.node_mut(parent).payload else {
                    unreachable!("checked above");
                };
                children.push(id);
                Ok(id)
            }
            other => Err(ConfigError::type_error(format!(
                "cannot append to a {} setting",
                other.name()
            ))),
        }
    }

    pub(crate) fn payload(&self, id: SettingId) -> &Payload {
        &self.node(id).payload
    }
}

fn conversion_err(from: SettingType, to: &str) -> ConfigError {
    ConfigError::type_error(format!("cannot read a {} setting as {to}", from.name()))
}

fn range_err(to: &str) -> ConfigError {
    ConfigError::type_error(format!("stored value out of range for {to}"))
}

/// Typed scalar extraction following the conversion matrix: booleans and
/// integers interconvert (with `!= 0` semantics and range checks),
/// integers widen to floats, floats narrow to nothing, and strings only
/// read as strings.
pub trait FromSetting: Sized {
    /// Reads the value of `setting` as `Self`.
    fn from_setting(setting: SettingRef<'_>) -> Result<Self>;
}

impl FromSetting for bool {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Bool(v) => Ok(*v),
            Payload::Int(v) => Ok(*v != 0),
            Payload::Int64(v) => Ok(*v != 0),
            Payload::Float(v) => Ok(*v != 0.0),
            p => Err(conversion_err(p.ty(), "a boolean")),
        }
    }
}

impl FromSetting for i32 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Bool(v) => Ok(*v as i32),
            Payload::Int(v) => Ok(*v),
            Payload::Int64(v) => i32::try_from(*v).map_err(|_| range_err("i32")),
            p => Err(conversion_err(p.ty(), "an integer")),
        }
    }
}

impl FromSetting for u32 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Bool(v) => Ok(*v as u32),
            Payload::Int(v) => u32::try_from(*v).map_err(|_| range_err("u32")),
            Payload::Int64(v) => u32::try_from(*v).map_err(|_| range_err("u32")),
            p => Err(conversion_err(p.ty(), "an integer")),
        }
    }
}

impl FromSetting for i64 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Bool(v) => Ok(*v as i64),
            Payload::Int(v) => Ok(*v as i64),
            Payload::Int64(v) => Ok(*v),
            p => Err(conversion_err(p.ty(), "an integer")),
        }
    }
}

impl FromSetting for u64 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Bool(v) => Ok(*v as u64),
            Payload::Int(v) => u64::try_from(*v).map_err(|_| range_err("u64")),
            Payload::Int64(v) => u64::try_from(*v).map_err(|_| range_err("u64")),
            p => Err(conversion_err(p.ty(), "an integer")),
        }
    }
}

impl FromSetting for f32 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Int(v) => Ok(*v as f32),
            Payload::Int64(v) => Ok(*v as f32),
            Payload::Float(v) => Ok(*v),
            p => Err(conversion_err(p.ty(), "a float")),
        }
    }
}

impl FromSetting for f64 {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Int(v) => Ok(*v as f64),
            Payload::Int64(v) => Ok(*v as f64),
            Payload::Float(v) => Ok(*v as f64),
            p => Err(conversion_err(p.ty(), "a float")),
        }
    }
}

impl FromSetting for String {
    fn from_setting(setting: SettingRef<'_>) -> Result<Self> {
        match setting.tree.payload(setting.id) {
            Payload::Str(v) => Ok(v.clone()),
            p => Err(conversion_err(p.ty(), "a string")),
        }
    }
}

/// A read-only handle to one setting in a tree.
#[derive(Clone, Copy)]
pub struct SettingRef<'a> {
    pub(crate) tree: &'a SettingTree,
    pub(crate) id: SettingId,
}

impl<'a> SettingRef<'a> {
    pub(crate) fn new(tree: &'a SettingTree, id: SettingId) -> Self {
        Self { tree, id }
    }

    /// The setting's name; empty for the root and for list/array elements.
    pub fn name(&self) -> &'a str {
        self.tree.name(self.id)
    }

    /// The setting's type tag.
    pub fn setting_type(&self) -> SettingType {
        self.tree.setting_type(self.id)
    }

    /// True if this is the tree's root group.
    pub fn is_root(&self) -> bool {
        self.tree.parent(self.id).is_none()
    }

    /// True for groups.
    pub fn is_group(&self) -> bool {
        self.setting_type() == SettingType::Group
    }

    /// True for arrays.
    pub fn is_array(&self) -> bool {
        self.setting_type() == SettingType::Array
    }

    /// True for lists.
    pub fn is_list(&self) -> bool {
        self.setting_type() == SettingType::List
    }

    /// True for the five scalar types.
    pub fn is_scalar(&self) -> bool {
        self.setting_type().is_scalar()
    }

    /// True for Int, Int64, and Float.
    pub fn is_number(&self) -> bool {
        self.setting_type().is_number()
    }

    /// True for arrays, lists, and groups.
    pub fn is_aggregate(&self) -> bool {
        self.setting_type().is_aggregate()
    }

    /// Number of children; 0 for scalars.
    pub fn len(&self) -> usize {
        self.tree.child_count(self.id)
    }

    /// True when the setting has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The display format hint for integer scalars.
    pub fn format(&self) -> IntegerFormat {
        self.tree.format(self.id)
    }

    /// File/line/column of the token that introduced this setting, when
    /// it came from a parse.
    pub fn source(&self) -> Option<&'a SourceInfo> {
        self.tree.source(self.id)
    }

    /// The element type of an array, fixed by its first element. `None`
    /// for empty arrays and non-arrays.
    pub fn element_type(&self) -> Option<SettingType> {
        self.tree.element_type(self.id)
    }

    /// Resolves a dotted path relative to this setting.
    pub fn lookup(&self, path: &str) -> Result<SettingRef<'a>> {
        let id = self.tree.resolve(self.id, path)?;
        Ok(SettingRef::new(self.tree, id))
    }

    /// Tests whether a path resolves; the path itself must be well-formed.
    pub fn exists(&self, path: &str) -> Result<bool> {
        self.tree.exists(self.id, path)
    }

    /// Resolves a path and converts the target's value; `None` on either
    /// failure.
    pub fn lookup_value<T: FromSetting>(&self, path: &str) -> Option<T> {
        self.lookup(path).ok().and_then(|s| s.value().ok())
    }

    /// Reads this setting's scalar value as `T` per the conversion matrix.
    pub fn value<T: FromSetting>(&self) -> Result<T> {
        T::from_setting(*self)
    }

    /// Borrows the string value of a string setting.
    pub fn as_str(&self) -> Result<&'a str> {
        match self.tree.payload(self.id) {
            Payload::Str(v) => Ok(v),
            p => Err(conversion_err(p.ty(), "a string")),
        }
    }

    /// The child at `index` in iteration order.
    pub fn child(&self, index: usize) -> Option<SettingRef<'a>> {
        self.tree
            .child_at(self.id, index)
            .map(|id| SettingRef::new(self.tree, id))
    }

    /// The named child of a group.
    pub fn child_named(&self, name: &str) -> Option<SettingRef<'a>> {
        self.tree
            .child_named(self.id, name)
            .map(|id| SettingRef::new(self.tree, id))
    }

    /// Iterates over children in iteration order.
    pub fn children(&self) -> Children<'a> {
        Children {
            setting: *self,
            index: 0,
        }
    }

    /// The owning parent; `None` for the root.
    pub fn parent(&self) -> Option<SettingRef<'a>> {
        self.tree
            .parent(self.id)
            .map(|id| SettingRef::new(self.tree, id))
    }

    /// Position among the parent's children; `None` for the root.
    pub fn index_in_parent(&self) -> Option<usize> {
        self.tree.index_in_parent(self.id)
    }

    /// The dotted path from the root ([`lookup`](Self::lookup) on the root
    /// resolves it back to this setting). The root's path is empty.
    pub fn path(&self) -> String {
        self.tree.path_of(self.id)
    }

    /// Deep-copies this subtree into an owned, parentless value.
    pub fn snapshot(&self) -> DetachedSetting {
        self.tree.snapshot(self.id)
    }
}

impl fmt::Debug for SettingRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingRef")
            .field("path", &self.path())
            .field("type", &self.setting_type())
            .finish()
    }
}

impl fmt::Display for SettingRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str(&printer::print_document(self.tree))
        } else {
            f.write_str(&printer::print_setting(self.tree, self.id))
        }
    }
}

impl PartialEq for SettingRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        SettingTree::structural_eq(self.tree, self.id, other.tree, other.id)
    }
}

/// Iterator over a setting's children.
pub struct Children<'a> {
    setting: SettingRef<'a>,
    index: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = SettingRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let child = self.setting.child(self.index)?;
        self.index += 1;
        Some(child)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.setting.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Children<'_> {}

/// A mutable handle to one setting in a tree.
pub struct SettingMut<'a> {
    pub(crate) tree: &'a mut SettingTree,
    pub(crate) id: SettingId,
}

impl<'a> SettingMut<'a> {
    pub(crate) fn new(tree: &'a mut SettingTree, id: SettingId) -> Self {
        Self { tree, id }
    }

    /// A read-only view of the same setting.
    pub fn as_ref(&self) -> SettingRef<'_> {
        SettingRef::new(self.tree, self.id)
    }

    /// The setting's name; empty for the root and for list/array elements.
    pub fn name(&self) -> &str {
        self.tree.name(self.id)
    }

    /// The setting's type tag.
    pub fn setting_type(&self) -> SettingType {
        self.tree.setting_type(self.id)
    }

    /// Number of children; 0 for scalars.
    pub fn len(&self) -> usize {
        self.tree.child_count(self.id)
    }

    /// True when the setting has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dotted path from the root.
    pub fn path(&self) -> String {
        self.tree.path_of(self.id)
    }

    /// The display format hint for integer scalars.
    pub fn format(&self) -> IntegerFormat {
        self.tree.format(self.id)
    }

    /// Sets the display format hint used when printing integer scalars.
    pub fn set_format(&mut self, format: IntegerFormat) {
        self.tree.set_format(self.id, format);
    }

    /// Reads this setting's scalar value as `T` per the conversion matrix.
    pub fn value<T: FromSetting>(&self) -> Result<T> {
        self.as_ref().value()
    }

    /// Resolves a dotted path relative to this setting, mutably.
    pub fn lookup(&mut self, path: &str) -> Result<SettingMut<'_>> {
        let id = self.tree.resolve(self.id, path)?;
        Ok(SettingMut::new(self.tree, id))
    }

    /// Creates an empty child of the given type under this group.
    pub fn add(&mut self, name: &str, ty: SettingType) -> Result<SettingMut<'_>> {
        let id = self.tree.attach_to_group(
            self.id,
            name,
            Payload::empty(ty),
            IntegerFormat::Decimal,
            None,
        )?;
        Ok(SettingMut::new(self.tree, id))
    }

    /// Creates a scalar child with the given value under this group.
    pub fn add_value(
        &mut self,
        name: &str,
        value: impl Into<ScalarValue>,
    ) -> Result<SettingMut<'_>> {
        let payload = Payload::from_scalar(value.into());
        let id = self
            .tree
            .attach_to_group(self.id, name, payload, IntegerFormat::Decimal, None)?;
        Ok(SettingMut::new(self.tree, id))
    }

    /// Appends an empty child of the given type to this list or array.
    pub fn append(&mut self, ty: SettingType) -> Result<SettingMut<'_>> {
        let payload = Payload::empty(ty);
        let id = match self.setting_type() {
            SettingType::Array => {
                self.tree
                    .attach_to_array(self.id, payload, IntegerFormat::Decimal, None)?
            }
            _ => self
                .tree
                .attach_to_list(self.id, payload, IntegerFormat::Decimal, None)?,
        };
        Ok(SettingMut::new(self.tree, id))
    }

    /// Appends a scalar element with the given value to this list or
    /// array.
    pub fn append_value(&mut self, value: impl Into<ScalarValue>) -> Result<SettingMut<'_>> {
        let payload = Payload::from_scalar(value.into());
        let id = match self.setting_type() {
            SettingType::Array => {
                self.tree
                    .attach_to_array(self.id, payload, IntegerFormat::Decimal, None)?
            }
            _ => self
                .tree
                .attach_to_list(self.id, payload, IntegerFormat::Decimal, None)?,
        };
        Ok(SettingMut::new(self.tree, id))
    }

    /// Inserts a deep copy of a detached subtree under this group.
    pub fn add_copy(&mut self, name: &str, copy: &DetachedSetting) -> Result<SettingMut<'_>> {
        let id = self.tree.copy_into_group(self.id, name, copy)?;
        Ok(SettingMut::new(self.tree, id))
    }

    /// Appends a deep copy of a detached subtree to this list or array.
    pub fn append_copy(&mut self, copy: &DetachedSetting) -> Result<SettingMut<'_>> {
        let id = self.tree.copy_into_sequence(self.id, copy)?;
        Ok(SettingMut::new(self.tree, id))
    }

    /// Detaches and destroys the named child of this group.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        self.tree.remove_named(self.id, name)
    }

    /// Detaches and destroys the child at `index` in iteration order.
    /// Later list/array elements shift down; group order is unaffected.
    pub fn remove_at(&mut self, index: usize) -> Result<()> {
        self.tree.remove_indexed(self.id, index)
    }

    /// Replaces this scalar's value, converting where the assignment
    /// matrix allows.
    pub fn assign(&mut self, value: impl Into<ScalarValue>) -> Result<()> {
        self.tree.assign(self.id, value.into())
    }

    /// Deep-copies this subtree into an owned, parentless value.
    pub fn snapshot(&self) -> DetachedSetting {
        self.tree.snapshot(self.id)
    }
}

impl fmt::Debug for SettingMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingMut")
            .field("path", &self.path())
            .field("type", &self.setting_type())
            .finish()
    }
}
