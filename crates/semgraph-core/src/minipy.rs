//! A compact Python-flavoured schema.
//!
//! Small enough to read in one sitting, large enough to exercise every part
//! of the container: owning and non-owning relations, singleton type nodes,
//! string/int/bool attributes and category predicates. The CLI and the test
//! suites build their graphs with it.

use std::fmt;

use crate::error::CoreError;
use crate::factory::Factory;
use crate::id::NodeId;
use crate::node::Node;
use crate::reverse::EdgeSelector;
use crate::schema::{AttrKind, EdgeKind, Kind, NodeKind, Schema};

macro_rules! kind_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant = $code),+
        }

        impl Kind for $name {
            fn code(self) -> u16 {
                self as u16
            }

            fn from_code(code: u16) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant),)+
                }
            }

            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

kind_enum! {
    /// Node kinds.
    PyKind {
        Compilation = 1,
        Module = 2,
        ClassDef = 3,
        FunctionDef = 4,
        Parameter = 5,
        Statement = 6,
        Call = 7,
        Identifier = 8,
        Literal = 9,
        Comment = 10,
        Docstring = 11,
        IntType = 12,
        StrType = 13,
        NoneType = 14,
    }
}

kind_enum! {
    /// Relation kinds. The `Has*` relations own their targets.
    Edge {
        HasModule = 1,
        HasMember = 2,
        HasParameter = 3,
        HasBody = 4,
        HasExpression = 5,
        HasArgument = 6,
        HasComment = 7,
        HasDocstring = 8,
        Calls = 9,
        RefersTo = 10,
        HasType = 11,
    }
}

kind_enum! {
    /// Attribute kinds.
    Attr {
        Name = 1,
        Line = 2,
        Value = 3,
        Text = 4,
        IsAsync = 5,
    }
}

impl PyKind {
    pub fn is_expression(self) -> bool {
        matches!(self, PyKind::Call | PyKind::Identifier | PyKind::Literal)
    }

    pub fn is_statement(self) -> bool {
        matches!(self, PyKind::Statement | PyKind::ClassDef | PyKind::FunctionDef)
    }

    pub fn is_type(self) -> bool {
        matches!(self, PyKind::IntType | PyKind::StrType | PyKind::NoneType)
    }

    /// Kinds that can be the target of a call.
    pub fn is_callable(self) -> bool {
        matches!(self, PyKind::FunctionDef | PyKind::ClassDef)
    }
}

impl NodeKind for PyKind {
    fn is_singleton(self) -> bool {
        self.is_type()
    }
}

impl EdgeKind for Edge {
    fn is_tree(self) -> bool {
        !matches!(self, Edge::Calls | Edge::RefersTo | Edge::HasType)
    }
}

impl AttrKind for Attr {}

/// Schema marker type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiniPy;

impl Schema for MiniPy {
    type Kind = PyKind;
    type Edge = Edge;
    type Attr = Attr;

    const LANGUAGE: &'static str = "MiniPy";
    const API_VERSION: &'static str = "1.0";
    const BINARY_VERSION: &'static str = "1.0.0";

    fn root_kind() -> PyKind {
        PyKind::Compilation
    }

    fn edge_allowed(source: PyKind, edge: Edge, target: PyKind) -> bool {
        match edge {
            Edge::HasModule => source == PyKind::Compilation && target == PyKind::Module,
            Edge::HasMember | Edge::HasBody => target.is_statement(),
            Edge::HasParameter => source == PyKind::FunctionDef && target == PyKind::Parameter,
            Edge::HasExpression => target.is_expression(),
            Edge::HasArgument => source == PyKind::Call && target.is_expression(),
            Edge::HasComment => target == PyKind::Comment,
            Edge::HasDocstring => target == PyKind::Docstring,
            Edge::Calls => source == PyKind::Call && target.is_callable(),
            Edge::RefersTo => source == PyKind::Identifier,
            Edge::HasType => target.is_type(),
        }
    }
}

// -----------------------------------------------------------------------
// Edge selectors
// -----------------------------------------------------------------------

fn all_edges(node: &Node<MiniPy>) -> Vec<(Edge, NodeId)> {
    node.edges().to_vec()
}

fn semantic_edges(node: &Node<MiniPy>) -> Vec<(Edge, NodeId)> {
    node.edges()
        .iter()
        .copied()
        .filter(|(edge, _)| !edge.is_tree())
        .collect()
}

fn call_edges(node: &Node<MiniPy>) -> Vec<(Edge, NodeId)> {
    node.targets(Edge::Calls).map(|t| (Edge::Calls, t)).collect()
}

/// Every relation, owning ones included.
pub const ALL_EDGES: EdgeSelector<MiniPy> = EdgeSelector::new("all", all_edges);

/// Non-owning relations only.
pub const SEMANTIC_EDGES: EdgeSelector<MiniPy> = EdgeSelector::new("semantic", semantic_edges);

/// `Calls` relations only ("who calls this function").
pub const CALL_EDGES: EdgeSelector<MiniPy> = EdgeSelector::new("calls", call_edges);

// -----------------------------------------------------------------------
// Typed constructors
// -----------------------------------------------------------------------

impl Factory<MiniPy> {
    pub fn create_module_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Module)
    }

    pub fn create_class_def_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::ClassDef)
    }

    pub fn create_function_def_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::FunctionDef)
    }

    pub fn create_parameter_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Parameter)
    }

    pub fn create_statement_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Statement)
    }

    pub fn create_call_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Call)
    }

    pub fn create_identifier_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Identifier)
    }

    pub fn create_literal_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Literal)
    }

    pub fn create_comment_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Comment)
    }

    pub fn create_docstring_node(&mut self) -> Result<NodeId, CoreError> {
        self.create_node(PyKind::Docstring)
    }

    /// The shared `int` type node.
    pub fn int_type(&mut self) -> Result<NodeId, CoreError> {
        self.singleton(PyKind::IntType)
    }

    /// The shared `str` type node.
    pub fn str_type(&mut self) -> Result<NodeId, CoreError> {
        self.singleton(PyKind::StrType)
    }

    /// The shared `None` type node.
    pub fn none_type(&mut self) -> Result<NodeId, CoreError> {
        self.singleton(PyKind::NoneType)
    }

    /// Creates a node carrying a `Name` attribute and owns it under `parent`.
    pub fn create_named(
        &mut self,
        parent: NodeId,
        edge: Edge,
        kind: PyKind,
        name: &str,
    ) -> Result<NodeId, CoreError> {
        let id = self.create_node(kind)?;
        self.set_str_attr(id, Attr::Name, name)?;
        self.add_edge(parent, edge, id)?;
        Ok(id)
    }
}
