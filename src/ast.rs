use std::collections::{BTreeMap, HashMap};

use derive_more::From;

use crate::{expr::Expr, store::Store};

#[derive(Debug, Clone, PartialEq)]
pub struct SetAction {
    /// Bare name or `object.field`.
    pub target: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalAction {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfAction {
    pub condition: Expr,
    pub then_target: String,
    pub else_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GotoAction {
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShowAction {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub instance: String,
    pub method: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    pub class: String,
    pub instance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrintArg {
    Text(String),
    Value(Expr),
}

/// Free-form statements, classified once when the script is parsed.
#[derive(Debug, Clone, PartialEq, From)]
pub enum Statement {
    MethodCall(MethodCall),
    New(NewInstance),
    Print(PrintArg),
    /// Anything unrecognised; kept for diagnostics and ignored at run time.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, From)]
pub enum Action {
    Set(SetAction),
    Signal(SignalAction),
    If(IfAction),
    Goto(GotoAction),
    End,
    Statement(Statement),
    Show(ShowAction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    pub id: i64,
    pub text: String,
    pub target: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    pub name: String,
    pub line: usize,
    pub text: Option<String>,
    pub choices: Vec<Choice>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Method {
    pub params: Vec<String>,
    pub body: Vec<Action>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub fields: BTreeMap<String, i64>,
    pub methods: HashMap<String, Method>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Room {
    pub name: String,
    pub description: String,
    pub exits: BTreeMap<String, String>,
    pub items: Vec<String>,
    pub npcs: Vec<String>,
}

/// `picture name[size] = load("folder");`
#[derive(Debug, Clone, PartialEq)]
pub struct PictureDecl {
    pub name: String,
    pub size: i64,
    pub folder: String,
    pub line: usize,
}

/// Everything a script declares. Immutable once parsed, except for
/// [`Program::store`] which is the initial state an interpreter copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub npc: Option<String>,
    pub desc: Option<String>,
    pub classes: HashMap<String, ClassDef>,
    pub nodes: HashMap<String, Node>,
    pub entry: Option<String>,
    pub rooms: HashMap<String, Room>,
    pub current_room: Option<String>,
    pub pictures: Vec<PictureDecl>,
    pub store: Store,
}

impl Program {
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }
}
