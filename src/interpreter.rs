use std::{
    collections::BTreeMap,
    io::{self, BufRead, Write},
};

use tracing::{debug, warn};

use crate::{
    ast::{Action, MethodCall, Node, PrintArg, Program, Statement},
    common::{Diagnostic, Error},
    store::{split_dotted, Env, Store},
};

pub const DEFAULT_PLAYER: &str = "Andrew";

/// Nested method calls deeper than this are skipped with a diagnostic.
const MAX_CALL_DEPTH: usize = 64;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Substituted for `[@You]` in node, show and choice text.
    pub player_name: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            player_name: DEFAULT_PLAYER.to_string(),
        }
    }
}

/// How a run terminated. None of these are errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An `end;` action was executed.
    Ended,
    /// The named node ran out of actions without jumping anywhere.
    Completed { node: String },
    /// A jump or choice led to a node that does not exist.
    UnknownNode(String),
    /// The script declares no nodes.
    NoEntry,
    /// Input ran out while waiting for a choice.
    InputClosed,
}

/// Hooks into a running interpreter. Every method has a no-op default.
pub trait Observer {
    /// Called before each node is rendered. Receives the interpreter's own
    /// console so interactive observers can prompt on the same streams.
    fn before_node(
        &mut self,
        _node: &Node,
        _store: &Store,
        _input: &mut dyn BufRead,
        _output: &mut dyn Write,
    ) -> io::Result<()> {
        Ok(())
    }

    fn on_signal(&mut self, _name: &str, _value: i64) {}

    fn on_diagnostic(&mut self, _diagnostic: &Diagnostic) {}
}

enum Flow<'a> {
    Continue,
    Jump(&'a str),
    End,
}

/// A method call's private copy of the global integers and booleans,
/// plus its parameters and the receiver's fields.
#[derive(Debug, Clone, Default)]
struct Locals {
    receiver: String,
    ints: BTreeMap<String, i64>,
    bools: BTreeMap<String, bool>,
}

impl Locals {
    fn assign(&mut self, name: &str, value: i64) {
        if let Some(flag) = self.bools.get_mut(name) {
            *flag = value != 0;
        } else {
            self.ints.insert(name.to_string(), value);
        }
    }
}

struct Scope<'s> {
    locals: Option<&'s Locals>,
    store: &'s Store,
}

impl Env for Scope<'_> {
    fn int(&self, name: &str) -> Option<i64> {
        match self.locals {
            Some(locals) => locals.ints.get(name).copied(),
            None => self.store.int(name),
        }
    }

    fn boolean(&self, name: &str) -> Option<bool> {
        match self.locals {
            Some(locals) => locals.bools.get(name).copied(),
            None => self.store.boolean(name),
        }
    }

    fn field(&self, object: &str, field: &str) -> Option<i64> {
        self.store.field(object, field)
    }

    fn string(&self, name: &str) -> Option<&str> {
        self.store.string(name)
    }
}

fn lookup(name: &str, env: &dyn Env) -> String {
    if let Some((object, field)) = split_dotted(name) {
        return env.field(object, field).unwrap_or(0).to_string();
    }
    if let Some(text) = env.string(name) {
        return text.to_string();
    }
    if let Some(flag) = env.boolean(name) {
        return flag.to_string();
    }
    env.int(name).unwrap_or(0).to_string()
}

/// Replaces every `${name}` marker. Scanning resumes after the inserted
/// text; an unterminated marker ends substitution.
pub fn interpolate(text: &str, env: &dyn Env) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&lookup(&after[..end], env));
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

pub struct Interpreter<'a, R, W> {
    program: &'a Program,
    store: Store,
    input: R,
    output: W,
    options: RunOptions,
    observers: Vec<Box<dyn Observer + 'a>>,
    diagnostics: Vec<Diagnostic>,

    line: usize,
    depth: usize,
}

impl<'a, R: BufRead, W: Write> Interpreter<'a, R, W> {
    pub fn new(program: &'a Program, input: R, output: W) -> Self {
        Interpreter {
            program,
            store: program.store.clone(),
            input,
            output,
            options: RunOptions::default(),
            observers: Vec::new(),
            diagnostics: Vec::new(),
            line: 0,
            depth: 0,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn observe(&mut self, observer: impl Observer + 'a) {
        self.observers.push(Box::new(observer));
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    fn report(&mut self, message: String) {
        let diagnostic = Diagnostic::new(self.line, message);
        warn!(%diagnostic, "runtime diagnostic");
        for observer in &mut self.observers {
            observer.on_diagnostic(&diagnostic);
        }
        self.diagnostics.push(diagnostic);
    }

    fn with_player(&self, text: &str) -> String {
        text.replace("[@You]", &format!("[{}]", self.options.player_name))
    }

    fn render(&self, text: &str, locals: Option<&Locals>) -> String {
        let scope = Scope {
            locals,
            store: &self.store,
        };
        interpolate(&self.with_player(text), &scope)
    }

    fn eval(&self, expr: &crate::expr::Expr, locals: Option<&Locals>) -> i64 {
        expr.eval(&Scope {
            locals,
            store: &self.store,
        })
    }

    pub fn run(&mut self) -> Result<Outcome, Error> {
        let program = self.program;

        if let Some(npc) = &program.npc {
            writeln!(self.output, "Npc: {}", npc)?;
        }
        if let Some(desc) = &program.desc {
            writeln!(self.output, "Description: {}\n", desc)?;
        }

        let Some(mut current) = program.entry.as_deref() else {
            self.report("script declares no nodes".to_string());
            return Ok(Outcome::NoEntry);
        };

        loop {
            let Some(node) = program.node(current) else {
                self.report(format!("Unknown node: {}", current));
                return Ok(Outcome::UnknownNode(current.to_string()));
            };
            self.line = node.line;
            debug!(node = %node.name, line = node.line, "visiting node");

            for observer in &mut self.observers {
                observer.before_node(node, &self.store, &mut self.input, &mut self.output)?;
            }

            if let Some(text) = &node.text {
                let rendered = self.render(text, None);
                writeln!(self.output, "{}", rendered)?;
            }

            if !node.choices.is_empty() {
                match self.choose(node)? {
                    Some(target) => {
                        current = target;
                        continue;
                    }
                    None => return Ok(Outcome::InputClosed),
                }
            }

            match self.exec_actions(&node.actions, None)? {
                Flow::Jump(target) => current = target,
                Flow::End => {
                    writeln!(self.output, "[Dialogue ended]")?;
                    return Ok(Outcome::Ended);
                }
                Flow::Continue => {
                    writeln!(self.output, "[End of Conversation]")?;
                    return Ok(Outcome::Completed {
                        node: node.name.clone(),
                    });
                }
            }
        }
    }

    /// Prompts until the player picks a declared choice id.
    fn choose(&mut self, node: &'a Node) -> Result<Option<&'a str>, Error> {
        for choice in &node.choices {
            let text = self.with_player(&choice.text);
            writeln!(self.output, "[{}] {}", choice.id, text)?;
        }

        loop {
            write!(self.output, "Choose: ")?;
            self.output.flush()?;

            let mut raw = Vec::new();
            if self.input.read_until(b'\n', &mut raw)? == 0 {
                return Ok(None);
            }

            let line = String::from_utf8_lossy(&raw);
            let Ok(selection) = line.trim().parse::<i64>() else {
                writeln!(self.output, "Invalid")?;
                continue;
            };

            match node.choices.iter().find(|choice| choice.id == selection) {
                Some(choice) => return Ok(Some(&choice.target)),
                None => writeln!(self.output, "Invalid choice")?,
            }
        }
    }

    fn exec_actions(
        &mut self,
        actions: &'a [Action],
        mut locals: Option<&mut Locals>,
    ) -> Result<Flow<'a>, Error> {
        for action in actions {
            match self.exec_action(action, locals.as_deref_mut())? {
                Flow::Continue => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_action(
        &mut self,
        action: &'a Action,
        locals: Option<&mut Locals>,
    ) -> Result<Flow<'a>, Error> {
        match action {
            Action::Set(set) => {
                let value = self.eval(&set.value, locals.as_deref());
                match (split_dotted(&set.target), locals) {
                    (Some((object, field)), locals) => {
                        // keep the receiver's local copy current so write-back
                        // does not undo the assignment
                        if let Some(locals) = locals.filter(|locals| locals.receiver == object) {
                            locals.ints.insert(field.to_string(), value);
                        }
                        self.store.set_field(object, field, value);
                    }
                    (None, Some(locals)) => locals.assign(&set.target, value),
                    (None, None) => self.store.assign(&set.target, value),
                }
            }
            Action::Signal(signal) => {
                let value = self.eval(&signal.value, locals.as_deref());
                debug!(name = %signal.name, value, "signal");
                writeln!(self.output, "[SIGNAL] {} = {}", signal.name, value)?;
                for observer in &mut self.observers {
                    observer.on_signal(&signal.name, value);
                }
            }
            Action::If(branch) => {
                if self.eval(&branch.condition, locals.as_deref()) != 0 {
                    return Ok(Flow::Jump(&branch.then_target));
                }
                if let Some(target) = &branch.else_target {
                    return Ok(Flow::Jump(target));
                }
            }
            Action::Goto(goto) => return Ok(Flow::Jump(&goto.target)),
            Action::End => return Ok(Flow::End),
            Action::Statement(statement) => return self.exec_statement(statement, locals),
            Action::Show(show) => {
                let rendered = self.render(&show.text, locals.as_deref());
                writeln!(self.output, "{}", rendered)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn exec_statement(
        &mut self,
        statement: &'a Statement,
        locals: Option<&mut Locals>,
    ) -> Result<Flow<'a>, Error> {
        let program = self.program;
        match statement {
            Statement::MethodCall(call) => return self.call_method(call, locals.as_deref()),
            Statement::New(new) => match program.classes.get(&new.class) {
                Some(class) => self.store.instantiate(&new.instance, class),
                None => self.report(format!("Unknown class in inline new: {}", new.class)),
            },
            Statement::Print(PrintArg::Text(text)) => writeln!(self.output, "{}", text)?,
            Statement::Print(PrintArg::Value(expr)) => {
                let value = self.eval(expr, locals.as_deref()) != 0;
                writeln!(self.output, "{}", value)?;
            }
            Statement::Other(text) => debug!(statement = %text, "ignoring statement"),
        }
        Ok(Flow::Continue)
    }

    fn call_method(
        &mut self,
        call: &MethodCall,
        caller: Option<&Locals>,
    ) -> Result<Flow<'a>, Error> {
        let program = self.program;
        let args: Vec<i64> = call
            .args
            .iter()
            .map(|arg| self.eval(arg, caller))
            .collect();

        let Some(object) = self.store.objects.get(&call.instance) else {
            self.report(format!("unknown instance '{}'", call.instance));
            return Ok(Flow::Continue);
        };
        let fields = object.fields.clone();
        let Some(class) = program.classes.get(&object.class) else {
            let message = format!(
                "unknown class '{}' for instance '{}'",
                object.class, call.instance
            );
            self.report(message);
            return Ok(Flow::Continue);
        };
        let Some(method) = class.methods.get(&call.method) else {
            self.report(format!(
                "class '{}' has no method '{}'",
                class.name, call.method
            ));
            return Ok(Flow::Continue);
        };
        if self.depth >= MAX_CALL_DEPTH {
            self.report(format!(
                "call depth exceeded calling {}.{}",
                call.instance, call.method
            ));
            return Ok(Flow::Continue);
        }

        let mut locals = Locals {
            receiver: call.instance.clone(),
            ints: self.store.ints.clone(),
            bools: self.store.bools.clone(),
        };
        for (param, value) in method.params.iter().zip(&args) {
            locals.ints.insert(param.clone(), *value);
        }
        for (field, value) in fields {
            locals.ints.entry(field).or_insert(value);
        }

        debug!(instance = %call.instance, method = %call.method, ?args, "calling method");
        self.depth += 1;
        let flow = self.exec_actions(&method.body, Some(&mut locals));
        self.depth -= 1;
        let flow = flow?;

        // Whole-scope write-back: any global sharing a name with a local,
        // parameter or field receives the local value.
        if let Some(object) = self.store.objects.get_mut(&call.instance) {
            for field in class.fields.keys() {
                if let Some(value) = locals.ints.get(field) {
                    object.fields.insert(field.clone(), *value);
                }
            }
        }
        for (name, value) in self.store.ints.iter_mut() {
            if let Some(local) = locals.ints.get(name) {
                *value = *local;
            }
        }
        for (name, flag) in self.store.bools.iter_mut() {
            if let Some(local) = locals.bools.get(name) {
                *flag = *local;
            }
        }

        match flow {
            Flow::Jump(target) => {
                debug!(target, "jump inside a method body has no effect");
                Ok(Flow::Continue)
            }
            flow => Ok(flow),
        }
    }
}
