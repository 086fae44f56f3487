//! Console debugger that pauses before nodes.
//!
//! Attached to an [`Interpreter`](crate::interpreter::Interpreter) as an
//! [`Observer`]. It stops when stepping or when a node's definition line has
//! a breakpoint, then reads commands from the interpreter's own input.

use std::{
    collections::BTreeSet,
    io::{self, BufRead, Write},
};

use tracing::debug;

use crate::{
    ast::Node,
    interpreter::Observer,
    store::{split_dotted, Env, Store},
};

#[derive(Debug, Clone, Default)]
pub struct Debugger {
    breakpoints: BTreeSet<usize>,
    stepping: bool,
}

impl Debugger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A debugger that stops before the very first node.
    pub fn stepping() -> Self {
        Debugger {
            breakpoints: BTreeSet::new(),
            stepping: true,
        }
    }

    pub fn add_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    pub fn remove_breakpoint(&mut self, line: usize) {
        self.breakpoints.remove(&line);
    }

    pub fn breakpoints(&self) -> impl Iterator<Item = usize> + '_ {
        self.breakpoints.iter().copied()
    }

    pub fn should_stop(&self, line: usize) -> bool {
        self.stepping || self.breakpoints.contains(&line)
    }

    fn cmd_print(&self, name: Option<&str>, store: &Store, out: &mut dyn Write) -> io::Result<()> {
        let Some(name) = name else {
            return writeln!(out, "Usage: print <variable>");
        };

        if let Some(value) = store.int(name) {
            writeln!(out, "{} = {}", name, value)
        } else if let Some(flag) = store.boolean(name) {
            writeln!(out, "{} = {}", name, flag)
        } else if let Some(text) = store.string(name) {
            writeln!(out, "{} = {}", name, text)
        } else if let Some(value) =
            split_dotted(name).and_then(|(object, field)| store.field(object, field))
        {
            writeln!(out, "{} = {}", name, value)
        } else {
            writeln!(out, "Variable not found.")
        }
    }

    fn cmd_variables(&self, store: &Store, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Integer variables:")?;
        for (name, value) in &store.ints {
            writeln!(out, "  {} = {}", name, value)?;
        }
        writeln!(out, "Boolean variables:")?;
        for (name, flag) in &store.bools {
            writeln!(out, "  {} = {}", name, flag)?;
        }
        writeln!(out, "String variables:")?;
        for (name, text) in &store.strings {
            writeln!(out, "  {} = {}", name, text)?;
        }
        writeln!(out, "Object fields:")?;
        for (instance, object) in &store.objects {
            for (field, value) in &object.fields {
                writeln!(out, "  {}.{} = {}", instance, field, value)?;
            }
        }
        Ok(())
    }

    fn cmd_breakpoints(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.breakpoints.is_empty() {
            return writeln!(out, "No breakpoints set.");
        }
        write!(out, "Breakpoints at lines:")?;
        for line in &self.breakpoints {
            write!(out, " {}", line)?;
        }
        writeln!(out)
    }

    fn cmd_break(&mut self, arg: Option<&str>, out: &mut dyn Write) -> io::Result<()> {
        match arg.map(str::parse::<usize>) {
            Some(Ok(line)) => {
                self.add_breakpoint(line);
                writeln!(out, "Breakpoint added at line {}", line)
            }
            Some(Err(_)) => writeln!(out, "Invalid line number"),
            None => writeln!(out, "Usage: break <line>"),
        }
    }

    fn cmd_delete(&mut self, arg: Option<&str>, out: &mut dyn Write) -> io::Result<()> {
        match arg.map(str::parse::<usize>) {
            Some(Ok(line)) => {
                self.remove_breakpoint(line);
                writeln!(out, "Breakpoint removed at line {}", line)
            }
            Some(Err(_)) => writeln!(out, "Invalid line number"),
            None => writeln!(out, "Usage: delete <line>"),
        }
    }

    fn cmd_help(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "Debugger commands:")?;
        writeln!(out, "  step (s):           Run until the next node.")?;
        writeln!(out, "  continue (c):       Run until the next breakpoint.")?;
        writeln!(out, "  print (p) <var>:    Print the value of a variable.")?;
        writeln!(out, "  variables (v):      List all variables.")?;
        writeln!(out, "  break (b) <line>:   Set a breakpoint at the specified line.")?;
        writeln!(out, "  delete <line>:      Remove a breakpoint at the specified line.")?;
        writeln!(out, "  breakpoints (b):    List all breakpoints.")?;
        writeln!(out, "  help (h):           Show this help message.")
    }
}

impl Observer for Debugger {
    fn before_node(
        &mut self,
        node: &Node,
        store: &Store,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> io::Result<()> {
        if !self.should_stop(node.line) {
            return Ok(());
        }

        debug!(node = %node.name, line = node.line, "debugger paused");
        writeln!(
            output,
            "Breakpoint at line {}. Type 'help' for commands.",
            node.line
        )?;

        loop {
            write!(output, "> ")?;
            output.flush()?;

            let mut raw = Vec::new();
            if input.read_until(b'\n', &mut raw)? == 0 {
                // nobody left to answer, let the script run
                self.stepping = false;
                return Ok(());
            }

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            let (verb, arg) = match line.split_once(char::is_whitespace) {
                Some((verb, arg)) => (verb, Some(arg.trim())),
                None => (line, None),
            };

            match (verb, arg) {
                ("step" | "s", _) => {
                    self.stepping = true;
                    return Ok(());
                }
                ("continue" | "c", _) => {
                    self.stepping = false;
                    return Ok(());
                }
                ("print" | "p", name) => self.cmd_print(name, store, output)?,
                ("variables" | "v", _) => self.cmd_variables(store, output)?,
                ("breakpoints", _) | ("b", None) => self.cmd_breakpoints(output)?,
                ("break" | "b", arg) => self.cmd_break(arg, output)?,
                ("delete", arg) => self.cmd_delete(arg, output)?,
                ("help" | "h", _) => self.cmd_help(output)?,
                _ => writeln!(
                    output,
                    "Unknown command. Type 'help' for available commands."
                )?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Object;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn node(line: usize) -> Node {
        Node {
            name: "Start".into(),
            line,
            ..Node::default()
        }
    }

    fn store() -> Store {
        let mut store = Store::default();
        store.ints.insert("gold".into(), 7);
        store.bools.insert("met".into(), true);
        store.strings.insert("title".into(), "Sir".into());
        store.objects.insert(
            "hero".into(),
            Object {
                class: "Actor".into(),
                fields: [("health".to_string(), 10)].into_iter().collect(),
            },
        );
        store
    }

    fn session(debugger: &mut Debugger, line: usize, commands: &str) -> String {
        let mut input = Cursor::new(commands.as_bytes().to_vec());
        let mut output = Vec::new();
        debugger
            .before_node(&node(line), &store(), &mut input, &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn runs_through_without_breakpoints() {
        let mut debugger = Debugger::new();
        assert_eq!(session(&mut debugger, 3, "p gold\n"), "");
    }

    #[test]
    fn inspects_the_store() {
        let mut debugger = Debugger::stepping();
        let output = session(
            &mut debugger,
            3,
            "p gold\nprint met\np title\np hero.health\np ghost\nprint\nc\n",
        );
        assert_eq!(
            output,
            indoc! {"
                Breakpoint at line 3. Type 'help' for commands.
                > gold = 7
                > met = true
                > title = Sir
                > hero.health = 10
                > Variable not found.
                > Usage: print <variable>
                > "}
        );
        assert!(!debugger.should_stop(3));
    }

    #[test]
    fn lists_variables() {
        let mut debugger = Debugger::stepping();
        let output = session(&mut debugger, 1, "v\ns\n");
        assert_eq!(
            output,
            indoc! {"
                Breakpoint at line 1. Type 'help' for commands.
                > Integer variables:
                  gold = 7
                Boolean variables:
                  met = true
                String variables:
                  title = Sir
                Object fields:
                  hero.health = 10
                > "}
        );
        assert!(debugger.should_stop(99));
    }

    #[test]
    fn manages_breakpoints() {
        let mut debugger = Debugger::stepping();
        let output = session(
            &mut debugger,
            1,
            "b\nbreak 9\nb 4\nbreak x\nbreakpoints\ndelete 9\ndelete\nb\nc\n",
        );
        assert_eq!(
            output,
            indoc! {"
                Breakpoint at line 1. Type 'help' for commands.
                > No breakpoints set.
                > Breakpoint added at line 9
                > Breakpoint added at line 4
                > Invalid line number
                > Breakpoints at lines: 4 9
                > Breakpoint removed at line 9
                > Usage: delete <line>
                > Breakpoints at lines: 4
                > "}
        );
        assert_eq!(debugger.breakpoints().collect::<Vec<_>>(), vec![4]);
        assert!(debugger.should_stop(4));
        assert!(!debugger.should_stop(9));
    }

    #[test]
    fn unknown_commands_and_end_of_input() {
        let mut debugger = Debugger::stepping();
        let output = session(&mut debugger, 2, "dance\n");
        assert_eq!(
            output,
            indoc! {"
                Breakpoint at line 2. Type 'help' for commands.
                > Unknown command. Type 'help' for available commands.
                > "}
        );
        assert!(!debugger.should_stop(2));
    }
}
