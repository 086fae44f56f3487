mod common;

use std::{cell::RefCell, io::Write, rc::Rc};

use common::{run, run_with};
use crtz::{
    ast::Node, parse, run_source, store::Store, Debugger, Diagnostic, Interpreter, Observer,
    Outcome, RunOptions,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

#[test]
fn header_text_and_completion() {
    let run = run(
        indoc! {r#"
            npc "Guard";
            desc "A tired guard.";
            int playerHp = 12;
            node Start { line "Halt, [@You]! You have ${playerHp} hp."; }
        "#},
        "",
    );

    assert_eq!(
        run.output,
        indoc! {"
            Npc: Guard
            Description: A tired guard.

            Halt, [Andrew]! You have 12 hp.
            [End of Conversation]
        "}
    );
    assert_eq!(
        run.outcome,
        Outcome::Completed {
            node: "Start".into()
        }
    );
}

#[test]
fn player_name_is_configurable() {
    let run = run_with(
        indoc! {r#"
            node Start {
                line "Welcome, [@You].";
                choice 1: "[@You] waves" -> Bye;
            }
            node Bye { show "Farewell [@You]"; end; }
        "#},
        "1\n",
        RunOptions {
            player_name: "Mira".into(),
        },
    );

    assert_eq!(
        run.output,
        indoc! {"
            Welcome, [Mira].
            [1] [Mira] waves
            Choose: Farewell [Mira]
            [Dialogue ended]
        "}
    );
}

const GATE: &str = indoc! {r#"
    node Start {
        line "Pick";
        choice 1: "Fight" -> Fight;
        choice 3: "Flee" -> Flee;
        set gold = 99;
    }
    node Fight { line "Fight!"; end; }
    node Flee { line "Bye"; }
"#};

#[test]
fn choices_reprompt_until_valid() {
    let run = run(GATE, "abc\n2\n 3 \n");

    assert_eq!(
        run.output,
        indoc! {"
            Pick
            [1] Fight
            [3] Flee
            Choose: Invalid
            Choose: Invalid choice
            Choose: Bye
            [End of Conversation]
        "}
    );
    assert_eq!(
        run.outcome,
        Outcome::Completed {
            node: "Flee".into()
        }
    );
    // choices pre-empt the node's actions
    assert_eq!(run.store.ints.get("gold"), None);
}

#[test]
fn closed_input_stops_at_the_prompt() {
    let run = run(GATE, "9\n");

    assert_eq!(run.outcome, Outcome::InputClosed);
    assert!(run.output.ends_with("Choose: Invalid choice\nChoose: "));
}

const BRANCH: &str = indoc! {r#"
    int hp = 0;
    node Start {
        if (hp <= 0) goto Dead else goto Alive;
    }
    node Dead { line "dead"; end; }
    node Alive { line "alive"; end; }
"#};

#[test]
fn if_else_branches() {
    let dead = run(BRANCH, "");
    assert_eq!(dead.output, "dead\n[Dialogue ended]\n");

    let alive = run(&BRANCH.replace("hp = 0", "hp = 5"), "");
    assert_eq!(alive.output, "alive\n[Dialogue ended]\n");
}

#[test]
fn if_without_else_falls_through() {
    let run = run(
        indoc! {r#"
            int hp = 4;
            node Start {
                if (hp <= 0) goto Dead;
                show "still standing";
            }
            node Dead { end; }
        "#},
        "",
    );

    assert_eq!(run.output, "still standing\n[End of Conversation]\n");
}

#[test]
fn set_respects_declared_types() {
    let run = run(
        indoc! {r#"
            match met;
            match angry = true;
            node Start {
                set met = 5;
                set angry = 0;
                set fresh = 2 + 3;
                set hero.health = fresh * 2;
            }
        "#},
        "",
    );

    assert_eq!(run.store.bools["met"], true);
    assert_eq!(run.store.bools["angry"], false);
    assert_eq!(run.store.ints["fresh"], 5);
    assert_eq!(run.store.ints.get("met"), None);
    assert_eq!(run.store.objects["hero"].fields["health"], 10);
}

#[test]
fn signals_print_their_value() {
    let run = run(
        indoc! {r#"
            int level = 2;
            node Start { signal alarm = level * 3; signal quiet = nothing; }
        "#},
        "",
    );

    assert_eq!(
        run.output,
        "[SIGNAL] alarm = 6\n[SIGNAL] quiet = 0\n[End of Conversation]\n"
    );
}

#[test]
fn end_halts_immediately() {
    let run = run(
        indoc! {r#"
            node Start { show "before"; end; show "after"; goto Other; }
            node Other { line "never"; }
        "#},
        "",
    );

    assert_eq!(run.output, "before\n[Dialogue ended]\n");
    assert_eq!(run.outcome, Outcome::Ended);
}

#[test]
fn unknown_node_is_reported() {
    let run = run(
        indoc! {r#"
            node Start {
                goto Nowhere;
            }
        "#},
        "",
    );

    assert_eq!(run.outcome, Outcome::UnknownNode("Nowhere".into()));
    assert_eq!(run.diagnostics, vec![Diagnostic::new(1, "Unknown node: Nowhere")]);
}

#[test]
fn script_without_nodes() {
    let run = run("int x = 1;", "");
    assert_eq!(run.outcome, Outcome::NoEntry);
    assert_eq!(run.output, "");
}

#[test]
fn interpolation_reads_every_table() {
    let run = run(
        indoc! {r#"
            string title = "Sir";
            match met = true;
            int playerHp = 17;
            node Start {
                set hero.health = 9;
                show "${title} ${met} ${playerHp} ${hero.health} ${nope} ${hero.nope}";
                show "odd ${${playerHp}} and ${playerHp";
            }
        "#},
        "",
    );

    assert_eq!(
        run.output,
        indoc! {"
            Sir true 17 9 0 0
            odd 0} and ${playerHp
            [End of Conversation]
        "}
    );
}

#[test]
fn print_statements() {
    let run = run(
        indoc! {r#"
            int hp = 3;
            node Start {
                print("hello");
                print(hp > 2);
                print(hp - 3);
                dance wildly;
            }
        "#},
        "",
    );

    assert_eq!(run.output, "hello\ntrue\nfalse\n[End of Conversation]\n");
}

#[derive(Default)]
struct Recorder {
    nodes: Vec<String>,
    signals: Vec<(String, i64)>,
    diagnostics: Vec<Diagnostic>,
}

struct Shared(Rc<RefCell<Recorder>>);

impl Observer for Shared {
    fn before_node(
        &mut self,
        node: &Node,
        _store: &Store,
        _input: &mut dyn std::io::BufRead,
        _output: &mut dyn Write,
    ) -> std::io::Result<()> {
        self.0.borrow_mut().nodes.push(node.name.clone());
        Ok(())
    }

    fn on_signal(&mut self, name: &str, value: i64) {
        self.0.borrow_mut().signals.push((name.to_string(), value));
    }

    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.0.borrow_mut().diagnostics.push(diagnostic.clone());
    }
}

#[test]
fn observers_see_nodes_signals_and_diagnostics() {
    let parsed = parse(indoc! {r#"
        node Start { signal door = 1; goto Hall; }
        node Hall { signal door = 0; ghost.haunt(); }
    "#});
    let recorder = Rc::new(RefCell::new(Recorder::default()));

    let mut output = Vec::new();
    let mut interpreter = Interpreter::new(&parsed.program, "".as_bytes(), &mut output);
    interpreter.observe(Shared(recorder.clone()));
    interpreter.run().unwrap();

    let recorder = recorder.borrow();
    assert_eq!(recorder.nodes, vec!["Start", "Hall"]);
    assert_eq!(
        recorder.signals,
        vec![("door".to_string(), 1), ("door".to_string(), 0)]
    );
    assert_eq!(
        recorder.diagnostics,
        vec![Diagnostic::new(2, "unknown instance 'ghost'")]
    );
}

#[test]
fn debugger_shares_the_console() {
    let parsed = parse(indoc! {r#"
        int gold = 3;
        node Start {
            line "Pay up.";
            choice 1: "Pay" -> Paid;
        }
        node Paid { set gold = 0; end; }
    "#});

    let mut output = Vec::new();
    {
        let mut interpreter =
            Interpreter::new(&parsed.program, "p gold\nc\n1\n".as_bytes(), &mut output);
        interpreter.observe(Debugger::stepping());
        assert_eq!(interpreter.run().unwrap(), Outcome::Ended);
        assert_eq!(interpreter.store().ints["gold"], 0);
    }

    assert_eq!(
        String::from_utf8(output).unwrap(),
        indoc! {"
            Breakpoint at line 2. Type 'help' for commands.
            > gold = 3
            > Pay up.
            [1] Pay
            Choose: [Dialogue ended]
        "}
    );
}

#[test]
fn run_source_reports_both_diagnostic_kinds() {
    let mut output = Vec::new();
    let report = run_source(
        indoc! {r#"
            banana;
            node Start { goto Missing; }
        "#},
        RunOptions::default(),
        "".as_bytes(),
        &mut output,
    )
    .unwrap();

    assert_eq!(report.outcome, Outcome::UnknownNode("Missing".into()));
    assert_eq!(
        report.parse_diagnostics,
        vec![Diagnostic::new(1, "Unknown top-level keyword: banana")]
    );
    assert_eq!(
        report.runtime_diagnostics,
        vec![Diagnostic::new(2, "Unknown node: Missing")]
    );
}

#[test]
fn undecodable_answer_is_reprompted() {
    let parsed = parse(indoc! {r#"
        node Start { choice 1: "A" -> A; }
        node A { line "picked"; }
    "#});

    let mut output = Vec::new();
    let outcome = Interpreter::new(&parsed.program, &b"\xff\xfe\n1\n"[..], &mut output)
        .run()
        .unwrap();

    assert_eq!(outcome, Outcome::Completed { node: "A".into() });
    assert_eq!(
        String::from_utf8(output).unwrap(),
        indoc! {"
            [1] A
            Choose: Invalid
            Choose: picked
            [End of Conversation]
        "}
    );
}

#[test]
fn negative_choice_id_is_selectable() {
    let run = run(
        indoc! {r#"
            node Start { choice -1: "Back" -> Back; }
            node Back { show "went back"; }
        "#},
        "-1\n",
    );

    assert_eq!(run.output, "[-1] Back\nChoose: went back\n[End of Conversation]\n");
}
