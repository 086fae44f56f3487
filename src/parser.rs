use tracing::debug;

use crate::{
    ast::{
        self, Action, ClassDef, GotoAction, IfAction, Method, MethodCall, NewInstance, Node,
        PictureDecl, PrintArg, Program, Room, SetAction, ShowAction, SignalAction, Statement,
    },
    common::Diagnostic,
    expr::Expr,
    lexer::Lexer,
    token::{Token, TokenKind},
};

/// A (possibly partial) program and every problem met while building it.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

enum BodyItem {
    Line(String),
    Choice(ast::Choice),
    Actions(Vec<Action>),
}

struct Parser {
    lexer: Lexer,
    tk: Token,
    program: Program,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(source: &str) -> Self {
        let mut lexer = Lexer::from_str(source);
        let tk = lexer.next_token();
        Parser {
            lexer,
            tk,
            program: Program::default(),
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tk
    }

    fn consume(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.tk, next)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.tk.kind == kind
    }

    fn at_end(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    fn accept(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.consume();
            true
        } else {
            false
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.error_at(self.tk.line, message);
    }

    fn error_at(&mut self, line: usize, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(line, message);
        debug!(%diagnostic, "parse diagnostic");
        self.diagnostics.push(diagnostic);
    }

    fn expect(&mut self, kind: TokenKind, symbol: &str) -> bool {
        if self.accept(kind) {
            return true;
        }
        let got = self.tk.describe().to_string();
        self.error(format!("Expected symbol '{}' but got '{}'", symbol, got));
        false
    }

    /// Consumes `kind` or records `message` without consuming anything.
    fn require(&mut self, kind: TokenKind, message: &str) -> bool {
        if self.accept(kind) {
            true
        } else {
            self.error(message);
            false
        }
    }

    fn ident(&mut self) -> Option<String> {
        if self.at(TokenKind::Ident) {
            Some(self.consume().text)
        } else {
            None
        }
    }

    fn string(&mut self) -> Option<String> {
        if self.at(TokenKind::String) {
            Some(self.consume().text)
        } else {
            None
        }
    }

    /// Skips past the next `;` after a malformed declaration.
    fn recover(&mut self) {
        while !self.at_end() && !self.at(TokenKind::Semicolon) {
            self.consume();
        }
        self.accept(TokenKind::Semicolon);
    }

    /// Gathers raw tokens of a statement up to (not including) `;` or `}`.
    fn statement_tokens(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.at_end() && !self.at(TokenKind::Semicolon) && !self.at(TokenKind::RightBrace)
        {
            tokens.push(self.consume());
        }
        tokens
    }

    fn source_text(&self, tokens: &[Token]) -> String {
        match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => self.lexer.slice(&(first.span.start..last.span.end)),
            _ => String::new(),
        }
    }

    fn expr_of(&self, tokens: &[Token]) -> Expr {
        Expr::from_tokens(self.source_text(tokens), tokens)
    }

    fn parse(&mut self) {
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Picture => self.parse_picture(),
                TokenKind::Ident => match self.peek().text.as_str() {
                    "npc" => self.parse_npc(),
                    "desc" => self.parse_desc(),
                    "int" | "string" | "match" => self.parse_var_decl(),
                    "node" => self.parse_node(),
                    "class" => self.parse_class(),
                    "new" => self.parse_new_instance(),
                    "room" => self.parse_room(),
                    other => {
                        let message = format!("Unknown top-level keyword: {}", other);
                        self.error(message);
                        self.consume();
                    }
                },
                _ => {
                    self.consume();
                }
            }
        }
    }

    fn parse_npc(&mut self) {
        self.consume();
        match self.string() {
            Some(npc) => {
                self.program.npc = Some(npc);
                self.expect(TokenKind::Semicolon, ";");
            }
            None => self.error("npc requires string"),
        }
    }

    fn parse_desc(&mut self) {
        self.consume();
        match self.string() {
            Some(desc) => {
                self.program.desc = Some(desc);
                self.expect(TokenKind::Semicolon, ";");
            }
            None => self.error("desc requires string"),
        }
    }

    fn parse_var_decl(&mut self) {
        let ty = self.consume().text;

        let Some(name) = self.ident() else {
            self.error(format!("{} expects identifier", ty));
            self.recover();
            return;
        };

        if !self.accept(TokenKind::Equal) {
            let store = &mut self.program.store;
            match ty.as_str() {
                "string" => {
                    store.strings.insert(name, String::new());
                }
                "match" => {
                    store.bools.insert(name, false);
                }
                _ => {
                    store.ints.insert(name, 0);
                }
            }
            self.expect(TokenKind::Semicolon, ";");
            return;
        }

        match ty.as_str() {
            "string" => {
                if self.at(TokenKind::String) || self.at(TokenKind::StringDecl) {
                    let value = self.consume().text;
                    self.program.store.strings.insert(name, value);
                    self.expect(TokenKind::Semicolon, ";");
                } else {
                    self.error("String variable requires string literal");
                    self.recover();
                }
            }
            "match" => {
                if self.at(TokenKind::True) || self.at(TokenKind::False) {
                    let value = self.consume().kind == TokenKind::True;
                    self.program.store.bools.insert(name, value);
                    self.expect(TokenKind::Semicolon, ";");
                } else {
                    self.error("Boolean variable requires true or false");
                    self.recover();
                }
            }
            _ => {
                let tokens = self.statement_tokens();
                self.expect(TokenKind::Semicolon, ";");
                let value = self.expr_of(&tokens).eval(&self.program.store);
                self.program.store.ints.insert(name, value);
            }
        }
    }

    fn parse_class(&mut self) {
        self.consume();
        let Some(class_name) = self.ident() else {
            self.error("class expects a name");
            return;
        };
        if !self.require(TokenKind::LeftBrace, "expected '{' after class name") {
            return;
        }

        let mut class = ClassDef {
            name: class_name.clone(),
            ..ClassDef::default()
        };

        while !self.at(TokenKind::RightBrace) && !self.at_end() {
            if !self.at(TokenKind::Ident) {
                self.consume();
                continue;
            }
            match self.peek().text.as_str() {
                "int" => self.parse_field(&mut class),
                "void" => self.parse_method(&mut class),
                other => {
                    let message = format!("Unknown class member: {}", other);
                    self.error(message);
                    self.consume();
                }
            }
        }

        self.expect(TokenKind::RightBrace, "}");
        self.program.classes.insert(class_name, class);
    }

    fn parse_field(&mut self, class: &mut ClassDef) {
        self.consume();
        let Some(field) = self.ident() else {
            self.error("field expects identifier");
            self.consume();
            return;
        };

        let mut value = 0;
        if self.accept(TokenKind::Equal) {
            let tokens = self.statement_tokens();
            self.expect(TokenKind::Semicolon, ";");
            value = self.expr_of(&tokens).eval(&self.program.store);
        } else {
            self.expect(TokenKind::Semicolon, ";");
        }
        class.fields.insert(field, value);
    }

    fn parse_method(&mut self, class: &mut ClassDef) {
        self.consume();
        let Some(method_name) = self.ident() else {
            self.error("method expects a name");
            return;
        };

        if !self.accept(TokenKind::LeftParen) {
            self.error("expected '(' after method name");
        }
        let mut params = Vec::new();
        while !self.at(TokenKind::RightParen) && !self.at_end() {
            let token = self.consume();
            if token.kind == TokenKind::Ident {
                params.push(token.text);
            }
        }
        self.expect(TokenKind::RightParen, ")");

        if !self.require(TokenKind::LeftBrace, "expected '{' for method body") {
            return;
        }

        let mut body = Vec::new();
        while !self.at(TokenKind::RightBrace) && !self.at_end() {
            if !self.at(TokenKind::Ident) {
                self.consume();
                continue;
            }
            let line = self.peek().line;
            match self.parse_body_item() {
                Some(BodyItem::Actions(actions)) => body.extend(actions),
                Some(BodyItem::Line(_)) => {
                    self.error_at(line, "line is not allowed in a method body")
                }
                Some(BodyItem::Choice(_)) => {
                    self.error_at(line, "choice is not allowed in a method body")
                }
                None => {}
            }
        }
        self.expect(TokenKind::RightBrace, "}");

        class
            .methods
            .insert(method_name, Method { params, body });
    }

    fn parse_new_instance(&mut self) {
        let line = self.consume().line;
        let Some(class_name) = self.ident() else {
            self.error("new expects class name");
            return;
        };
        let Some(instance) = self.ident() else {
            self.error("new expects instance name");
            return;
        };
        self.expect(TokenKind::Semicolon, ";");

        match self.program.classes.get(&class_name) {
            Some(class) => self.program.store.instantiate(&instance, class),
            None => self.error_at(line, format!("Unknown class {} for new", class_name)),
        }
    }

    fn parse_room(&mut self) {
        self.consume();
        let Some(room_name) = self.ident() else {
            self.error("room expects a name");
            return;
        };
        if !self.require(TokenKind::LeftBrace, "expected '{' after room name") {
            return;
        }

        let mut room = Room {
            name: room_name.clone(),
            ..Room::default()
        };

        while !self.at(TokenKind::RightBrace) && !self.at_end() {
            let keyword = self.consume();
            if keyword.kind != TokenKind::Ident {
                continue;
            }
            match keyword.text.as_str() {
                "desc" => {
                    if let Some(description) = self.string() {
                        room.description = description;
                        self.expect(TokenKind::Semicolon, ";");
                    }
                }
                "exit" => {
                    if let Some(direction) = self.ident() {
                        if let Some(target) = self.ident() {
                            room.exits.insert(direction, target);
                            self.expect(TokenKind::Semicolon, ";");
                        }
                    }
                }
                "item" => {
                    if let Some(item) = self.ident() {
                        room.items.push(item);
                        self.expect(TokenKind::Semicolon, ";");
                    }
                }
                "npc" => {
                    if let Some(npc) = self.ident() {
                        room.npcs.push(npc);
                        self.expect(TokenKind::Semicolon, ";");
                    }
                }
                _ => {}
            }
        }
        self.expect(TokenKind::RightBrace, "}");

        if self.program.current_room.is_none() {
            self.program.current_room = Some(room_name.clone());
        }
        self.program.rooms.insert(room_name, room);
    }

    fn parse_picture(&mut self) {
        let line = self.consume().line;

        let Some(name) = self.ident() else {
            self.error("picture expects an identifier");
            return;
        };
        if !self.require(TokenKind::LeftBracket, "expected '[' after picture name") {
            return;
        }
        if !self.at(TokenKind::Number) {
            self.error("expected number for array size");
            return;
        }
        let size = self.consume().number;
        if !self.require(TokenKind::RightBracket, "expected ']' after array size")
            || !self.require(TokenKind::Equal, "expected '=' after array declaration")
            || !self.require(TokenKind::Load, "expected 'load' keyword")
            || !self.require(TokenKind::LeftParen, "expected '(' after load")
        {
            return;
        }
        let Some(folder) = self.string() else {
            self.error("expected string for folder path");
            return;
        };
        if !self.require(TokenKind::RightParen, "expected ')' after folder path") {
            return;
        }
        self.expect(TokenKind::Semicolon, ";");

        self.program.pictures.push(PictureDecl {
            name,
            size,
            folder,
            line,
        });
    }

    fn parse_node(&mut self) {
        let line = self.consume().line;
        let Some(name) = self.ident() else {
            self.error("node expects name");
            self.consume();
            return;
        };

        if self.program.entry.is_none() {
            self.program.entry = Some(name.clone());
        }
        if !self.require(TokenKind::LeftBrace, "expected '{' after node name") {
            return;
        }

        let mut node = Node {
            name: name.clone(),
            line,
            ..Node::default()
        };

        while !self.at(TokenKind::RightBrace) && !self.at_end() {
            if !self.at(TokenKind::Ident) {
                self.consume();
                continue;
            }
            match self.parse_body_item() {
                Some(BodyItem::Line(text)) => node.text = Some(text),
                Some(BodyItem::Choice(choice)) => node.choices.push(choice),
                Some(BodyItem::Actions(actions)) => node.actions.extend(actions),
                None => {}
            }
        }
        self.expect(TokenKind::RightBrace, "}");

        debug!(node = %name, line, "parsed node");
        self.program.nodes.insert(name, node);
    }

    /// One item of a node or method body; the current token is an identifier.
    fn parse_body_item(&mut self) -> Option<BodyItem> {
        let keyword = self.peek().text.clone();
        match keyword.as_str() {
            "line" => {
                self.consume();
                let text = self.string();
                self.expect(TokenKind::Semicolon, ";");
                text.map(BodyItem::Line)
            }
            "show" => {
                self.consume();
                let Some(first) = self.string() else {
                    self.error("show requires string literal");
                    return None;
                };
                let mut texts = vec![first];
                while self.accept(TokenKind::Comma) {
                    match self.string() {
                        Some(text) => texts.push(text),
                        None => {
                            self.error("show expects string after comma");
                            break;
                        }
                    }
                }
                self.expect(TokenKind::Semicolon, ";");
                Some(BodyItem::Actions(
                    texts
                        .into_iter()
                        .map(|text| ShowAction { text }.into())
                        .collect(),
                ))
            }
            "choice" => self.parse_choice().map(BodyItem::Choice),
            "set" => {
                self.consume();
                let target = self.ident();
                if target.is_none() {
                    self.error("set expected identifier");
                }
                if !self.accept(TokenKind::Equal) {
                    self.error("expected '=' after set var");
                }
                let tokens = self.statement_tokens();
                self.expect(TokenKind::Semicolon, ";");
                let value = self.expr_of(&tokens);
                target.map(|target| BodyItem::Actions(vec![SetAction { target, value }.into()]))
            }
            "signal" => {
                self.consume();
                let Some(name) = self.ident() else {
                    self.error("signal name expected");
                    return None;
                };
                self.accept(TokenKind::Equal);
                let tokens = self.statement_tokens();
                self.expect(TokenKind::Semicolon, ";");
                let value = self.expr_of(&tokens);
                Some(BodyItem::Actions(vec![SignalAction { name, value }.into()]))
            }
            "if" => self.parse_if().map(|action| BodyItem::Actions(vec![action])),
            "goto" => {
                self.consume();
                let Some(target) = self.ident() else {
                    self.error("goto target expected");
                    return None;
                };
                self.expect(TokenKind::Semicolon, ";");
                Some(BodyItem::Actions(vec![GotoAction { target }.into()]))
            }
            "end" => {
                self.consume();
                self.expect(TokenKind::Semicolon, ";");
                Some(BodyItem::Actions(vec![Action::End]))
            }
            _ => {
                let tokens = self.statement_tokens();
                self.accept(TokenKind::Semicolon);
                self.classify_statement(&tokens)
                    .map(|statement| BodyItem::Actions(vec![statement.into()]))
            }
        }
    }

    fn parse_choice(&mut self) -> Option<ast::Choice> {
        self.consume();
        // after `choice` the lexer sees an identifier, so `-1` arrives split
        let negative = self.accept(TokenKind::Minus);
        if !self.at(TokenKind::Number) {
            self.error("choice id expected");
            self.consume();
            return None;
        }
        let id = self.consume().number;
        let id = if negative { id.wrapping_neg() } else { id };
        self.expect(TokenKind::Colon, ":");

        let Some(text) = self.string() else {
            self.error("choice text string expected");
            return None;
        };
        if !self.accept(TokenKind::Arrow) {
            self.accept(TokenKind::Minus);
        }
        let Some(target) = self.ident() else {
            self.error("choice target expected");
            return None;
        };
        self.expect(TokenKind::Semicolon, ";");

        Some(ast::Choice { id, text, target })
    }

    fn parse_if(&mut self) -> Option<Action> {
        self.consume();
        if !self.accept(TokenKind::LeftParen) {
            self.error("if requires (");
        }

        let mut condition = Vec::new();
        let mut depth = 0usize;
        while !self.at_end() && !self.at(TokenKind::Semicolon) {
            match self.peek().kind {
                TokenKind::RightParen if depth == 0 => break,
                TokenKind::RightParen => depth -= 1,
                TokenKind::LeftParen => depth += 1,
                _ => {}
            }
            condition.push(self.consume());
        }
        self.expect(TokenKind::RightParen, ")");

        if self.peek().is_ident("goto") {
            self.consume();
        } else {
            self.error("if expects goto");
        }
        let Some(then_target) = self.ident() else {
            self.error("goto target expected");
            return None;
        };

        let mut else_target = None;
        if self.peek().is_ident("else") {
            self.consume();
            if self.peek().is_ident("goto") {
                self.consume();
            } else {
                self.error("else expects goto");
            }
            else_target = self.ident();
            if else_target.is_none() {
                self.error("else goto target expected");
            }
        }
        self.expect(TokenKind::Semicolon, ";");

        Some(
            IfAction {
                condition: self.expr_of(&condition),
                then_target,
                else_target,
            }
            .into(),
        )
    }

    fn classify_statement(&self, tokens: &[Token]) -> Option<Statement> {
        let first = tokens.first()?;
        let second = tokens.get(1);
        let opens_call = second.map_or(false, |t| t.is(TokenKind::LeftParen));

        if first.is(TokenKind::Ident) && opens_call {
            if let Some((instance, method)) = first.text.split_once('.') {
                let args = split_args(call_inner(&tokens[2..]))
                    .into_iter()
                    .map(|arg| self.expr_of(arg))
                    .collect();
                return Some(
                    MethodCall {
                        instance: instance.to_string(),
                        method: method.to_string(),
                        args,
                    }
                    .into(),
                );
            }

            if first.text == "print" {
                let inner = call_inner(&tokens[2..]);
                let arg = match inner {
                    [literal] if literal.is(TokenKind::String) => {
                        PrintArg::Text(literal.text.clone())
                    }
                    _ => PrintArg::Value(self.expr_of(inner)),
                };
                return Some(arg.into());
            }
        }

        if first.is_ident("new") {
            if let [_, class, instance] = tokens {
                if class.is(TokenKind::Ident) && instance.is(TokenKind::Ident) {
                    return Some(
                        NewInstance {
                            class: class.text.clone(),
                            instance: instance.text.clone(),
                        }
                        .into(),
                    );
                }
            }
        }

        Some(Statement::Other(self.source_text(tokens)))
    }
}

/// Tokens between an already consumed `(` and its matching `)`.
fn call_inner(tokens: &[Token]) -> &[Token] {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen if depth == 0 => return &tokens[..i],
            TokenKind::RightParen => depth -= 1,
            _ => {}
        }
    }
    tokens
}

/// Splits call arguments at top-level commas, dropping empty ones.
fn split_args(tokens: &[Token]) -> Vec<&[Token]> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => {
                args.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&tokens[start..]);
    args.retain(|arg| !arg.is_empty());
    args
}

pub fn parse(source: &str) -> Parsed {
    let mut parser = Parser::new(source);
    parser.parse();
    Parsed {
        program: parser.program,
        diagnostics: parser.diagnostics,
    }
}
