//! Parser for RSL shader source.
//!
//! Produces the syntax tree consumed by the semantic analyzer: a root list
//! node holding one shader definition. The lighting statements attach
//! identifier nodes for the ambient variables they implicitly reference
//! (`Cl` and `Ol`, plus `Ps` and `L` where applicable), and a `texture`
//! call with only a filename picks up the default `s` and `t` coordinates.
//!
//! Syntax errors are reported through the error policy as they are found;
//! parsing stops at the first error and the caller receives a
//! `parsing-failed` summary.

use crate::{
    ast::{NodeKind, SyntaxNode},
    error::{ErrorCode, ErrorPolicy},
    lexer::{Token, TokenKind, tokenize},
};

/// Parses shader source into a syntax tree.
pub struct ShaderParser<'a> {
    errors: &'a mut dyn ErrorPolicy,
}

impl<'a> ShaderParser<'a> {
    pub fn new(errors: &'a mut dyn ErrorPolicy) -> Self {
        Self { errors }
    }

    /// Parses `source`, reporting diagnostics against `name`.
    ///
    /// Returns the root list node on success; on failure every syntax error
    /// has been reported individually followed by a `parsing-failed`
    /// summary.
    pub fn parse(&mut self, source: &str, name: &str) -> Option<SyntaxNode> {
        let mut state = State {
            tokens: tokenize(source),
            position: 0,
            errors: &mut *self.errors,
        };
        match state.parse_shader_source() {
            Ok(root) => Some(root),
            Err(Abort) => {
                self.errors
                    .error(ErrorCode::ParsingFailed, &format!("Parsing shader '{name}' failed"));
                None
            }
        }
    }
}

/// Marker for an abandoned parse; the diagnostic was already reported.
struct Abort;

type Parsed<T> = Result<T, Abort>;

struct State<'a> {
    tokens: Vec<Token>,
    position: usize,
    errors: &'a mut dyn ErrorPolicy,
}

impl State<'_> {
    fn peek(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.position].kind
    }

    fn peek_kind_at(&self, ahead: usize) -> TokenKind {
        self.tokens
            .get(self.position + ahead)
            .map_or(TokenKind::Eof, |t| t.kind)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.position].clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        (self.peek_kind() == kind).then(|| self.advance())
    }

    fn expect(&mut self, kind: TokenKind) -> Parsed<Token> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.syntax_error(&format!("expected {kind}, found {}", self.peek_kind())))
        }
    }

    fn syntax_error(&mut self, message: &str) -> Abort {
        let line = self.peek().line;
        self.errors
            .error(ErrorCode::SyntaxError, &format!("({line}): {message}"));
        Abort
    }

    fn parse_shader_source(&mut self) -> Parsed<SyntaxNode> {
        let shader = self.parse_shader_definition()?;
        if self.peek_kind() != TokenKind::Eof {
            return Err(self.syntax_error(&format!("expected end of input, found {}", self.peek_kind())));
        }
        let mut root = SyntaxNode::new(NodeKind::List, shader.line());
        root.add_node(shader);
        Ok(root)
    }

    fn parse_shader_definition(&mut self) -> Parsed<SyntaxNode> {
        let kind = match self.peek_kind() {
            TokenKind::Light => NodeKind::LightShader,
            TokenKind::Surface => NodeKind::SurfaceShader,
            TokenKind::Volume => NodeKind::VolumeShader,
            TokenKind::Displacement => NodeKind::DisplacementShader,
            TokenKind::Imager => NodeKind::ImagerShader,
            other => return Err(self.syntax_error(&format!("expected a shader kind, found {other}"))),
        };
        let keyword = self.advance();
        let identifier = self.expect(TokenKind::Identifier)?;
        let mut shader = SyntaxNode::with_lexeme(kind, keyword.line, &identifier.lexeme);

        self.expect(TokenKind::LeftParen)?;
        let formals = self.parse_formals()?;
        self.expect(TokenKind::RightParen)?;
        self.expect(TokenKind::LeftBrace)?;
        let statements = self.parse_statement_list(keyword.line)?;
        self.expect(TokenKind::RightBrace)?;

        shader.add_node(formals);
        shader.add_node(statements);
        Ok(shader)
    }

    /// Formal parameter groups: `[output] [detail] type name [= expr]
    /// {, name [= expr]} ;` repeated until the closing parenthesis. The
    /// trailing semicolon of the last group may be omitted.
    fn parse_formals(&mut self) -> Parsed<SyntaxNode> {
        let mut list = SyntaxNode::new(NodeKind::List, self.peek().line);
        while self.peek_kind() != TokenKind::RightParen {
            self.parse_definition_group(&mut list)?;
            if self.peek_kind() == TokenKind::RightParen {
                break;
            }
            self.expect(TokenKind::Semicolon)?;
        }
        Ok(list)
    }

    /// One `[storage] type name [= expr] {, ...}` group, appending a
    /// variable node per name. Each variable carries three children: the
    /// initializer (or a null node), the storage node, and the type node.
    fn parse_definition_group(&mut self, list: &mut SyntaxNode) -> Parsed<()> {
        while matches!(self.peek_kind(), TokenKind::Output | TokenKind::Extern) {
            self.advance();
        }
        let storage_kind = match self.peek_kind() {
            TokenKind::Varying => {
                self.advance();
                NodeKind::Varying
            }
            TokenKind::Uniform => {
                self.advance();
                NodeKind::Uniform
            }
            _ => NodeKind::Null,
        };
        let type_token = self.advance();
        let type_kind = match type_token.kind {
            TokenKind::Float => NodeKind::FloatType,
            TokenKind::StringType => NodeKind::StringType,
            TokenKind::Color => NodeKind::ColorType,
            TokenKind::Point => NodeKind::PointType,
            TokenKind::Vector => NodeKind::VectorType,
            TokenKind::Normal => NodeKind::NormalType,
            TokenKind::Matrix => NodeKind::MatrixType,
            other => return Err(self.syntax_error(&format!("expected a type, found {other}"))),
        };

        loop {
            let identifier = self.expect(TokenKind::Identifier)?;
            let mut variable = SyntaxNode::with_lexeme(NodeKind::Variable, identifier.line, &identifier.lexeme);
            if self.accept(TokenKind::Assign).is_some() {
                variable.add_node(self.parse_expression()?);
            } else {
                variable.add_node(SyntaxNode::new(NodeKind::Null, identifier.line));
            }
            variable.add_node(SyntaxNode::new(storage_kind, type_token.line));
            variable.add_node(SyntaxNode::new(type_kind, type_token.line));
            list.add_node(variable);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(())
    }

    fn parse_statement_list(&mut self, line: usize) -> Parsed<SyntaxNode> {
        let mut list = SyntaxNode::new(NodeKind::List, line);
        while !matches!(self.peek_kind(), TokenKind::RightBrace | TokenKind::Eof) {
            if self.accept(TokenKind::Semicolon).is_some() {
                continue;
            }
            let statement = self.parse_statement()?;
            list.add_node(statement);
        }
        Ok(list)
    }

    fn parse_statement(&mut self) -> Parsed<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::LeftBrace => {
                let open = self.advance();
                let list = self.parse_statement_list(open.line)?;
                self.expect(TokenKind::RightBrace)?;
                Ok(list)
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Solar => self.parse_solar_statement(),
            TokenKind::Illuminate => self.parse_illuminate_statement(),
            TokenKind::Illuminance => self.parse_illuminance_statement(),
            TokenKind::Break => self.parse_break_or_continue(NodeKind::Break),
            TokenKind::Continue => self.parse_break_or_continue(NodeKind::Continue),
            TokenKind::Return => {
                let keyword = self.advance();
                let mut node = SyntaxNode::new(NodeKind::Return, keyword.line);
                node.add_node(self.parse_expression()?);
                self.expect(TokenKind::Semicolon)?;
                Ok(node)
            }
            TokenKind::Varying
            | TokenKind::Uniform
            | TokenKind::Output
            | TokenKind::Extern
            | TokenKind::Float
            | TokenKind::StringType
            | TokenKind::Color
            | TokenKind::Point
            | TokenKind::Vector
            | TokenKind::Normal
            | TokenKind::Matrix => self.parse_variable_definition(),
            TokenKind::Identifier => {
                let node = self.parse_assignment_or_call()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(node)
            }
            other => Err(self.syntax_error(&format!("expected a statement, found {other}"))),
        }
    }

    /// A variable definition statement is a formal group used as a
    /// statement. Type keywords can also begin a typecast expression
    /// statement, which is not valid RSL, so the type keyword here always
    /// introduces a definition.
    fn parse_variable_definition(&mut self) -> Parsed<SyntaxNode> {
        let mut list = SyntaxNode::new(NodeKind::List, self.peek().line);
        self.parse_definition_group(&mut list)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(list)
    }

    fn parse_if_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        self.expect(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        let then_statement = self.parse_statement()?;
        if self.accept(TokenKind::Else).is_some() {
            let else_statement = self.parse_statement()?;
            let mut node = SyntaxNode::new(NodeKind::IfElse, keyword.line);
            node.add_node(condition);
            node.add_node(then_statement);
            node.add_node(else_statement);
            Ok(node)
        } else {
            let mut node = SyntaxNode::new(NodeKind::If, keyword.line);
            node.add_node(condition);
            node.add_node(then_statement);
            Ok(node)
        }
    }

    fn parse_while_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        self.expect(TokenKind::LeftParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_statement()?;
        let mut node = SyntaxNode::new(NodeKind::While, keyword.line);
        node.add_node(condition);
        node.add_node(body);
        Ok(node)
    }

    fn parse_for_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        self.expect(TokenKind::LeftParen)?;
        let initialize = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Semicolon)?;
        let increment = self.parse_expression()?;
        self.expect(TokenKind::RightParen)?;
        let body = self.parse_statement()?;
        let mut node = SyntaxNode::new(NodeKind::For, keyword.line);
        node.add_node(initialize);
        node.add_node(condition);
        node.add_node(increment);
        node.add_node(body);
        Ok(node)
    }

    fn parse_light_arguments(&mut self) -> Parsed<SyntaxNode> {
        self.expect(TokenKind::LeftParen)?;
        let mut expressions = SyntaxNode::new(NodeKind::List, self.peek().line);
        if self.peek_kind() != TokenKind::RightParen {
            loop {
                expressions.add_node(self.parse_expression()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(expressions)
    }

    fn parse_solar_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let expressions = self.parse_light_arguments()?;
        let statement = self.parse_statement()?;
        let mut node = SyntaxNode::new(NodeKind::Solar, keyword.line);
        node.add_node(expressions);
        node.add_node(statement);
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Cl"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Ol"));
        Ok(node)
    }

    fn parse_illuminate_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let expressions = self.parse_light_arguments()?;
        let statement = self.parse_statement()?;
        let mut node = SyntaxNode::new(NodeKind::Illuminate, keyword.line);
        node.add_node(expressions);
        node.add_node(statement);
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Ps"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "L"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Cl"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Ol"));
        Ok(node)
    }

    fn parse_illuminance_statement(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let expressions = self.parse_light_arguments()?;
        let statement = self.parse_statement()?;
        let mut node = SyntaxNode::new(NodeKind::Illuminance, keyword.line);
        node.add_node(expressions);
        node.add_node(statement);
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "L"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Cl"));
        node.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "Ol"));
        Ok(node)
    }

    fn parse_break_or_continue(&mut self, kind: NodeKind) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let mut node = SyntaxNode::new(kind, keyword.line);
        if self.peek_kind() == TokenKind::Integer {
            let level = self.advance();
            node.add_node(SyntaxNode::with_lexeme(NodeKind::Integer, level.line, &level.lexeme));
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(node)
    }

    fn parse_expression(&mut self) -> Parsed<SyntaxNode> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Parsed<SyntaxNode> {
        if self.peek_kind() == TokenKind::Identifier {
            let kind = match self.peek_kind_at(1) {
                TokenKind::Assign => Some(NodeKind::Assign),
                TokenKind::PlusAssign => Some(NodeKind::AddAssign),
                TokenKind::MinusAssign => Some(NodeKind::SubtractAssign),
                TokenKind::StarAssign => Some(NodeKind::MultiplyAssign),
                TokenKind::SlashAssign => Some(NodeKind::DivideAssign),
                _ => None,
            };
            if let Some(kind) = kind {
                let identifier = self.advance();
                self.advance();
                let expression = self.parse_assignment()?;
                let mut node = SyntaxNode::with_lexeme(kind, identifier.line, &identifier.lexeme);
                node.add_node(expression);
                return Ok(node);
            }
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Parsed<SyntaxNode> {
        let condition = self.parse_or()?;
        if let Some(question) = self.accept(TokenKind::Question) {
            let then_expression = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let else_expression = self.parse_expression()?;
            let mut node = SyntaxNode::new(NodeKind::Ternary, question.line);
            node.add_node(condition);
            node.add_node(then_expression);
            node.add_node(else_expression);
            return Ok(node);
        }
        Ok(condition)
    }

    fn binary(kind: NodeKind, line: usize, lhs: SyntaxNode, rhs: SyntaxNode) -> SyntaxNode {
        let mut node = SyntaxNode::new(kind, line);
        node.add_node(lhs);
        node.add_node(rhs);
        node
    }

    fn parse_or(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_and()?;
        while let Some(operator) = self.accept(TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Self::binary(NodeKind::Or, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_relational()?;
        while let Some(operator) = self.accept(TokenKind::AndAnd) {
            let rhs = self.parse_relational()?;
            lhs = Self::binary(NodeKind::And, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_additive()?;
        loop {
            let kind = match self.peek_kind() {
                TokenKind::Greater => NodeKind::Greater,
                TokenKind::GreaterEqual => NodeKind::GreaterEqual,
                TokenKind::Less => NodeKind::Less,
                TokenKind::LessEqual => NodeKind::LessEqual,
                TokenKind::EqualEqual => NodeKind::Equal,
                TokenKind::NotEqual => NodeKind::NotEqual,
                _ => break,
            };
            let operator = self.advance();
            let rhs = self.parse_additive()?;
            lhs = Self::binary(kind, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_cross()?;
        loop {
            let kind = match self.peek_kind() {
                TokenKind::Plus => NodeKind::Add,
                TokenKind::Minus => NodeKind::Subtract,
                _ => break,
            };
            let operator = self.advance();
            let rhs = self.parse_cross()?;
            lhs = Self::binary(kind, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_cross(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_multiplicative()?;
        while let Some(operator) = self.accept(TokenKind::Caret) {
            let rhs = self.parse_multiplicative()?;
            lhs = Self::binary(NodeKind::Cross, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_dot()?;
        loop {
            let kind = match self.peek_kind() {
                TokenKind::Star => NodeKind::Multiply,
                TokenKind::Slash => NodeKind::Divide,
                _ => break,
            };
            let operator = self.advance();
            let rhs = self.parse_dot()?;
            lhs = Self::binary(kind, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_dot(&mut self) -> Parsed<SyntaxNode> {
        let mut lhs = self.parse_unary()?;
        while let Some(operator) = self.accept(TokenKind::Period) {
            let rhs = self.parse_unary()?;
            lhs = Self::binary(NodeKind::Dot, operator.line, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Parsed<SyntaxNode> {
        if let Some(operator) = self.accept(TokenKind::Minus) {
            let operand = self.parse_unary()?;
            let mut node = SyntaxNode::new(NodeKind::Negate, operator.line);
            node.add_node(operand);
            return Ok(node);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Parsed<SyntaxNode> {
        match self.peek_kind() {
            TokenKind::Integer => {
                let token = self.advance();
                Ok(SyntaxNode::with_lexeme(NodeKind::Integer, token.line, &token.lexeme))
            }
            TokenKind::Real => {
                let token = self.advance();
                Ok(SyntaxNode::with_lexeme(NodeKind::Real, token.line, &token.lexeme))
            }
            TokenKind::StringLiteral => {
                let token = self.advance();
                Ok(SyntaxNode::with_lexeme(NodeKind::String, token.line, &token.lexeme))
            }
            TokenKind::LeftParen => self.parse_tuple(),
            TokenKind::Float
            | TokenKind::StringType
            | TokenKind::Color
            | TokenKind::Point
            | TokenKind::Vector
            | TokenKind::Normal
            | TokenKind::Matrix => self.parse_typecast(),
            TokenKind::Texture => self.parse_texture(),
            TokenKind::Environment => self.parse_environment(),
            TokenKind::Shadow => self.parse_shadow(),
            TokenKind::Identifier => {
                let token = self.advance();
                if self.peek_kind() == TokenKind::LeftParen {
                    let arguments = self.parse_call_arguments()?;
                    let mut call = SyntaxNode::with_lexeme(NodeKind::Call, token.line, &token.lexeme);
                    for argument in arguments {
                        call.add_node(argument);
                    }
                    Ok(call)
                } else {
                    Ok(SyntaxNode::with_lexeme(NodeKind::Identifier, token.line, &token.lexeme))
                }
            }
            other => Err(self.syntax_error(&format!("expected an expression, found {other}"))),
        }
    }

    /// A parenthesised expression, a `triple`, or a `sixteentuple`,
    /// depending on how many comma-separated expressions appear.
    fn parse_tuple(&mut self) -> Parsed<SyntaxNode> {
        let open = self.expect(TokenKind::LeftParen)?;
        let mut expressions = vec![self.parse_expression()?];
        while self.accept(TokenKind::Comma).is_some() {
            expressions.push(self.parse_expression()?);
        }
        self.expect(TokenKind::RightParen)?;
        match expressions.len() {
            1 => Ok(expressions.pop().expect("one expression")),
            3 => {
                let mut triple = SyntaxNode::new(NodeKind::Triple, open.line);
                for expression in expressions {
                    triple.add_node(expression);
                }
                Ok(triple)
            }
            16 => {
                let mut sixteentuple = SyntaxNode::new(NodeKind::Sixteentuple, open.line);
                for expression in expressions {
                    sixteentuple.add_node(expression);
                }
                Ok(sixteentuple)
            }
            n => Err(self.syntax_error(&format!("expected 1, 3, or 16 expressions in a tuple, found {n}"))),
        }
    }

    /// `type ["space"] expression`, covering both plain typecasts like
    /// `color(1, 0, 0)` and space-qualified ones like `point "world" (…)`.
    fn parse_typecast(&mut self) -> Parsed<SyntaxNode> {
        let token = self.advance();
        let type_kind = match token.kind {
            TokenKind::Float => NodeKind::FloatType,
            TokenKind::StringType => NodeKind::StringType,
            TokenKind::Color => NodeKind::ColorType,
            TokenKind::Point => NodeKind::PointType,
            TokenKind::Vector => NodeKind::VectorType,
            TokenKind::Normal => NodeKind::NormalType,
            TokenKind::Matrix => NodeKind::MatrixType,
            _ => unreachable!("caller checked for a type keyword"),
        };
        let mut type_node = SyntaxNode::new(type_kind, token.line);
        if self.peek_kind() == TokenKind::StringLiteral {
            let space = self.advance();
            type_node.add_node(SyntaxNode::with_lexeme(NodeKind::String, space.line, &space.lexeme));
        }
        let operand = self.parse_unary()?;
        let mut typecast = SyntaxNode::new(NodeKind::Typecast, token.line);
        typecast.add_node(type_node);
        typecast.add_node(operand);
        Ok(typecast)
    }

    fn parse_call_arguments(&mut self) -> Parsed<Vec<SyntaxNode>> {
        self.expect(TokenKind::LeftParen)?;
        let mut arguments = Vec::new();
        if self.peek_kind() != TokenKind::RightParen {
            loop {
                arguments.push(self.parse_expression()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen)?;
        Ok(arguments)
    }

    fn parse_texture(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let arguments = self.parse_call_arguments()?;
        let count = arguments.len();
        let mut texture = SyntaxNode::new(NodeKind::Texture, keyword.line);
        for argument in arguments {
            texture.add_node(argument);
        }
        match count {
            1 => {
                texture.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "s"));
                texture.add_node(SyntaxNode::with_lexeme(NodeKind::Identifier, keyword.line, "t"));
                Ok(texture)
            }
            3 => Ok(texture),
            n => Err(self.syntax_error(&format!("expected 1 or 3 arguments to 'texture', found {n}"))),
        }
    }

    fn parse_environment(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let arguments = self.parse_call_arguments()?;
        if arguments.len() != 2 {
            return Err(self.syntax_error(&format!(
                "expected 2 arguments to 'environment', found {}",
                arguments.len()
            )));
        }
        let mut environment = SyntaxNode::new(NodeKind::Environment, keyword.line);
        for argument in arguments {
            environment.add_node(argument);
        }
        Ok(environment)
    }

    fn parse_shadow(&mut self) -> Parsed<SyntaxNode> {
        let keyword = self.advance();
        let arguments = self.parse_call_arguments()?;
        let count = arguments.len();
        let mut shadow = SyntaxNode::new(NodeKind::Shadow, keyword.line);
        for argument in arguments {
            shadow.add_node(argument);
        }
        match count {
            2 => {
                shadow.add_node(SyntaxNode::with_lexeme(NodeKind::Integer, keyword.line, "0"));
                Ok(shadow)
            }
            3 => Ok(shadow),
            n => Err(self.syntax_error(&format!("expected 2 or 3 arguments to 'shadow', found {n}"))),
        }
    }

    fn parse_assignment_or_call(&mut self) -> Parsed<SyntaxNode> {
        let node = self.parse_expression()?;
        if !(node.kind().is_assignment() || node.kind() == NodeKind::Call) {
            return Err(self.syntax_error("expected an assignment or a function call statement"));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::CollectingErrorPolicy;

    use super::*;

    fn parse(source: &str) -> SyntaxNode {
        let mut errors = CollectingErrorPolicy::default();
        let root = ShaderParser::new(&mut errors).parse(source, "test.sl");
        assert_eq!(errors.total_errors(), 0, "{:?}", errors.diagnostics());
        root.expect("parse succeeded")
    }

    #[test]
    fn null_surface_shader_tree_shape() {
        let root = parse("surface null() { Ci = Cs; Oi = Os; }");
        assert_eq!(root.kind(), NodeKind::List);
        let shader = root.child(0);
        assert_eq!(shader.kind(), NodeKind::SurfaceShader);
        assert_eq!(shader.lexeme(), "null");
        assert_eq!(shader.child(0).kind(), NodeKind::List);
        let statements = shader.child(1);
        assert_eq!(statements.children().len(), 2);
        assert_eq!(statements.child(0).kind(), NodeKind::Assign);
        assert_eq!(statements.child(0).lexeme(), "Ci");
        assert_eq!(statements.child(0).child(0).lexeme(), "Cs");
    }

    #[test]
    fn formals_carry_initializer_storage_and_type() {
        let root = parse("light amb(float intensity = 1;) {}");
        let formals = root.child(0).child(0);
        assert_eq!(formals.children().len(), 1);
        let variable = formals.child(0);
        assert_eq!(variable.kind(), NodeKind::Variable);
        assert_eq!(variable.lexeme(), "intensity");
        assert_eq!(variable.child(0).kind(), NodeKind::Integer);
        assert_eq!(variable.child(1).kind(), NodeKind::Null);
        assert_eq!(variable.child(2).kind(), NodeKind::FloatType);
    }

    #[test]
    fn uninitialized_formals_get_a_null_child() {
        let root = parse("surface s(uniform float a, b;) {}");
        let formals = root.child(0).child(0);
        assert_eq!(formals.children().len(), 2);
        for variable in formals.children() {
            assert_eq!(variable.child(0).kind(), NodeKind::Null);
            assert_eq!(variable.child(1).kind(), NodeKind::Uniform);
            assert_eq!(variable.child(2).kind(), NodeKind::FloatType);
        }
    }

    #[test]
    fn operator_precedence_dot_binds_tighter_than_multiply() {
        let root = parse("surface s() { Ci = Cs * N.I; }");
        let assign = root.child(0).child(1).child(0);
        let multiply = assign.child(0);
        assert_eq!(multiply.kind(), NodeKind::Multiply);
        assert_eq!(multiply.child(0).lexeme(), "Cs");
        assert_eq!(multiply.child(1).kind(), NodeKind::Dot);
    }

    #[test]
    fn typecast_with_space_attaches_string_child() {
        let root = parse(r#"surface s() { P = point "world" (1, 2, 3); }"#);
        let assign = root.child(0).child(1).child(0);
        let typecast = assign.child(0);
        assert_eq!(typecast.kind(), NodeKind::Typecast);
        let type_node = typecast.child(0);
        assert_eq!(type_node.kind(), NodeKind::PointType);
        assert_eq!(type_node.child(0).kind(), NodeKind::String);
        assert_eq!(type_node.child(0).lexeme(), "world");
        assert_eq!(typecast.child(1).kind(), NodeKind::Triple);
    }

    #[test]
    fn solar_statement_attaches_ambient_identifiers() {
        let root = parse("light sun() { solar((0, 0, 1), 0) { Cl = (1, 1, 1); } }");
        let solar = root.child(0).child(1).child(0);
        assert_eq!(solar.kind(), NodeKind::Solar);
        assert_eq!(solar.child(0).children().len(), 2);
        assert_eq!(solar.child(2).lexeme(), "Cl");
        assert_eq!(solar.child(3).lexeme(), "Ol");
    }

    #[test]
    fn illuminance_attaches_light_identifiers() {
        let root = parse("surface s() { illuminance(P, N, 1.57) { Ci += Cl; } }");
        let illuminance = root.child(0).child(1).child(0);
        assert_eq!(illuminance.kind(), NodeKind::Illuminance);
        assert_eq!(illuminance.child(0).children().len(), 3);
        assert_eq!(illuminance.child(2).lexeme(), "L");
        assert_eq!(illuminance.child(3).lexeme(), "Cl");
        assert_eq!(illuminance.child(4).lexeme(), "Ol");
    }

    #[test]
    fn texture_with_filename_only_picks_up_default_coordinates() {
        let root = parse(r#"surface s() { Ci = color texture("wood"); }"#);
        let assign = root.child(0).child(1).child(0);
        let typecast = assign.child(0);
        let texture = typecast.child(1);
        assert_eq!(texture.kind(), NodeKind::Texture);
        assert_eq!(texture.children().len(), 3);
        assert_eq!(texture.child(1).lexeme(), "s");
        assert_eq!(texture.child(2).lexeme(), "t");
    }

    #[test]
    fn break_statement_carries_its_level() {
        let root = parse("surface s() { while (s > 0) { break 1; } }");
        let while_node = root.child(0).child(1).child(0);
        let body = while_node.child(1);
        let break_node = body.child(0);
        assert_eq!(break_node.kind(), NodeKind::Break);
        assert_eq!(break_node.child(0).integer(), 1);
    }

    #[test]
    fn syntax_error_reports_line_and_summary() {
        let mut errors = CollectingErrorPolicy::default();
        let root = ShaderParser::new(&mut errors).parse("surface s() { Ci = ; }", "bad.sl");
        assert!(root.is_none());
        assert!(errors.contains(ErrorCode::SyntaxError));
        assert!(errors.contains(ErrorCode::ParsingFailed));
        assert!(errors.diagnostics()[0].message.starts_with("(1):"));
    }

    #[test]
    fn for_statement_has_four_children() {
        let root = parse("surface s() { float i; for (i = 0; i < 3; i += 1) Ci = Cs; }");
        let for_node = root.child(0).child(1).child(1);
        assert_eq!(for_node.kind(), NodeKind::For);
        assert_eq!(for_node.children().len(), 4);
        assert_eq!(for_node.child(0).kind(), NodeKind::Assign);
        assert_eq!(for_node.child(1).kind(), NodeKind::Less);
        assert_eq!(for_node.child(2).kind(), NodeKind::AddAssign);
    }
}
