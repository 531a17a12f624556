//! Passthrough query executor.
//!
//! Resolves the subscription name from the operation's first root field
//! and answers every event with `{ <name>: <event payload> }`. Enough for
//! hosts that publish ready-made results; hosts with a GraphQL schema plug
//! in their own `QueryExecutor`.

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};

use crate::domain::event::Event;
use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::protocol::OperationPayload;
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::QueryExecutor;

#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExecutor;

impl PassthroughExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryExecutor for PassthroughExecutor {
    fn resolve_operation(&self, operation: &OperationPayload) -> Result<String, DomainError> {
        root_field(&operation.query, operation.operation_name.as_deref()).ok_or_else(|| {
            DomainError::new(
                ErrorCode::ValidationFailed,
                "query does not contain a subscription operation",
            )
        })
    }

    async fn execute(
        &self,
        request: &SubscriptionRequest,
        event: &Event,
    ) -> Result<JsonValue, DomainError> {
        let mut result = Map::new();
        result.insert(request.name.clone(), event.payload().clone());
        Ok(JsonValue::Object(result))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Name(&'a str),
    Punct(char),
}

/// Splits a GraphQL document into names and punctuators, dropping
/// whitespace, commas, comments, strings and numbers.
fn tokenize(source: &str) -> Vec<Token<'_>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            '#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            '"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let start = i;
                while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                tokens.push(Token::Name(&source[start..i]));
            }
            '-' | '0'..='9' => {
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.' || bytes[i] == b'-')
                {
                    i += 1;
                }
            }
            '{' | '}' | '(' | ')' | ':' | '$' | '!' | '=' | '@' | '[' | ']' | '|' | '&' => {
                tokens.push(Token::Punct(c));
                i += 1;
            }
            _ => i += 1,
        }
    }

    tokens
}

/// Index just past the group opened at `open`, or the end of input.
fn skip_group(tokens: &[Token<'_>], open: usize, left: char, right: char) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i < tokens.len() {
        match tokens[i] {
            Token::Punct(c) if c == left => depth += 1,
            Token::Punct(c) if c == right => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    tokens.len()
}

/// First root field of the (named) subscription operation, alias stripped.
fn root_field(query: &str, operation_name: Option<&str>) -> Option<String> {
    let tokens = tokenize(query);
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Name("subscription") => {
                i += 1;
                let name = match tokens.get(i) {
                    Some(Token::Name(name)) => {
                        i += 1;
                        Some(*name)
                    }
                    _ => None,
                };

                // Variable definitions and directives up to the selection set
                while i < tokens.len() && tokens[i] != Token::Punct('{') {
                    if tokens[i] == Token::Punct('(') {
                        i = skip_group(&tokens, i, '(', ')');
                    } else {
                        i += 1;
                    }
                }

                let wanted = match (operation_name, name) {
                    (Some(wanted), Some(name)) => wanted == name,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                if !wanted {
                    i = skip_group(&tokens, i, '{', '}');
                    continue;
                }

                return match (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3)) {
                    (Some(Token::Name(_)), Some(Token::Punct(':')), Some(Token::Name(field))) => {
                        Some(field.to_string())
                    }
                    (Some(Token::Name(field)), _, _) => Some(field.to_string()),
                    _ => None,
                };
            }
            // Other definitions (queries, fragments) are skipped whole
            Token::Punct('{') => i = skip_group(&tokens, i, '{', '}'),
            _ => i += 1,
        }
    }

    None
}
