//! Expression body evaluation
//!
//! Grammar of the text between `<{` and `}>`:
//!
//! ```text
//! pipeline := command ( "|" command )*
//! command  := operand | IDENT operand?
//! operand  := STRING | RAW_STRING | FIELD
//! FIELD    := "." segment ( "." segment )*
//! ```
//!
//! Later pipeline stages must be bare function names; the previous stage's
//! value is passed as their argument.

use std::collections::HashMap;

use super::functions::{FunctionTable, TemplateFn};

/// Printed for field references that resolve to nothing
pub const NO_VALUE: &str = "<no value>";

const SECRETS_FIELD: &str = "secrets";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Field(Vec<String>),
    Ident(String),
    Pipe,
}

/// Result of evaluating one expression body
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluated {
    pub value: String,
    /// A secret field was dereferenced while evaluating
    pub read_secret: bool,
}

/// Evaluates expression bodies against a function table and the secret map
pub(crate) struct Evaluator<'a> {
    functions: &'a FunctionTable,
    secrets: HashMap<&'a str, &'a str>,
}

impl<'a> Evaluator<'a> {
    pub fn new(functions: &'a FunctionTable, secrets: HashMap<&'a str, &'a str>) -> Self {
        Self { functions, secrets }
    }

    /// Evaluate a body. Errors are syntax or execution failure reasons.
    pub fn evaluate(&self, body: &str) -> Result<Evaluated, String> {
        let tokens = tokenize(body)?;
        if tokens.is_empty() {
            return Err("empty expression".to_string());
        }

        let mut read_secret = false;
        let mut value: Option<String> = None;

        for (stage, command) in tokens.split(|t| *t == Token::Pipe).enumerate() {
            value = Some(match (command, value.take()) {
                ([], _) => return Err("missing command in pipeline".to_string()),

                // first stage
                ([operand], None) if !matches!(operand, Token::Ident(_)) => {
                    self.operand(operand, &mut read_secret)?
                }
                ([Token::Ident(name)], None) => {
                    return Err(format!("wrong number of args for {name}: want 1 got 0"));
                }
                ([Token::Ident(name), arg], None) => {
                    let f = self.function(name)?;
                    if matches!(arg, Token::Ident(_)) {
                        return Err(format!("function {arg:?} used as an argument"));
                    }
                    f(&self.operand(arg, &mut read_secret)?)
                }
                ([Token::Ident(name), ..], None) => {
                    return Err(format!("too many arguments for {name}"));
                }

                // piped stages
                ([Token::Ident(name)], Some(piped)) => self.function(name)?(&piped),
                ([Token::Ident(name), ..], Some(_)) => {
                    return Err(format!("wrong number of args for {name}: want 1 got 2"));
                }
                (_, Some(_)) => {
                    return Err(format!("stage {} of the pipeline is not a function", stage + 1));
                }
                (_, None) => return Err("unexpected operand".to_string()),
            });
        }

        Ok(Evaluated {
            value: value.unwrap_or_default(),
            read_secret,
        })
    }

    fn function(&self, name: &str) -> Result<TemplateFn, String> {
        self.functions
            .get(name)
            .ok_or_else(|| format!("function {name:?} not defined"))
    }

    fn operand(&self, token: &Token, read_secret: &mut bool) -> Result<String, String> {
        match token {
            Token::Str(s) => Ok(s.clone()),
            Token::Field(path) => self.field(path, read_secret),
            Token::Ident(name) => Err(format!("unexpected identifier {name:?}")),
            Token::Pipe => Err("unexpected '|'".to_string()),
        }
    }

    fn field(&self, path: &[String], read_secret: &mut bool) -> Result<String, String> {
        match path {
            [] => Err("cannot print the data root".to_string()),
            [root] if root == SECRETS_FIELD => Err("cannot print the secrets map".to_string()),
            [root, key] if root == SECRETS_FIELD => match self.secrets.get(key.as_str()) {
                Some(value) => {
                    *read_secret = true;
                    Ok((*value).to_string())
                }
                None => Ok(NO_VALUE.to_string()),
            },
            [root, key, rest, ..] if root == SECRETS_FIELD => {
                if self.secrets.contains_key(key.as_str()) {
                    Err(format!("can't evaluate field {rest} in type string"))
                } else {
                    Ok(NO_VALUE.to_string())
                }
            }
            _ => Ok(NO_VALUE.to_string()),
        }
    }
}

fn tokenize(body: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some('r') => s.push('\r'),
                            Some(other) => return Err(format!("unknown escape sequence \\{other}")),
                            None => return Err("unterminated quoted string".to_string()),
                        },
                        Some('\n') => return Err("newline in quoted string".to_string()),
                        Some(other) => s.push(other),
                        None => return Err("unterminated quoted string".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '`' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(other) => s.push(other),
                        None => return Err("unterminated raw string".to_string()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '.' => {
                let mut path = Vec::new();
                while chars.peek() == Some(&'.') {
                    chars.next();
                    let mut segment = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_alphanumeric() || c == '_' || c == '-' {
                            segment.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    if segment.is_empty() {
                        if path.is_empty() && !chars.peek().is_some_and(|c| *c == '.') {
                            break;
                        }
                        return Err("empty field name".to_string());
                    }
                    path.push(segment);
                }
                tokens.push(Token::Field(path));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("unexpected {other:?} in operand")),
        }
    }

    Ok(tokens)
}
