//! Script parser
//!
//! Line-oriented, single pass:
//!
//! ```text
//! !: BOLT 3                      directive
//! !: AUTO HELLO
//!
//! C: RUN "RETURN 1" {} {}        opens (or extends) a client block
//!    PULL_ALL                    indented continuation, same role
//! S: SUCCESS {"fields": ["x"]}   opens a server block
//!    RECORD [1]
//!    <EXIT>
//! ```
//!
//! Blank lines and `#` / `//` comments never break a block; only a line of
//! the other role does.

use std::path::Path;
use std::time::Duration;

use crate::error::{Result, StubError};
use crate::protocol::{is_known_name, BoltVersion, Message, Role, Value};
use super::{Action, Directive, Expect, Reply, Script, Step};

/// Parse a script document
pub fn parse(text: &str) -> Result<Script> {
    let mut parser = Parser::default();
    for (index, line) in text.lines().enumerate() {
        parser.feed(index + 1, line)?;
    }
    parser.finish()
}

/// Read and parse a script file
pub fn load(path: &Path) -> Result<Script> {
    let text = std::fs::read_to_string(path)?;
    let script = parse(&text)?;
    tracing::debug!(
        "Loaded script {} ({} steps, {} directives)",
        path.display(),
        script.steps.len(),
        script.directives.len()
    );
    Ok(script)
}

impl Script {
    /// Parse a script document
    pub fn parse(text: &str) -> Result<Self> {
        parse(text)
    }

    /// Read and parse a script file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        load(path.as_ref())
    }
}

#[derive(Default)]
struct Parser {
    steps: Vec<Step>,
    directives: Vec<Directive>,

    /// Role of the last `C:`/`S:` line; indented lines continue it
    current: Option<Role>,

    /// Message names to check once the protocol version is known
    names: Vec<(usize, Role, String)>,
}

impl Parser {
    fn feed(&mut self, line_no: usize, raw: &str) -> Result<()> {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            return Ok(());
        }

        if let Some(rest) = line.strip_prefix("!:") {
            self.current = None;
            return self.directive(line_no, rest.trim());
        }

        let (role, body) = if let Some(rest) = line.strip_prefix("C:") {
            (Role::Client, rest.trim())
        } else if let Some(rest) = line.strip_prefix("S:") {
            (Role::Server, rest.trim())
        } else if raw.starts_with(char::is_whitespace) {
            match self.current {
                Some(role) => (role, line),
                None => {
                    return Err(StubError::parse(
                        line_no,
                        "continuation line outside of a C: or S: block",
                    ))
                }
            }
        } else {
            return Err(StubError::parse(
                line_no,
                format!("expected a C:, S: or !: line, got {:?}", line),
            ));
        };

        self.current = Some(role);
        if body.is_empty() {
            return Ok(());
        }

        match role {
            Role::Client => {
                let expect = self.client_line(line_no, body)?;
                match self.steps.last_mut() {
                    Some(Step::Client(block)) => block.push(expect),
                    _ => self.steps.push(Step::Client(vec![expect])),
                }
            }
            Role::Server => {
                let reply = self.server_line(line_no, body)?;
                match self.steps.last_mut() {
                    Some(Step::Server(block)) => block.push(reply),
                    _ => self.steps.push(Step::Server(vec![reply])),
                }
            }
        }
        Ok(())
    }

    fn directive(&mut self, line_no: usize, body: &str) -> Result<()> {
        let (keyword, rest) = split_word(body);
        let directive = match keyword {
            "AUTO" => {
                let (name, _) = split_word(rest);
                if name.is_empty() {
                    return Err(StubError::parse(line_no, "AUTO needs a message name"));
                }
                self.names.push((line_no, Role::Client, name.to_string()));
                Directive::Auto(name.to_string())
            }
            "BOLT" => {
                let version: BoltVersion = rest
                    .parse()
                    .map_err(|e: String| StubError::parse(line_no, e))?;
                if !version.is_supported() {
                    return Err(StubError::parse(
                        line_no,
                        format!("unsupported protocol version {}", version),
                    ));
                }
                Directive::BoltVersion(version)
            }
            "HANDSHAKE" => Directive::Handshake(parse_hex(line_no, rest)?),
            "" => return Err(StubError::parse(line_no, "empty directive")),
            other => {
                return Err(StubError::parse(
                    line_no,
                    format!("unknown directive {:?}", other),
                ))
            }
        };
        self.directives.push(directive);
        Ok(())
    }

    fn client_line(&mut self, line_no: usize, body: &str) -> Result<Expect> {
        let (name, rest) = split_word(body);
        if name.starts_with('<') {
            return Err(StubError::parse(
                line_no,
                format!("{} is only valid in a server block", name),
            ));
        }
        let message = self.message(line_no, Role::Client, name, rest)?;
        Ok(Expect { line_no, message })
    }

    fn server_line(&mut self, line_no: usize, body: &str) -> Result<Reply> {
        let (name, rest) = split_word(body);
        let action = match name {
            "<EXIT>" => Action::Exit,
            "<NOOP>" => Action::Noop,
            "<RAW>" => Action::Raw(parse_hex(line_no, rest)?),
            "<SLEEP>" => {
                let secs: f64 = rest.trim().parse().map_err(|_| {
                    StubError::parse(line_no, format!("invalid sleep duration {:?}", rest))
                })?;
                let delay = Duration::try_from_secs_f64(secs).map_err(|_| {
                    StubError::parse(line_no, format!("invalid sleep duration {:?}", rest))
                })?;
                Action::Sleep(delay)
            }
            command if command.starts_with('<') => {
                return Err(StubError::parse(
                    line_no,
                    format!("unknown command {}", command),
                ))
            }
            _ => Action::Send(self.message(line_no, Role::Server, name, rest)?),
        };
        Ok(Reply { line_no, action })
    }

    fn message(&mut self, line_no: usize, role: Role, name: &str, rest: &str) -> Result<Message> {
        if !name.chars().all(|c| c.is_ascii_uppercase() || c == '_') {
            return Err(StubError::parse(
                line_no,
                format!("invalid message name {:?}", name),
            ));
        }
        self.names.push((line_no, role, name.to_string()));
        Ok(Message::new(name, parse_fields(line_no, rest)?))
    }

    fn finish(self) -> Result<Script> {
        let script = Script {
            steps: self.steps,
            directives: self.directives,
        };

        let pinned = script.bolt_version();
        for (line_no, role, name) in &self.names {
            let known = match pinned {
                Some(version) => version.tag_for(*role, name).is_some(),
                None => is_known_name(*role, name),
            };
            if !known {
                let side = match role {
                    Role::Client => "client",
                    Role::Server => "server",
                };
                let message = match pinned {
                    Some(version) => format!(
                        "unknown {} message {} for protocol version {}",
                        side, name, version
                    ),
                    None => format!("unknown {} message {}", side, name),
                };
                return Err(StubError::parse(*line_no, message));
            }
        }

        Ok(script)
    }
}

/// Split off the first whitespace-delimited word
fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim_start()),
        None => (text, ""),
    }
}

/// Read whitespace-separated JSON literals
fn parse_fields(line_no: usize, text: &str) -> Result<Vec<Value>> {
    let mut fields = Vec::new();
    let stream = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();
    for item in stream {
        let json = item.map_err(|e| {
            StubError::parse(line_no, format!("invalid field literal: {}", e))
        })?;
        fields.push(Value::from_json(json).map_err(|e| StubError::parse(line_no, e))?);
    }
    Ok(fields)
}

/// Parse hex digits, ignoring whitespace: `00 00 01 04` or `00000104`
fn parse_hex(line_no: usize, text: &str) -> Result<Vec<u8>> {
    let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(StubError::parse(
            line_no,
            format!("expected an even number of hex digits, got {:?}", text),
        ));
    }
    digits
        .chunks(2)
        .map(|pair| {
            let byte: String = pair.iter().collect();
            u8::from_str_radix(&byte, 16)
                .map_err(|_| StubError::parse(line_no, format!("invalid hex byte {:?}", byte)))
        })
        .collect()
}
