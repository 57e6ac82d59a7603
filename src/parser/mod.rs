//! Whitespace-tokenizing, trie-driven multi-word command parser (spec
//! §4.1). Grounded on the teacher's `parser/mod.rs` module placement;
//! the trie itself is new, since no SQL grammar in the teacher applies
//! to this command set.

pub mod commands;
pub mod trie;

use crate::error::{DbError, Result};
use commands::{schema, CommandType, ParamSpec};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use trie::TrieNode;

#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub command: CommandType,
    pub args: HashMap<String, String>,
}

impl ParsedCommand {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(|s| s.as_str())
    }
}

static TRIE: Lazy<TrieNode> = Lazy::new(|| {
    let mut root = TrieNode::new();
    for command in commands::all_commands() {
        root.insert(&command.tokens(), command);
    }
    root
});

/// Tokenizes on whitespace (collapsing runs), matches the command via
/// the trie, then resolves the remainder against the command's
/// parameter schema: positionals first (strict prefix), then
/// alternating `name value` pairs.
pub fn parse(query: &str) -> Result<ParsedCommand> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(DbError::InvalidSyntax("query cannot be empty".to_string()));
    }

    let (command, consumed) =
        TRIE.descend(&tokens).ok_or_else(|| DbError::InvalidCommand("unknown command".to_string()))?;
    let remainder = &tokens[consumed..];
    let params = schema(command);
    let args = resolve_args(&params, remainder)?;
    Ok(ParsedCommand { command, args })
}

fn resolve_args(params: &[ParamSpec], remainder: &[&str]) -> Result<HashMap<String, String>> {
    let mut args = HashMap::new();

    let mut positionals: Vec<&ParamSpec> = params.iter().filter(|p| p.positional).collect();
    positionals.sort_by_key(|p| p.position);

    let take = positionals.len().min(remainder.len());
    for (param, value) in positionals.iter().take(take).zip(remainder.iter()) {
        args.insert(param.name.to_string(), value.to_string());
    }

    let rest = &remainder[take..];
    if rest.len() % 2 != 0 {
        return Err(DbError::InvalidSyntax(format!("dangling parameter name {:?}", rest.last().unwrap())));
    }
    for pair in rest.chunks(2) {
        let name = pair[0].to_ascii_lowercase();
        let value = pair[1];
        let param = params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(&name) && !p.positional)
            .ok_or_else(|| DbError::UnknownParameter(name.clone()))?;
        args.insert(param.name.to_string(), value.to_string());
    }

    for param in params.iter().filter(|p| p.required) {
        if !args.contains_key(param.name) {
            return Err(DbError::MissingRequiredParameter(param.name.to_string()));
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_a_syntax_error() {
        assert!(matches!(parse(""), Err(DbError::InvalidSyntax(_))));
        assert!(matches!(parse("   "), Err(DbError::InvalidSyntax(_))));
    }

    #[test]
    fn unknown_command_errors() {
        assert!(matches!(parse("frobnicate x"), Err(DbError::InvalidCommand(_))));
    }

    #[test]
    fn prefix_of_multiword_command_alone_is_unknown() {
        // "create" by itself isn't a command; it only resolves through
        // "create user"/"create role"/"create ns".
        assert!(matches!(parse("create"), Err(DbError::InvalidCommand(_))));
    }

    #[test]
    fn get_with_positional_and_named_args() {
        let parsed = parse("get foo ns tenant1").unwrap();
        assert_eq!(parsed.command, CommandType::Get);
        assert_eq!(parsed.get("key"), Some("foo"));
        assert_eq!(parsed.get("ns"), Some("tenant1"));
    }

    #[test]
    fn set_resolves_both_positionals_and_ttl() {
        let parsed = parse("set foo bar ttl 100").unwrap();
        assert_eq!(parsed.command, CommandType::Set);
        assert_eq!(parsed.get("key"), Some("foo"));
        assert_eq!(parsed.get("value"), Some("bar"));
        assert_eq!(parsed.get("ttl"), Some("100"));
    }

    #[test]
    fn distinguishes_get_get_user_and_get_role() {
        assert_eq!(parse("get foo").unwrap().command, CommandType::Get);
        assert_eq!(parse("get user bob").unwrap().command, CommandType::GetUser);
        assert_eq!(parse("get role r1").unwrap().command, CommandType::GetRole);
    }

    #[test]
    fn missing_required_positional_errors() {
        assert!(matches!(parse("get"), Err(DbError::MissingRequiredParameter(_))));
    }

    #[test]
    fn unknown_named_parameter_errors() {
        assert!(matches!(parse("get foo bogus x"), Err(DbError::UnknownParameter(_))));
    }

    #[test]
    fn dangling_trailing_name_errors() {
        assert!(matches!(parse("get foo ns"), Err(DbError::InvalidSyntax(_))));
    }

    #[test]
    fn create_role_takes_three_positionals() {
        let parsed = parse("create role rw_t3 rw t3").unwrap();
        assert_eq!(parsed.get("name"), Some("rw_t3"));
        assert_eq!(parsed.get("perms"), Some("rw"));
        assert_eq!(parsed.get("ns"), Some("t3"));
    }

    #[test]
    fn zero_arg_commands_parse_with_no_args() {
        assert_eq!(parse("help").unwrap().command, CommandType::Help);
        assert_eq!(parse("stat").unwrap().command, CommandType::Stat);
        assert_eq!(parse("ns").unwrap().command, CommandType::Ns);
    }

    #[test]
    fn parser_idempotence_on_canonical_repr() {
        // parse(canonical + " " + args) round-trips for each command with well-typed args.
        let cases: &[(&str, &[(&str, &str)])] = &[
            ("get", &[("key", "foo")]),
            ("set", &[("key", "foo"), ("value", "bar")]),
            ("del", &[("key", "foo")]),
            ("watch", &[("key", "foo")]),
            ("login", &[("user", "u"), ("pass", "p")]),
            ("create user", &[("user", "u"), ("pass", "p")]),
            ("get user", &[("user", "u")]),
            ("delete user", &[("user", "u")]),
            ("assign role", &[("user", "u"), ("role", "r")]),
            ("divest role", &[("user", "u"), ("role", "r")]),
            ("create role", &[("name", "n"), ("perms", "rw"), ("ns", "t1")]),
            ("get role", &[("name", "n")]),
            ("delete role", &[("name", "n")]),
            ("create ns", &[("ns", "t1")]),
            ("delete ns", &[("ns", "t1")]),
            ("set ns", &[("ns", "t1")]),
        ];
        for (canonical, positional_values) in cases {
            let values: Vec<&str> = positional_values.iter().map(|(_, v)| *v).collect();
            let query = format!("{canonical} {}", values.join(" "));
            let parsed = parse(&query).unwrap();
            assert_eq!(parsed.command.canonical(), *canonical);
            for (name, value) in positional_values.iter() {
                assert_eq!(parsed.get(name), Some(*value));
            }
        }
    }
}
