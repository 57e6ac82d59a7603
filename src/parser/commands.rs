//! The exhaustive command table from spec §4.1: canonical token
//! sequence, parameter schema, and whether the command is admin-only
//! (consumed by the executor's registry, not the parser itself).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Get,
    Set,
    Del,
    Watch,
    Login,
    CreateUser,
    GetUser,
    DeleteUser,
    AssignRole,
    DivestRole,
    Users,
    Sessions,
    Me,
    CreateRole,
    GetRole,
    DeleteRole,
    Roles,
    CreateNs,
    DeleteNs,
    Ns,
    SetNs,
    Help,
    Stat,
}

impl CommandType {
    /// The canonical textual representation, used both to populate the
    /// trie and to round-trip a parsed command back to text (spec §8's
    /// parser-idempotence property).
    pub fn canonical(self) -> &'static str {
        match self {
            CommandType::Get => "get",
            CommandType::Set => "set",
            CommandType::Del => "del",
            CommandType::Watch => "watch",
            CommandType::Login => "login",
            CommandType::CreateUser => "create user",
            CommandType::GetUser => "get user",
            CommandType::DeleteUser => "delete user",
            CommandType::AssignRole => "assign role",
            CommandType::DivestRole => "divest role",
            CommandType::Users => "users",
            CommandType::Sessions => "sessions",
            CommandType::Me => "me",
            CommandType::CreateRole => "create role",
            CommandType::GetRole => "get role",
            CommandType::DeleteRole => "delete role",
            CommandType::Roles => "roles",
            CommandType::CreateNs => "create ns",
            CommandType::DeleteNs => "delete ns",
            CommandType::Ns => "ns",
            CommandType::SetNs => "set ns",
            CommandType::Help => "help",
            CommandType::Stat => "stat",
        }
    }

    pub fn tokens(self) -> Vec<&'static str> {
        self.canonical().split(' ').collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub positional: bool,
    pub position: usize,
}

const fn pos(name: &'static str, position: usize) -> ParamSpec {
    ParamSpec { name, required: true, positional: true, position }
}

const fn named(name: &'static str) -> ParamSpec {
    ParamSpec { name, required: false, positional: false, position: 0 }
}

/// Parameter schema for every command, in the order the spec names them.
pub fn schema(command: CommandType) -> Vec<ParamSpec> {
    match command {
        CommandType::Get => vec![pos("key", 0), named("ttl"), named("ns")],
        CommandType::Set => vec![pos("key", 0), pos("value", 1), named("ttl"), named("ns")],
        CommandType::Del => vec![pos("key", 0), named("ns")],
        CommandType::Watch => vec![pos("key", 0), named("ns")],
        CommandType::Login => vec![pos("user", 0), pos("pass", 1)],
        CommandType::CreateUser => vec![pos("user", 0), pos("pass", 1)],
        CommandType::GetUser => vec![pos("user", 0)],
        CommandType::DeleteUser => vec![pos("user", 0)],
        CommandType::AssignRole => vec![pos("user", 0), pos("role", 1)],
        CommandType::DivestRole => vec![pos("user", 0), pos("role", 1)],
        CommandType::Users => vec![],
        CommandType::Sessions => vec![],
        CommandType::Me => vec![],
        CommandType::CreateRole => vec![pos("name", 0), pos("perms", 1), pos("ns", 2)],
        CommandType::GetRole => vec![pos("name", 0)],
        CommandType::DeleteRole => vec![pos("name", 0)],
        CommandType::Roles => vec![],
        CommandType::CreateNs => vec![pos("ns", 0)],
        CommandType::DeleteNs => vec![pos("ns", 0)],
        CommandType::Ns => vec![],
        CommandType::SetNs => vec![pos("ns", 0)],
        CommandType::Help => vec![],
        CommandType::Stat => vec![],
    }
}

/// Every command in canonical-token form, for populating the trie.
pub fn all_commands() -> Vec<CommandType> {
    vec![
        CommandType::Get,
        CommandType::Set,
        CommandType::Del,
        CommandType::Watch,
        CommandType::Login,
        CommandType::CreateUser,
        CommandType::GetUser,
        CommandType::DeleteUser,
        CommandType::AssignRole,
        CommandType::DivestRole,
        CommandType::Users,
        CommandType::Sessions,
        CommandType::Me,
        CommandType::CreateRole,
        CommandType::GetRole,
        CommandType::DeleteRole,
        CommandType::Roles,
        CommandType::CreateNs,
        CommandType::DeleteNs,
        CommandType::Ns,
        CommandType::SetNs,
        CommandType::Help,
        CommandType::Stat,
    ]
}
