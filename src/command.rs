//! Remote mutation commands.
//!
//! A command is a path of the form
//! `command/application/file/section/property[/value]?query`, for example
//! `set/myapp/settings/Core/Name/Robin` or
//! `add/myapp/settings/Core/Tags?red&green`. Path segments and query
//! parameters may be percent-encoded.
//!
//! `add` and `remove` work on list, set and map properties. For lists and
//! sets the query keys are the items; for maps `add` takes `key=value`
//! pairs and `remove` takes keys.

use percent_encoding::percent_decode_str;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::container::IniContainer;
use crate::ini::IniValue;
use crate::instance::ConfigInstance;
use crate::value::{Value, ValueType};
use crate::{Error, Result};

/// Operation of a remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandVerb {
    Get,
    Set,
    Reset,
    Add,
    Remove,
}

impl FromStr for CommandVerb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "reset" => Ok(Self::Reset),
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            _ => Err(Error::InvalidCommand(format!(
                "Unknown command '{}' (expected get, set, reset, add or remove)",
                s
            ))),
        }
    }
}

impl fmt::Display for CommandVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Reset => "reset",
            Self::Add => "add",
            Self::Remove => "remove",
        };
        write!(f, "{}", name)
    }
}

/// A parsed remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub verb: CommandVerb,
    pub application: String,
    pub file: String,
    pub section: Option<String>,
    pub property: Option<String>,
    pub value: Option<String>,
    /// Query parameters in order; keys without `=` have an empty value
    pub query: Vec<(String, String)>,
}

impl FromStr for RemoteCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (path, query) = match s.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (s, None),
        };
        let segments: Vec<String> = path
            .trim_matches('/')
            .split('/')
            .map(percent_decode)
            .collect::<Result<_>>()?;
        if segments.len() < 3 || segments.len() > 6 {
            return Err(Error::InvalidCommand(format!(
                "Expected command/application/file[/section[/property[/value]]], got '{}'",
                path
            )));
        }
        let mut segments = segments.into_iter();
        let verb: CommandVerb = segments.next().unwrap_or_default().parse()?;
        let application = segments.next().unwrap_or_default();
        let file = segments.next().unwrap_or_default();
        let section = segments.next();
        let property = segments.next();
        let value = segments.next();

        let query = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let command = Self {
            verb,
            application,
            file,
            section,
            property,
            value,
            query,
        };
        command.validate()?;
        Ok(command)
    }
}

impl RemoteCommand {
    fn validate(&self) -> Result<()> {
        let needs_property = matches!(
            self.verb,
            CommandVerb::Set | CommandVerb::Add | CommandVerb::Remove
        );
        if needs_property && self.property.is_none() {
            return Err(Error::InvalidCommand(format!(
                "'{}' needs a section and a property",
                self.verb
            )));
        }
        if self.verb == CommandVerb::Set && self.value.is_none() {
            return Err(Error::InvalidCommand("'set' needs a value".to_string()));
        }
        if self.verb != CommandVerb::Set && self.value.is_some() {
            return Err(Error::InvalidCommand(format!(
                "'{}' does not take a value",
                self.verb
            )));
        }
        if matches!(self.verb, CommandVerb::Add | CommandVerb::Remove) && self.query.is_empty() {
            return Err(Error::InvalidCommand(format!(
                "'{}' needs query parameters",
                self.verb
            )));
        }
        Ok(())
    }
}

/// Run `command` against `container`, returning the affected values.
pub fn execute(container: &IniContainer, command: &RemoteCommand) -> Result<Vec<IniValue>> {
    if !command.application.eq_ignore_ascii_case(container.application())
        || !command.file.eq_ignore_ascii_case(container.name())
    {
        return Err(Error::NotFound(format!(
            "{}/{}",
            command.application, command.file
        )));
    }
    tracing::debug!(verb = %command.verb, section = ?command.section, property = ?command.property, "Executing command");

    let targets = resolve_targets(container, command)?;
    match command.verb {
        CommandVerb::Get => {}
        CommandVerb::Set => {
            let text = command.value.as_deref().unwrap_or_default();
            for target in &targets {
                target.set_text(text)?;
            }
        }
        CommandVerb::Reset => {
            for target in &targets {
                target.reset()?;
            }
        }
        CommandVerb::Add => {
            for target in &targets {
                add_items(target, &command.query)?;
            }
        }
        CommandVerb::Remove => {
            for target in &targets {
                remove_items(target, &command.query)?;
            }
        }
    }
    Ok(targets)
}

/// Parse and run a command path.
pub fn execute_path(container: &IniContainer, path: &str) -> Result<Vec<IniValue>> {
    let command: RemoteCommand = path.parse()?;
    execute(container, &command)
}

fn resolve_targets(container: &IniContainer, command: &RemoteCommand) -> Result<Vec<IniValue>> {
    let sections = match &command.section {
        Some(name) => vec![find_or_register(container, name)?],
        None => container.sections(),
    };
    match &command.property {
        Some(property) => {
            let section = sections
                .first()
                .ok_or_else(|| Error::InvalidCommand("missing section".to_string()))?;
            let name = section
                .descriptor()
                .property(property)
                .or_else(|| section.descriptor().property_by_ini_key(property))
                .map(|p| p.name().to_string())
                .ok_or_else(|| {
                    Error::UnknownProperty(format!("{}.{}", section.name(), property))
                })?;
            Ok(vec![section.ini_value(&name)?])
        }
        None => Ok(sections.iter().flat_map(|s| s.ini_values()).collect()),
    }
}

fn find_or_register(container: &IniContainer, name: &str) -> Result<ConfigInstance> {
    match container.try_get(name) {
        Some(instance) => Ok(instance),
        None => container.register_untyped(name),
    }
}

fn add_items(target: &IniValue, query: &[(String, String)]) -> Result<()> {
    let current = target.value()?;
    match target.descriptor().value_type() {
        ValueType::List(_) | ValueType::Set(_) => {
            let mut items = current.as_items().map(<[Value]>::to_vec).unwrap_or_default();
            items.extend(query.iter().map(|(key, _)| Value::Text(key.clone())));
            target.set_value(Value::List(items))
        }
        ValueType::Map(_) => {
            let mut map = current.as_map().cloned().unwrap_or_default();
            for (key, value) in query {
                if value.is_empty() {
                    return Err(Error::InvalidCommand(format!(
                        "Map entry '{}' needs a value",
                        key
                    )));
                }
                map.insert(key.clone(), Value::Text(value.clone()));
            }
            target.set_value(Value::Map(map))
        }
        other => Err(not_a_collection(target, other)),
    }
}

fn remove_items(target: &IniValue, query: &[(String, String)]) -> Result<()> {
    let current = target.value()?;
    match target.descriptor().value_type() {
        ValueType::List(_) | ValueType::Set(_) => {
            // Parse the keys into the element type so they compare equal
            let keys = Value::List(query.iter().map(|(k, _)| Value::Text(k.clone())).collect());
            let registry = target.instance().registry();
            let parsed = registry.coerce(target.descriptor(), keys)?;
            let remove = parsed.as_items().unwrap_or_default();
            let items: Vec<Value> = current
                .as_items()
                .unwrap_or_default()
                .iter()
                .filter(|item| !remove.contains(item))
                .cloned()
                .collect();
            target.set_value(Value::List(items))
        }
        ValueType::Map(_) => {
            let map: BTreeMap<String, Value> = current
                .as_map()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|(k, _)| !query.iter().any(|(q, _)| q == k))
                .collect();
            target.set_value(Value::Map(map))
        }
        other => Err(not_a_collection(target, other)),
    }
}

fn not_a_collection(target: &IniValue, value_type: &ValueType) -> Error {
    Error::InvalidCommand(format!(
        "{}.{} is {}, not a list, set or map",
        target.section(),
        target.name(),
        value_type
    ))
}

fn percent_decode(input: &str) -> Result<String> {
    percent_decode_str(input)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Error::InvalidCommand(format!("'{}' is not valid UTF-8", input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Section;
    use crate::test_utils::{CoreSettings, TestEnv, text};

    #[test]
    fn test_parse_full_command() {
        let cmd: RemoteCommand = "set/test/app/Core/Name/Hello%20World".parse().unwrap();
        assert_eq!(cmd.verb, CommandVerb::Set);
        assert_eq!(cmd.application, "test");
        assert_eq!(cmd.file, "app");
        assert_eq!(cmd.section.as_deref(), Some("Core"));
        assert_eq!(cmd.property.as_deref(), Some("Name"));
        assert_eq!(cmd.value.as_deref(), Some("Hello World"));
    }

    #[test]
    fn test_parse_query_pairs() {
        let cmd: RemoteCommand = "add/test/app/Core/Counts?One=1&Two=2".parse().unwrap();
        assert_eq!(
            cmd.query,
            vec![
                ("One".to_string(), "1".to_string()),
                ("Two".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_rejects_bad_commands() {
        for bad in [
            "frob/test/app/Core/Name",
            "get/test",
            "set/test/app/Core/Name",
            "get/test/app/Core/Name/extra",
            "add/test/app/Core/Tags",
            "get/test/app/Core/Name%FF",
        ] {
            assert!(
                matches!(bad.parse::<RemoteCommand>(), Err(Error::InvalidCommand(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_malformed_escapes_stay_literal() {
        let cmd: RemoteCommand = "set/test/app/Core/Name/a%+1b".parse().unwrap();
        assert_eq!(cmd.value.as_deref(), Some("a%+1b"));

        let cmd: RemoteCommand = "add/test/app/Core/Tags?two+words&a%26b".parse().unwrap();
        assert_eq!(cmd.query[0].0, "two words");
        assert_eq!(cmd.query[1].0, "a&b");
    }

    #[test]
    fn test_get_and_set() {
        let env = TestEnv::new();
        let container = env.container();
        let core = container.section::<CoreSettings>().unwrap();

        let values = execute_path(&container, "get/test/app/Core/Name").unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value().unwrap(), text("Robin"));

        execute_path(&container, "set/test/app/Core/Age/42").unwrap();
        assert_eq!(core.age(), 42);

        let all = execute_path(&container, "get/test/app/Core").unwrap();
        assert_eq!(all.len(), 6);
    }

    #[test]
    fn test_reset_restores_default() {
        let env = TestEnv::new();
        let container = env.container();
        let core = container.section::<CoreSettings>().unwrap();
        core.instance().set("Age", 99).unwrap();
        execute_path(&container, "reset/test/app/Core/Age").unwrap();
        assert_eq!(core.age(), 21);
    }

    #[test]
    fn test_add_and_remove_list_items() {
        let env = TestEnv::new();
        let container = env.container();
        let core = container.section::<CoreSettings>().unwrap();

        execute_path(&container, "add/test/app/Core/Tags?red&green&blue").unwrap();
        assert_eq!(
            core.instance().get("Tags").unwrap(),
            Value::from(vec!["red", "green", "blue"])
        );
        execute_path(&container, "remove/test/app/Core/Tags?green").unwrap();
        assert_eq!(core.instance().get("Tags").unwrap(), Value::from(vec!["red", "blue"]));
    }

    #[test]
    fn test_add_and_remove_map_entries() {
        let env = TestEnv::new();
        let container = env.container();
        let core = container.section::<CoreSettings>().unwrap();

        execute_path(&container, "add/test/app/Core/Counts?One=1&Two=2").unwrap();
        let counts: BTreeMap<String, i64> = core.instance().get_as("Counts").unwrap();
        assert_eq!(counts.get("Two"), Some(&2));

        execute_path(&container, "remove/test/app/Core/Counts?One").unwrap();
        let counts: BTreeMap<String, i64> = core.instance().get_as("Counts").unwrap();
        assert!(!counts.contains_key("One"));
        assert!(counts.contains_key("Two"));

        let err = execute_path(&container, "add/test/app/Core/Counts?Three").unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)));
    }

    #[test]
    fn test_add_on_scalar_is_rejected() {
        let env = TestEnv::new();
        let container = env.container();
        container.section::<CoreSettings>().unwrap();
        let err = execute_path(&container, "add/test/app/Core/Age?1").unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)));
    }

    #[test]
    fn test_wrong_application_or_file() {
        let env = TestEnv::new();
        let container = env.container();
        container.section::<CoreSettings>().unwrap();
        for path in ["get/other/app/Core/Name", "get/test/other/Core/Name"] {
            assert!(matches!(execute_path(&container, path), Err(Error::NotFound(_))));
        }
    }

    #[test]
    fn test_unknown_section_and_property() {
        let env = TestEnv::new();
        let container = env.container();
        container.section::<CoreSettings>().unwrap();
        assert!(matches!(
            execute_path(&container, "get/test/app/Nope/Name"),
            Err(Error::UnknownSection(_))
        ));
        assert!(matches!(
            execute_path(&container, "get/test/app/Core/Nope"),
            Err(Error::UnknownProperty(_))
        ));
    }
}
