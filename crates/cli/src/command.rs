use thiserror::Error;

/// One line of stdin input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Toggle(String),
	On(String),
	Off(String),
	All,
	Clear,
	/// Raw search text; may be empty to reset the search.
	Search(String),
	/// Inserts or replaces an item in the store.
	Add { id: String, key: Option<String>, name: Option<String> },
	Remove(String),
	/// Fails the store subscription with a message.
	Fail(String),
	Login(String),
	Logout,
	Show,
	Help,
	Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
	#[error("unknown command `{0}` (try `help`)")]
	Unknown(String),
	#[error("`{0}` needs an argument")]
	MissingArgument(&'static str),
}

pub const HELP: &str = "\
commands:
  toggle <key>           flip one key
  on <key> | off <key>   set one key
  all | clear            select every key | clear the set
  search [text]          set the search text (empty resets)
  add <id> <key|-> [name...]
  remove <id>
  fail <message>         fail the collection source
  login <user> | logout  change the session (with `session = true`)
  show                   print the current view
  quit";

impl Command {
	/// Parses one input line. Blank lines yield `None`.
	pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
		let line = line.trim();
		if line.is_empty() {
			return Ok(None);
		}
		let (verb, rest) = match line.split_once(char::is_whitespace) {
			Some((verb, rest)) => (verb, rest.trim()),
			None => (line, ""),
		};

		let command = match verb {
			"toggle" | "t" => Self::Toggle(required("toggle", rest)?),
			"on" => Self::On(required("on", rest)?),
			"off" => Self::Off(required("off", rest)?),
			"all" => Self::All,
			"clear" => Self::Clear,
			"search" | "/" => Self::Search(rest.to_string()),
			"add" => parse_add(rest)?,
			"remove" | "rm" => Self::Remove(required("remove", rest)?),
			"fail" => Self::Fail(required("fail", rest)?),
			"login" => Self::Login(required("login", rest)?),
			"logout" => Self::Logout,
			"show" => Self::Show,
			"help" | "?" => Self::Help,
			"quit" | "q" | "exit" => Self::Quit,
			other => return Err(CommandError::Unknown(other.to_string())),
		};
		Ok(Some(command))
	}
}

fn required(verb: &'static str, rest: &str) -> Result<String, CommandError> {
	if rest.is_empty() {
		return Err(CommandError::MissingArgument(verb));
	}
	Ok(rest.to_string())
}

fn parse_add(rest: &str) -> Result<Command, CommandError> {
	let mut parts = rest.splitn(3, char::is_whitespace);
	let id = parts.next().filter(|id| !id.is_empty()).ok_or(CommandError::MissingArgument("add"))?;
	let key = match parts.next() {
		None | Some("-") => None,
		Some(key) => Some(key.to_string()),
	};
	let name = parts.next().map(str::trim).filter(|name| !name.is_empty()).map(str::to_string);
	Ok(Command::Add {
		id: id.to_string(),
		key,
		name,
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_key_commands() {
		assert_eq!(Command::parse("toggle temp"), Ok(Some(Command::Toggle("temp".into()))));
		assert_eq!(Command::parse("  on door "), Ok(Some(Command::On("door".into()))));
		assert_eq!(Command::parse("off door"), Ok(Some(Command::Off("door".into()))));
		assert_eq!(Command::parse("all"), Ok(Some(Command::All)));
		assert_eq!(Command::parse("clear"), Ok(Some(Command::Clear)));
	}

	#[test]
	fn search_keeps_inner_spaces_and_allows_empty() {
		assert_eq!(Command::parse("search Front Door"), Ok(Some(Command::Search("Front Door".into()))));
		assert_eq!(Command::parse("search"), Ok(Some(Command::Search(String::new()))));
	}

	#[test]
	fn add_with_and_without_key() {
		assert_eq!(
			Command::parse("add d9 temp Attic Sensor"),
			Ok(Some(Command::Add {
				id: "d9".into(),
				key: Some("temp".into()),
				name: Some("Attic Sensor".into()),
			}))
		);
		assert_eq!(
			Command::parse("add d0 -"),
			Ok(Some(Command::Add {
				id: "d0".into(),
				key: None,
				name: None,
			}))
		);
	}

	#[test]
	fn blank_and_bad_lines() {
		assert_eq!(Command::parse("   "), Ok(None));
		assert_eq!(Command::parse("toggle"), Err(CommandError::MissingArgument("toggle")));
		assert_eq!(Command::parse("add"), Err(CommandError::MissingArgument("add")));
		assert_eq!(Command::parse("frobnicate x"), Err(CommandError::Unknown("frobnicate".into())));
	}
}
