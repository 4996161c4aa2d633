//! Command palette table and matching.

/// Command resolved from palette input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
  Decks,
  Problems,
  Home,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: AppCommand,
}

pub const COMMANDS: &[Command] = &[
  Command {
    name: "decks",
    aliases: &["d", "deck", "cards"],
    description: "Browse flashcard decks",
    action: AppCommand::Decks,
  },
  Command {
    name: "problems",
    aliases: &["p", "problem", "leetcode"],
    description: "Problem list",
    action: AppCommand::Problems,
  },
  Command {
    name: "home",
    aliases: &["h", "welcome"],
    description: "Welcome screen",
    action: AppCommand::Home,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit devdecks",
    action: AppCommand::Quit,
  },
];

impl Command {
  /// How well `input` (already lowercased) matches; lower is better, `None` is no match.
  ///
  /// Exact beats prefix beats substring, and at each level the name beats an alias.
  fn rank(&self, input: &str) -> Option<u8> {
    let tests: [fn(&str, &str) -> bool; 3] = [
      |word, input| word == input,
      |word, input| word.starts_with(input),
      |word, input| word.contains(input),
    ];
    tests.iter().enumerate().find_map(|(level, test)| {
      let level = level as u8 * 2;
      if test(self.name, input) {
        Some(level)
      } else if self.aliases.iter().any(|alias| test(*alias, input)) {
        Some(level + 1)
      } else {
        None
      }
    })
  }
}

impl AppCommand {
  /// Map a submitted command name or alias; unknown input yields `None`.
  pub fn parse(input: &str) -> Option<Self> {
    let input = input.trim().to_lowercase();
    COMMANDS
      .iter()
      .find(|cmd| cmd.name == input || cmd.aliases.contains(&input.as_str()))
      .map(|cmd| cmd.action)
  }
}

/// Commands matching `input`, best match first. Empty input lists everything.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut ranked: Vec<(u8, &'static Command)> = COMMANDS
    .iter()
    .filter_map(|cmd| cmd.rank(&input).map(|rank| (rank, cmd)))
    .collect();
  // Stable, so equal ranks keep table order
  ranked.sort_by_key(|(rank, _)| *rank);
  ranked.into_iter().map(|(_, cmd)| cmd).collect()
}
