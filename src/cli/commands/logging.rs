use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_LEVEL: &str = "log-level";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

/// Effective verbosity: the louder of `-v` repetitions and `--log-level`.
#[must_use]
pub fn verbosity(matches: &ArgMatches) -> u8 {
    let count = matches.get_count(ARG_VERBOSITY);
    let level = matches.get_one::<u8>(ARG_LOG_LEVEL).copied().unwrap_or(0);
    count.max(level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Increase verbosity, repeatable (-v WARN .. -vvvv TRACE)")
                .global(true)
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new(ARG_LOG_LEVEL)
                .long("log-level")
                .help("Log level: ERROR, WARN, INFO, DEBUG, TRACE or 0-5 (default: ERROR)")
                .env("LUXSUV_LOG_LEVEL")
                .global(true)
                .value_name("LEVEL")
                .value_parser(validator_log_level()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_names_and_numbers() {
        let command = with_args(Command::new("luxsuv"));
        for (level, expected) in [("error", 0), ("WARN", 1), ("info", 2), ("3", 3), ("5", 5)] {
            temp_env::with_var("LUXSUV_LOG_LEVEL", Some(level), || {
                let matches = command.clone().get_matches_from(vec!["luxsuv"]);
                assert_eq!(matches.get_one::<u8>(ARG_LOG_LEVEL).copied(), Some(expected));
                assert_eq!(verbosity(&matches), expected);
            });
        }
    }

    #[test]
    fn log_level_rejects_unknown() {
        temp_env::with_var("LUXSUV_LOG_LEVEL", Some("chatty"), || {
            let result = with_args(Command::new("luxsuv")).try_get_matches_from(vec!["luxsuv"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn louder_of_flag_and_level_wins() {
        let command = with_args(Command::new("luxsuv"));
        temp_env::with_var("LUXSUV_LOG_LEVEL", Some("debug"), || {
            let matches = command.clone().get_matches_from(vec!["luxsuv", "-v"]);
            assert_eq!(verbosity(&matches), 3);
            let matches = command.clone().get_matches_from(vec!["luxsuv", "-vvvv"]);
            assert_eq!(verbosity(&matches), 4);
        });
        temp_env::with_var_unset("LUXSUV_LOG_LEVEL", || {
            let matches = command
                .clone()
                .get_matches_from(vec!["luxsuv", "--log-level", "warn"]);
            assert_eq!(verbosity(&matches), 1);
            let matches = command.clone().get_matches_from(vec!["luxsuv"]);
            assert_eq!(verbosity(&matches), 0);
        });
    }
}
