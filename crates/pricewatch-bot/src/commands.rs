//! Chat command parsing.
//!
//! Commands are `/name arg...`, with arguments split on whitespace. The
//! `/name@BotName` form used in group chats is accepted. Extra trailing
//! arguments are ignored.

use pricewatch_core::{normalize_product_url, parse_price, Decimal};

use crate::error::CommandError;
use crate::messages::{TRACK_USAGE, UNTRACK_USAGE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `url` is already normalized.
    Track { url: String, target: Decimal },
    List,
    /// `url` is as typed; lookup normalizes it.
    Untrack { url: String },
    Unknown(String),
}

impl Command {
    /// Parses one line of chat input.
    ///
    /// Returns `Ok(None)` for text that is not a command.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::InvalidInput`] when a known command has
    /// missing or malformed arguments.
    pub fn parse(text: &str) -> Result<Option<Self>, CommandError> {
        let mut words = text.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let Some(name) = head.strip_prefix('/') else {
            return Ok(None);
        };
        let name = name.split_once('@').map_or(name, |(name, _bot)| name);
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "list" => Command::List,
            "track" => parse_track(&args)?,
            "untrack" => match args.first() {
                Some(url) => Command::Untrack {
                    url: (*url).to_string(),
                },
                None => return Err(invalid("missing URL", UNTRACK_USAGE)),
            },
            other => Command::Unknown(other.to_string()),
        };
        Ok(Some(command))
    }
}

fn parse_track(args: &[&str]) -> Result<Command, CommandError> {
    let [raw_url, raw_target, ..] = args else {
        return Err(invalid("expected a URL and a target price", TRACK_USAGE));
    };
    let url = normalize_product_url(raw_url).map_err(|e| invalid(e.to_string(), TRACK_USAGE))?;
    let target = parse_price(raw_target).map_err(|e| invalid(e.to_string(), TRACK_USAGE))?;
    Ok(Command::Track { url, target })
}

fn invalid(reason: impl Into<String>, usage: &'static str) -> CommandError {
    CommandError::InvalidInput {
        reason: reason.into(),
        usage,
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn parse(text: &str) -> Command {
        Command::parse(text).unwrap().unwrap()
    }

    fn usage_of(text: &str) -> &'static str {
        match Command::parse(text) {
            Err(CommandError::InvalidInput { usage, .. }) => usage,
            other => panic!("expected InvalidInput for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("/start"), Command::Start);
        assert_eq!(parse("/help"), Command::Help);
        assert_eq!(parse("  /list  "), Command::List);
        assert_eq!(parse("/LIST"), Command::List);
    }

    #[test]
    fn bot_mention_suffix_is_ignored() {
        assert_eq!(parse("/list@PriceTrackerBot"), Command::List);
    }

    #[test]
    fn track_normalizes_url_and_parses_decimal_target() {
        assert_eq!(
            parse("/track https://shop.example/products/tea?ref=abc 499.50"),
            Command::Track {
                url: "https://shop.example/products/tea".to_string(),
                target: Decimal::from_str("499.50").unwrap(),
            }
        );
    }

    #[test]
    fn track_ignores_extra_arguments() {
        assert!(matches!(
            parse("/track https://shop.example/p 10 please"),
            Command::Track { .. }
        ));
    }

    #[test]
    fn track_rejects_missing_or_malformed_arguments() {
        assert_eq!(usage_of("/track"), TRACK_USAGE);
        assert_eq!(usage_of("/track https://shop.example/p"), TRACK_USAGE);
        assert_eq!(usage_of("/track https://shop.example/p cheap"), TRACK_USAGE);
        assert_eq!(usage_of("/track https://shop.example/p -5"), TRACK_USAGE);
        assert_eq!(usage_of("/track shop.example/p 10"), TRACK_USAGE);
    }

    #[test]
    fn untrack_keeps_url_as_typed() {
        assert_eq!(
            parse("/untrack https://shop.example/p?ref=1"),
            Command::Untrack {
                url: "https://shop.example/p?ref=1".to_string()
            }
        );
        assert_eq!(usage_of("/untrack"), UNTRACK_USAGE);
    }

    #[test]
    fn unknown_commands_and_plain_text() {
        assert_eq!(parse("/frobnicate now"), Command::Unknown("frobnicate".into()));
        assert!(Command::parse("hello there").unwrap().is_none());
        assert!(Command::parse("   ").unwrap().is_none());
    }
}
