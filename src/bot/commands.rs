use crate::{audio::manager::QueueSnapshot, error::PreconditionError};

/// Entries shown in a queue listing before it is truncated.
const QUEUE_LISTING_LIMIT: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play(String),
    Pause,
    Resume,
    Stop,
    Skip,
    Queue,
    /// Raw argument; empty means "show the current volume".
    Volume(String),
    Help,
}

/// Primary name and aliases for each command.
const ALIASES: &[(&str, &[&str])] = &[
    ("play", &["p"]),
    ("pause", &["pa", "ps"]),
    ("resume", &["r", "res"]),
    ("stop", &["s", "st"]),
    ("skip", &["sk"]),
    ("queue", &["q"]),
    ("volume", &["v", "vol"]),
    ("help", &["h"]),
];

fn canonical(token: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(name, aliases)| *name == token || aliases.contains(&token))
        .map(|(name, _)| *name)
}

/// Parses a chat message. Returns `None` for anything that is not one of our
/// commands, so ordinary chatter is ignored.
pub fn parse(content: &str, prefix: &str) -> Option<Command> {
    let body = content.trim_start().strip_prefix(prefix)?;
    let mut parts = body.splitn(2, char::is_whitespace);
    let token = parts.next()?.to_lowercase();
    let args = parts.next().unwrap_or("").trim().to_string();

    let command = match canonical(&token)? {
        "play" => Command::Play(args),
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        "stop" => Command::Stop,
        "skip" => Command::Skip,
        "queue" => Command::Queue,
        "volume" => Command::Volume(args),
        "help" => Command::Help,
        _ => return None,
    };
    Some(command)
}

/// Parses a volume percentage, rejecting anything outside 0-100.
pub fn parse_volume(arg: &str) -> Result<i64, PreconditionError> {
    let percent: i64 = arg
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| PreconditionError::VolumeOutOfRange)?;
    if !(0..=100).contains(&percent) {
        return Err(PreconditionError::VolumeOutOfRange);
    }
    Ok(percent)
}

/// Renders the queue. Item 1 is always labelled as now playing.
pub fn format_queue(snapshot: &QueueSnapshot) -> String {
    let mut out = String::from("📜 Queue:");
    for (i, item) in snapshot.items.iter().take(QUEUE_LISTING_LIMIT).enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, item.title()));
        if i == 0 {
            out.push_str(if snapshot.paused {
                " (now playing, paused)"
            } else {
                " (now playing)"
            });
        }
    }
    if snapshot.items.len() > QUEUE_LISTING_LIMIT {
        out.push_str(&format!(
            "\n…and {} more",
            snapshot.items.len() - QUEUE_LISTING_LIMIT
        ));
    }
    out
}

pub fn help_text(prefix: &str) -> String {
    format!(
        "🎵 Commands:\n\
        `{p}play <query|url>` (p) - play or queue a song\n\
        `{p}pause` (pa, ps) - pause playback\n\
        `{p}resume` (r, res) - resume playback\n\
        `{p}skip` (sk) - skip the current song\n\
        `{p}stop` (s, st) - stop, clear the queue and leave\n\
        `{p}queue` (q) - show the queue\n\
        `{p}volume [0-100]` (v, vol) - show or set the volume",
        p = prefix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PlayableItem;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_primary_names_case_insensitively() {
        assert_eq!(
            parse("!PLAY never gonna give you up", "!"),
            Some(Command::Play("never gonna give you up".to_string()))
        );
        assert_eq!(parse("!Queue", "!"), Some(Command::Queue));
    }

    #[test]
    fn resolves_every_alias() {
        let cases = [
            ("!p foo", Command::Play("foo".to_string())),
            ("!pa", Command::Pause),
            ("!ps", Command::Pause),
            ("!r", Command::Resume),
            ("!res", Command::Resume),
            ("!s", Command::Stop),
            ("!st", Command::Stop),
            ("!sk", Command::Skip),
            ("!q", Command::Queue),
            ("!v 40", Command::Volume("40".to_string())),
            ("!vol", Command::Volume(String::new())),
            ("!h", Command::Help),
        ];
        for (input, expected) in cases {
            assert_eq!(parse(input, "!"), Some(expected), "{input}");
        }
    }

    #[test]
    fn ignores_other_messages() {
        assert_eq!(parse("hello there", "!"), None);
        assert_eq!(parse("!dance", "!"), None);
        assert_eq!(parse("!", "!"), None);
        assert_eq!(parse("?play foo", "!"), None);
    }

    #[test]
    fn supports_custom_prefix() {
        assert_eq!(parse("$$skip", "$$"), Some(Command::Skip));
        assert_eq!(parse("!skip", "$$"), None);
    }

    #[test]
    fn play_without_query_keeps_empty_args() {
        assert_eq!(parse("!play   ", "!"), Some(Command::Play(String::new())));
    }

    #[test]
    fn volume_bounds() {
        assert_eq!(parse_volume("0"), Ok(0));
        assert_eq!(parse_volume("100"), Ok(100));
        assert_eq!(parse_volume(" 55% "), Ok(55));
        for bad in ["150", "-1", "loud", "", "2.5"] {
            assert_eq!(parse_volume(bad), Err(PreconditionError::VolumeOutOfRange), "{bad}");
        }
    }

    #[test]
    fn queue_listing_marks_now_playing() {
        let snapshot = QueueSnapshot {
            items: vec![
                PlayableItem::new("Foo Song", "https://x/foo"),
                PlayableItem::new("Bar Song", "https://x/bar"),
            ],
            paused: true,
            volume: 0.5,
        };
        assert_eq!(
            format_queue(&snapshot),
            "📜 Queue:\n1. Foo Song (now playing, paused)\n2. Bar Song"
        );
    }

    #[test]
    fn long_queues_are_truncated() {
        let snapshot = QueueSnapshot {
            items: (0..20)
                .map(|i| PlayableItem::new(format!("Song {i}"), "https://x"))
                .collect(),
            paused: false,
            volume: 0.5,
        };
        let listing = format_queue(&snapshot);
        assert!(listing.ends_with("…and 5 more"));
        assert!(!listing.contains("Song 15"));
    }
}
