//! Lyric window selection and answer masking for the lyrics mode.
//!
//! Selection and masking both go through [`tokenize`], so a token chosen as
//! part of the answer always maps back to the same byte span when the line is
//! rebuilt with the mask applied.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use thiserror::Error;

/// Separator between lines in stored lyrics and in the masked rendering.
pub const LINE_DELIMITER: &str = ";";
/// Number of consecutive lines displayed to the player.
pub const LINES_TO_SHOW: usize = 2;
/// Longest answer span, in words.
pub const MAXIMUM_ANSWER_WORDS: usize = 2;

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}']+").expect("word pattern is valid"));

/// Failures while building a lyric puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LyricsError {
    /// The displayed window contains no letters at all.
    #[error("no words available in lyrics")]
    NoWords,
    /// A chosen answer token could not be found again while masking.
    #[error("lyrics answer token `{expected}` not found at line {line}, position {position}")]
    AnswerNotFound {
        /// Line index inside the window.
        line: usize,
        /// Token index inside the line.
        position: usize,
        /// Token text that was expected there.
        expected: String,
    },
}

/// Word span inside a single lyric line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Matched word text.
    pub text: &'a str,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

/// Location of a token inside the displayed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenPosition {
    /// Index of the line inside the window.
    pub line: usize,
    /// Index of the token inside its line.
    pub position: usize,
}

/// Fully resolved lyric round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsPuzzle {
    /// Lines shown to the player, before masking.
    pub window: Vec<String>,
    /// Words the player must find, joined by single spaces.
    pub answer: String,
    /// Where each answer word sits inside the window.
    pub answer_positions: Vec<TokenPosition>,
    /// Window with the answer replaced by underscores, lines joined by [`LINE_DELIMITER`].
    pub masked: String,
}

/// Split raw lyrics into trimmed, non-empty lines.
pub fn split_lines(raw: &str) -> Vec<&str> {
    raw.split(LINE_DELIMITER)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Words of a line: maximal runs of letters and apostrophes.
pub fn tokenize(line: &str) -> Vec<Token<'_>> {
    WORD.find_iter(line)
        .map(|found| Token {
            text: found.as_str(),
            start: found.start(),
            end: found.end(),
        })
        .collect()
}

/// Pick a window of lyrics and a contiguous 1–2 word answer inside it, then mask it.
pub fn build_puzzle<R: Rng>(raw: &str, rng: &mut R) -> Result<LyricsPuzzle, LyricsError> {
    let lines = split_lines(raw);
    if lines.is_empty() {
        return Err(LyricsError::NoWords);
    }

    let latest_start = lines.len().saturating_sub(LINES_TO_SHOW);
    let first = rng.random_range(0..=latest_start);
    let window: Vec<&str> = lines.iter().skip(first).take(LINES_TO_SHOW).copied().collect();

    let (answer, answer_positions) = choose_answer(&window, rng)?;
    let masked = mask_window(&window, &answer_positions, &answer)?;

    Ok(LyricsPuzzle {
        window: window.into_iter().map(str::to_owned).collect(),
        answer,
        answer_positions,
        masked,
    })
}

fn choose_answer<R: Rng>(
    window: &[&str],
    rng: &mut R,
) -> Result<(String, Vec<TokenPosition>), LyricsError> {
    let words: Vec<(TokenPosition, &str)> = window
        .iter()
        .enumerate()
        .flat_map(|(line, text)| {
            tokenize(text)
                .into_iter()
                .enumerate()
                .map(move |(position, token)| (TokenPosition { line, position }, token.text))
        })
        .collect();

    if words.is_empty() {
        return Err(LyricsError::NoWords);
    }

    let length = rng
        .random_range(1..=MAXIMUM_ANSWER_WORDS)
        .min(words.len());
    let start = rng.random_range(0..=words.len() - length);
    let selected = &words[start..start + length];

    let answer = selected
        .iter()
        .map(|(_, word)| *word)
        .collect::<Vec<_>>()
        .join(" ");
    let positions = selected.iter().map(|(position, _)| *position).collect();

    Ok((answer, positions))
}

/// Rebuild the window with every answer token replaced by its mask.
///
/// Each answer word must still be found at its recorded position; anything
/// else means selection and masking disagree and the round is abandoned.
pub fn mask_window(
    window: &[&str],
    positions: &[TokenPosition],
    answer: &str,
) -> Result<String, LyricsError> {
    let expected: Vec<&str> = answer.split(' ').collect();
    let mut masked_lines = Vec::with_capacity(window.len());

    for (line_index, line) in window.iter().enumerate() {
        let tokens = tokenize(line);
        let mut rebuilt = String::with_capacity(line.len() * 2);
        let mut cursor = 0;

        for (answer_index, position) in positions.iter().enumerate() {
            if position.line != line_index {
                continue;
            }

            let word = expected.get(answer_index).copied().unwrap_or_default();
            let token = tokens
                .get(position.position)
                .filter(|token| token.text == word)
                .ok_or_else(|| LyricsError::AnswerNotFound {
                    line: position.line,
                    position: position.position,
                    expected: word.to_owned(),
                })?;

            rebuilt.push_str(&line[cursor..token.start]);
            rebuilt.push_str(&mask_word(token.text));
            let next_on_same_line = positions
                .get(answer_index + 1)
                .is_some_and(|next| next.line == line_index);
            if next_on_same_line {
                rebuilt.push_str("  ");
            }
            cursor = token.end;
        }

        rebuilt.push_str(&line[cursor..]);
        masked_lines.push(rebuilt);
    }

    Ok(masked_lines.join(LINE_DELIMITER))
}

/// One underscore per character, separated by single spaces.
fn mask_word(word: &str) -> String {
    vec!["_"; word.chars().count()].join(" ")
}
