//! Splitting raw text into tokens and joining tokens back into text.
//!
//! Template text is scanned for slot markers first (`<name>` or `#name#`
//! named slots and the `[SLOT]` anonymous marker); the text between markers is
//! handed to a [`Tokenizer`].

use crate::token::{Slot, Token, ANONYMOUS_SLOT_MARKER};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::char;
use nom::combinator::{map, value};
use nom::sequence::delimited;
use nom::IResult;

/// Turns a piece of text into atomic tokens.
pub trait Tokenizer {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Best-effort inverse of a [`Tokenizer`].
pub trait Detokenizer {
    fn detokenize(&self, tokens: &[String]) -> String;
}

const PUNCTUATION: &[char] = &[',', '.', '!', '?', ';', ':', '"', '(', ')'];

/// Whitespace tokenizer that also splits punctuation off the edges of words.
///
/// `"Hello, world!"` becomes `["Hello", ",", "world", "!"]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in text.split_whitespace() {
            let core_start = word
                .char_indices()
                .find(|(_, c)| !PUNCTUATION.contains(c))
                .map_or(word.len(), |(index, _)| index);
            let core_end = word
                .char_indices()
                .rev()
                .find(|(_, c)| !PUNCTUATION.contains(c))
                .map_or(core_start, |(index, c)| index + c.len_utf8());

            tokens.extend(word[..core_start].chars().map(String::from));
            if core_start < core_end {
                tokens.push(word[core_start..core_end].to_string());
            }
            tokens.extend(word[core_end.max(core_start)..].chars().map(String::from));
        }
        tokens
    }
}

/// Joins tokens with single spaces, attaching closing punctuation to the
/// previous token and opening brackets to the next one.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordDetokenizer;

impl Detokenizer for WordDetokenizer {
    fn detokenize(&self, tokens: &[String]) -> String {
        let mut result = String::new();
        let mut glue_next = true;
        for token in tokens {
            let attaches_left = matches!(token.as_str(), "," | "." | "!" | "?" | ";" | ":" | ")");
            if !glue_next && !attaches_left {
                result.push(' ');
            }
            result.push_str(token);
            glue_next = token == "(";
        }
        result
    }
}

/// Joins tokens with single spaces, nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpaceDetokenizer;

impl Detokenizer for SpaceDetokenizer {
    fn detokenize(&self, tokens: &[String]) -> String {
        tokens.join(" ")
    }
}

/// How named slots are written in template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotSyntax {
    /// `<name>`
    #[default]
    Angle,
    /// `#name#`, as used by Tracery grammars.
    Hash,
}

impl SlotSyntax {
    fn delimiters(self) -> (char, char) {
        match self {
            SlotSyntax::Angle => ('<', '>'),
            SlotSyntax::Hash => ('#', '#'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Named(&'a str),
    Anonymous,
}

fn slot_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

fn slot_marker(input: &str, syntax: SlotSyntax) -> IResult<&str, Piece<'_>> {
    let (open, close) = syntax.delimiters();
    alt((
        value(Piece::Anonymous, tag(ANONYMOUS_SLOT_MARKER)),
        map(delimited(char(open), slot_name, char(close)), Piece::Named),
    ))(input)
}

fn split_pieces(input: &str, syntax: SlotSyntax) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut position = 0;

    while position < input.len() {
        let rest = &input[position..];
        match slot_marker(rest, syntax) {
            Ok((remaining, marker)) => {
                if text_start < position {
                    pieces.push(Piece::Text(&input[text_start..position]));
                }
                pieces.push(marker);
                position = input.len() - remaining.len();
                text_start = position;
            }
            Err(_) => {
                position += rest.chars().next().map_or(1, |c| c.len_utf8());
            }
        }
    }
    if text_start < input.len() {
        pieces.push(Piece::Text(&input[text_start..]));
    }
    pieces
}

/// Parses template text into tokens.
pub fn parse_tokens(text: &str, tokenizer: &dyn Tokenizer, syntax: SlotSyntax) -> Vec<Token> {
    let mut tokens = Vec::new();
    for piece in split_pieces(text, syntax) {
        match piece {
            Piece::Text(text) => {
                tokens.extend(tokenizer.tokenize(text).into_iter().map(Token::Literal))
            }
            Piece::Named(name) => tokens.push(Token::Slot(Slot::named(name))),
            Piece::Anonymous => tokens.push(Token::anonymous_slot()),
        }
    }
    tokens
}
