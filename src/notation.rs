//! Tracery ingestion and textual export of grammars.
//!
//! Tracery writes non-terminals as `#name#` and may append modifiers
//! (`#name.capitalize#`). Modifiers are dropped on import; saved-variable
//! actions such as `[hero:#name#]` cannot be expressed and are rejected.

use crate::error::{GrammarError, Result};
use crate::grammar::{slot_key, ContextFreeGrammar};
use crate::template::Template;
use crate::tokenizer::{Detokenizer, SlotSyntax, WordTokenizer};
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::combinator::recognize;
use nom::multi::many1;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::IResult;

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-')(input)
}

/// `#name.mod1.mod2#`, yielding `name`.
fn modified_slot(input: &str) -> IResult<&str, &str> {
    delimited(
        char('#'),
        terminated(identifier, recognize(many1(preceded(char('.'), identifier)))),
        char('#'),
    )(input)
}

/// `[name:value]`
fn saved_variable(input: &str) -> IResult<&str, (&str, &str)> {
    delimited(char('['), separated_pair(identifier, char(':'), identifier), char(']'))(input)
}

/// `[name:#value#]`
fn saved_slot_variable(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        char('['),
        pair(identifier, preceded(char(':'), delimited(char('#'), identifier, char('#')))),
        char(']'),
    ))(input)
}

/// Rewrites every `#name.modifier#` into `#name#`.
pub fn strip_tracery_modifiers(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        match modified_slot(rest) {
            Ok((remaining, name)) => {
                result.push('#');
                result.push_str(name);
                result.push('#');
                rest = remaining;
            }
            Err(_) => {
                result.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    result
}

/// The first saved-variable action in `text`, if any.
fn find_saved_variable(text: &str) -> Option<&str> {
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if let Ok((remaining, _)) = saved_variable(rest) {
            return Some(&rest[..rest.len() - remaining.len()]);
        }
        if let Ok((_, action)) = saved_slot_variable(rest) {
            return Some(action);
        }
        rest = &rest[c.len_utf8()..];
    }
    None
}

/// Parses a Tracery grammar document.
pub fn from_tracery_str(json: &str) -> Result<ContextFreeGrammar> {
    let stripped = strip_tracery_modifiers(json);
    if let Some(action) = find_saved_variable(&stripped) {
        return Err(GrammarError::UnsupportedTracery(format!(
            "saved variable {action} cannot be represented"
        )));
    }
    ContextFreeGrammar::from_json_str_with(&stripped, |text| {
        Template::parse_with(text, &WordTokenizer, SlotSyntax::Hash)
    })
}

/// Renders the grammar as a Tracery document with `#name#` references.
pub fn to_tracery(grammar: &ContextFreeGrammar, detokenizer: &dyn Detokenizer) -> Result<String> {
    grammar.to_json_with(|template| template.hash_notation(detokenizer))
}

/// One `name -> first | second` line per defined non-terminal, in
/// [`ContextFreeGrammar::slots_sorted`] order with sorted productions.
pub fn to_arrow_notation(grammar: &ContextFreeGrammar, detokenizer: &dyn Detokenizer) -> String {
    let mut lines = Vec::new();
    for slot in grammar.slots_sorted() {
        let Ok(productions) = grammar.productions(&slot) else {
            continue;
        };
        let mut rendered: Vec<String> = productions
            .iter()
            .map(|production| production.flat_string(detokenizer))
            .collect();
        rendered.sort();
        lines.push(format!("{} -> {}", slot_key(&slot), rendered.join(" | ")));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Slot;
    use crate::tokenizer::{SpaceDetokenizer, WordDetokenizer};

    #[test]
    fn test_modifier_removal() {
        assert_eq!("#a#", strip_tracery_modifiers("#a.bla#"));
        assert_eq!("#a#", strip_tracery_modifiers("#a.title#"));
        assert_eq!("#b#", strip_tracery_modifiers("#b.title#"));
        assert_eq!("#blabla#", strip_tracery_modifiers("#blabla.title#"));
        assert_eq!("#a# and #b#", strip_tracery_modifiers("#a.s.capitalize# and #b#"));
        assert_eq!("no slots.", strip_tracery_modifiers("no slots."));
    }

    #[test]
    fn test_from_tracery() {
        let json = r##"{
            "origin": ["#hero.capitalize# fights #villain#"],
            "hero": ["knight", "wizard"],
            "villain": "dragon"
        }"##;
        let grammar = from_tracery_str(json).unwrap();
        let expected = ContextFreeGrammar::from_strings([
            ("origin", vec!["<hero> fights <villain>"]),
            ("hero", vec!["knight", "wizard"]),
            ("villain", vec!["dragon"]),
        ]);
        assert_eq!(expected, grammar);
        assert_eq!(grammar.number_of_generations(), Some(2));
    }

    #[test]
    fn test_rejects_saved_variables() {
        let json = r##"{"origin": ["[hero:#name#]#hero# waits"], "name": ["Ann"]}"##;
        assert!(matches!(from_tracery_str(json), Err(GrammarError::UnsupportedTracery(_))));

        let json = r##"{"origin": ["[mood:happy]#mood#"]}"##;
        assert!(matches!(from_tracery_str(json), Err(GrammarError::UnsupportedTracery(_))));
    }

    #[test]
    fn test_to_tracery_round_trip() {
        let grammar = ContextFreeGrammar::from_strings([
            ("origin", vec!["<hello>, <world>!"]),
            ("hello", vec!["hi", "hello"]),
            ("world", vec!["world"]),
        ]);
        let tracery = to_tracery(&grammar, &WordDetokenizer).unwrap();
        assert!(tracery.contains("\"#hello#, #world#!\""));
        assert_eq!(grammar, from_tracery_str(&tracery).unwrap());
    }

    #[test]
    fn test_arrow_notation() {
        let grammar = ContextFreeGrammar::from_strings([
            ("origin", vec!["<hello> <world>"]),
            ("world", vec!["world", "universe"]),
            ("hello", vec!["hi", "hello"]),
        ]);
        assert_eq!(
            to_arrow_notation(&grammar, &SpaceDetokenizer),
            "origin -> <hello> <world>\nhello -> hello | hi\nworld -> universe | world"
        );
        assert_eq!(grammar.to_string(), to_arrow_notation(&grammar, &WordDetokenizer));
        assert!(grammar.is_defined(&Slot::named("hello")));
    }
}
