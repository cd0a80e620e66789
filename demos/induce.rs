//! Induces a grammar from a corpus file with one example per line.
//!
//! ```text
//! RUST_LOG=debug cargo run --example induce -- corpus.txt [config.json]
//! ```
//!
//! The optional config is a (partial) JSON `InductionConfig`. Without a
//! corpus file a small built-in corpus is used.

use gitta_rs::{GrammarInducer, InductionConfig};
use std::env;
use std::error::Error;
use std::fs;

const BUILT_IN: &[&str] = &[
    "I like my cat and my dog.",
    "I like my dog and my chicken.",
    "I like my cat and my chicken.",
    "I love my cat and my dog.",
];

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let lines: Vec<String> = match args.next() {
        Some(path) => fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect(),
        None => BUILT_IN.iter().map(|line| line.to_string()).collect(),
    };
    let config: InductionConfig = match args.next() {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => InductionConfig::default(),
    };

    let mut inducer = GrammarInducer::new(config).with_observer(|label, tree| {
        println!("=== {label} ===");
        println!("{}", tree.render());
    });
    let grammar = inducer.induce(&lines)?;

    println!("=== Grammar ===");
    println!("{grammar}");
    println!();
    println!("{}", grammar.to_json()?);
    match grammar.number_of_generations() {
        Some(count) => println!(
            "\n{count} possible generations (corpus has {} lines)",
            lines.len()
        ),
        None => println!("\nrecursive grammar with unbounded generations"),
    }
    Ok(())
}
