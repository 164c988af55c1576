//! # rudep
//!
//! Greedy transition-based dependency parsing and part-of-speech tagging
//! implemented in pure Rust.
//!
//! The tagger is a greedy averaged perceptron with a shortcut dictionary for
//! frequent unambiguous words. The parser is a greedy shift/reduce-style
//! decoder over a stack and an input buffer, trained online with a dynamic
//! oracle and frozen by weight averaging. Tagging and parsing are total:
//! well-formed token input always yields a tag sequence and a well-formed
//! tree.
#![cfg_attr(
    feature = "train",
    doc = r#"
## Examples

```rust
use rudep::{DependencyGraph, Evaluator, ParserTrainer, TaggerTrainer};

// A toy tree-bank sentence: `form tag head` columns, head 0 is the root.
let gold = DependencyGraph::from_text("Dog\tNOUN\t2\nsees\tVERB\t0\ncat\tNOUN\t2\n")?;

// Train the tagger on tagged words and the parser on gold trees.
let (words, tags) = gold.pos_sequence();
let tagger = TaggerTrainer::new()
    .iterations(10)?
    .train(&[(words.clone(), tags)])?;
let (parser, report) = ParserTrainer::new()
    .iterations(50)?
    .train(std::slice::from_ref(&gold))?;
assert_eq!(report.skipped_non_projective, 0);

// Decode: tags first, then the tree.
let (tags, parsed) = parser.parse_with_tagger(&tagger, &words)?;
assert_eq!(tags, ["NOUN", "VERB", "NOUN"]);
assert_eq!(parsed.node(2).unwrap().head, Some(0));

// Score against the gold tree.
let evaluator = Evaluator::new(std::slice::from_ref(&parsed), std::slice::from_ref(&gold))?;
let (uas, _las) = evaluator.attachment_scores()?;
assert!((uas - 1.0).abs() < f64::EPSILON);
# Ok::<(), rudep::RudepError>(())
```
"#
)]
#![deny(missing_docs)]

mod distance;
mod errors;
mod evaluate;
mod feature;
mod graph;
mod parser;
mod perceptron;
mod tagger;

pub use distance::{EditOp, WordDistance};
pub use errors::{Result, RudepError};
pub use evaluate::Evaluator;
pub use graph::{ColumnLayout, DependencyGraph, Node, ROOT};
pub use parser::{Move, Parser};
pub use perceptron::Perceptron;
pub use tagger::{describe_tag, TaggedSentence, Tagger};

#[cfg(feature = "train")]
pub use parser::{ParserTrainer, TrainReport};
#[cfg(feature = "train")]
pub use tagger::TaggerTrainer;
