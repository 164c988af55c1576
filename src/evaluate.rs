//! Tagging accuracy and attachment scores.

use crate::errors::{Result, RudepError};
use crate::graph::DependencyGraph;

/// Characters treated as punctuation when deciding whether a token is
/// scored. Approximates the Unicode `P*` categories as they occur in
/// tree-bank text; symbol characters such as `$` or `+` still count as
/// words.
fn is_punctuation_char(c: char) -> bool {
    matches!(
        c,
        '.' | ','
            | ';'
            | ':'
            | '!'
            | '?'
            | '¡'
            | '¿'
            | '('
            | ')'
            | '['
            | ']'
            | '{'
            | '}'
            | '"'
            | '\''
            | '`'
            | '-'
            | '_'
            | '/'
            | '\\'
            | '&'
            | '#'
            | '%'
            | '*'
            | '@'
            | '‘'
            | '’'
            | '“'
            | '”'
            | '„'
            | '«'
            | '»'
            | '–'
            | '—'
            | '…'
    )
}

fn is_punctuation(form: &str) -> bool {
    form.chars().all(is_punctuation_char)
}

/// Measures labelled and unlabelled attachment score and tagging accuracy
/// between parser output and gold trees. Punctuation is ignored in the
/// attachment scores.
pub struct Evaluator<'a> {
    parsed: &'a [DependencyGraph],
    gold: &'a [DependencyGraph],
}

impl<'a> Evaluator<'a> {
    /// Pairs parser output with gold graphs.
    ///
    /// # Errors
    ///
    /// [`RudepError::LengthMismatch`] when the lists differ in length.
    pub fn new(parsed: &'a [DependencyGraph], gold: &'a [DependencyGraph]) -> Result<Self> {
        if parsed.len() != gold.len() {
            return Err(RudepError::LengthMismatch {
                parsed: parsed.len(),
                gold: gold.len(),
            });
        }
        Ok(Self { parsed, gold })
    }

    fn pairs(&self) -> Result<Vec<(&DependencyGraph, &DependencyGraph)>> {
        let mut pairs = Vec::with_capacity(self.parsed.len());
        for (parsed, gold) in self.parsed.iter().zip(self.gold) {
            if parsed.len() != gold.len() {
                return Err(RudepError::LengthMismatch {
                    parsed: parsed.len(),
                    gold: gold.len(),
                });
            }
            pairs.push((parsed, gold));
        }
        Ok(pairs)
    }

    /// The share of non-root nodes whose coarse tag matches the gold tag.
    ///
    /// # Errors
    ///
    /// [`RudepError::LengthMismatch`] when a pair differs in node count.
    pub fn pos_accuracy(&self) -> Result<f64> {
        let mut correct = 0usize;
        let mut total = 0usize;
        for (parsed, gold) in self.pairs()? {
            for (parsed_node, gold_node) in parsed.nodes()[1..].iter().zip(&gold.nodes()[1..]) {
                total += 1;
                if parsed_node.coarse_tag == gold_node.coarse_tag {
                    correct += 1;
                }
            }
        }
        if total == 0 {
            return Ok(0.0);
        }
        Ok(correct as f64 / total as f64)
    }

    /// `(UAS, LAS)`: the share of scored tokens with the right head, and
    /// with the right head and relation.
    ///
    /// # Errors
    ///
    /// [`RudepError::LengthMismatch`] when a pair differs in node count,
    /// [`RudepError::TokenMismatch`] when forms diverge within a pair.
    pub fn attachment_scores(&self) -> Result<(f64, f64)> {
        let mut correct = 0usize;
        let mut correct_labelled = 0usize;
        let mut total = 0usize;
        for (parsed, gold) in self.pairs()? {
            for (parsed_node, gold_node) in parsed.nodes()[1..].iter().zip(&gold.nodes()[1..]) {
                let Some(form) = parsed_node.form.as_deref() else {
                    continue;
                };
                if parsed_node.form != gold_node.form {
                    return Err(RudepError::TokenMismatch {
                        id: parsed_node.id,
                    });
                }
                if is_punctuation(form) {
                    continue;
                }
                total += 1;
                if parsed_node.head == gold_node.head {
                    correct += 1;
                    if parsed_node.relation == gold_node.relation {
                        correct_labelled += 1;
                    }
                }
            }
        }
        if total == 0 {
            return Ok((0.0, 0.0));
        }
        Ok((
            correct as f64 / total as f64,
            correct_labelled as f64 / total as f64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLD: &str = "\
one\tA\t2\tx
two\tA\t0\troot
three\tA\t2\ty
four\tA\t2\tz
";

    // One wrong head (node 1) and one wrong relation (node 3).
    const PARSED: &str = "\
one\tA\t3\tx
two\tA\t0\troot
three\tA\t2\tw
four\tA\t2\tz
";

    #[test]
    fn test_attachment_scores_fractions() {
        let gold = vec![DependencyGraph::from_text(GOLD).unwrap()];
        let parsed = vec![DependencyGraph::from_text(PARSED).unwrap()];
        let (uas, las) = Evaluator::new(&parsed, &gold)
            .unwrap()
            .attachment_scores()
            .unwrap();
        assert!((uas - 3.0 / 4.0).abs() < f64::EPSILON);
        assert!((las - 2.0 / 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_punctuation_is_skipped() {
        let gold_text = "one\tA\t2\tx\ntwo\tA\t0\troot\n.\tPUNCT\t2\tp\n";
        let parsed_text = "one\tA\t2\tx\ntwo\tA\t0\troot\n.\tPUNCT\t1\tp\n";
        let gold = vec![DependencyGraph::from_text(gold_text).unwrap()];
        let parsed = vec![DependencyGraph::from_text(parsed_text).unwrap()];
        let (uas, las) = Evaluator::new(&parsed, &gold)
            .unwrap()
            .attachment_scores()
            .unwrap();
        // The period's wrong head does not count against the score.
        assert!((uas - 1.0).abs() < f64::EPSILON);
        assert!((las - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pos_accuracy_counts_tags() {
        let gold = vec![DependencyGraph::from_text("a\tNOUN\t0\nb\tVERB\t1\n").unwrap()];
        let parsed = vec![DependencyGraph::from_text("a\tNOUN\t0\nb\tNOUN\t1\n").unwrap()];
        let accuracy = Evaluator::new(&parsed, &gold)
            .unwrap()
            .pos_accuracy()
            .unwrap();
        assert!((accuracy - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_graph_list_length_mismatch_rejected() {
        let gold = vec![DependencyGraph::from_text(GOLD).unwrap()];
        assert!(matches!(
            Evaluator::new(&[], &gold),
            Err(RudepError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_node_count_mismatch_rejected() {
        let gold = vec![DependencyGraph::from_text(GOLD).unwrap()];
        let parsed = vec![DependencyGraph::from_text("one\tA\t0\n").unwrap()];
        let evaluator = Evaluator::new(&parsed, &gold).unwrap();
        assert!(matches!(
            evaluator.pos_accuracy(),
            Err(RudepError::LengthMismatch { .. })
        ));
        assert!(matches!(
            evaluator.attachment_scores(),
            Err(RudepError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_token_mismatch_rejected() {
        let gold = vec![DependencyGraph::from_text("one\tA\t0\n").unwrap()];
        let parsed = vec![DependencyGraph::from_text("eins\tA\t0\n").unwrap()];
        assert!(matches!(
            Evaluator::new(&parsed, &gold).unwrap().attachment_scores(),
            Err(RudepError::TokenMismatch { id: 1 })
        ));
    }
}
